//! Search methods and their matching predicates.
//!
//! Every sequential matcher is a pure predicate over already-baked
//! strings; option handling happens once at compile time through a
//! per-call option snapshot, so nothing here mutates shared state.

use crate::fsutil::final_component;
use crate::options::Options;
use crate::search::fuzzy::{levenshtein, LevenshteinCost};
use anyhow::{bail, Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use memchr::memmem;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// The available search methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Exact basename lookup through the prebuilt index.
    HashMap,
    /// Byte substring containment.
    Substring,
    /// Shell-style glob over basenames.
    Wildcard,
    /// Regular expression match anywhere in the path.
    Regexp,
    /// Weighted edit distance between final components.
    Levenshtein,
}

impl FromStr for Method {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hashmap" => Ok(Method::HashMap),
            "substring" => Ok(Method::Substring),
            "wildcard" => Ok(Method::Wildcard),
            "regexp" => Ok(Method::Regexp),
            "levenshtein" => Ok(Method::Levenshtein),
            other => bail!("no such search method: {}", other),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::HashMap => "hashmap",
            Method::Substring => "substring",
            Method::Wildcard => "wildcard",
            Method::Regexp => "regexp",
            Method::Levenshtein => "levenshtein",
        };
        f.write_str(name)
    }
}

/// Parse a comma-separated method chain, e.g. `"hashmap,substring"`.
pub fn parse_method_chain(spec: &str) -> Result<Vec<Method>> {
    let methods: Vec<Method> = spec
        .split(',')
        .filter(|s| !s.is_empty())
        .map(Method::from_str)
        .collect::<Result<_>>()?;
    if methods.is_empty() {
        bail!("empty search method list");
    }
    Ok(methods)
}

/// Strip the extension of the final component, leaving dotfiles alone.
fn strip_extension(name: &str) -> &str {
    let base = final_component(name);
    match base.rfind('.') {
        Some(i) if i > 0 => &name[..name.len() - (base.len() - i)],
        _ => name,
    }
}

/// Canonicalize a name per the active options: ASCII case fold, then
/// extension strip, then reduction to the final component.
pub fn bake_name(name: &str, options: &Options) -> String {
    let mut name = if options.ignore_case {
        name.to_ascii_lowercase()
    } else {
        name.to_string()
    };

    if options.strip_extension {
        name = strip_extension(&name).to_string();
    }

    if options.strip_path {
        name = final_component(&name).to_string();
    }

    name
}

/// A compiled sequential matcher. The hashmap method never reaches this
/// type; it is answered straight from the basename index.
pub enum Pattern {
    Substring(String),
    Wildcard(GlobMatcher),
    Regexp(Regex),
    Levenshtein {
        name: String,
        cost: LevenshteinCost,
        threshold: usize,
    },
}

impl Pattern {
    /// Compile `pattern` for `method`, baking it with a snapshot of the
    /// options. The snapshot is returned for baking haystacks with the
    /// same transform: the wildcard matcher forces `strip_path` so globs
    /// run against basenames, without touching the caller's options.
    pub fn compile(method: Method, pattern: &str, options: &Options) -> Result<(Pattern, Options)> {
        let mut snapshot = options.clone();

        let pattern = match method {
            Method::HashMap => bail!("hashmap lookups are answered from the index"),
            Method::Wildcard => {
                snapshot.strip_path = true;
                let baked = bake_name(pattern, &snapshot);
                let glob = GlobBuilder::new(&baked)
                    .literal_separator(true)
                    .build()
                    .with_context(|| format!("bad wildcard pattern {:?}", baked))?;
                return Ok((Pattern::Wildcard(glob.compile_matcher()), snapshot));
            }
            _ => bake_name(pattern, &snapshot),
        };

        let compiled = match method {
            Method::Substring => Pattern::Substring(pattern),
            Method::Regexp => Pattern::Regexp(
                Regex::new(&pattern).with_context(|| format!("bad regexp {:?}", pattern))?,
            ),
            Method::Levenshtein => Pattern::Levenshtein {
                name: final_component(&pattern).to_string(),
                cost: snapshot.levenshtein_cost,
                threshold: snapshot.levenshtein_threshold,
            },
            Method::HashMap | Method::Wildcard => unreachable!(),
        };

        Ok((compiled, snapshot))
    }

    /// Pure predicate over an already-baked haystack.
    pub fn is_match(&self, haystack: &str) -> bool {
        match self {
            Pattern::Substring(needle) => {
                memmem::find(haystack.as_bytes(), needle.as_bytes()).is_some()
            }
            Pattern::Wildcard(glob) => glob.is_match(haystack),
            Pattern::Regexp(re) => re.is_match(haystack),
            Pattern::Levenshtein {
                name,
                cost,
                threshold,
            } => levenshtein(name, final_component(haystack), cost) <= *threshold,
        }
    }
}
