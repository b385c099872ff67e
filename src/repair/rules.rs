//! Replacement rules consulted when the search chain finds no candidate
//! for a broken link.
//!
//! One rule per line; empty lines and lines starting with `#` are
//! skipped. A rule is a method character followed by two backtick-quoted
//! fields:
//!
//! ```text
//! [m]`source`destination`
//! ```
//!
//! where `m` is `s` (substring), `w` (wildcard) or `r` (regexp); a line
//! starting directly with a backtick means an exact match. Source and
//! destination must both be non-empty.

use crate::fsutil::final_component;
use anyhow::{bail, Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use log::debug;
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug)]
enum RuleMatcher {
    Exact,
    Substring,
    Wildcard(GlobMatcher),
    Regexp(Regex),
}

/// A single replacement rule: when the matcher accepts a link name, the
/// destination becomes a candidate target.
#[derive(Debug)]
pub struct Rule {
    matcher: RuleMatcher,
    source: String,
    destination: String,
}

impl Rule {
    fn parse(line: &str) -> Result<Rule> {
        let (method, rest) = match line.chars().next() {
            Some('`') => ('h', line),
            Some(c @ ('s' | 'w' | 'r')) => (c, &line[1..]),
            Some(c) => bail!("unknown rule method {:?}", c),
            None => bail!("empty rule"),
        };

        let ticks: Vec<usize> = rest
            .char_indices()
            .filter(|(_, c)| *c == '`')
            .map(|(i, _)| i)
            .collect();
        if ticks.len() != 4 {
            bail!("expected 4 backticks, found {}", ticks.len());
        }

        let source = rest[ticks[0] + 1..ticks[1]].to_string();
        let destination = rest[ticks[2] + 1..ticks[3]].to_string();
        if source.is_empty() || destination.is_empty() {
            bail!("rule source and destination must not be empty");
        }

        let matcher = match method {
            'h' => RuleMatcher::Exact,
            's' => RuleMatcher::Substring,
            'w' => RuleMatcher::Wildcard(
                GlobBuilder::new(&source)
                    .literal_separator(true)
                    .build()
                    .with_context(|| format!("bad wildcard rule {:?}", source))?
                    .compile_matcher(),
            ),
            'r' => RuleMatcher::Regexp(
                Regex::new(&source).with_context(|| format!("bad regexp rule {:?}", source))?,
            ),
            _ => unreachable!(),
        };

        Ok(Rule {
            matcher,
            source,
            destination,
        })
    }

    /// Does this rule apply to `filename`? Wildcard rules run against the
    /// final component, mirroring the wildcard search method.
    pub fn matches(&self, filename: &str) -> bool {
        match &self.matcher {
            RuleMatcher::Exact => filename == self.source,
            RuleMatcher::Substring => filename.contains(&self.source),
            RuleMatcher::Wildcard(glob) => glob.is_match(final_component(filename)),
            RuleMatcher::Regexp(re) => re.is_match(filename),
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match self.matcher {
            RuleMatcher::Exact => "exact",
            RuleMatcher::Substring => "substring",
            RuleMatcher::Wildcard(_) => "wildcard",
            RuleMatcher::Regexp(_) => "regexp",
        };
        write!(f, "{}: {} -> {}", method, self.source, self.destination)
    }
}

/// An ordered rule list.
#[derive(Debug)]
pub struct Replacer {
    rules: Vec<Rule>,
}

impl Replacer {
    /// Parse a rule file. Failures carry the file name and line number.
    pub fn from_file(path: &Path) -> Result<Replacer> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading rule file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in rule file {}", path.display()))
    }

    /// Parse rule lines from a string.
    pub fn parse(text: &str) -> Result<Replacer> {
        let mut rules = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let rule = Rule::parse(line).with_context(|| format!("line {}", i + 1))?;
            debug!("replacement rule: {}", rule);
            rules.push(rule);
        }
        Ok(Replacer { rules })
    }

    /// Destinations of every rule matching `filename`, in rule order.
    pub fn replace(&self, filename: &str) -> Vec<String> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(filename))
            .map(|rule| rule.destination.clone())
            .collect()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_methods_and_skips_comments() {
        let replacer = Replacer::parse(
            "# comment\n\
             \n\
             `exact-name` `/dst/exact`\n\
             s`frag` `/dst/sub`\n\
             w`lib*.so` `/dst/glob`\n\
             r`^/opt/.*\\.cfg$` `/dst/re`\n",
        )
        .unwrap();
        assert_eq!(replacer.rules().len(), 4);
    }

    #[test]
    fn replace_concatenates_matching_destinations_in_order() {
        let replacer = Replacer::parse(
            "s`conf` `/first`\n\
             s`old` `/second`\n\
             s`conf` `/third`\n",
        )
        .unwrap();
        assert_eq!(
            replacer.replace("/etc/old.conf"),
            vec!["/first", "/second", "/third"]
        );
        assert_eq!(replacer.replace("/etc/other"), Vec::<String>::new());
    }

    #[test]
    fn exact_rules_compare_the_whole_name() {
        let replacer = Replacer::parse("`/lib/libz.so` `/usr/lib/libz.so`\n").unwrap();
        assert_eq!(replacer.replace("/lib/libz.so"), vec!["/usr/lib/libz.so"]);
        assert!(replacer.replace("/lib/libz.so.1").is_empty());
    }

    #[test]
    fn wildcard_rules_match_the_final_component() {
        let replacer = Replacer::parse("w`libfoo.so.*` `/usr/lib/libfoo.so`\n").unwrap();
        assert_eq!(
            replacer.replace("/old/tree/libfoo.so.3"),
            vec!["/usr/lib/libfoo.so"]
        );
        assert!(replacer.replace("/old/tree/libbar.so.3").is_empty());
    }

    #[test]
    fn malformed_rules_fail_with_the_line_number() {
        let err = Replacer::parse("`ok` `/dst`\nx`bad` `/dst`\n").unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));

        let err = Replacer::parse("`missing-ticks`\n").unwrap_err();
        assert!(format!("{:#}", err).contains("line 1"));
    }

    #[test]
    fn empty_fields_are_rejected() {
        assert!(Replacer::parse("`` `/dst`\n").is_err());
        assert!(Replacer::parse("`src` ``\n").is_err());
    }

    #[test]
    fn bad_regexp_rule_is_rejected() {
        assert!(Replacer::parse("r`(unclosed` `/dst`\n").is_err());
    }
}
