//! Re-point symlinks whose raw targets match a pattern.
//!
//! Unlike the repair engine this never consults a database: the caller
//! names the pattern and (optionally) the replacement target. Without a
//! replacement, matching links are only printed.

use crate::fsutil::{absolutize, final_component};
use anyhow::{bail, Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use ignore::WalkBuilder;
use log::{debug, warn};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::symlink;
#[cfg(windows)]
use std::os::windows::fs::symlink_file as symlink;

enum TargetMatcher {
    Exact(String),
    Substring(String),
    Wildcard(GlobMatcher),
    Regexp(Regex),
}

impl TargetMatcher {
    fn new(method: &str, pattern: &str) -> Result<Self> {
        Ok(match method {
            "exact" => TargetMatcher::Exact(pattern.to_string()),
            "substring" => TargetMatcher::Substring(pattern.to_string()),
            "wildcard" => TargetMatcher::Wildcard(
                GlobBuilder::new(pattern)
                    .literal_separator(true)
                    .build()
                    .with_context(|| format!("bad wildcard pattern {:?}", pattern))?
                    .compile_matcher(),
            ),
            "regexp" => TargetMatcher::Regexp(
                Regex::new(pattern).with_context(|| format!("bad regexp {:?}", pattern))?,
            ),
            other => bail!("no such match method: {}", other),
        })
    }

    fn is_match(&self, target: &str) -> bool {
        match self {
            TargetMatcher::Exact(p) => target == p,
            TargetMatcher::Substring(p) => target.contains(p.as_str()),
            // Globs run against the final component, like the wildcard search method.
            TargetMatcher::Wildcard(glob) => glob.is_match(final_component(target)),
            TargetMatcher::Regexp(re) => re.is_match(target),
        }
    }
}

/// A retarget pass over one or more trees.
pub struct Retarget {
    matcher: TargetMatcher,
    ignore_case: bool,
    new_target: Option<String>,
    rename: bool,
    recurse: bool,
}

/// What a [`Retarget::run`] did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetargetStats {
    pub matched: usize,
    pub replaced: usize,
}

impl Retarget {
    pub fn new(
        method: &str,
        pattern: &str,
        ignore_case: bool,
        new_target: Option<String>,
        rename: bool,
        recurse: bool,
    ) -> Result<Retarget> {
        let pattern = if ignore_case {
            pattern.to_ascii_lowercase()
        } else {
            pattern.to_string()
        };
        Ok(Retarget {
            matcher: TargetMatcher::new(method, &pattern)?,
            ignore_case,
            new_target,
            rename,
            recurse,
        })
    }

    /// Walk `start`, inspecting every symlink's raw target.
    pub fn run(&self, start: &Path) -> RetargetStats {
        let mut stats = RetargetStats::default();

        let max_depth = if self.recurse { None } else { Some(1) };
        let walker = WalkBuilder::new(start)
            .standard_filters(false)
            .follow_links(false)
            .max_depth(max_depth)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("walk: {}", e);
                    continue;
                }
            };
            if entry.path_is_symlink() {
                self.visit(entry.path(), &mut stats);
            }
        }

        stats
    }

    fn visit(&self, path: &Path, stats: &mut RetargetStats) {
        let target = match fs::read_link(path) {
            Ok(target) => target,
            Err(e) => {
                warn!("readlink {}: {}", path.display(), e);
                return;
            }
        };
        let mut target = target.to_string_lossy().into_owned();
        if self.ignore_case {
            target = target.to_ascii_lowercase();
        }

        if !self.matcher.is_match(&target) {
            return;
        }
        debug!("{} -> {} matches", path.display(), target);
        stats.matched += 1;

        let Some(new_target) = &self.new_target else {
            println!("{}", absolutize(path, Path::new("")).display());
            return;
        };

        let newname: PathBuf = if self.rename {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            dir.join(final_component(new_target))
        } else {
            path.to_path_buf()
        };

        if let Err(e) = fs::remove_file(path) {
            warn!("unlink {}: {}", path.display(), e);
            return;
        }
        match symlink(new_target, &newname) {
            Ok(()) => {
                debug!("{} -> {}", newname.display(), new_target);
                stats.replaced += 1;
            }
            Err(e) => warn!("symlink {} -> {}: {}", newname.display(), new_target, e),
        }
    }
}
