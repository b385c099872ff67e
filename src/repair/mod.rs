//! Broken-symlink detection and repair.
//!
//! The engine walks directory trees, classifies symlinks, asks the
//! search layer for replacement candidates, falls back to the rule
//! engine, and applies the fix. All state lives in the engine value;
//! one link's failure never aborts the walk.

pub mod rules;

use crate::db::DB;
use crate::fsutil::{final_component, link_alive};
use crate::interact::Prompt;
use crate::search::locate_all;
use crate::search::matcher::Method;
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use log::{debug, info, warn};
use regex::Regex;
use rules::Replacer;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::symlink;
#[cfg(windows)]
use std::os::windows::fs::symlink_file as symlink;

/// Behavior switches for a repair run.
#[derive(Debug, Clone, Default)]
pub struct RepairConfig {
    /// Descend into subdirectories.
    pub recurse: bool,
    /// Never prompt; links with several candidates are skipped.
    pub automated: bool,
    /// Unlink broken links that have no candidate at all.
    pub delete_dead: bool,
    /// Assume yes for every confirmation.
    pub yes_to_all: bool,
    /// Rename the link to the new target's final component.
    pub rename_symlink: bool,
    /// Treat a link whose name differs from its target's as broken.
    pub match_names: bool,
    /// Search method chain for candidate lookup.
    pub methods: Vec<Method>,
}

/// Repair outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub repaired: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub dead: usize,
}

/// Counters plus the record of links nothing could be found for.
#[derive(Default)]
pub struct Summary {
    pub counters: Counters,
    pub missing_targets: BTreeSet<String>,
    pub broken_links: BTreeMap<String, String>,
}

impl Summary {
    /// Dump to stderr. Printed on request even after per-link errors.
    pub fn print(&self) {
        let c = &self.counters;
        eprintln!(
            "[summary] repaired: {}, deleted: {}, skipped: {}, dead: {}",
            c.repaired, c.deleted, c.skipped, c.dead
        );
        eprintln!(
            "[summary] missing targets ({} items):",
            self.missing_targets.len()
        );
        for target in &self.missing_targets {
            eprintln!("[summary]   {}", target);
        }
        eprintln!("[summary] broken links ({} items):", self.broken_links.len());
        for (link, target) in &self.broken_links {
            eprintln!("[summary]   {} -> {}", link, target);
        }
    }
}

/// Candidate filters: newline-separated regular expressions, a leading
/// `!` inverting the sense. A candidate passes when it matches every
/// plain filter and none of the inverted ones.
#[derive(Default)]
pub struct ResultFilters {
    keep: Vec<Regex>,
    drop: Vec<Regex>,
}

impl ResultFilters {
    pub fn parse(spec: &str) -> Result<ResultFilters> {
        let mut filters = ResultFilters::default();
        for line in spec.lines() {
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix('!') {
                filters
                    .drop
                    .push(Regex::new(rest).with_context(|| format!("bad filter {:?}", line))?);
            } else {
                filters
                    .keep
                    .push(Regex::new(line).with_context(|| format!("bad filter {:?}", line))?);
            }
        }
        Ok(filters)
    }

    pub fn is_empty(&self) -> bool {
        self.keep.is_empty() && self.drop.is_empty()
    }

    pub fn allows(&self, name: &str) -> bool {
        self.keep.iter().all(|re| re.is_match(name))
            && !self.drop.iter().any(|re| re.is_match(name))
    }
}

/// The repair driver. Holds the database, the configuration and the
/// running summary; filesystem mutation happens only in `relink`.
pub struct RepairEngine<'a, P: Prompt> {
    db: &'a DB,
    config: RepairConfig,
    filters: ResultFilters,
    replacer: Option<Replacer>,
    prompt: P,
    summary: Summary,
}

impl<'a, P: Prompt> RepairEngine<'a, P> {
    pub fn new(
        db: &'a DB,
        config: RepairConfig,
        filters: ResultFilters,
        replacer: Option<Replacer>,
        prompt: P,
    ) -> Self {
        Self {
            db,
            config,
            filters,
            replacer,
            prompt,
            summary: Summary::default(),
        }
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn into_summary(self) -> Summary {
        self.summary
    }

    /// Walk `start` and repair every symlink found. Walk errors are
    /// warnings; the traversal continues past them.
    pub fn run(&mut self, start: &Path) {
        if let Err(e) = fs::symlink_metadata(start) {
            warn!("{}: {}", start.display(), e);
            return;
        }

        let max_depth = if self.config.recurse { None } else { Some(1) };
        let walker = WalkBuilder::new(start)
            .standard_filters(false)
            .follow_links(false)
            .max_depth(max_depth)
            .build();

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.path_is_symlink() {
                        self.fix_link(entry.path());
                    }
                }
                Err(e) => warn!("walk: {}", e),
            }
        }
    }

    /// Repair a single link. Per-link failures are logged and leave the
    /// link untouched.
    pub fn fix_link(&mut self, path: &Path) {
        let (alive, resolved) = match link_alive(path, self.config.match_names) {
            Ok(pair) => pair,
            Err(e) => {
                warn!("{}: {}", path.display(), e);
                return;
            }
        };

        let link = path.display().to_string();
        let mut target = resolved.to_string_lossy().into_owned();
        if alive {
            debug!("{} -> {}", link, target);
            return;
        }
        debug!("{} -> {} (broken)", link, target);

        // The database never stores a trailing slash for directories.
        if target.len() > 1 && target.ends_with('/') {
            target.pop();
        }
        let pattern = final_component(&target).to_string();

        let mut matches = match locate_all(self.db, &self.config.methods, &pattern) {
            Ok(matches) => matches,
            Err(e) => {
                warn!("searching candidates for {}: {:#}", pattern, e);
                Vec::new()
            }
        };
        if !self.filters.is_empty() {
            matches.retain(|m| self.filters.allows(m));
        }
        for m in &matches {
            debug!("candidate: {}", m);
        }

        if matches.is_empty() {
            if let Some(replacer) = &self.replacer {
                debug!("consulting replacement rules for {}", link);
                matches = replacer.replace(&link);
            }
        }

        if matches.is_empty() {
            self.summary.missing_targets.insert(target.clone());
            self.summary.broken_links.insert(link, target);
            self.summary.counters.dead += 1;
            if self.config.delete_dead {
                self.relink(path, None);
            }
            return;
        }

        if matches.len() == 1 {
            self.relink(path, Some(&matches[0]));
            return;
        }

        if self.config.automated {
            debug!("automated mode, {} candidates for {}, skipping", matches.len(), link);
            self.summary.counters.skipped += 1;
            return;
        }

        matches.sort();
        let query = format!("(Fixing: {} -> {}) Which one is the correct target?", link, target);
        match self.prompt.choose(&query, &matches) {
            Some(choice) => self.relink(path, Some(&matches[choice])),
            None => self.summary.counters.skipped += 1,
        }
    }

    /// Unlink `name`; when a target is given, create the replacement
    /// symlink (under the target's final component when renaming).
    ///
    /// The removal and the creation are not atomic together: a create
    /// failure after a successful removal loses the link. The failure is
    /// logged and the counter stays untouched.
    fn relink(&mut self, name: &Path, target: Option<&str>) {
        let newname: PathBuf = match (self.config.rename_symlink, target) {
            (true, Some(t)) => {
                let dir = name.parent().unwrap_or_else(|| Path::new("."));
                dir.join(final_component(t))
            }
            _ => name.to_path_buf(),
        };

        if let Some(t) = target {
            if Path::new(t) == newname {
                warn!("symlink {} would point to itself, leaving it alone", newname.display());
                return;
            }
        }

        if !self.config.yes_to_all {
            let question = match target {
                None => format!("Really unlink {}?", name.display()),
                Some(t) => format!("Really relink {} -> {}?", newname.display(), t),
            };
            if !self.prompt.confirm(&question) {
                self.summary.counters.skipped += 1;
                return;
            }
        }

        if let Err(e) = fs::remove_file(name) {
            warn!("unlink {}: {}", name.display(), e);
            return;
        }

        match target {
            None => {
                info!("unlinked {}", name.display());
                self.summary.counters.deleted += 1;
            }
            Some(t) => match symlink(t, &newname) {
                Ok(()) => {
                    info!("created symlink {} -> {}", newname.display(), t);
                    self.summary.counters.repaired += 1;
                }
                Err(e) => warn!("symlink {} -> {}: {}", newname.display(), t, e),
            },
        }
    }
}
