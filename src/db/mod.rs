//! Database loading and the in-memory path set.
//!
//! A [`DB`] is the canonicalized union of one or more mlocate database
//! files, restricted to the configured root prefix. The basename index
//! is built lazily on first use (or eagerly when `hash_map` is set) and
//! is read-only afterwards.

pub mod format;

use crate::fsutil;
use crate::options::Options;
use crate::search::matcher::bake_name;
use anyhow::{Context, Result};
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Lists of paths keyed by baked basename.
pub type PathList = HashMap<String, Vec<String>>;

/// An opened set of locate databases.
pub struct DB {
    db_filenames: Vec<PathBuf>,
    files: Vec<String>,
    options: Options,
    basenames: OnceLock<PathList>,
}

impl DB {
    /// Read the given database files and store the union of their paths.
    ///
    /// The options are copied; `root` is normalized and `accessable` is
    /// downgraded when one of the database files itself is unreadable
    /// before escalation (a database we cannot access directly would
    /// otherwise filter away every candidate).
    pub fn open(db_filenames: &[PathBuf], options: &Options) -> Result<DB> {
        let mut options = options.clone();
        options.root = normalize_root(&options.root);

        if options.accessable {
            for filename in db_filenames {
                if !fsutil::readable(filename) {
                    debug!(
                        "database {} not readable, dropping access checks",
                        filename.display()
                    );
                    options.accessable = false;
                    break;
                }
            }
        }

        let files = read_all(db_filenames, &options)?;

        let db = DB {
            db_filenames: db_filenames.to_vec(),
            files,
            options,
            basenames: OnceLock::new(),
        };

        if db.options.hash_map {
            db.basenames();
        }

        Ok(db)
    }

    /// The loaded path set. Every entry is absolute with no trailing slash.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// The creation-time options (after root normalization and the
    /// possible `accessable` downgrade).
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The database files this `DB` was opened from.
    pub fn db_filenames(&self) -> &[PathBuf] {
        &self.db_filenames
    }

    /// Baked-basename index, built at most once.
    pub fn basenames(&self) -> &PathList {
        self.basenames.get_or_init(|| {
            let mut map = PathList::new();
            for f in &self.files {
                let key = bake_name(fsutil::final_component(f), &self.options);
                map.entry(key).or_default().push(f.clone());
            }
            map
        })
    }

    /// Basename groups with more than one member.
    pub fn duplicates(&self) -> PathList {
        self.basenames()
            .iter()
            .filter(|(_, paths)| paths.len() > 1)
            .map(|(base, paths)| (base.clone(), paths.clone()))
            .collect()
    }
}

/// Refine a duplicate group by file size: link-stat each path, drop
/// non-regular files and anything below `min_size`, and return only the
/// size buckets that still hold more than one path.
pub fn size_groups(paths: &[String], min_size: u64) -> Vec<(u64, Vec<String>)> {
    let mut by_size: HashMap<u64, Vec<String>> = HashMap::new();
    for path in paths {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("stat {}: {}", path, e);
                continue;
            }
        };
        if !meta.file_type().is_file() {
            continue;
        }
        let size = meta.len();
        if size < min_size {
            continue;
        }
        by_size.entry(size).or_default().push(path.clone());
    }

    let mut groups: Vec<(u64, Vec<String>)> = by_size
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .collect();
    groups.sort_by_key(|(size, _)| *size);
    groups
}

fn normalize_root(root: &str) -> String {
    if root.is_empty() {
        return "/".to_string();
    }
    let cleaned = fsutil::clean_path(Path::new(root));
    cleaned.to_string_lossy().into_owned()
}

fn read_all(db_filenames: &[PathBuf], options: &Options) -> Result<Vec<String>> {
    if db_filenames.is_empty() {
        anyhow::bail!("no database files given");
    }

    if db_filenames.len() == 1 {
        return read_one(&db_filenames[0], options);
    }

    // Databases are independent; read and decode them in parallel and
    // union the results through a set afterwards.
    let per_db: Vec<Result<Vec<String>>> = db_filenames
        .par_iter()
        .map(|filename| read_one(filename, options))
        .collect();

    let mut union: HashSet<String> = HashSet::new();
    let mut loaded_any = false;
    let mut last_err = None;
    for (filename, result) in db_filenames.iter().zip(per_db) {
        match result {
            Ok(paths) => {
                loaded_any = true;
                union.extend(paths);
            }
            Err(e) if options.skip_bad_databases => {
                warn!("skipping database {}: {}", filename.display(), e);
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    // Skipping bad databases still fails when not a single one loaded.
    if !loaded_any {
        if let Some(e) = last_err {
            return Err(e);
        }
    }

    Ok(union.into_iter().collect())
}

fn read_one(filename: &Path, options: &Options) -> Result<Vec<String>> {
    let data = read_database(filename)
        .with_context(|| format!("reading database {}", filename.display()))?;
    let paths = format::parse(&data, &options.root)
        .with_context(|| format!("decoding database {}", filename.display()))?;
    debug!("{}: {} paths", filename.display(), paths.len());
    Ok(paths)
}

/// Read a database file, escalating to the owning group of our own
/// executable when a direct read is denied. Escalation is best-effort:
/// when the credentials cannot be changed the direct error stands.
fn read_database(filename: &Path) -> std::io::Result<Vec<u8>> {
    match fs::read(filename) {
        Ok(data) => Ok(data),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            read_with_group_escalation(filename).map_err(|_| e)
        }
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn read_with_group_escalation(filename: &Path) -> std::io::Result<Vec<u8>> {
    use std::os::unix::fs::MetadataExt;

    let exe = std::env::current_exe()?;
    let gid = fs::metadata(&exe)?.gid();

    let prev = unsafe { libc::getegid() };
    if unsafe { libc::setegid(gid) } != 0 {
        return fs::read(filename);
    }
    let result = fs::read(filename);
    if unsafe { libc::setegid(prev) } != 0 {
        warn!("failed to restore group id {}", prev);
    }
    result
}

#[cfg(not(unix))]
fn read_with_group_escalation(filename: &Path) -> std::io::Result<Vec<u8>> {
    fs::read(filename)
}
