//! Filesystem helpers: link-aliveness checks, path absolutization and
//! existence/access probes shared by the search and repair paths.

use crate::options::Options;
use anyhow::Result;
use log::warn;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Final path component of a `/`-separated path string. The root path is
/// its own final component.
pub fn final_component(path: &str) -> &str {
    if path == "/" {
        return path;
    }
    path.rsplit('/').next().unwrap_or(path)
}

/// Lexical path cleanup: drops `.` components and resolves `..` against
/// earlier components where possible. No filesystem access.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                let tail_is_parent =
                    matches!(out.components().next_back(), Some(Component::ParentDir));
                if tail_is_parent || !out.pop() {
                    if !path.has_root() {
                        out.push("..");
                    }
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Make `path` absolute: join against `dir` first, then against the
/// working directory if still relative, and clean the result.
pub fn absolutize(path: &Path, dir: &Path) -> PathBuf {
    let mut p = path.to_path_buf();
    if p.is_relative() {
        p = dir.join(p);
    }
    if p.is_relative() {
        match std::env::current_dir() {
            Ok(wd) => p = wd.join(p),
            Err(e) => warn!("cannot resolve working directory: {}", e),
        }
    }
    clean_path(&p)
}

/// Existence probe without following a final symlink.
pub fn file_exists(path: &Path) -> bool {
    match fs::symlink_metadata(path) {
        Ok(_) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("stat {}: {}", path.display(), e);
            false
        }
    }
}

/// Read-access probe. Uses `access(2)` so group/other permission bits are
/// honored for the current credentials rather than just openability.
#[cfg(unix)]
pub fn readable(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(cpath) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    unsafe { libc::access(cpath.as_ptr(), libc::R_OK) == 0 }
}

#[cfg(not(unix))]
pub fn readable(path: &Path) -> bool {
    fs::File::open(path).is_ok()
}

/// Classify a symlink. Returns whether the link is alive together with
/// its target resolved against the link's own directory.
///
/// With `match_names`, a link whose final component differs from its
/// target's final component counts as broken even when the target exists.
pub fn link_alive(path: &Path, match_names: bool) -> io::Result<(bool, PathBuf)> {
    let target = fs::read_link(path)?;
    let resolved = if target.is_relative() {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        clean_path(&dir.join(&target))
    } else {
        clean_path(&target)
    };

    if match_names && path.file_name() != resolved.file_name() {
        return Ok((false, resolved));
    }

    Ok((file_exists(&resolved), resolved))
}

/// Candidate post-filter honoring the `existing`, `accessable` and
/// `symlink` options by probing the filesystem.
pub fn file_okay(candidate: &str, options: &Options) -> Result<bool> {
    let path = Path::new(candidate);
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => Some(meta),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    if options.existing && meta.is_none() {
        return Ok(false);
    }

    if options.accessable && !readable(path) {
        return Ok(false);
    }

    if !options.symlink {
        if let Some(meta) = &meta {
            if meta.file_type().is_symlink() {
                return Ok(false);
            }
        }
    }

    Ok(true)
}

/// Cheap wrapper around [`file_okay`]: skips the probe entirely when no
/// active option can reject the candidate.
pub fn match_okay(candidate: &str, options: &Options) -> Result<bool> {
    if !options.existing && !options.accessable && options.symlink {
        return Ok(true);
    }
    file_okay(candidate, options)
}
