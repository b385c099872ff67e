//! Shared fixtures: a minimal mlocate encoder and database writers.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const ENTRY_FILE: u8 = 0;
pub const ENTRY_SUBDIR: u8 = 1;
pub const ENTRY_END: u8 = 2;
pub const STAMP_LEN: usize = 16;

/// Encode a database buffer the way updatedb(8) lays it out: header,
/// then per directory a stamp, the directory path and tagged basenames.
pub fn encode_db(root: &str, dirs: &[(&str, &[(&str, u8)])]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"\x00mlocate");
    buf.extend_from_slice(&0u32.to_be_bytes());
    buf.extend_from_slice(&[0, 1, 0, 0]); // version, visibility, padding
    buf.extend_from_slice(root.as_bytes());
    buf.push(0);
    for (dir, entries) in dirs {
        buf.extend_from_slice(&[0u8; STAMP_LEN]);
        buf.extend_from_slice(dir.as_bytes());
        buf.push(0);
        for (name, tag) in *entries {
            buf.push(*tag);
            buf.extend_from_slice(name.as_bytes());
            buf.push(0);
        }
        buf.push(ENTRY_END);
    }
    buf
}

/// Write an encoded database under `dir` and return its path.
pub fn write_db(dir: &Path, name: &str, dirs: &[(&str, &[(&str, u8)])]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, encode_db("/", dirs)).unwrap();
    path
}

pub fn sorted(mut v: Vec<String>) -> Vec<String> {
    v.sort();
    v
}
