//! Parser for the binary `mlocate.db` format produced by updatedb(8).
//!
//! Layout (multi-byte fields are big-endian):
//!
//! | offset | size | field |
//! |--------|------|-------|
//! | 0      | 8    | magic `\0mlocate` |
//! | 8      | 4    | configuration block length |
//! | 12     | 1    | format version (must be 0) |
//! | 13     | 1    | visibility flag |
//! | 14     | 2    | padding |
//! | 16     | ...  | database root path, NUL-terminated |
//!
//! The configuration block follows the root path and is skipped. After it
//! come directory blocks: a 16-byte time stamp, the directory's full path
//! as a NUL-terminated string, then file entries, each a one-byte type
//! tag (`0` file, `1` sub-directory) followed by a NUL-terminated
//! basename. Tag `2` closes the directory; the next directory block
//! starts right after it. Directory paths are emitted as entries in
//! their own right.

use std::collections::HashSet;
use thiserror::Error;

const MAGIC: &[u8; 8] = b"\x00mlocate";
const HEADER_LEN: usize = 16;
const STAMP_LEN: usize = 16;

const ENTRY_FILE: u8 = 0;
const ENTRY_SUBDIR: u8 = 1;
const ENTRY_END: u8 = 2;

/// Structural failures while decoding a database buffer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("not an mlocate database (bad magic)")]
    BadMagic,
    #[error("unsupported mlocate format version {0}")]
    UnsupportedVersion(u8),
    #[error("truncated database (unexpected end of data at byte {0})")]
    Truncated(usize),
    #[error("unknown entry tag {tag:#x} at byte {offset}")]
    BadEntryTag { tag: u8, offset: usize },
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if self.remaining() < n {
            return Err(FormatError::Truncated(self.data.len()));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn byte(&mut self) -> Result<u8, FormatError> {
        Ok(self.take(1)?[0])
    }

    /// NUL-terminated string. Paths are byte sequences on disk; undecodable
    /// bytes are carried through lossily rather than rejected.
    fn cstr(&mut self) -> Result<String, FormatError> {
        let rest = &self.data[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(FormatError::Truncated(self.data.len()))?;
        let s = String::from_utf8_lossy(&rest[..nul]).into_owned();
        self.pos += nul + 1;
        Ok(s)
    }
}

/// True when `path` equals `root` or sits underneath it.
pub fn under_root(path: &str, root: &str) -> bool {
    if root == "/" || path == root {
        return true;
    }
    path.strip_prefix(root)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

/// Decode every directory and file path in `data`, keeping only entries
/// under `root` (`"/"` keeps everything).
pub fn parse(data: &[u8], root: &str) -> Result<Vec<String>, FormatError> {
    let mut cur = Cursor::new(data);

    if cur.remaining() < MAGIC.len() || cur.take(MAGIC.len())? != MAGIC {
        return Err(FormatError::BadMagic);
    }

    let conf_len = u32::from_be_bytes(cur.take(4)?.try_into().unwrap()) as usize;

    let header = cur.take(HEADER_LEN - 12)?;
    let version = header[0];
    if version != 0 {
        return Err(FormatError::UnsupportedVersion(version));
    }
    // header[1] is the visibility flag, header[2..4] padding; both unused.

    let db_root = cur.cstr()?;
    cur.take(conf_len)?;

    // The header root bounds every entry: once it sits under the filter
    // root, the per-entry prefix checks can be skipped wholesale.
    let always_ok = under_root(&db_root, root);

    let mut paths = Vec::new();
    // Sub-directory entries announce the child's full path inside the
    // parent's block; the child's own header must not emit it again.
    let mut announced: HashSet<String> = HashSet::new();
    while cur.remaining() > 0 {
        cur.take(STAMP_LEN)?;
        let dir = cur.cstr()?;
        let dir_ok = always_ok || under_root(&dir, root);
        let was_announced = announced.remove(&dir);
        if dir_ok && !was_announced {
            paths.push(dir.clone());
        }

        loop {
            let offset = cur.pos;
            match cur.byte()? {
                tag @ (ENTRY_FILE | ENTRY_SUBDIR) => {
                    let name = cur.cstr()?;
                    let full = if dir == "/" {
                        format!("/{}", name)
                    } else {
                        format!("{}/{}", dir, name)
                    };
                    if dir_ok || under_root(&full, root) {
                        if tag == ENTRY_SUBDIR {
                            announced.insert(full.clone());
                        }
                        paths.push(full);
                    }
                }
                ENTRY_END => break,
                tag => return Err(FormatError::BadEntryTag { tag, offset }),
            }
        }
    }

    Ok(paths)
}

/// Build a well-formed database buffer from a directory listing. Test
/// support for the unit and integration suites.
#[cfg(test)]
pub(crate) fn encode(root: &str, dirs: &[(&str, &[(&str, u8)])]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_nested_directories() {
        let buf = encode(
            "/r",
            &[
                ("/r", &[("a", ENTRY_SUBDIR)]),
                ("/r/a", &[("b", ENTRY_FILE)]),
            ],
        );
        let paths = parse(&buf, "/").unwrap();
        assert_eq!(paths, vec!["/r", "/r/a", "/r/a/b"]);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = encode("/", &[]);
        buf[1] = b'x';
        assert_eq!(parse(&buf, "/"), Err(FormatError::BadMagic));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut buf = encode("/", &[]);
        buf[12] = 3;
        assert_eq!(parse(&buf, "/"), Err(FormatError::UnsupportedVersion(3)));
    }

    #[test]
    fn truncation_fails_or_yields_a_subset() {
        let buf = encode(
            "/r",
            &[
                ("/r", &[("a", ENTRY_SUBDIR)]),
                ("/r/a", &[("b", ENTRY_FILE), ("c", ENTRY_FILE)]),
            ],
        );
        let full: Vec<String> = parse(&buf, "/").unwrap();
        let unique: HashSet<&String> = full.iter().collect();
        assert_eq!(unique.len(), full.len(), "full parse emitted a duplicate");

        for cut in 0..buf.len() {
            match parse(&buf[..cut], "/") {
                Ok(paths) => {
                    assert!(
                        paths.iter().all(|p| full.contains(p)),
                        "truncation at {} produced a path outside the full set",
                        cut
                    );
                    assert!(paths.len() < full.len());
                    let unique: HashSet<&String> = paths.iter().collect();
                    assert_eq!(
                        unique.len(),
                        paths.len(),
                        "truncation at {} emitted a duplicate path",
                        cut
                    );
                }
                Err(_) => {}
            }
        }
    }

    #[test]
    fn root_filter_keeps_prefix_and_exact_match() {
        let buf = encode(
            "/",
            &[
                ("/usr", &[("bin", ENTRY_SUBDIR)]),
                ("/usr/bin", &[("ls", ENTRY_FILE)]),
                ("/var", &[("log", ENTRY_FILE)]),
            ],
        );
        let paths = parse(&buf, "/usr").unwrap();
        assert_eq!(paths, vec!["/usr", "/usr/bin", "/usr/bin/ls"]);
    }

    #[test]
    fn root_filter_does_not_match_sibling_prefixes() {
        assert!(under_root("/usr/bin", "/usr"));
        assert!(under_root("/usr", "/usr"));
        assert!(!under_root("/usr2/bin", "/usr"));
        assert!(under_root("/anything", "/"));
    }

    #[test]
    fn entries_directly_under_slash_get_single_separator() {
        let buf = encode("/", &[("/", &[("etc", ENTRY_SUBDIR)])]);
        let paths = parse(&buf, "/").unwrap();
        assert_eq!(paths, vec!["/", "/etc"]);
    }

    #[test]
    fn unknown_tag_is_reported_with_offset() {
        let mut buf = encode("/r", &[("/r", &[("a", ENTRY_FILE)])]);
        let tag_at = buf.iter().position(|&b| b == ENTRY_FILE).unwrap();
        buf[tag_at] = 9;
        match parse(&buf, "/") {
            Err(FormatError::BadEntryTag { tag: 9, .. }) => {}
            other => panic!("expected BadEntryTag, got {:?}", other),
        }
    }
}
