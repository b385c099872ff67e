//! End-to-end scenarios for the database loader and the search driver,
//! exercised through the public API against synthetic databases.

mod common;

use common::{sorted, write_db, ENTRY_FILE, ENTRY_SUBDIR};
use std::collections::HashSet;
use symkit::db::DB;
use symkit::options::Options;
use symkit::search::matcher::{parse_method_chain, Method};
use symkit::search::{locate, locate_all};

/// Options that skip filesystem probing, for purely synthetic paths.
fn lenient() -> Options {
    Options {
        symlink: true,
        ..Options::default()
    }
}

#[test]
fn loading_a_single_database_yields_the_encoded_paths() {
    let dir = tempfile::tempdir().unwrap();
    let db_file = write_db(
        dir.path(),
        "single.db",
        &[
            ("/r", &[("a", ENTRY_SUBDIR)]),
            ("/r/a", &[("b", ENTRY_FILE)]),
        ],
    );

    let db = DB::open(&[db_file], &lenient()).unwrap();
    assert_eq!(sorted(db.files().to_vec()), vec!["/r", "/r/a", "/r/a/b"]);
}

#[test]
fn hashmap_lookup_returns_every_owner_of_the_basename() {
    let dir = tempfile::tempdir().unwrap();
    let db_file = write_db(
        dir.path(),
        "ls.db",
        &[
            ("/usr/bin", &[("ls", ENTRY_FILE)]),
            ("/bin", &[("ls", ENTRY_FILE)]),
            ("/etc", &[("ls", ENTRY_FILE)]),
        ],
    );

    let db = DB::open(&[db_file], &lenient()).unwrap();
    let matches = locate(&db, Method::HashMap, "ls").unwrap();
    assert_eq!(
        sorted(matches),
        vec!["/bin/ls", "/etc/ls", "/usr/bin/ls"]
    );
}

#[test]
fn case_folding_and_extension_strip_combine() {
    let dir = tempfile::tempdir().unwrap();
    let db_file = write_db(dir.path(), "case.db", &[("/x", &[("Foo.TXT", ENTRY_FILE)])]);

    let options = Options {
        ignore_case: true,
        strip_extension: true,
        ..lenient()
    };
    let db = DB::open(&[db_file], &options).unwrap();
    let matches = locate(&db, Method::HashMap, "foo").unwrap();
    assert_eq!(matches, vec!["/x/Foo.TXT"]);
}

#[test]
fn method_chain_falls_through_to_substring() {
    let dir = tempfile::tempdir().unwrap();
    let db_file = write_db(
        dir.path(),
        "chain.db",
        &[("/usr/bin", &[("ls", ENTRY_FILE), ("cat", ENTRY_FILE)])],
    );

    let db = DB::open(&[db_file], &lenient()).unwrap();
    let methods = parse_method_chain("hashmap,substring").unwrap();

    // "sr/bi" is not a basename, so the hashmap method finds nothing
    // and the chain falls through to the substring scan.
    let matches = locate_all(&db, &methods, "sr/bi").unwrap();
    assert_eq!(
        sorted(matches),
        vec!["/usr/bin", "/usr/bin/cat", "/usr/bin/ls"]
    );
}

#[test]
fn duplicates_groups_paths_sharing_a_basename() {
    let dir = tempfile::tempdir().unwrap();
    let db_file = write_db(
        dir.path(),
        "dups.db",
        &[
            ("/a", &[("f", ENTRY_FILE)]),
            ("/b", &[("f", ENTRY_FILE)]),
            ("/c", &[("g", ENTRY_FILE)]),
        ],
    );

    let db = DB::open(&[db_file], &lenient()).unwrap();
    let dups = db.duplicates();
    assert_eq!(dups.len(), 1);
    assert_eq!(sorted(dups["f"].clone()), vec!["/a/f", "/b/f"]);
}

#[test]
fn match_limit_bounds_every_method() {
    let dir = tempfile::tempdir().unwrap();
    let entries: Vec<(String, u8)> = (0..64).map(|i| (format!("file-{}", i), ENTRY_FILE)).collect();
    let borrowed: Vec<(&str, u8)> = entries.iter().map(|(n, t)| (n.as_str(), *t)).collect();
    let db_file = write_db(dir.path(), "limit.db", &[("/data", borrowed.as_slice())]);

    let options = Options {
        max_matches: 5,
        n_workers: 4,
        ..lenient()
    };
    let db = DB::open(&[db_file], &options).unwrap();

    for method in [Method::Substring, Method::Regexp] {
        let matches = locate(&db, method, "file-").unwrap();
        assert!(
            !matches.is_empty() && matches.len() <= 5,
            "{} returned {} matches",
            method,
            matches.len()
        );
    }
}

#[test]
fn root_restriction_applies_to_every_result() {
    let dir = tempfile::tempdir().unwrap();
    let db_file = write_db(
        dir.path(),
        "root.db",
        &[
            ("/x", &[("keep", ENTRY_FILE)]),
            ("/xy", &[("drop", ENTRY_FILE)]),
            ("/y", &[("drop", ENTRY_FILE)]),
        ],
    );

    let options = Options {
        root: "/x".to_string(),
        ..lenient()
    };
    let db = DB::open(&[db_file], &options).unwrap();
    assert!(!db.files().is_empty());
    assert!(db.files().iter().all(|p| p == "/x" || p.starts_with("/x/")));

    let matches = locate(&db, Method::Substring, "drop").unwrap();
    assert!(matches.is_empty());
}

#[test]
fn multiple_databases_union_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_db(dir.path(), "a.db", &[("/x", &[("f", ENTRY_FILE)])]);
    let b = write_db(dir.path(), "b.db", &[("/x", &[("f", ENTRY_FILE), ("g", ENTRY_FILE)])]);

    let db = DB::open(&[a, b], &lenient()).unwrap();
    let unique: HashSet<&String> = db.files().iter().collect();
    assert_eq!(unique.len(), db.files().len());
    assert_eq!(sorted(db.files().to_vec()), vec!["/x", "/x/f", "/x/g"]);
}

#[test]
fn corrupt_databases_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("bogus.db");
    std::fs::write(&bogus, b"definitely not a database").unwrap();
    assert!(DB::open(&[bogus], &lenient()).is_err());
}
