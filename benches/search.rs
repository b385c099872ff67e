//! Search benchmarks over a synthetic database.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::PathBuf;
use symkit::db::DB;
use symkit::options::Options;
use symkit::search::matcher::Method;
use symkit::search::locate;
use tempfile::TempDir;

const STAMP_LEN: usize = 16;

fn encode_db(root: &str, dirs: &[(String, Vec<String>)]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"\x00mlocate");
    buf.extend_from_slice(&0u32.to_be_bytes());
    buf.extend_from_slice(&[0, 1, 0, 0]);
    buf.extend_from_slice(root.as_bytes());
    buf.push(0);
    for (dir, names) in dirs {
        buf.extend_from_slice(&[0u8; STAMP_LEN]);
        buf.extend_from_slice(dir.as_bytes());
        buf.push(0);
        for name in names {
            buf.push(0); // regular file
            buf.extend_from_slice(name.as_bytes());
            buf.push(0);
        }
        buf.push(2); // end of directory
    }
    buf
}

/// 100 directories x 200 files.
fn build_fixture(options: &Options) -> (TempDir, DB) {
    let tmp = TempDir::new().expect("temp dir");

    let dirs: Vec<(String, Vec<String>)> = (0..100)
        .map(|d| {
            let names = (0..200).map(|f| format!("file-{}-{}.dat", d, f)).collect();
            (format!("/data/dir-{}", d), names)
        })
        .collect();

    let db_path = tmp.path().join("bench.db");
    std::fs::write(&db_path, encode_db("/", &dirs)).expect("write db");

    let db = DB::open(&[PathBuf::from(db_path)], options).expect("open db");
    (tmp, db)
}

fn bench_hashmap(c: &mut Criterion) {
    let options = Options {
        symlink: true,
        hash_map: true,
        ..Options::default()
    };
    let (_tmp, db) = build_fixture(&options);

    c.bench_function("hashmap_lookup", |b| {
        b.iter(|| locate(&db, Method::HashMap, black_box("file-50-100.dat")).unwrap())
    });
}

fn bench_scans(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_scan");

    for workers in [1usize, 2, 4, 8] {
        let options = Options {
            symlink: true,
            n_workers: workers,
            ..Options::default()
        };
        let (_tmp, db) = build_fixture(&options);

        group.bench_with_input(
            BenchmarkId::new("substring", workers),
            &workers,
            |b, _| b.iter(|| locate(&db, Method::Substring, black_box("file-50-1")).unwrap()),
        );
    }

    let options = Options {
        symlink: true,
        levenshtein_threshold: 2,
        ..Options::default()
    };
    let (_tmp, db) = build_fixture(&options);
    group.bench_function("levenshtein", |b| {
        b.iter(|| locate(&db, Method::Levenshtein, black_box("file-50-100.dat")).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_hashmap, bench_scans);
criterion_main!(benches);
