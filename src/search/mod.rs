//! Query execution: worker fan-out over the path set, result limits and
//! the method chain.

pub mod fuzzy;
pub mod matcher;

use crate::db::DB;
use crate::fsutil::{final_component, match_okay};
use crate::options::Options;
use anyhow::Result;
use log::debug;
use matcher::{bake_name, Method, Pattern};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread;

/// Run a single search method against the database. Results are
/// deduplicated; their order is unspecified.
pub fn locate(db: &DB, method: Method, pattern: &str) -> Result<Vec<String>> {
    match method {
        Method::HashMap => locate_hashmap(db, pattern),
        _ => locate_scan(db, method, pattern),
    }
}

/// Run a method chain in order: the first method yielding at least one
/// result wins, and a failing method short-circuits the chain.
pub fn locate_all(db: &DB, methods: &[Method], pattern: &str) -> Result<Vec<String>> {
    for method in methods {
        let matches = locate(db, *method, pattern)?;
        debug!("{} {:?}: {} matches", method, pattern, matches.len());
        if !matches.is_empty() {
            return Ok(matches);
        }
    }
    Ok(Vec::new())
}

/// Index-only lookup on the pattern's final component.
fn locate_hashmap(db: &DB, pattern: &str) -> Result<Vec<String>> {
    let options = db.options();
    let key = bake_name(final_component(pattern), options);
    let Some(bucket) = db.basenames().get(&key) else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    for candidate in bucket {
        if match_okay(candidate, options)? {
            out.push(candidate.clone());
            if options.max_matches > 0 && out.len() >= options.max_matches {
                break;
            }
        }
    }
    Ok(out)
}

/// Sequential matcher scan: the path set is split into `n_workers`
/// contiguous blocks (plus a remainder worker when the split is uneven),
/// each worker feeding one shared channel. The consumer counts unique
/// results and flips the cancellation flag once the global limit is
/// reached; workers additionally cap themselves at their own share so a
/// slow consumer cannot make them overshoot.
fn locate_scan(db: &DB, method: Method, pattern: &str) -> Result<Vec<String>> {
    let (compiled, snapshot) = Pattern::compile(method, pattern, db.options())?;

    let files = db.files();
    let n_workers = snapshot.workers();
    let max = snapshot.max_matches;
    let share = if max > 0 {
        max.div_ceil(n_workers)
    } else {
        0
    };

    let cancel = AtomicBool::new(false);
    let error_slot: Mutex<Option<anyhow::Error>> = Mutex::new(None);
    let mut seen: HashSet<String> = HashSet::new();

    let block = files.len() / n_workers;
    thread::scope(|scope| {
        let (tx, rx) = mpsc::channel::<String>();
        let compiled = &compiled;
        let snapshot = &snapshot;
        let cancel = &cancel;
        let error_slot = &error_slot;

        let mut blocks: Vec<&[String]> = (0..n_workers)
            .map(|i| &files[i * block..(i + 1) * block])
            .collect();
        if files.len() % n_workers != 0 {
            blocks.push(&files[n_workers * block..]);
        }

        for slice in blocks {
            let tx = tx.clone();
            scope.spawn(move || {
                scan_worker(
                    slice, compiled, pattern, snapshot, share, tx, cancel, error_slot,
                );
            });
        }
        drop(tx);

        // Single consumer; the channel closes once every worker is done.
        for path in rx {
            seen.insert(path);
            if max > 0 && seen.len() >= max {
                cancel.store(true, Ordering::Relaxed);
                break;
            }
        }
    });

    if let Ok(Some(e)) = error_slot.into_inner() {
        return Err(e);
    }

    Ok(seen.into_iter().collect())
}

#[allow(clippy::too_many_arguments)]
fn scan_worker(
    files: &[String],
    pattern: &Pattern,
    raw_pattern: &str,
    options: &Options,
    share: usize,
    tx: Sender<String>,
    cancel: &AtomicBool,
    error_slot: &Mutex<Option<anyhow::Error>>,
) {
    let mut sent = 0usize;

    for f in files {
        if cancel.load(Ordering::Relaxed) {
            return;
        }

        let haystack = bake_name(f, options);
        if !pattern.is_match(&haystack) {
            continue;
        }

        // Compared on the raw components, before any baking.
        if options.basename_must_match && final_component(f) != final_component(raw_pattern) {
            continue;
        }

        match match_okay(f, options) {
            Ok(true) => {
                if tx.send(f.clone()).is_err() {
                    return;
                }
                sent += 1;
                if share > 0 && sent >= share {
                    return;
                }
            }
            Ok(false) => {}
            Err(e) => {
                let mut slot = error_slot.lock().unwrap();
                if slot.is_none() {
                    *slot = Some(e);
                }
                return;
            }
        }
    }
}
