//! # symkit — locate-backed symlink maintenance
//!
//! symkit reads mlocate databases and uses them to answer filename
//! queries and to repair broken symlinks: when a link's target has moved,
//! the database usually still knows where a file with that name lives.
//!
//! ## Architecture
//!
//! - [`db`] - mlocate database parsing, the path set and basename index
//! - [`search`] - matchers, worker fan-out and the method chain
//! - [`repair`] - broken-link detection, candidate lookup and relinking
//! - [`retarget`] - re-pointing symlinks by target pattern
//! - [`fsutil`] - link-aliveness, absolutization and access probes
//! - [`interact`] - the prompt seam between engines and the terminal
//! - [`serve`] - HTTP search mode
//!
//! ## Quick start
//!
//! ```ignore
//! use symkit::db::DB;
//! use symkit::options::Options;
//! use symkit::search::{locate_all, matcher::parse_method_chain};
//! use std::path::PathBuf;
//!
//! let options = Options::default();
//! let db = DB::open(&[PathBuf::from("/var/lib/mlocate/mlocate.db")], &options)?;
//! let methods = parse_method_chain("hashmap,substring")?;
//! for path in locate_all(&db, &methods, "libz.so")? {
//!     println!("{}", path);
//! }
//! ```

pub mod db;
pub mod fsutil;
pub mod interact;
pub mod options;
pub mod repair;
pub mod retarget;
pub mod search;
pub mod serve;
