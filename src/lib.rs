//! Materialized, multi-index cache over a slow, human-edited tabular store,
//! plus the community engines that read and write through it.
//!
//! Each sheet is loaded into a [`core::table::Table`] holding typed records and
//! their indexes behind one lock. A background refresher reloads snapshots on
//! an interval; local writes land in memory first and are sent to the record
//! store as appended rows or sparse cell patches.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use clubhouse::{
//!     engine::ladder::{Ladder, LadderConfig},
//!     persist::memory::MemoryRecordStore,
//!     records::User,
//!     repo::{SheetMatchRepository, SheetStandingRepository},
//!     runtime::{database::Database, handle::{spawn_refresher, RefreshConfig}},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let db = Database::new(Arc::new(MemoryRecordStore::new()));
//! let standings = Arc::new(SheetStandingRepository::attach(db.clone(), "Standings"));
//! let matches = Arc::new(SheetMatchRepository::attach(db.clone(), "Matches"));
//! let refresher = spawn_refresher(db, RefreshConfig::default());
//!
//! let ladder = Ladder::new(standings, matches, &LadderConfig::default());
//! let now = chrono::Local::now().naive_local();
//! let outcome = ladder
//!     .record_result(&User::new("Ana Pop"), &User::new("Bo Ionescu"), now)
//!     .await
//!     .expect("distinct players");
//! assert_eq!(outcome.winner.rank.after, 1);
//! refresher.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Settings for the refresher and the engines.
pub mod config;
/// Indexes and tables.
pub mod core;
/// Ladder, visit accumulator and raffle.
pub mod engine;
/// Row model and remote mutations.
pub mod op;
/// Record-store abstraction with in-memory and SQLite implementations.
pub mod persist;
/// Typed records.
pub mod records;
/// Repository facades over tables.
pub mod repo;
/// Refresh loop and change events.
pub mod runtime;
/// Shared primitive types.
pub mod types;
