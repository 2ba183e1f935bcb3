//! In-memory materialized tables and their indexes.

/// Index contract and per-table index set.
pub mod index;
/// Unique, bucket, sorted-bucket and prefix-search indexes.
pub mod indices;
/// Tables: snapshot parsing, refresh and diff-based write-back.
pub mod table;
