//! Record-store handle, refresh loop and change events.

/// Record-store handle with per-table snapshot slots.
pub mod database;
/// Change notifications.
pub mod events;
/// Background refresh loop.
pub mod handle;
