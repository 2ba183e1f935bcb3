//! Change notifications published by a [`super::database::Database`].

/// Events emitted by refreshes and remote writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseEvent {
    /// A table received a snapshot that differs from the previous one.
    Refreshed {
        /// Table name.
        table: String,
    },
    /// A table was reloaded but its content did not change.
    Unchanged {
        /// Table name.
        table: String,
    },
    /// Loading a table failed; its previous snapshot is kept.
    RefreshFailed {
        /// Table name.
        table: String,
    },
    /// A remote append or patch failed; memory stays ahead until the next refresh.
    WriteFailed {
        /// Table name.
        table: String,
    },
}
