//! Typed records materialized from the record store.
//!
//! Records are immutable once indexed; a change builds a new value.

pub mod event;
pub mod ladder;
pub mod nomination;
pub mod raffle;
pub mod task;
pub mod user;
pub mod visit;

pub use event::{Event, EventLocation};
pub use ladder::{LadderMatch, Standing};
pub use nomination::Nomination;
pub use raffle::RaffleEntry;
pub use task::{Task, TaskList};
pub use user::{User, UserRole};
pub use visit::VisitsEntry;
