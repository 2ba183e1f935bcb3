//! Repository facades: the per-entity API the rest of the application consumes.
//!
//! Each `Sheet*Repository` owns one [`Table`](crate::core::table::Table) and
//! implements the matching repository trait.

pub mod events;
pub mod ladder;
pub mod nominations;
pub mod raffle;
pub mod tasks;
pub mod users;
pub mod visits;

use thiserror::Error;

use crate::core::table::TableError;

pub use events::{EventRepository, SheetEventRepository};
pub use ladder::{MatchRepository, SheetMatchRepository, SheetStandingRepository, StandingRepository};
pub use nominations::{NominationRepository, SheetNominationRepository};
pub use raffle::{RaffleRepository, SheetRaffleRepository};
pub use tasks::{SheetTaskRepository, TaskRepository};
pub use users::{SheetUserRepository, UserRepository};
pub use visits::{SheetVisitRepository, VisitRepository};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("task list {0} is not stored")]
    MissingTaskList(String),
    #[error("task list {list} has no task at position {position}")]
    MissingTask { list: String, position: usize },
}

pub type RepoResult<T> = Result<T, RepoError>;

pub(crate) fn parse_u32(text: &str) -> Option<u32> {
    text.trim().parse().ok()
}

pub(crate) fn parse_i64(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}

pub(crate) fn parse_f64(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
