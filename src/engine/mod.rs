//! Business engines built on the repositories.

/// Elo ladder with global re-ranking.
pub mod ladder;
/// Ticket raffle charged through the points ledger.
pub mod raffle;
/// Visit accumulation and reward checkpoints.
pub mod visits;
