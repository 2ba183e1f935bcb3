use serde::{Deserialize, Serialize};

use crate::{core::index::Record, types::Timestamp};

/// One raffle ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaffleEntry {
    pub full_name: String,
    /// Ticket number, unique within the raffle.
    pub ticket: u32,
    pub created_at: Option<Timestamp>,
}

impl Record for RaffleEntry {
    type Id = u32;

    fn id(&self) -> u32 {
        self.ticket
    }
}
