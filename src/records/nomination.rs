use serde::{Deserialize, Serialize};

use crate::{core::index::Record, types::Timestamp};

/// A vote for a community member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nomination {
    pub nominee: String,
    pub date: Timestamp,
    /// Full name of the voter.
    pub voter: String,
    pub reason: String,
}

impl Record for Nomination {
    type Id = (String, Timestamp, String);

    fn id(&self) -> Self::Id {
        (self.voter.clone(), self.date, self.nominee.clone())
    }
}
