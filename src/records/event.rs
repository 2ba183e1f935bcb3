use chrono::{NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::{core::index::Record, types::Timestamp};

/// Where an event takes place. Each location has its own column pair in the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLocation {
    Outside,
    Inside,
    Daytime,
}

impl EventLocation {
    pub const ALL: [EventLocation; 3] = [
        EventLocation::Outside,
        EventLocation::Inside,
        EventLocation::Daytime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventLocation::Outside => "outside",
            EventLocation::Inside => "inside",
            EventLocation::Daytime => "daytime",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().to_lowercase();
        Self::ALL.into_iter().find(|location| location.as_str() == text)
    }

    /// Evening events; daytime ones are the side program.
    pub fn is_main(self) -> bool {
        matches!(self, EventLocation::Outside | EventLocation::Inside)
    }

    pub fn default_start_time(self) -> NaiveTime {
        let hour = if self.is_main() { 19 } else { 15 };
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
    }

    pub fn default_duration(self) -> TimeDelta {
        TimeDelta::hours(if self.is_main() { 3 } else { 1 })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub location: EventLocation,
    pub start: Timestamp,
    pub end: Timestamp,
    pub host: String,
}

impl Event {
    /// Builds an event lasting the location's default duration.
    pub fn new(name: impl Into<String>, location: EventLocation, start: Timestamp) -> Self {
        Self {
            name: name.into(),
            location,
            start,
            end: start + location.default_duration(),
            host: String::new(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
}

impl Record for Event {
    type Id = (Timestamp, EventLocation, String);

    fn id(&self) -> Self::Id {
        (self.start, self.location, self.name.clone())
    }
}
