//! Shared primitive types, time helpers and reward units.

use std::{fmt, ops::Add};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Local wall-clock timestamp, as written in the record store.
pub type Timestamp = NaiveDateTime;
/// First day of a calendar month.
pub type Month = NaiveDate;

/// Cell format used for every timestamp column.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a timestamp cell, returning `None` for blank or malformed text.
pub fn parse_timestamp(text: &str) -> Option<Timestamp> {
    NaiveDateTime::parse_from_str(text.trim(), DATETIME_FORMAT).ok()
}

/// Formats an optional timestamp; `None` becomes an empty cell.
pub fn format_timestamp(value: Option<Timestamp>) -> String {
    value
        .map(|ts| ts.format(DATETIME_FORMAT).to_string())
        .unwrap_or_default()
}

/// Returns the month bucket a timestamp belongs to.
pub fn month_of(ts: Timestamp) -> Month {
    // Day 1 exists in every month.
    ts.date().with_day(1).unwrap_or(ts.date())
}

/// Column key for a month, e.g. `nov_2024`.
pub fn month_column(month: Month) -> String {
    month.format("%b_%Y").to_string().to_lowercase()
}

/// Parses a month column key such as `nov_2024`.
pub fn parse_month_column(key: &str) -> Option<Month> {
    let (name, year) = key.split_once('_')?;
    if name.len() != 3 || year.len() != 4 {
        return None;
    }
    NaiveDate::parse_from_str(&format!("01 {name} {year}"), "%d %b %Y").ok()
}

/// Loyalty points, the reward unit for visit checkpoints and raffle tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Points(pub u32);

impl Points {
    /// True when no points are involved.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Add for Points {
    type Output = Points;

    fn add(self, rhs: Self) -> Self::Output {
        Points(self.0.saturating_add(rhs.0))
    }
}

impl std::iter::Sum for Points {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Points(0), Add::add)
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_columns_round_trip_through_headers() {
        let month = NaiveDate::from_ymd_opt(2024, 11, 1).unwrap();
        assert_eq!(month_column(month), "nov_2024");
        assert_eq!(parse_month_column("nov_2024"), Some(month));
        assert_eq!(parse_month_column("full_name"), None);
        assert_eq!(parse_month_column("last_visit"), None);
    }

    #[test]
    fn timestamps_parse_leniently_and_format_blank() {
        let ts = parse_timestamp(" 2024-12-01 09:30:00 ").unwrap();
        assert_eq!(month_of(ts), NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(format_timestamp(None), "");
        assert_eq!(format_timestamp(Some(ts)), "2024-12-01 09:30:00");
    }
}
