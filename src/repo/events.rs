use std::sync::{Arc, LazyLock};

use chrono::{NaiveDate, NaiveTime};
use regex::{Captures, Regex};

use crate::{
    core::{
        index::{Index, IndexSet},
        indices::SortedBucketIndex,
        table::{Table, TableSchema},
    },
    op::Row,
    records::{Event, EventLocation},
    runtime::database::Database,
    types::Timestamp,
};

/// The schedule has two header rows before the first day.
const HEADER_ROWS: usize = 2;

/// Columns of the schedule, by position.
const COLUMNS: [&str; 8] = [
    "weekday",
    "date",
    "outside_name",
    "outside_host",
    "inside_name",
    "inside_host",
    "daytime_name",
    "daytime_host",
];

static TWELVE_HOUR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)@? *([0-9]{1,2})(?:[:.]([0-9]{2}))? *(am|pm) *-? *").expect("static regex")
});
static TWENTY_FOUR_HOUR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@? *([0-9]{1,2}):([0-9]{2}) *-? *").expect("static regex"));

pub trait EventRepository: Send + Sync {
    /// Events starting on `day`, by start time.
    fn events_on(&self, day: NaiveDate) -> Vec<Arc<Event>>;
}

pub struct EventIndexes {
    pub by_date: SortedBucketIndex<Event, NaiveDate, Timestamp>,
}

impl IndexSet<Event> for EventIndexes {
    fn indexes_mut(&mut self) -> Vec<&mut dyn Index<Event>> {
        vec![&mut self.by_date]
    }
}

/// Read-only schedule: one row per day, one name/host column pair per
/// location. A cell may hold several events, one per line, with the start
/// time written inside the name (`Quiz night @ 7:30 pm`).
#[derive(Debug, Default, Clone, Copy)]
pub struct EventSchema;

impl TableSchema for EventSchema {
    type Record = Event;
    type Indexes = EventIndexes;

    fn new_indexes(&self) -> EventIndexes {
        EventIndexes {
            by_date: SortedBucketIndex::new(|event: &Event| Some(event.start.date()), |event: &Event| event.start),
        }
    }

    fn deserialize(&self, row: &Row) -> Option<Event> {
        let location = EventLocation::parse(row.text("location"))?;
        let day = NaiveDate::parse_from_str(row.text("date"), "%Y-%m-%d").ok()?;
        let (name, time) = split_time(row.non_empty("name")?);
        if name.is_empty() {
            return None;
        }

        let start = day.and_time(time.unwrap_or_else(|| location.default_start_time()));
        Some(Event::new(name, location, start).with_host(row.text("host")))
    }

    fn parse(&self, grid: &[Vec<String>]) -> Vec<Event> {
        grid.iter()
            .skip(HEADER_ROWS)
            .flat_map(|cells| split_day(cells))
            .filter_map(|row| self.deserialize(&row))
            .collect()
    }
}

/// Expands one schedule row into one row per event.
fn split_day(cells: &[String]) -> Vec<Row> {
    let day = Row::from_pairs(COLUMNS.iter().zip(cells).map(|(k, v)| (*k, v.as_str())));

    let mut rows = Vec::new();
    for location in EventLocation::ALL {
        let names = lines(day.text(&format!("{}_name", location.as_str())));
        let hosts = lines(day.text(&format!("{}_host", location.as_str())));
        for (i, name) in names.into_iter().enumerate() {
            rows.push(
                Row::new()
                    .with("date", day.text("date"))
                    .with("location", location.as_str())
                    .with("name", name)
                    .with("host", hosts.get(i).copied().unwrap_or("")),
            );
        }
    }
    rows
}

fn lines(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty()).collect()
}

/// Pulls a start time out of an event name: `7pm`, `7:30 pm`, `7.30pm`, `19:00`.
fn split_time(text: &str) -> (String, Option<NaiveTime>) {
    let found = TWELVE_HOUR
        .captures(text)
        .and_then(|caps| twelve_hour(&caps))
        .map(|time| (&*TWELVE_HOUR, time))
        .or_else(|| {
            TWENTY_FOUR_HOUR
                .captures(text)
                .and_then(|caps| twenty_four_hour(&caps))
                .map(|time| (&*TWENTY_FOUR_HOUR, time))
        });

    match found {
        Some((regex, time)) => (regex.replace_all(text, "").trim().to_string(), Some(time)),
        None => (text.trim().to_string(), None),
    }
}

fn twelve_hour(caps: &Captures<'_>) -> Option<NaiveTime> {
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
    if !(1..=12).contains(&hour) {
        return None;
    }
    let pm = caps.get(3)?.as_str().eq_ignore_ascii_case("pm");
    NaiveTime::from_hms_opt(hour % 12 + if pm { 12 } else { 0 }, minute, 0)
}

fn twenty_four_hour(caps: &Captures<'_>) -> Option<NaiveTime> {
    let hour = caps.get(1)?.as_str().parse().ok()?;
    let minute = caps.get(2)?.as_str().parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

pub struct SheetEventRepository {
    table: Table<EventSchema>,
}

impl SheetEventRepository {
    pub fn attach(db: Arc<Database>, sheet: &str) -> Self {
        Self {
            table: Table::attach(db, sheet, EventSchema),
        }
    }

    pub fn table(&self) -> &Table<EventSchema> {
        &self.table
    }
}

impl EventRepository for SheetEventRepository {
    fn events_on(&self, day: NaiveDate) -> Vec<Arc<Event>> {
        self.table.read().by_date.get(&day).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn times_are_cut_out_of_names() {
        assert_eq!(split_time("Quiz night @ 7:30 pm"), ("Quiz night".to_string(), time(19, 30)));
        assert_eq!(split_time("8pm - Karaoke"), ("Karaoke".to_string(), time(20, 0)));
        assert_eq!(split_time("Brunch 11.15am"), ("Brunch".to_string(), time(11, 15)));
        assert_eq!(split_time("Jam 21:00"), ("Jam".to_string(), time(21, 0)));
        assert_eq!(split_time("Board games"), ("Board games".to_string(), None));
    }

    #[test]
    fn schedule_rows_expand_per_line_and_location() {
        let grid = vec![
            cells(&["Week 45"]),
            cells(&["Day", "Date", "Outside", "Host", "Inside", "Host", "Daytime", "Host"]),
            cells(&[
                "Monday",
                "2024-11-04",
                "Quiz @ 8pm\nKaraoke 10pm",
                "Ana\nBo",
                "",
                "",
                "Yoga",
                "",
            ]),
            cells(&["Tuesday", "not a date", "Movie", "Cy"]),
        ];

        let events = EventSchema.parse(&grid);
        assert_eq!(events.len(), 3);

        let day = NaiveDate::from_ymd_opt(2024, 11, 4).expect("date");
        assert_eq!(events[0].name, "Quiz");
        assert_eq!(events[0].host, "Ana");
        assert_eq!(events[0].start, day.and_hms_opt(20, 0, 0).expect("time"));
        assert_eq!(events[0].end, day.and_hms_opt(23, 0, 0).expect("time"));
        assert_eq!(events[1].name, "Karaoke");
        assert_eq!(events[1].host, "Bo");
        assert_eq!(events[2].location, EventLocation::Daytime);
        assert_eq!(events[2].start, day.and_hms_opt(15, 0, 0).expect("time"));
        assert_eq!(events[2].end, day.and_hms_opt(16, 0, 0).expect("time"));
    }
}
