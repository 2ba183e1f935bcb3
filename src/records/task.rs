use std::sync::Arc;

use chrono::{Datelike, NaiveTime, TimeDelta, Weekday};
use serde::{Deserialize, Serialize};

use crate::{core::index::Record, types::Timestamp};

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Full English name of a weekday, as written in the sheet.
pub fn weekday_name(weekday: Weekday) -> &'static str {
    WEEKDAY_NAMES[weekday.num_days_from_monday() as usize]
}

/// One checklist item. Tasks sharing a weekday and group form a [`TaskList`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub weekday: Weekday,
    /// Lowercased group name, e.g. `opening`.
    pub group: String,
    /// Zero-based order inside the list.
    pub position: u32,
    pub time: NaiveTime,
    pub name: String,
    pub done: bool,
}

impl Task {
    /// Row id, `weekday.group.position`.
    pub fn row_id(&self) -> String {
        format!("{}.{}", self.list_id(), self.position)
    }

    /// Id of the list the task belongs to, `weekday.group`.
    pub fn list_id(&self) -> String {
        list_id(self.weekday, &self.group)
    }

    pub fn with_done(&self, done: bool) -> Self {
        Self {
            done,
            ..self.clone()
        }
    }
}

impl Record for Task {
    type Id = String;

    fn id(&self) -> String {
        self.row_id()
    }
}

pub fn list_id(weekday: Weekday, group: &str) -> String {
    format!("{}.{}", weekday.num_days_from_monday(), group.to_lowercase())
}

/// Ordered tasks of one group on one weekday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskList {
    pub weekday: Weekday,
    pub group: String,
    pub tasks: Vec<Arc<Task>>,
}

impl TaskList {
    pub fn id(&self) -> String {
        list_id(self.weekday, &self.group)
    }

    pub fn start_time(&self) -> Option<NaiveTime> {
        self.tasks.first().map(|task| task.time)
    }

    pub fn is_done(&self) -> bool {
        self.tasks.iter().all(|task| task.done)
    }

    /// Next time the list starts strictly after `now`; a list starting
    /// exactly now is scheduled for next week.
    pub fn next_run(&self, now: Timestamp) -> Option<Timestamp> {
        let start = self.start_time()?;
        let mut days_ahead = i64::from(self.weekday.num_days_from_monday())
            - i64::from(now.weekday().num_days_from_monday());
        if days_ahead < 0 || (days_ahead == 0 && now.time() >= start) {
            days_ahead += 7;
        }
        Some((now.date() + TimeDelta::days(days_ahead)).and_time(start))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn task(weekday: Weekday, position: u32, hour: u32) -> Arc<Task> {
        Arc::new(Task {
            weekday,
            group: "opening".into(),
            position,
            time: NaiveTime::from_hms_opt(hour, 0, 0).expect("time"),
            name: format!("task {position}"),
            done: false,
        })
    }

    fn at(day: u32, hour: u32) -> Timestamp {
        // 2024-11-04 is a Monday.
        NaiveDate::from_ymd_opt(2024, 11, day)
            .expect("date")
            .and_hms_opt(hour, 0, 0)
            .expect("time")
    }

    #[test]
    fn ids_are_weekday_number_group_position() {
        let task = task(Weekday::Wed, 3, 9);
        assert_eq!(task.row_id(), "2.opening.3");
        assert_eq!(task.list_id(), "2.opening");
        assert_eq!(weekday_name(Weekday::Sun), "Sunday");
    }

    #[test]
    fn next_run_rolls_to_next_week_once_started() {
        let list = TaskList {
            weekday: Weekday::Mon,
            group: "opening".into(),
            tasks: vec![task(Weekday::Mon, 0, 9), task(Weekday::Mon, 1, 10)],
        };

        assert_eq!(list.next_run(at(4, 8)), Some(at(4, 9)));
        assert_eq!(list.next_run(at(4, 9)), Some(at(11, 9)));
        assert_eq!(list.next_run(at(6, 12)), Some(at(11, 9)));
    }

    #[test]
    fn empty_list_never_runs() {
        let list = TaskList {
            weekday: Weekday::Fri,
            group: "closing".into(),
            tasks: vec![],
        };
        assert_eq!(list.next_run(at(4, 8)), None);
    }
}
