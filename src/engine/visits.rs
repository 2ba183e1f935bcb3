//! Monthly visit accumulation and reward checkpoints.

use std::{collections::BTreeMap, sync::Arc};

use chrono::TimeDelta;
use log::{debug, info};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{
    records::{User, VisitsEntry},
    repo::VisitRepository,
    types::{Month, Points, Timestamp, month_of},
};

/// Visit threshold to reward.
pub type Checkpoints = BTreeMap<u32, Points>;
/// Checkpoints reached, by month.
pub type ReachedCheckpoints = BTreeMap<Month, Checkpoints>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VisitsConfig {
    /// Check-ins closer than this to the previous visit count as the same visit.
    pub min_gap_hours: u32,
    pub checkpoints: Checkpoints,
}

impl Default for VisitsConfig {
    fn default() -> Self {
        Self {
            min_gap_hours: 8,
            checkpoints: Checkpoints::new(),
        }
    }
}

/// Turns raw check-ins into visits.
///
/// Check-ins not strictly after `last_visit` are dropped. The rest, in time
/// order, count only when at least `min_gap` after the previous accepted one
/// (or after `last_visit`).
pub fn clean_visits(raw: &[Timestamp], last_visit: Option<Timestamp>, min_gap: TimeDelta) -> Vec<Timestamp> {
    let mut fresh: Vec<Timestamp> = raw
        .iter()
        .copied()
        .filter(|ts| last_visit.is_none_or(|last| *ts > last))
        .collect();
    fresh.sort_unstable();

    let Some(first) = fresh.first().copied() else {
        return Vec::new();
    };
    let mut next_allowed = last_visit.map_or(first, |last| last + min_gap);

    let mut visits = Vec::with_capacity(fresh.len());
    for ts in fresh {
        if ts >= next_allowed {
            visits.push(ts);
            next_allowed = ts + min_gap;
        }
    }
    visits
}

pub fn count_by_month(visits: &[Timestamp]) -> BTreeMap<Month, u32> {
    let mut counts = BTreeMap::new();
    for ts in visits {
        *counts.entry(month_of(*ts)).or_insert(0) += 1;
    }
    counts
}

/// Thresholds crossed when a monthly count goes from `before` to `after`:
/// `before <= threshold < after`.
pub fn reached(checkpoints: &Checkpoints, before: u32, after: u32) -> Checkpoints {
    if after <= before {
        return Checkpoints::new();
    }
    checkpoints
        .range(before..after)
        .map(|(visits, points)| (*visits, *points))
        .collect()
}

pub struct VisitAccumulator {
    visits: Arc<dyn VisitRepository>,
    checkpoints: Checkpoints,
    min_gap: TimeDelta,
    lock: Mutex<()>,
}

impl VisitAccumulator {
    pub fn new(visits: Arc<dyn VisitRepository>, config: &VisitsConfig) -> Self {
        Self {
            visits,
            checkpoints: config.checkpoints.clone(),
            min_gap: TimeDelta::hours(i64::from(config.min_gap_hours)),
            lock: Mutex::new(()),
        }
    }

    pub fn checkpoints(&self) -> &Checkpoints {
        &self.checkpoints
    }

    pub fn last_visit(&self, user: &User) -> Option<Timestamp> {
        self.visits.entry_for(&user.full_name).last_visit
    }

    /// Visits of `user` in the month containing `at`.
    pub fn visits_in_month(&self, user: &User, at: Timestamp) -> u32 {
        self.visits.entry_for(&user.full_name).visits_in(month_of(at))
    }

    /// Visitors of the month containing `at`, most visits first.
    pub fn visitors_in_month(&self, at: Timestamp) -> Vec<(String, u32)> {
        self.visits.visitors_in_month(month_of(at))
    }

    /// The first checkpoint a member with `visits` this month has not crossed yet.
    pub fn next_checkpoint(&self, visits: u32) -> Option<(u32, Points)> {
        self.checkpoints
            .range(visits..)
            .next()
            .map(|(threshold, points)| (*threshold, *points))
    }

    /// Ingests a batch of raw check-ins from any number of members.
    ///
    /// Changed entries are stored in one batch. Returns the checkpoints each
    /// member crossed, by full name; members without any are left out.
    pub async fn add_visits(&self, raw: Vec<(User, Timestamp)>) -> BTreeMap<String, ReachedCheckpoints> {
        if raw.is_empty() {
            return BTreeMap::new();
        }
        let _guard = self.lock.lock().await;

        let mut by_user: BTreeMap<String, Vec<Timestamp>> = BTreeMap::new();
        for (user, ts) in raw {
            by_user.entry(user.full_name).or_default().push(ts);
        }

        let mut changed = Vec::new();
        let mut rewards = BTreeMap::new();
        for (full_name, check_ins) in by_user {
            let entry = self.visits.entry_for(&full_name);
            let Some((updated, crossed)) = self.accumulate(&entry, &check_ins) else {
                debug!("visits: nothing new for {full_name}");
                continue;
            };
            changed.push(updated);
            if !crossed.is_empty() {
                rewards.insert(full_name, crossed);
            }
        }

        if !changed.is_empty() {
            info!(
                "visits: {} members updated, {} reached checkpoints",
                changed.len(),
                rewards.len()
            );
            self.visits.save_all(changed).await;
        }
        rewards
    }

    /// Applies one member's check-ins; `None` when none of them is a new visit.
    pub fn accumulate(&self, entry: &VisitsEntry, check_ins: &[Timestamp]) -> Option<(VisitsEntry, ReachedCheckpoints)> {
        let visits = clean_visits(check_ins, entry.last_visit, self.min_gap);
        let last = *visits.last()?;

        let counts = count_by_month(&visits);
        let updated = entry.add_visits(&counts).with_last_visit(last);

        let by_month = counts
            .keys()
            .filter_map(|month| {
                let crossed = reached(&self.checkpoints, entry.visits_in(*month), updated.visits_in(*month));
                (!crossed.is_empty()).then_some((*month, crossed))
            })
            .collect();
        Some((updated, by_month))
    }
}
