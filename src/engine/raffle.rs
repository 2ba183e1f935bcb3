//! Ticket raffle paid with loyalty points.

use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    records::{RaffleEntry, User},
    repo::{RaffleRepository, UserRepository},
    types::{Points, Timestamp},
};

/// Errors raised by the point-of-sale ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointsError {
    #[error("{0} has no point-of-sale account")]
    NoAccount(String),
    #[error("not enough points: {needed} needed, {available} available")]
    InsufficientBalance { needed: Points, available: Points },
    #[error("points service unavailable: {0}")]
    Unavailable(String),
}

/// Loyalty points held by the point-of-sale system.
#[async_trait]
pub trait PointsLedger: Send + Sync {
    async fn remove_points(&self, user: &User, points: Points) -> Result<(), PointsError>;
}

#[derive(Debug, Error)]
pub enum RaffleError {
    #[error("the raffle is closed")]
    Closed,
    #[error("{user} already holds {max} tickets")]
    TicketLimit { user: String, max: u32 },
    #[error(transparent)]
    Points(#[from] PointsError),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RaffleSettings {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub end: Timestamp,
    #[serde(default)]
    pub ticket_price: Points,
    /// `0` means unlimited.
    #[serde(default)]
    pub max_tickets: u32,
}

pub struct Raffle {
    ledger: Arc<dyn PointsLedger>,
    users: Arc<dyn UserRepository>,
    entries: Arc<dyn RaffleRepository>,
    settings: RaffleSettings,
    lock: Mutex<()>,
}

impl Raffle {
    pub fn new(
        ledger: Arc<dyn PointsLedger>,
        users: Arc<dyn UserRepository>,
        entries: Arc<dyn RaffleRepository>,
        settings: RaffleSettings,
    ) -> Self {
        Self {
            ledger,
            users,
            entries,
            settings,
            lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &RaffleSettings {
        &self.settings
    }

    pub fn is_active(&self, now: Timestamp) -> bool {
        now < self.settings.end
    }

    pub fn is_free_entry(&self) -> bool {
        self.settings.ticket_price.is_zero()
    }

    pub fn entries(&self, user: &User) -> Vec<Arc<RaffleEntry>> {
        self.entries.entries_for(&user.full_name)
    }

    pub fn has_entries(&self, user: &User) -> bool {
        !self.entries(user).is_empty()
    }

    pub fn can_enter(&self, user: &User) -> bool {
        self.settings.max_tickets == 0 || self.entries(user).len() < self.settings.max_tickets as usize
    }

    /// Entries of every known user; entries of names missing from the
    /// users table are left out.
    pub fn all_entries(&self) -> Vec<(Arc<User>, Vec<Arc<RaffleEntry>>)> {
        self.entries
            .entries_by_user()
            .into_iter()
            .filter_map(|(name, entries)| Some((self.users.by_full_name(&name)?, entries)))
            .collect()
    }

    /// Charges the ticket price and issues a ticket. Ledger errors are
    /// returned as they are and no ticket is issued.
    pub async fn buy_ticket(&self, user: &User, now: Timestamp) -> Result<Arc<RaffleEntry>, RaffleError> {
        let _guard = self.lock.lock().await;
        if !self.is_active(now) {
            return Err(RaffleError::Closed);
        }
        if !self.can_enter(user) {
            return Err(RaffleError::TicketLimit {
                user: user.full_name.clone(),
                max: self.settings.max_tickets,
            });
        }

        if !self.is_free_entry() {
            self.ledger.remove_points(user, self.settings.ticket_price).await?;
        }
        let entry = self.entries.create(user, now).await;
        info!("raffle: ticket {} issued to {}", entry.ticket, user.full_name);
        Ok(entry)
    }
}
