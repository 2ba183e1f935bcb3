use std::sync::Arc;

use log::{debug, info};
use serde::Deserialize;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    time::{self, Duration, MissedTickBehavior},
};

use super::database::Database;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("refresh loop is gone")]
    ChannelClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between scheduled refreshes.
    pub interval_secs: u64,
    /// Refresh once as soon as the loop starts.
    pub run_on_start: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            run_on_start: true,
        }
    }
}

/// Handle to the background refresh loop.
#[derive(Clone)]
pub struct RefresherHandle {
    cmd_tx: mpsc::Sender<Command>,
}

enum Command {
    Refresh {
        resp: oneshot::Sender<usize>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Spawns a task refreshing `db` on a fixed interval and on demand.
pub fn spawn_refresher(db: Arc<Database>, config: RefreshConfig) -> RefresherHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(16);
    let period = Duration::from_secs(config.interval_secs.max(1));

    tokio::spawn(async move {
        let start = if config.run_on_start {
            time::Instant::now()
        } else {
            time::Instant::now() + period
        };
        let mut ticker = time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("refresh loop started, every {}s", period.as_secs());

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    match cmd {
                        Command::Refresh { resp } => {
                            let changed = db.refresh().await;
                            let _ = resp.send(changed);
                        }
                        Command::Shutdown { resp } => {
                            let _ = resp.send(());
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    debug!("scheduled refresh");
                    db.refresh().await;
                }
            }
        }
        info!("refresh loop stopped");
    });

    RefresherHandle { cmd_tx }
}

impl RefresherHandle {
    /// Refreshes immediately; returns how many tables changed.
    pub async fn refresh_now(&self) -> Result<usize, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Refresh { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}
