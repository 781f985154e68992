// libs/waitlist-cell/src/services/sweeper.rs
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::WaitlistError;
use crate::models::WaitlistStatus;
use crate::services::engine::WaitlistEngine;
use crate::store::{EntryPatch, EntryStore, UpdateOutcome};

/// Time-driven counterpart to the event-driven engine: transitions lapsed
/// offers to `expired` and cascades each freed slot to the next waiting
/// patient. Holds no timers of its own beyond the interval loop; an external
/// scheduler may equally drive `sweep` directly.
pub struct ExpirySweeper {
    store: Arc<dyn EntryStore>,
    engine: Arc<WaitlistEngine>,
    is_shutdown: tokio::sync::RwLock<bool>,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn EntryStore>, engine: Arc<WaitlistEngine>) -> Self {
        Self {
            store,
            engine,
            is_shutdown: tokio::sync::RwLock::new(false),
        }
    }

    /// Expire every notified entry whose deadline has passed, cascading each
    /// into a fresh slot-freed dispatch. Returns how many entries this call
    /// transitioned. Idempotent: a re-run only sees entries still meeting the
    /// deadline predicate, and a lost conditional write means the entry was
    /// resolved in the meantime, which is expected benign contention.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, WaitlistError> {
        let due = self.store.find_expired(now).await?;
        if due.is_empty() {
            debug!("Sweep at {} found no lapsed offers", now);
            return Ok(0);
        }

        info!("Sweep at {} found {} lapsed offers", now, due.len());
        let mut expired = 0usize;

        for entry in due {
            match self
                .store
                .conditional_update(entry.id, entry.version, EntryPatch::to_status(WaitlistStatus::Expired))
                .await?
            {
                UpdateOutcome::Applied(lapsed) => {
                    expired += 1;
                    info!("Offer for entry {} expired unanswered", lapsed.id);

                    // The lapsed offer frees the slot again; hand it to the
                    // next patient in line.
                    let key = lapsed.slot_key();
                    if let Err(e) = self.engine.on_slot_freed(&key, &lapsed.preferred_time).await {
                        warn!("Cascade dispatch for slot {} failed: {}", key, e);
                    }
                }
                UpdateOutcome::Conflict => {
                    debug!(
                        "Entry {} already resolved before expiry, skipping",
                        entry.id
                    );
                }
            }
        }

        Ok(expired)
    }

    /// Fixed-interval sweep loop for the API process. Runs until `shutdown`.
    pub async fn run(&self, period: Duration) {
        info!("Expiry sweeper started with period {:?}", period);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if *self.is_shutdown.read().await {
                info!("Expiry sweeper received shutdown signal");
                break;
            }

            match self.sweep(Utc::now()).await {
                Ok(0) => {}
                Ok(count) => info!("Sweep expired {} entries", count),
                // A failed sweep is local to this tick; the next tick retries
                // the same predicate.
                Err(e) => error!("Sweep failed: {}", e),
            }
        }
    }

    pub async fn shutdown(&self) {
        let mut is_shutdown = self.is_shutdown.write().await;
        *is_shutdown = true;
    }
}
