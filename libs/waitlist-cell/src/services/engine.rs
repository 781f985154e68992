// libs/waitlist-cell/src/services/engine.rs
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::WaitlistError;
use crate::models::{
    CancelOutcome, DispatchOutcome, JoinWaitlistRequest, SlotKey, WaitlistEntry, WaitlistSettings,
    WaitlistStatus,
};
use crate::services::notification::NotificationGateway;
use crate::store::{EntryPatch, EntryStore, UpdateOutcome};

/// Owns the waitlist state machine. Stateless apart from injected
/// collaborators; correctness under concurrent callers rests entirely on the
/// store's per-entry compare-and-swap, so the engine survives restarts and
/// needs no in-process lock table.
pub struct WaitlistEngine {
    store: Arc<dyn EntryStore>,
    gateway: Arc<dyn NotificationGateway>,
    settings: WaitlistSettings,
}

impl WaitlistEngine {
    pub fn new(
        store: Arc<dyn EntryStore>,
        gateway: Arc<dyn NotificationGateway>,
        settings: WaitlistSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    pub fn settings(&self) -> &WaitlistSettings {
        &self.settings
    }

    /// Add a patient to the waitlist for a slot key. Idempotent: a second join
    /// while a non-terminal entry exists returns the existing entry's id.
    /// Durable write only; no notification is sent at join time.
    pub async fn enqueue(&self, request: JoinWaitlistRequest) -> Result<Uuid, WaitlistError> {
        self.validate_join_request(&request)?;

        let key = request.slot_key();
        if let Some(existing) = self.store.find_duplicate(request.user_id, &key).await? {
            debug!(
                "User {} already waiting for slot {} as entry {}",
                request.user_id, key, existing.id
            );
            return Ok(existing.id);
        }

        let entry = WaitlistEntry {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            user_name: request.user_name,
            user_email: request.user_email,
            user_phone: request.user_phone,
            provider_id: request.provider_id,
            service_id: request.service_id,
            preferred_date: request.preferred_date,
            preferred_time: request.preferred_time,
            status: WaitlistStatus::Active,
            created_at: Utc::now(),
            notified_at: None,
            expires_at: None,
            version: 1,
        };

        let id = self.store.insert(&entry).await?;
        info!("User {} joined waitlist for slot {} as entry {}", entry.user_id, key, id);
        Ok(id)
    }

    /// Dispatch a freed slot to the earliest waiting patient. Safe under
    /// concurrent invocation for the same slot key: only one conditional
    /// write per entry can win, and candidates are tried in FIFO order, so the
    /// winner is always the earliest still-active entry. A losing candidate
    /// stays active and is reconsidered on the next dispatch.
    pub async fn on_slot_freed(
        &self,
        key: &SlotKey,
        available_time: &str,
    ) -> Result<DispatchOutcome, WaitlistError> {
        for round in 0..self.settings.max_claim_rounds {
            let candidates = self
                .store
                .find_by_status(key, WaitlistStatus::Active, self.settings.candidate_lookahead)
                .await?;

            if candidates.is_empty() {
                debug!("No active waitlist entries for slot {}", key);
                return Ok(DispatchOutcome::NoneWaiting);
            }

            for candidate in candidates {
                let now = Utc::now();
                let expires_at = now + self.settings.offer_window();
                match self
                    .store
                    .conditional_update(candidate.id, candidate.version, EntryPatch::offered(now, expires_at))
                    .await?
                {
                    UpdateOutcome::Applied(entry) => {
                        info!(
                            "Entry {} claimed for slot {} (offer expires {})",
                            entry.id, key, expires_at
                        );

                        // The claim is committed; delivery failure must not
                        // roll it back. Retrying delivery is the gateway's
                        // concern.
                        if let Err(e) = self.gateway.notify(&entry, available_time, expires_at).await {
                            warn!("Offer notification for entry {} failed: {}", entry.id, e);
                        }

                        return Ok(DispatchOutcome::Notified { entry_id: entry.id });
                    }
                    UpdateOutcome::Conflict => {
                        debug!(
                            "Entry {} already claimed by a concurrent caller, trying next candidate",
                            candidate.id
                        );
                    }
                }
            }

            debug!(
                "All candidates for slot {} contested in round {}, re-reading queue",
                key,
                round + 1
            );
        }

        warn!(
            "Gave up dispatching slot {} after {} contested rounds",
            key, self.settings.max_claim_rounds
        );
        Ok(DispatchOutcome::NoneWaiting)
    }

    /// Confirm a booking against a pending offer (`notified -> booked`). The
    /// booking flow must treat `StaleOffer` as "nothing booked" to avoid a
    /// double booking.
    pub async fn mark_booked(&self, entry_id: Uuid) -> Result<WaitlistEntry, WaitlistError> {
        let entry = self
            .store
            .get(entry_id)
            .await?
            .ok_or(WaitlistError::EntryNotFound)?;

        if entry.status != WaitlistStatus::Notified {
            return Err(WaitlistError::StaleOffer);
        }
        if entry.offer_expired(Utc::now()) {
            return Err(WaitlistError::StaleOffer);
        }

        match self
            .store
            .conditional_update(entry.id, entry.version, EntryPatch::to_status(WaitlistStatus::Booked))
            .await?
        {
            UpdateOutcome::Applied(booked) => {
                info!("Entry {} booked its offered slot", booked.id);
                Ok(booked)
            }
            // Sweeper or a concurrent cancellation got there first.
            UpdateOutcome::Conflict => Err(WaitlistError::StaleOffer),
        }
    }

    /// Patient-initiated withdrawal (`active|notified -> cancelled`). When the
    /// entry held a pending offer, the outcome flags the slot as released so
    /// the caller can cascade a fresh dispatch for the same key.
    pub async fn mark_cancelled(&self, entry_id: Uuid) -> Result<CancelOutcome, WaitlistError> {
        let mut last_status = WaitlistStatus::Cancelled;

        for _ in 0..3 {
            let entry = self
                .store
                .get(entry_id)
                .await?
                .ok_or(WaitlistError::EntryNotFound)?;

            if entry.status.is_terminal() {
                return Err(WaitlistError::InvalidStatusTransition(entry.status));
            }
            last_status = entry.status;

            match self
                .store
                .conditional_update(entry.id, entry.version, EntryPatch::to_status(WaitlistStatus::Cancelled))
                .await?
            {
                UpdateOutcome::Applied(cancelled) => {
                    let slot_released = last_status == WaitlistStatus::Notified;
                    info!(
                        "Entry {} cancelled by patient (slot released: {})",
                        cancelled.id, slot_released
                    );
                    return Ok(CancelOutcome {
                        entry_id: cancelled.id,
                        slot_key: cancelled.slot_key(),
                        preferred_time: cancelled.preferred_time,
                        slot_released,
                    });
                }
                UpdateOutcome::Conflict => {
                    debug!("Entry {} changed under cancellation, re-reading", entry_id);
                }
            }
        }

        Err(WaitlistError::InvalidStatusTransition(last_status))
    }

    pub async fn get_entry(&self, entry_id: Uuid) -> Result<WaitlistEntry, WaitlistError> {
        self.store
            .get(entry_id)
            .await?
            .ok_or(WaitlistError::EntryNotFound)
    }

    /// A patient's open entries, for the account screen.
    pub async fn entries_for_user(&self, user_id: Uuid) -> Result<Vec<WaitlistEntry>, WaitlistError> {
        Ok(self.store.find_by_user(user_id).await?)
    }

    fn validate_join_request(&self, request: &JoinWaitlistRequest) -> Result<(), WaitlistError> {
        if request.user_name.trim().is_empty() {
            return Err(WaitlistError::ValidationError(
                "Patient name is required".to_string(),
            ));
        }
        if request.user_email.trim().is_empty() || !request.user_email.contains('@') {
            return Err(WaitlistError::ValidationError(
                "A valid patient email is required".to_string(),
            ));
        }
        if request.preferred_time.trim().is_empty() {
            return Err(WaitlistError::ValidationError(
                "Preferred time is required".to_string(),
            ));
        }
        if request.preferred_date < Utc::now().date_naive() {
            return Err(WaitlistError::ValidationError(
                "Preferred date cannot be in the past".to_string(),
            ));
        }
        Ok(())
    }
}
