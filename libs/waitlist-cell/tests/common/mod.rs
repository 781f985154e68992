#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use waitlist_cell::{
    EntryPatch, EntryStore, InMemoryEntryStore, JoinWaitlistRequest, NotificationError,
    NotificationGateway, SlotKey, StoreError, UpdateOutcome, WaitlistEntry, WaitlistStatus,
};

pub fn slot_key() -> SlotKey {
    SlotKey {
        provider_id: Uuid::new_v4(),
        service_id: Uuid::new_v4(),
        preferred_date: chrono::NaiveDate::from_ymd_opt(2031, 6, 15).unwrap(),
    }
}

/// Fixed point safely in the past: offers seeded from here are always lapsed
/// relative to the real clock, while fresh offers issued by the engine land
/// strictly later.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

pub fn entry_for(key: &SlotKey, created_at: DateTime<Utc>) -> WaitlistEntry {
    WaitlistEntry {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        user_name: "Ana Morales".to_string(),
        user_email: "ana@example.com".to_string(),
        user_phone: Some("+34600000000".to_string()),
        provider_id: key.provider_id,
        service_id: key.service_id,
        preferred_date: key.preferred_date,
        preferred_time: "10:00".to_string(),
        status: WaitlistStatus::Active,
        created_at,
        notified_at: None,
        expires_at: None,
        version: 1,
    }
}

pub fn notified_entry(
    key: &SlotKey,
    created_at: DateTime<Utc>,
    notified_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> WaitlistEntry {
    let mut entry = entry_for(key, created_at);
    entry.status = WaitlistStatus::Notified;
    entry.notified_at = Some(notified_at);
    entry.expires_at = Some(expires_at);
    entry.version = 2;
    entry
}

pub fn join_request(key: &SlotKey) -> JoinWaitlistRequest {
    JoinWaitlistRequest {
        user_id: Uuid::new_v4(),
        user_name: "Ana Morales".to_string(),
        user_email: "ana@example.com".to_string(),
        user_phone: None,
        provider_id: key.provider_id,
        service_id: key.service_id,
        preferred_date: key.preferred_date,
        preferred_time: "10:00".to_string(),
    }
}

pub fn day() -> Duration {
    Duration::hours(24)
}

// ==============================================================================
// GATEWAY TEST DOUBLES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct SentOffer {
    pub entry_id: Uuid,
    pub email: String,
    pub offered_time: String,
    pub expires_at: DateTime<Utc>,
}

/// Records every offer the engine hands to the gateway.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<SentOffer>>,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<SentOffer> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn notify(
        &self,
        entry: &WaitlistEntry,
        offered_time: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(SentOffer {
            entry_id: entry.id,
            email: entry.user_email.clone(),
            offered_time: offered_time.to_string(),
            expires_at,
        });
        Ok(())
    }
}

/// Gateway whose delivery always fails; the claim must stand regardless.
pub struct FailingGateway;

#[async_trait]
impl NotificationGateway for FailingGateway {
    async fn notify(
        &self,
        _entry: &WaitlistEntry,
        _offered_time: &str,
        _expires_at: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        Err(NotificationError::RequestFailed(
            "simulated provider outage".to_string(),
        ))
    }
}

// ==============================================================================
// STORE TEST DOUBLE
// ==============================================================================

/// Store wrapper that makes the first `n` conditional writes lose their race,
/// simulating concurrent claimants without real interleaving.
pub struct ConflictingStore {
    inner: Arc<InMemoryEntryStore>,
    conflicts_remaining: AtomicUsize,
}

impl ConflictingStore {
    pub fn new(inner: Arc<InMemoryEntryStore>, conflicts: usize) -> Self {
        Self {
            inner,
            conflicts_remaining: AtomicUsize::new(conflicts),
        }
    }

    fn should_conflict(&self) -> bool {
        self.conflicts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl EntryStore for ConflictingStore {
    async fn insert(&self, entry: &WaitlistEntry) -> Result<Uuid, StoreError> {
        self.inner.insert(entry).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<WaitlistEntry>, StoreError> {
        self.inner.get(id).await
    }

    async fn find_by_status(
        &self,
        key: &SlotKey,
        status: WaitlistStatus,
        limit: usize,
    ) -> Result<Vec<WaitlistEntry>, StoreError> {
        self.inner.find_by_status(key, status, limit).await
    }

    async fn find_duplicate(
        &self,
        user_id: Uuid,
        key: &SlotKey,
    ) -> Result<Option<WaitlistEntry>, StoreError> {
        self.inner.find_duplicate(user_id, key).await
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<WaitlistEntry>, StoreError> {
        self.inner.find_by_user(user_id).await
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<WaitlistEntry>, StoreError> {
        self.inner.find_expired(now).await
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: EntryPatch,
    ) -> Result<UpdateOutcome, StoreError> {
        if self.should_conflict() {
            return Ok(UpdateOutcome::Conflict);
        }
        self.inner.conditional_update(id, expected_version, patch).await
    }
}
