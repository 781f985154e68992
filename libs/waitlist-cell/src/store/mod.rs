// libs/waitlist-cell/src/store/mod.rs
pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{SlotKey, WaitlistEntry, WaitlistStatus};

pub use memory::InMemoryEntryStore;
pub use supabase::SupabaseEntryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed store record: {0}")]
    Malformed(String),
}

/// Single-field-group patch applied by a conditional write. Statuses always
/// change; the offer timestamps only on the `active -> notified` transition.
#[derive(Debug, Clone)]
pub struct EntryPatch {
    pub status: WaitlistStatus,
    pub notified_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl EntryPatch {
    pub fn to_status(status: WaitlistStatus) -> Self {
        Self {
            status,
            notified_at: None,
            expires_at: None,
        }
    }

    pub fn offered(notified_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            status: WaitlistStatus::Notified,
            notified_at: Some(notified_at),
            expires_at: Some(expires_at),
        }
    }

    pub fn apply(&self, entry: &mut WaitlistEntry) {
        entry.status = self.status;
        if let Some(notified_at) = self.notified_at {
            entry.notified_at = Some(notified_at);
        }
        if let Some(expires_at) = self.expires_at {
            entry.expires_at = Some(expires_at);
        }
        entry.version += 1;
    }
}

/// Outcome of a conditional write. `Conflict` is expected, benign contention:
/// another caller resolved the entry first.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    Applied(WaitlistEntry),
    Conflict,
}

/// Durable keyed storage for waitlist entries. The only mutation primitive is
/// a compare-and-swap on `version`; no caller ever holds a lock broader than
/// one entry.
#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn insert(&self, entry: &WaitlistEntry) -> Result<Uuid, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<WaitlistEntry>, StoreError>;

    /// Entries for one slot key in the given status, ordered ascending by
    /// `(created_at, id)` and bounded to `limit`.
    async fn find_by_status(
        &self,
        key: &SlotKey,
        status: WaitlistStatus,
        limit: usize,
    ) -> Result<Vec<WaitlistEntry>, StoreError>;

    /// An existing non-terminal entry for the same user and slot key, if any.
    async fn find_duplicate(
        &self,
        user_id: Uuid,
        key: &SlotKey,
    ) -> Result<Option<WaitlistEntry>, StoreError>;

    /// A user's open (non-terminal) entries across all slot keys.
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<WaitlistEntry>, StoreError>;

    /// Notified entries whose offer deadline has passed, across all slot keys.
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<WaitlistEntry>, StoreError>;

    /// Apply `patch` only if the stored entry still carries `expected_version`.
    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: EntryPatch,
    ) -> Result<UpdateOutcome, StoreError>;
}
