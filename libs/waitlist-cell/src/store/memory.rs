// libs/waitlist-cell/src/store/memory.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{SlotKey, WaitlistEntry, WaitlistStatus};
use crate::store::{EntryPatch, EntryStore, StoreError, UpdateOutcome};

/// Reference store implementation backed by a process-local map. The
/// conditional update runs entirely under the write guard, so it is atomic
/// with respect to concurrent claim attempts, matching the guarantee the
/// hosted document store gives a filtered PATCH.
#[derive(Default)]
pub struct InMemoryEntryStore {
    entries: RwLock<HashMap<Uuid, WaitlistEntry>>,
}

impl InMemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn fifo_order(a: &WaitlistEntry, b: &WaitlistEntry) -> std::cmp::Ordering {
    a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
}

#[async_trait]
impl EntryStore for InMemoryEntryStore {
    async fn insert(&self, entry: &WaitlistEntry) -> Result<Uuid, StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.id, entry.clone());
        Ok(entry.id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<WaitlistEntry>, StoreError> {
        Ok(self.entries.read().await.get(&id).cloned())
    }

    async fn find_by_status(
        &self,
        key: &SlotKey,
        status: WaitlistStatus,
        limit: usize,
    ) -> Result<Vec<WaitlistEntry>, StoreError> {
        let entries = self.entries.read().await;
        let mut matches: Vec<WaitlistEntry> = entries
            .values()
            .filter(|e| e.slot_key() == *key && e.status == status)
            .cloned()
            .collect();
        matches.sort_by(fifo_order);
        matches.truncate(limit);
        Ok(matches)
    }

    async fn find_duplicate(
        &self,
        user_id: Uuid,
        key: &SlotKey,
    ) -> Result<Option<WaitlistEntry>, StoreError> {
        let entries = self.entries.read().await;
        let mut matches: Vec<&WaitlistEntry> = entries
            .values()
            .filter(|e| e.user_id == user_id && e.slot_key() == *key && !e.status.is_terminal())
            .collect();
        matches.sort_by(|a, b| fifo_order(a, b));
        Ok(matches.first().map(|e| (*e).clone()))
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<WaitlistEntry>, StoreError> {
        let entries = self.entries.read().await;
        let mut matches: Vec<WaitlistEntry> = entries
            .values()
            .filter(|e| e.user_id == user_id && !e.status.is_terminal())
            .cloned()
            .collect();
        matches.sort_by(fifo_order);
        Ok(matches)
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<WaitlistEntry>, StoreError> {
        let entries = self.entries.read().await;
        let mut matches: Vec<WaitlistEntry> = entries
            .values()
            .filter(|e| e.offer_expired(now))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then(a.id.cmp(&b.id)));
        Ok(matches)
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: EntryPatch,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&id) {
            Some(entry) if entry.version == expected_version => {
                patch.apply(entry);
                Ok(UpdateOutcome::Applied(entry.clone()))
            }
            // Missing or re-versioned: someone else resolved it first.
            _ => Ok(UpdateOutcome::Conflict),
        }
    }
}
