// libs/waitlist-cell/src/store/supabase.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{SlotKey, WaitlistEntry, WaitlistStatus};
use crate::store::{EntryPatch, EntryStore, StoreError, UpdateOutcome};

const TABLE_PATH: &str = "/rest/v1/waitlist_entries";

/// Entry store backed by the hosted document database (PostgREST). The
/// conditional write is a filtered PATCH on `id` AND `version`: with
/// `Prefer: return=representation`, an empty result set means the row no
/// longer matched, i.e. another caller claimed the entry first.
pub struct SupabaseEntryStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseEntryStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    async fn fetch(&self, path: &str) -> Result<Vec<WaitlistEntry>, StoreError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, None)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| StoreError::Malformed(format!("Failed to parse entry: {}", e)))
            })
            .collect()
    }
}

#[async_trait]
impl EntryStore for SupabaseEntryStore {
    async fn insert(&self, entry: &WaitlistEntry) -> Result<Uuid, StoreError> {
        let body = serde_json::to_value(entry)
            .map_err(|e| StoreError::Malformed(format!("Failed to serialize entry: {}", e)))?;

        let created: Vec<WaitlistEntry> = self
            .supabase
            .request_with_headers(
                Method::POST,
                TABLE_PATH,
                Some(body),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        created
            .first()
            .map(|e| e.id)
            .ok_or_else(|| StoreError::Unavailable("Insert returned no row".to_string()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<WaitlistEntry>, StoreError> {
        let path = format!("{}?id=eq.{}&limit=1", TABLE_PATH, id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn find_by_status(
        &self,
        key: &SlotKey,
        status: WaitlistStatus,
        limit: usize,
    ) -> Result<Vec<WaitlistEntry>, StoreError> {
        let path = format!(
            "{}?provider_id=eq.{}&service_id=eq.{}&preferred_date=eq.{}&status=eq.{}&order=created_at.asc,id.asc&limit={}",
            TABLE_PATH, key.provider_id, key.service_id, key.preferred_date, status, limit
        );
        self.fetch(&path).await
    }

    async fn find_duplicate(
        &self,
        user_id: Uuid,
        key: &SlotKey,
    ) -> Result<Option<WaitlistEntry>, StoreError> {
        let path = format!(
            "{}?user_id=eq.{}&provider_id=eq.{}&service_id=eq.{}&preferred_date=eq.{}&status=in.(active,notified)&order=created_at.asc,id.asc&limit=1",
            TABLE_PATH, user_id, key.provider_id, key.service_id, key.preferred_date
        );
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<WaitlistEntry>, StoreError> {
        let path = format!(
            "{}?user_id=eq.{}&status=in.(active,notified)&order=created_at.asc,id.asc",
            TABLE_PATH, user_id
        );
        self.fetch(&path).await
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<WaitlistEntry>, StoreError> {
        // RFC3339 timestamps carry '+' and ':', so the filter value must be
        // URL-encoded for PostgREST.
        let timestamp = now.to_rfc3339();
        let deadline = urlencoding::encode(&timestamp);
        let path = format!(
            "{}?status=eq.notified&expires_at=lte.{}&order=expires_at.asc,id.asc",
            TABLE_PATH, deadline
        );
        self.fetch(&path).await
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: EntryPatch,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut update = serde_json::Map::new();
        update.insert("status".to_string(), json!(patch.status.to_string()));
        update.insert("version".to_string(), json!(expected_version + 1));
        if let Some(notified_at) = patch.notified_at {
            update.insert("notified_at".to_string(), json!(notified_at.to_rfc3339()));
        }
        if let Some(expires_at) = patch.expires_at {
            update.insert("expires_at".to_string(), json!(expires_at.to_rfc3339()));
        }

        let path = format!("{}?id=eq.{}&version=eq.{}", TABLE_PATH, id, expected_version);
        let updated: Vec<WaitlistEntry> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(Value::Object(update)),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        match updated.into_iter().next() {
            Some(entry) => Ok(UpdateOutcome::Applied(entry)),
            None => {
                debug!("Conditional update on entry {} lost the race", id);
                Ok(UpdateOutcome::Conflict)
            }
        }
    }
}
