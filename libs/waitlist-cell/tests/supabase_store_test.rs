mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{base_time, entry_for, notified_entry, slot_key};
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use waitlist_cell::{
    EntryPatch, EntryStore, StoreError, SupabaseEntryStore, UpdateOutcome, WaitlistStatus,
};

fn store_against(server: &MockServer) -> SupabaseEntryStore {
    let config = AppConfig {
        supabase_url: server.uri(),
        supabase_service_key: "test-service-key".to_string(),
        email_api_url: String::new(),
        email_api_key: String::new(),
        email_from_address: String::new(),
        offer_window_hours: 24,
        sweep_interval_minutes: 60,
    };
    SupabaseEntryStore::new(Arc::new(SupabaseClient::new(&config)))
}

#[tokio::test]
async fn conditional_update_applies_when_version_matches() {
    let server = MockServer::start().await;
    let store = store_against(&server);

    let key = slot_key();
    let entry = entry_for(&key, base_time());
    let mut claimed = entry.clone();
    claimed.status = WaitlistStatus::Notified;
    claimed.version = 2;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/waitlist_entries"))
        .and(query_param("id", format!("eq.{}", entry.id)))
        .and(query_param("version", "eq.1"))
        .and(body_partial_json(serde_json::json!({
            "status": "notified",
            "version": 2,
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(vec![serde_json::to_value(&claimed).unwrap()]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let now = Utc::now();
    let outcome = store
        .conditional_update(entry.id, 1, EntryPatch::offered(now, now + Duration::hours(24)))
        .await
        .unwrap();

    let updated = match outcome {
        UpdateOutcome::Applied(e) => e,
        UpdateOutcome::Conflict => panic!("matching version must apply"),
    };
    assert_eq!(updated.version, 2);
    assert_eq!(updated.status, WaitlistStatus::Notified);
}

#[tokio::test]
async fn conditional_update_reports_conflict_on_empty_representation() {
    let server = MockServer::start().await;
    let store = store_against(&server);

    // PostgREST returns no rows when the id/version filter matched nothing
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/waitlist_entries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let key = slot_key();
    let entry = entry_for(&key, base_time());
    let outcome = store
        .conditional_update(entry.id, 7, EntryPatch::to_status(WaitlistStatus::Expired))
        .await
        .unwrap();

    assert_matches!(outcome, UpdateOutcome::Conflict);
}

#[tokio::test]
async fn find_by_status_queries_in_fifo_order() {
    let server = MockServer::start().await;
    let store = store_against(&server);

    let key = slot_key();
    let entry = entry_for(&key, base_time());

    Mock::given(method("GET"))
        .and(path("/rest/v1/waitlist_entries"))
        .and(query_param("provider_id", format!("eq.{}", key.provider_id)))
        .and(query_param("service_id", format!("eq.{}", key.service_id)))
        .and(query_param("preferred_date", format!("eq.{}", key.preferred_date)))
        .and(query_param("status", "eq.active"))
        .and(query_param("order", "created_at.asc,id.asc"))
        .and(query_param("limit", "10"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(vec![serde_json::to_value(&entry).unwrap()]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let found = store
        .find_by_status(&key, WaitlistStatus::Active, 10)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, entry.id);
}

#[tokio::test]
async fn insert_round_trips_created_entry() {
    let server = MockServer::start().await;
    let store = store_against(&server);

    let key = slot_key();
    let entry = entry_for(&key, base_time());

    Mock::given(method("POST"))
        .and(path("/rest/v1/waitlist_entries"))
        .and(body_partial_json(serde_json::json!({
            "id": entry.id,
            "status": "active",
            "version": 1,
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(vec![serde_json::to_value(&entry).unwrap()]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let id = store.insert(&entry).await.unwrap();
    assert_eq!(id, entry.id);
}

#[tokio::test]
async fn find_expired_filters_on_notified_status() {
    let server = MockServer::start().await;
    let store = store_against(&server);

    let key = slot_key();
    let lapsed = notified_entry(&key, base_time(), base_time(), base_time() + Duration::hours(24));

    Mock::given(method("GET"))
        .and(path("/rest/v1/waitlist_entries"))
        .and(query_param("status", "eq.notified"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(vec![serde_json::to_value(&lapsed).unwrap()]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let found = store.find_expired(Utc::now()).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, lapsed.id);
}

#[tokio::test]
async fn backend_failure_surfaces_as_store_unavailable() {
    let server = MockServer::start().await;
    let store = store_against(&server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/waitlist_entries"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database timeout"))
        .mount(&server)
        .await;

    let key = slot_key();
    let result = store.find_by_status(&key, WaitlistStatus::Active, 10).await;
    assert_matches!(result, Err(StoreError::Unavailable(_)));
}
