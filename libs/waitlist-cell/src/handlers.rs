// libs/waitlist-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_models::AppError;

use crate::models::{JoinWaitlistRequest, SlotFreedRequest};
use crate::services::engine::WaitlistEngine;
use crate::services::sweeper::ExpirySweeper;

/// Shared state for the waitlist HTTP surface. Engine and sweeper are
/// constructed once at startup with their injected store and gateway.
pub struct WaitlistState {
    pub engine: Arc<WaitlistEngine>,
    pub sweeper: Arc<ExpirySweeper>,
}

/// POST / - join the waitlist for a provider/service/day.
pub async fn join_waitlist(
    State(state): State<Arc<WaitlistState>>,
    Json(request): Json<JoinWaitlistRequest>,
) -> Result<Json<Value>, AppError> {
    let entry_id = state.engine.enqueue(request).await?;
    Ok(Json(json!({ "entry_id": entry_id })))
}

/// POST /slot-freed - called by the cancellation flow when an appointment
/// slot opens up.
pub async fn slot_freed(
    State(state): State<Arc<WaitlistState>>,
    Json(request): Json<SlotFreedRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = state
        .engine
        .on_slot_freed(&request.slot_key(), &request.available_time)
        .await?;
    Ok(Json(json!(outcome)))
}

/// POST /{entry_id}/book - the booking flow confirms a pending offer.
pub async fn book_entry(
    State(state): State<Arc<WaitlistState>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = state.engine.mark_booked(entry_id).await?;
    Ok(Json(json!({
        "entry_id": entry.id,
        "status": entry.status,
    })))
}

/// POST /{entry_id}/cancel - patient withdraws from the waitlist. If the
/// entry held a pending offer the freed slot is immediately re-dispatched to
/// the next patient, mirroring a real slot cancellation.
pub async fn cancel_entry(
    State(state): State<Arc<WaitlistState>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let outcome = state.engine.mark_cancelled(entry_id).await?;

    if outcome.slot_released {
        if let Err(e) = state
            .engine
            .on_slot_freed(&outcome.slot_key, &outcome.preferred_time)
            .await
        {
            warn!(
                "Cascade after cancellation of entry {} failed: {}",
                outcome.entry_id, e
            );
        }
    }

    Ok(Json(json!({
        "entry_id": outcome.entry_id,
        "cancelled": true,
        "slot_released": outcome.slot_released,
    })))
}

/// GET /{entry_id} - entry status lookup for the patient-facing UI.
pub async fn get_entry(
    State(state): State<Arc<WaitlistState>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = state.engine.get_entry(entry_id).await?;
    Ok(Json(json!(entry)))
}

/// GET /users/{user_id} - a patient's open waitlist entries.
pub async fn get_user_entries(
    State(state): State<Arc<WaitlistState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entries = state.engine.entries_for_user(user_id).await?;
    Ok(Json(json!({ "entries": entries })))
}

/// POST /sweep - external scheduler trigger for the expiry sweep.
pub async fn run_sweep(
    State(state): State<Arc<WaitlistState>>,
) -> Result<Json<Value>, AppError> {
    let expired = state.sweeper.sweep(Utc::now()).await?;
    Ok(Json(json!({ "expired": expired })))
}
