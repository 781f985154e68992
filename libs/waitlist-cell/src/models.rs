// libs/waitlist-cell/src/models.rs
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_config::AppConfig;

// ==============================================================================
// CORE WAITLIST MODELS
// ==============================================================================

/// One patient's standing request for one slot context. Mutated only through
/// conditional writes guarded by `version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub user_phone: Option<String>,
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub preferred_date: NaiveDate,
    pub preferred_time: String,
    pub status: WaitlistStatus,
    pub created_at: DateTime<Utc>,
    pub notified_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl WaitlistEntry {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            provider_id: self.provider_id,
            service_id: self.service_id,
            preferred_date: self.preferred_date,
        }
    }

    /// Whether a pending offer has lapsed. Entries that were never notified
    /// carry no deadline and never expire.
    pub fn offer_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, WaitlistStatus::Notified)
            && self.expires_at.map(|deadline| deadline <= now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    Active,
    Notified,
    Booked,
    Expired,
    Cancelled,
}

impl WaitlistStatus {
    /// Terminal entries are retained for audit but excluded from queue scans.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WaitlistStatus::Booked | WaitlistStatus::Expired | WaitlistStatus::Cancelled
        )
    }
}

impl fmt::Display for WaitlistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitlistStatus::Active => write!(f, "active"),
            WaitlistStatus::Notified => write!(f, "notified"),
            WaitlistStatus::Booked => write!(f, "booked"),
            WaitlistStatus::Expired => write!(f, "expired"),
            WaitlistStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The unit of mutual exclusion: one FIFO queue per provider/service/day.
/// Time-of-day is informational metadata carried on the offer, not a
/// partition key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub preferred_date: NaiveDate,
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.provider_id, self.service_id, self.preferred_date
        )
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinWaitlistRequest {
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub user_phone: Option<String>,
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub preferred_date: NaiveDate,
    pub preferred_time: String,
}

impl JoinWaitlistRequest {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            provider_id: self.provider_id,
            service_id: self.service_id,
            preferred_date: self.preferred_date,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotFreedRequest {
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub date: NaiveDate,
    pub available_time: String,
}

impl SlotFreedRequest {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            provider_id: self.provider_id,
            service_id: self.service_id,
            preferred_date: self.date,
        }
    }
}

/// Result of one slot-freed dispatch.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum DispatchOutcome {
    /// Exactly one waiting patient was claimed and offered the slot.
    Notified { entry_id: Uuid },
    /// No active entry could be claimed for this slot key.
    NoneWaiting,
}

/// Result of a patient-initiated cancellation. When the entry held a pending
/// offer the slot opened back up and the caller should cascade a slot-freed
/// dispatch for the same key.
#[derive(Debug, Clone, Serialize)]
pub struct CancelOutcome {
    pub entry_id: Uuid,
    pub slot_key: SlotKey,
    pub preferred_time: String,
    pub slot_released: bool,
}

// ==============================================================================
// ENGINE SETTINGS
// ==============================================================================

#[derive(Debug, Clone)]
pub struct WaitlistSettings {
    /// How long a notified patient has to book before the offer lapses.
    pub offer_window_hours: i64,
    /// How many head-of-queue candidates one claim round considers.
    pub candidate_lookahead: usize,
    /// How many full re-read rounds `on_slot_freed` attempts before giving up.
    pub max_claim_rounds: usize,
}

impl Default for WaitlistSettings {
    fn default() -> Self {
        Self {
            offer_window_hours: 24,
            candidate_lookahead: 10,
            max_claim_rounds: 3,
        }
    }
}

impl WaitlistSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            offer_window_hours: config.offer_window_hours,
            ..Self::default()
        }
    }

    pub fn offer_window(&self) -> ChronoDuration {
        ChronoDuration::hours(self.offer_window_hours)
    }
}
