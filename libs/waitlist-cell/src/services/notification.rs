// libs/waitlist-cell/src/services/notification.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::WaitlistEntry;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Email provider not configured")]
    NotConfigured,

    #[error("Email request failed: {0}")]
    RequestFailed(String),

    #[error("Email provider rejected message: HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// Sends an offer message to one patient about one freed slot. At-least-once
/// best effort: the engine never rolls back a claim because delivery failed,
/// and no callback is expected.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn notify(
        &self,
        entry: &WaitlistEntry,
        offered_time: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), NotificationError>;
}

/// Fallback gateway for environments without email credentials: the claim
/// still stands, the offer is only logged.
pub struct DiscardNotificationGateway;

#[async_trait]
impl NotificationGateway for DiscardNotificationGateway {
    async fn notify(
        &self,
        entry: &WaitlistEntry,
        offered_time: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        info!(
            "Discarding offer notification for entry {} (time {}, expires {})",
            entry.id, offered_time, expires_at
        );
        Ok(())
    }
}

/// Gateway backed by a hosted transactional email API.
pub struct EmailNotificationGateway {
    client: Client,
    api_url: String,
    api_key: String,
    from_address: String,
}

impl EmailNotificationGateway {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_email_configured() {
            return Err(NotificationError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            api_url: config.email_api_url.clone(),
            api_key: config.email_api_key.clone(),
            from_address: config.email_from_address.clone(),
        })
    }

    fn offer_body(entry: &WaitlistEntry, offered_time: &str, expires_at: DateTime<Utc>) -> String {
        format!(
            "<p>Hi {name},</p>\
             <p>An appointment opening on <strong>{date}</strong> at <strong>{time}</strong> \
             just became available and is being held for you.</p>\
             <p>Please confirm your booking before <strong>{deadline}</strong>. \
             After that the opening will be offered to the next patient on the waitlist.</p>",
            name = entry.user_name,
            date = entry.preferred_date.format("%B %-d, %Y"),
            time = offered_time,
            deadline = expires_at.format("%B %-d, %Y at %H:%M UTC"),
        )
    }
}

#[async_trait]
impl NotificationGateway for EmailNotificationGateway {
    async fn notify(
        &self,
        entry: &WaitlistEntry,
        offered_time: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        debug!("Sending waitlist offer email for entry {}", entry.id);

        let request_body = json!({
            "from": self.from_address,
            "to": [entry.user_email],
            "subject": "An appointment opening is waiting for you",
            "html": Self::offer_body(entry, offered_time, expires_at),
        });

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| NotificationError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(
                "Offer email for entry {} rejected: {} - {}",
                entry.id, status, message
            );
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        info!("Offer email sent for entry {} to {}", entry.id, entry.user_email);
        Ok(())
    }
}
