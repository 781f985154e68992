use thiserror::Error;

use crate::models::WaitlistStatus;
use crate::store::StoreError;
use shared_models::AppError;

#[derive(Error, Debug)]
pub enum WaitlistError {
    #[error("Waitlist entry not found")]
    EntryNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Offer is no longer valid")]
    StaleOffer,

    #[error("Entry cannot be cancelled from status {0}")]
    InvalidStatusTransition(WaitlistStatus),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<WaitlistError> for AppError {
    fn from(err: WaitlistError) -> Self {
        match err {
            WaitlistError::EntryNotFound => AppError::NotFound("waitlist entry not found".to_string()),
            WaitlistError::ValidationError(msg) => AppError::ValidationError(msg),
            WaitlistError::StaleOffer => {
                AppError::Conflict("offer expired, please rejoin the waitlist".to_string())
            }
            WaitlistError::InvalidStatusTransition(status) => {
                AppError::Conflict(format!("entry already resolved as {}", status))
            }
            WaitlistError::Store(e) => AppError::Database(e.to_string()),
        }
    }
}
