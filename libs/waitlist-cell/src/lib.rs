pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

pub use error::WaitlistError;
pub use handlers::WaitlistState;
pub use models::*;
pub use router::waitlist_routes;
pub use services::{
    DiscardNotificationGateway, EmailNotificationGateway, ExpirySweeper, NotificationError,
    NotificationGateway, WaitlistEngine,
};
pub use store::{
    EntryPatch, EntryStore, InMemoryEntryStore, StoreError, SupabaseEntryStore, UpdateOutcome,
};
