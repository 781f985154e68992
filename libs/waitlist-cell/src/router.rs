// libs/waitlist-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{self, WaitlistState};

pub fn waitlist_routes(state: Arc<WaitlistState>) -> Router {
    Router::new()
        .route("/", post(handlers::join_waitlist))
        .route("/slot-freed", post(handlers::slot_freed))
        .route("/sweep", post(handlers::run_sweep))
        .route("/users/{user_id}", get(handlers::get_user_entries))
        .route("/{entry_id}", get(handlers::get_entry))
        .route("/{entry_id}/book", post(handlers::book_entry))
        .route("/{entry_id}/cancel", post(handlers::cancel_entry))
        .with_state(state)
}
