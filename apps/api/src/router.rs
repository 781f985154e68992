use std::sync::Arc;

use axum::{routing::get, Router};

use waitlist_cell::{waitlist_routes, WaitlistState};

pub fn create_router(state: Arc<WaitlistState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic waitlist API is running!" }))
        .nest("/waitlist", waitlist_routes(state))
}
