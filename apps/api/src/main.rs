use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use waitlist_cell::{
    DiscardNotificationGateway, EmailNotificationGateway, ExpirySweeper, NotificationGateway,
    SupabaseEntryStore, WaitlistEngine, WaitlistSettings, WaitlistState,
};

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic waitlist API server");

    // Load configuration
    let config = AppConfig::from_env();

    // Wire the engine once with its injected collaborators
    let supabase = Arc::new(SupabaseClient::new(&config));
    let store = Arc::new(SupabaseEntryStore::new(supabase));

    let gateway: Arc<dyn NotificationGateway> = match EmailNotificationGateway::new(&config) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            warn!("Email gateway unavailable ({}), offers will be logged only", e);
            Arc::new(DiscardNotificationGateway)
        }
    };

    let engine = Arc::new(WaitlistEngine::new(
        store.clone(),
        gateway,
        WaitlistSettings::from_config(&config),
    ));
    let sweeper = Arc::new(ExpirySweeper::new(store, engine.clone()));

    // Background expiry sweep, independent of slot-freed triggers
    let sweep_period = Duration::from_secs(config.sweep_interval_minutes * 60);
    let background_sweeper = sweeper.clone();
    tokio::spawn(async move {
        background_sweeper.run(sweep_period).await;
    });

    let state = Arc::new(WaitlistState { engine, sweeper });

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
