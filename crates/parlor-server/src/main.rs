use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parlor_api::mail::Notifier;
use parlor_api::state::{AppState, AppStateInner, CoreConfig};
use parlor_api::tokens::TokenService;
use parlor_api::{devices, messages, presence, rooms};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parlor=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let secret = std::env::var("PARLOR_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let data_dir = std::env::var("PARLOR_DATA_DIR").unwrap_or_else(|_| "data".into());
    let host = std::env::var("PARLOR_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PARLOR_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let admin_email =
        std::env::var("PARLOR_ADMIN_EMAIL").unwrap_or_else(|_| "admin@localhost".into());
    let require_approval = std::env::var("PARLOR_REQUIRE_APPROVAL")
        .map(|value| !matches!(value.to_lowercase().as_str(), "0" | "false" | "no"))
        .unwrap_or(true);
    let base_url = std::env::var("PARLOR_BASE_URL")
        .unwrap_or_else(|_| format!("http://localhost:{port}"));
    let mail_webhook = std::env::var("PARLOR_MAIL_WEBHOOK").ok();

    // Init storage
    let data_dir = PathBuf::from(data_dir);
    std::fs::create_dir_all(&data_dir)?;
    let registry = parlor_db::RegistryDb::open(&data_dir.join("registry.db"))?;
    let stores = parlor_db::StoreManager::new(&data_dir)?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        registry,
        stores,
        tokens: TokenService::new(&secret),
        notifier: Notifier::from_webhook(mail_webhook),
        config: CoreConfig {
            admin_email,
            require_approval,
            base_url,
        },
    });

    // Routes
    let app = Router::new()
        .route("/rooms/approve", get(rooms::approve))
        .route("/rooms/deny", get(rooms::deny))
        .route("/devices/confirm", get(devices::confirm_device))
        .route("/{room}/enter", get(rooms::enter))
        .route("/{room}/history", get(messages::get_history))
        .route("/{room}/send", post(messages::send_message))
        .route("/{room}/messages/{id}", delete(messages::remove_message))
        .route("/{room}/heartbeat", post(presence::heartbeat))
        .route("/{room}/online", get(presence::online))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Parlor server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
