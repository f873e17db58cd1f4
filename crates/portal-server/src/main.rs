use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use portal_api::config::PortalConfig;
use portal_api::email::Mailer;
use portal_api::storage::Storage;
use portal_api::{AppState, AppStateInner};

const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal=debug,portal_api=debug,portal_db=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("PORTAL_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
        if cfg!(debug_assertions) {
            warn!("PORTAL_JWT_SECRET is unset or a placeholder; acceptable for local development only");
        } else {
            eprintln!("FATAL: PORTAL_JWT_SECRET is unset or still a placeholder.");
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    }
    let db_path = std::env::var("PORTAL_DB_PATH").unwrap_or_else(|_| "portal.db".into());
    let host = std::env::var("PORTAL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PORTAL_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let config = PortalConfig::from_env()?;

    if config.primary_admin_email.is_none() {
        warn!("PORTAL_PRIMARY_ADMIN_EMAIL is not set; admins can only be created by existing admins");
    }
    if config.email_endpoint.is_none() {
        warn!("PORTAL_EMAIL_ENDPOINT is not set; outbound email is disabled");
    }

    // Init database and storage
    let db = portal_db::Database::open(&PathBuf::from(&db_path))?;
    let storage = Storage::new(config.storage_dir.clone()).await?;
    let mailer = Mailer::new(config.email_endpoint.clone());

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        config,
        storage,
        mailer,
    });

    let app = portal_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Portal server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
