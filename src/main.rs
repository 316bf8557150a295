use dotenvy::dotenv;
use std::net::SocketAddr;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use congreso::config::AppConfig;
use congreso::database;
use congreso::services::mailer;
use congreso::web::router::build_router;
use congreso::AppState;

#[tokio::main]
async fn main() {
    // Load .env
    dotenv().ok();

    // 1. Logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!("💥 {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    // 2. Database
    info!("Connecting to database: {}", config.database_url);
    let pool = database::connect(&config.database_url).await?;
    database::migrate(&pool).await?;

    // 3. Mail transport
    let mailer = mailer::build_mailer(&config)?;
    if config.admin_password.is_empty() {
        warn!("ADMIN_PASSWORD is empty; the admin console is disabled");
    }

    let host = config.host.clone();
    let port = config.port;
    let state = AppState::new(pool, config, mailer);

    // 4. Application
    let app = build_router(state);

    // 5. Serve (with fallback port)
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            let fallback: SocketAddr = format!("{}:{}", host, port.saturating_add(1)).parse()?;
            warn!("⚠️  Could not bind {}: {}. Trying fallback {}", addr, e, fallback);
            tokio::net::TcpListener::bind(fallback).await?
        }
    };

    let bound_addr = listener.local_addr()?;
    info!(
        "🚀 Server running on http://{} (build {})",
        bound_addr,
        congreso::web::routes::misc::build_id()
    );

    axum::serve(listener, app).await?;
    Ok(())
}
