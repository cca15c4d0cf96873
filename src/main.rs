use giftstash::config::CONFIG;
use giftstash::db::Database;
use giftstash::router::{StashState, stash_router};
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &*CONFIG;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        app_url = %cfg.basic.app_url,
        utc_offset_minutes = cfg.basic.utc_offset_minutes,
        loglevel = %cfg.basic.loglevel,
        "starting giftstash"
    );
    for (service, ready) in [
        ("anthropic", cfg.anthropic.is_configured()),
        ("twilio", cfg.twilio.is_configured()),
        ("weather", !cfg.weather.api_key.is_empty()),
    ] {
        if !ready {
            warn!(service, "integration not configured");
        }
    }
    if cfg.basic.cron_secret.is_empty() {
        warn!("cron secret empty; /api/cron/* will reject every call");
    }

    let db = Database::connect(&cfg.basic.database_url).await?;
    let state = StashState::new(cfg.clone(), db)?;
    let app = stash_router(state);

    let listener = TcpListener::bind(&cfg.basic.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.basic.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
