use anyhow::Context;
use tracing::{error, info};

use blogcraft_api::AppStateInner;
use blogcraft_api::config::Config;
use blogcraft_api::routes::router;
use blogcraft_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
            |_| {
                "blogcraft_server=debug,blogcraft_api=debug,blogcraft_db=debug,tower_http=debug"
                    .into()
            },
        ))
        .init();

    let config = Config::from_env()?;
    info!(environment = ?config.environment, "Configuration loaded");

    // A database we can't open is fatal
    let db = Database::open(&config.db_path)
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;

    info!("CORS configured for origin {:?}", config.frontend_origin);

    let listener = config.bind().await?;
    let app = router(AppStateInner::new(db, config));
    info!("BlogCraft server listening on {}", listener.local_addr()?);

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
                error!("Failed to install SIGTERM handler: {}", e);
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
