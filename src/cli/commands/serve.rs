use clap::Args;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::config;
use crate::database::DatabaseManager;
use crate::routes;
use crate::state::AppState;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    #[arg(long, help = "Port to listen on (defaults to API_PORT or 8000)")]
    pub port: Option<u16>,
}

pub async fn handle(args: ServeArgs) -> anyhow::Result<()> {
    let config = config();
    info!("Starting EasyConnect API in {:?} mode", config.environment);
    if crate::is_development!() && std::env::var("JWT_SECRET").is_err() {
        tracing::warn!("JWT_SECRET not set, using the development secret");
    }

    // A lazy pool lets /health answer 503 while the database is down
    let pool = if config.database.run_migrations {
        let pool = DatabaseManager::connect(&config.database).await?;
        DatabaseManager::migrate(&pool).await?;
        pool
    } else {
        DatabaseManager::connect_lazy(&config.database)?
    };

    let app = routes::app(AppState::new(pool));

    let port = args.port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("EasyConnect API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
