use rockfall_watch::{
    build_router,
    config::{validate_production_config, AppConfig, SessionConfig},
    db, services,
    telemetry::{Fleet, Simulator},
    AppState,
};

use std::net::SocketAddr;
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rockfall_watch=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    validate_production_config()?;

    // Database connection
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    // Session store
    let session_store = SqliteStore::new(pool.clone()).with_table_name("sessions")?;
    session_store.migrate().await?;
    let session_layer = SessionConfig::from_env().create_layer(session_store);

    // Telemetry simulator
    let simulator = Simulator::new(Fleet::seed());
    let simulator_task = simulator.spawn(config.simulation_interval);

    let email_service = services::create_email_service(&config.base_url);
    let addr = SocketAddr::from((config.host, config.port));
    let app_state = AppState::new(pool, config, email_service, simulator.clone()).await;

    let app = build_router(app_state, session_layer);

    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(simulator))
        .await?;

    simulator_task.await?;
    tracing::info!("Server stopped");

    Ok(())
}

/// Resolves on Ctrl-C. Stopping the simulator here ends the open live
/// streams so the server can drain.
async fn shutdown_signal(simulator: Simulator) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    simulator.shutdown();
}
