use anyhow::Context;
use campusdesk_api::{
    app_router, config, db, handlers::health, services::reservations::deliver_reminders, AppState,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = config::load_config().context("failed to load configuration")?;

    // Initialize tracing
    config::init_tracing(config.log_level(), config.log_json);
    info!(environment = %config.environment, "Starting CampusDesk API");

    health::init_start_time();

    // Connect to database
    let db_pool = db::establish_connection_from_app_config(&config)
        .await
        .context("failed to connect to database")?;
    info!("Database connection established");

    if config.auto_migrate {
        db::run_migrations(&db_pool)
            .await
            .context("failed to run database migrations")?;
    } else {
        info!("Skipping automatic migrations (auto_migrate = false)");
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid host/port combination")?;

    let (state, reminder_rx) = AppState::new(Arc::new(db_pool), config);

    // Background work: reminders, change-driven invalidation and occupancy polling
    tokio::spawn(deliver_reminders(reminder_rx));
    let _invalidation = state
        .services
        .invalidation_registry()
        .spawn(&state.feed);
    let _occupancy = state.services.occupancy.clone().spawn();

    // Prime the room board so the first list request is warm
    if let Err(err) = state.services.room_status.refresh().fetch().await {
        warn!(error = %err, "Initial room board load failed");
    }

    let app = app_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("CampusDesk API listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
