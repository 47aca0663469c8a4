use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::ConnectOptions;

use bronzedraw_api::config::ServerConfig;
use bronzedraw_api::router::build_app_router;
use bronzedraw_api::state::AppState;
use bronzedraw_api::{connection, telemetry};
use bronzedraw_db::store::PgMappingStore;

/// Set by the Lambda execution environment.
const LAMBDA_RUNTIME_API_VAR: &str = "AWS_LAMBDA_RUNTIME_API";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let on_lambda = std::env::var_os(LAMBDA_RUNTIME_API_VAR).is_some();

    // --- Tracing ---
    telemetry::init_tracing(on_lambda);

    // --- Configuration ---
    let config = ServerConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration, refusing to start");
    })?;
    tracing::info!(
        environment = %config.environment,
        db_echo = config.db_echo,
        on_lambda,
        "Loaded server configuration"
    );

    // --- Database ---
    let resolvers = connection::default_resolvers().await?;
    let options = connection::resolve_connect_options(&resolvers)
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "No usable database connection, refusing to start");
        })?;
    let options = if config.db_echo {
        options
    } else {
        options.disable_statement_logging()
    };

    let pool = bronzedraw_db::create_pool(
        options,
        config.db_max_connections,
        Duration::from_secs(config.db_acquire_timeout_secs),
    );
    tracing::info!(
        max_connections = config.db_max_connections,
        acquire_timeout_secs = config.db_acquire_timeout_secs,
        "Database connection pool created"
    );

    if config.run_migrations {
        bronzedraw_db::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
        tracing::info!("Database migrations applied");
    }

    // --- App state ---
    let state = AppState {
        store: Arc::new(PgMappingStore::new(pool)),
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Serve ---
    if on_lambda {
        tracing::info!("Serving through the Lambda runtime");
        return lambda_http::run(app)
            .await
            .map_err(|e| anyhow::anyhow!("Lambda runtime error: {e}"));
    }

    let ip = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(ip, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a container
/// runtime.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
