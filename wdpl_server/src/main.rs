//! Authentication server: sign-up, sign-in, refresh and sign-out over HTTP,
//! backed by PostgreSQL.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use pico_args::Arguments;
use tracing::{info, warn};
use wdpl_auth::{auth::AuthManager, db::Database};
use wdpl_server::{
    api,
    config::ServerConfig,
    logging, metrics,
};

const HELP: &str = "\
Run the wdpl authentication server

USAGE:
  wdpl_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or SERVER_HOST:SERVER_PORT]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  DATABASE_URL             PostgreSQL connection string (required)
  JWT_SECRET               JWT signing secret, at least 32 characters (required)
  ACCESS_TOKEN_TTL         Access token lifetime in minutes [default: 15]
  REFRESH_TOKEN_TTL        Refresh session lifetime in minutes [default: 30]
  REFRESH_ROTATION         retain | rotate [default: retain]
  REFRESH_REDERIVE_ROLE    Reload the user's role on refresh [default: false]
  LOG_FORMAT               text | json [default: text]
  METRICS_BIND             Prometheus exporter address (disabled when unset)
  APP_ENV                  production | prod skips loading .env
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    if !ServerConfig::is_production() {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();
    }

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let args = Args {
        bind: pargs
            .opt_value_from_str("--bind")
            .context("Invalid --bind address")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
    };

    let config = ServerConfig::from_env(args.bind, args.database_url)?;

    logging::init(config.log_format);
    config.validate()?;
    info!(
        bind = %config.bind,
        refresh_policy = ?config.security.refresh_policy,
        rederive_role = config.security.rederive_role_on_refresh,
        "Configuration loaded"
    );

    if let Some(addr) = config.metrics_bind {
        match metrics::init_metrics(addr) {
            Ok(()) => info!("Prometheus metrics exposed at http://{}/metrics", addr),
            Err(e) => warn!("{}", e),
        }
    }

    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!("Database connected successfully");

    let auth_manager = AuthManager::with_postgres(&db, Arc::new(config.security.auth_config()?));
    let app = api::create_router(api::AppState::new(auth_manager, Some(db.clone())));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Shutting down server...");
    db.close().await;

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
