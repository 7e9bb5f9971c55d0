//! Wager ledger HTTP server.
//!
//! Builds the ledger on PostgreSQL (or an in-memory store for local runs),
//! starts the operator rollup task and serves the HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Error};
use pico_args::Arguments;
use wager_ledger::{
    Ledger,
    db::{Database, InMemoryLedgerStore, LedgerStore},
    identity::TokenVerifier,
    outcome::PayoutTable,
    session::OperatorAggregator,
};
use wl_server::{
    api::{self, AppState},
    config::ServerConfig,
    logging, metrics,
};

const HELP: &str = "\
Run the wager ledger HTTP server

USAGE:
  wl_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  --in-memory              Keep all state in process memory instead of PostgreSQL
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND                  Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL                 PostgreSQL connection string
  AUTH_JWT_SECRET              Identity provider HS256 secret (required, >= 32 chars)
  AUTH_AUDIENCE                Required token audience [default: authenticated]
  METRICS_BIND                 Prometheus exporter address (disabled when unset)
  BONUS_WAGERING_MULTIPLIER    Playthrough per unit of bonus [default: 30]
  DEPOSIT_WAGERING_MULTIPLIER  Playthrough per unit deposited [default: 0]
  LEDGER_MAX_CONFLICT_RETRIES  Retries after a lost update [default: 3]
  ROLLUP_INTERVAL_SECS         Operator rollup refresh period [default: 60]
  DB_MAX_CONNECTIONS etc.      Pool tuning, see DatabaseConfig::from_env
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        in_memory: pargs.contains("--in-memory"),
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(anyhow::Error::msg)?;
        tracing::info!("Prometheus metrics exposed at http://{}/metrics", addr);
    }

    let (store, database): (Arc<dyn LedgerStore>, Option<Database>) = if args.in_memory {
        tracing::warn!("Using the in-memory store; all state is lost on exit");
        (Arc::new(InMemoryLedgerStore::new()), None)
    } else {
        tracing::info!("Connecting to database");
        let db = Database::connect(&config.database)
            .await
            .context("Failed to connect to database")?;
        (Arc::new(db.ledger_store()), Some(db))
    };

    let ledger = Ledger::new(store.clone(), Arc::new(PayoutTable::slots()), config.ledger);
    let aggregator = OperatorAggregator::new(store);
    let rollups = aggregator.spawn_refresh(Duration::from_secs(config.rollup_interval_secs));

    let verifier = TokenVerifier::new(&config.auth.jwt_secret, config.auth.audience.as_deref());

    let state = AppState {
        ledger,
        aggregator,
        verifier: Arc::new(verifier),
    };
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    tracing::info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutting down server...");
    rollups.abort();
    if let Some(db) = database {
        db.close().await;
    }

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
