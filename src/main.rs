use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use subgate::config::Config;
use subgate::db::{create_pool, init_db, queries, AppState};
use subgate::gateway::GatewayClient;
use subgate::handlers;
use subgate::models::Package;
use subgate::notify::LogNotifier;
use subgate::sweeper::Sweeper;

#[derive(Parser, Debug)]
#[command(name = "subgate")]
#[command(about = "Subscription payment reconciliation service")]
struct Cli {
    /// Seed the database with dev data (users and the package catalog)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seed");

    let count = queries::count_users(&conn).expect("Failed to count users");
    if count > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("Seeding dev data");

    for (code, name, price, duration_days) in [
        ("basic", "Basic (1 month)", 100_000, 30),
        ("standard", "Standard (3 months)", 270_000, 90),
        ("premium", "Premium (6 months)", 500_000, 180),
    ] {
        queries::upsert_package(
            &conn,
            &Package {
                code: code.to_string(),
                name: name.to_string(),
                price,
                duration_days,
            },
        )
        .expect("Failed to seed package");
        tracing::info!("Package: {} ({})", name, code);
    }

    let user = queries::create_user(&conn, "dev@subgate.local", Some("+620000000000"))
        .expect("Failed to seed user");
    tracing::info!("User: {} (id: {})", user.email, user.id);
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "subgate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.gateway_server_key.is_empty() {
        tracing::warn!("GATEWAY_SERVER_KEY is empty - all inbound notifications will be rejected");
    }

    // Create database connection pool and initialize the schema
    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let gateway = GatewayClient::new(&config).expect("Failed to build gateway client");

    let state = AppState {
        db: db_pool,
        gateway: Arc::new(gateway),
        notifier: Arc::new(LogNotifier),
        server_key: config.gateway_server_key.clone(),
    };

    // Seed dev data if --seed flag is passed (only in dev mode)
    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set SUBGATE_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    // Start the expiry sweeper with its own lifecycle
    let sweeper = Sweeper::new(
        state.db.clone(),
        Duration::from_secs(config.sweep_interval_secs),
    );
    let sweeper_handle = sweeper.start();

    // Build the application router
    let app = Router::new()
        .merge(handlers::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();
    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Subgate server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    // Stop the sweeper before touching the database file
    sweeper_handle.shutdown().await;

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        }
    }
}
