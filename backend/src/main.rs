use std::process::ExitCode;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

mod cache;
mod client;
mod config;
mod db;
mod error;
mod extract;
mod handlers;
mod health;
mod metrics;
mod models;
mod sync;

use crate::cache::MemoryCache;
use crate::client::CatalogClient;
use crate::config::Config;
use crate::health::{HealthMonitor, DEFAULT_UPTIME_WINDOW};
use crate::metrics::MetricsStore;
use crate::models::{ComprehensiveReport, HealthCheckResult, HealthStatus};
use crate::sync::{SyncError, Syncer};

/// Name under which the catalog API is probed and reported.
const API_NAME: &str = "dummyjson";

/// Shared application state — cheap to clone (all heap behind Arc).
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub catalog: CatalogClient,
    pub health: HealthMonitor,
    pub metrics: Arc<RwLock<MetricsStore>>,
    pub sync_page_size: u32,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Product catalog sync & API health service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Pull products from the catalog API into the database
    Sync {
        /// Sync one product by its catalog id instead of the whole catalog
        #[arg(long)]
        id: Option<i64>,
        /// Records per catalog page [default: SYNC_PAGE_SIZE]
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        limit: Option<u32>,
    },
    /// Probe the catalog API and print the result
    CheckHealth {
        /// Probe every catalog endpoint instead of the single product probe
        #[arg(long)]
        comprehensive: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env if present (ignored in production where env vars are injected)
    dotenv::dotenv().ok();

    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,catalog_sync_service=debug")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Sync { id, limit } => run_sync(config, id, limit).await,
        Command::CheckHealth { comprehensive } => run_health_check(config, comprehensive).await,
    }
}

async fn connect(config: &Config) -> anyhow::Result<sqlx::PgPool> {
    info!("Connecting to PostgreSQL...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(config.database_url()?)
        .await?;
    info!("Database connection pool established.");

    info!("Running migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations complete.");

    Ok(pool)
}

fn health_monitor(config: &Config) -> anyhow::Result<HealthMonitor> {
    Ok(HealthMonitor::new(
        API_NAME,
        &config.catalog_base_url,
        config.health_timeout,
        MemoryCache::new(),
    )?)
}

async fn serve(config: Config) -> anyhow::Result<ExitCode> {
    info!("Catalog sync service starting");

    let pool = connect(&config).await?;
    let catalog = CatalogClient::new(&config.catalog_base_url, config.catalog_timeout)?;
    info!(catalog = %catalog.base_url(), "Catalog client ready");

    let state = AppState {
        db: pool,
        catalog,
        health: health_monitor(&config)?,
        metrics: Arc::new(RwLock::new(MetricsStore::new())),
        sync_page_size: config.sync_page_size,
    };

    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Listening on http://{}", addr);
    info!("Quick-start: POST http://{}/api/products/sync  →  then GET http://{}/api/products", addr, addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(ExitCode::SUCCESS)
}

async fn run_sync(config: Config, id: Option<i64>, limit: Option<u32>) -> anyhow::Result<ExitCode> {
    let pool = connect(&config).await?;
    let catalog = CatalogClient::new(&config.catalog_base_url, config.catalog_timeout)?;
    let syncer = Syncer::new(&catalog, &pool);

    if let Some(api_id) = id {
        info!(api_id, "Syncing single product");
        return match syncer.sync_one(api_id).await {
            Ok(product) => {
                println!("{:<10} {}", "ID", product.id);
                println!("{:<10} {}", "API ID", product.api_id);
                println!("{:<10} {}", "Title", product.title);
                println!("{:<10} {}", "Category", product.category.as_deref().unwrap_or("-"));
                println!("{:<10} {}", "Brand", product.brand.as_deref().unwrap_or("-"));
                println!("{:<10} ${:.2}", "Price", product.price);
                println!("{:<10} {}", "Stock", product.stock);
                println!("{:<10} {}", "Rating", product.rating);
                Ok(ExitCode::SUCCESS)
            }
            Err(e @ SyncError::NotFound(_)) => {
                error!("{}", e);
                Ok(ExitCode::FAILURE)
            }
            Err(e) => {
                error!(error = %e, "Error syncing product");
                Ok(ExitCode::FAILURE)
            }
        };
    }

    let report = syncer
        .sync_all(limit.unwrap_or(config.sync_page_size))
        .await;
    println!("{}", report.message());
    if report.failed > 0 {
        println!("{} records skipped", report.failed);
    }

    Ok(if report.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_health_check(config: Config, comprehensive: bool) -> anyhow::Result<ExitCode> {
    let monitor = health_monitor(&config)?;
    info!(api = %monitor.api_name(), "Checking catalog API health...");

    let status = if comprehensive {
        let report = monitor.comprehensive_check().await;
        print_comprehensive(&report);
        report.overall_status
    } else {
        let result = monitor.check_health().await;
        print_result(&result);
        println!();
        println!(
            "API Uptime (last {} checks): {}%",
            DEFAULT_UPTIME_WINDOW,
            monitor.compute_uptime(DEFAULT_UPTIME_WINDOW)
        );
        result.status
    };

    Ok(if status == HealthStatus::Up {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_result(result: &HealthCheckResult) {
    println!("{:<18} {}", "API Name", result.api_name);
    println!("{:<18} {}", "Status", result.status.as_str().to_uppercase());
    println!("{:<18} {}", "HTTP Status Code", result.status_code);
    println!("{:<18} {} ms", "Response Time", result.response_time_ms);
    println!("{:<18} {}", "Checked At", result.checked_at.to_rfc3339());
    println!("{:<18} {}", "Error", result.error.as_deref().unwrap_or("-"));
}

fn print_comprehensive(report: &ComprehensiveReport) {
    println!("Overall Status: {}", report.overall_status.as_str().to_uppercase());
    println!();
    println!(
        "{:<12} {:<10} {:<10} {:<15} {}",
        "Endpoint", "Status", "HTTP Code", "Response Time", "Error"
    );
    for (name, endpoint) in &report.endpoints {
        println!(
            "{:<12} {:<10} {:<10} {:<15} {}",
            name,
            endpoint.status,
            endpoint.status_code,
            format!("{} ms", endpoint.response_time_ms),
            endpoint.error.as_deref().unwrap_or("-"),
        );
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        // ── Health ──────────────────────────────────────────────────────────
        .route("/health", get(handlers::health))

        // ── Products ────────────────────────────────────────────────────────
        .route("/api/products", get(handlers::products::list_products))
        .route(
            "/api/products/categories",
            get(handlers::products::list_categories),
        )
        .route("/api/products/stats", get(handlers::products::product_stats))
        .route("/api/products/:id", get(handlers::products::get_product))

        // ── Catalog sync ────────────────────────────────────────────────────
        .route("/api/products/sync", post(handlers::sync::sync_all))
        .route("/api/products/sync/:api_id", post(handlers::sync::sync_one))

        // ── Catalog API health ──────────────────────────────────────────────
        .route("/api/api-health", get(handlers::api_health::current_health))
        .route("/api/api-health/check", post(handlers::api_health::force_check))
        .route(
            "/api/api-health/comprehensive",
            get(handlers::api_health::comprehensive),
        )
        .route(
            "/api/api-health/history",
            get(handlers::api_health::history).delete(handlers::api_health::clear_history),
        )
        .route("/api/api-health/stats", get(handlers::api_health::stats))

        // ── Operation timings ───────────────────────────────────────────────
        .route(
            "/api/metrics",
            get(handlers::metrics::get_metrics).delete(handlers::metrics::clear_metrics),
        )
        .route("/api/metrics/export/csv", get(handlers::metrics::export_csv))

        // ── Middleware ──────────────────────────────────────────────────────
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
