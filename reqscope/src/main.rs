//! reqscope - HTTP request analytics recorder
//!
//! Runs the capturing analytics server and offers maintenance commands over the
//! same database.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use reqscope_core::analytics::report_filter;
use reqscope_core::format::{format_bytes, format_millis_opt};
use reqscope_core::{BandwidthStats, Config, Database, EventStore, TrafficSummary};

#[derive(Parser)]
#[command(name = "reqscope")]
#[command(about = "Record HTTP traffic and report on it")]
#[command(version)]
struct Args {
    /// SQLite database file (overrides the configured path)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server with request capture enabled
    Serve {
        /// Address to listen on (overrides the configured bind address)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Delete old capture events
    Cleanup {
        /// Remove events older than this many days (defaults to retention.days)
        #[arg(short, long)]
        days: Option<u32>,

        /// Remove every stored event
        #[arg(long, conflicts_with = "days")]
        all: bool,
    },

    /// Print the traffic summary and bandwidth report
    Summary {
        /// Only include the last N days
        #[arg(short, long)]
        days: Option<i64>,

        /// Only include paths containing this text (case-insensitive)
        #[arg(short, long)]
        path: Option<String>,

        /// Output format: text (default) or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(path) = args.database {
        config.database.path = Some(path);
    }

    // Only the server mirrors logs to stdout; reports own it otherwise
    if !matches!(args.command, Command::Serve { .. }) {
        config.logging.stdout = false;
    }

    // Initialize logging
    let _log_guard =
        reqscope_core::logging::init(&config.logging).context("failed to initialize logging")?;

    // Open database
    let db_path = config.resolved_database_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;
    let store = EventStore::new(db);

    match args.command {
        Command::Serve { bind } => serve(store, config, bind).await,
        Command::Cleanup { days, all } => cleanup(&store, &config, days, all).await,
        Command::Summary { days, path, format } => {
            summary(&store, days, path.as_deref(), &format).await
        }
    }
}

async fn serve(store: EventStore, mut config: Config, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;

    tracing::info!(
        bind = %config.server.bind,
        capture = config.capture.enabled,
        "reqscope server starting up"
    );

    let stats = reqscope_core::server::serve(listener, store, &config)
        .await
        .context("server error")?;

    tracing::info!(
        recorded = stats.recorded,
        failed = stats.failed,
        "reqscope server shutting down"
    );
    Ok(())
}

async fn cleanup(store: &EventStore, config: &Config, days: Option<u32>, all: bool) -> Result<()> {
    if all {
        let deleted = store
            .delete_all()
            .await
            .context("failed to delete events")?;
        println!("Deleted {} analytics records", deleted);
        return Ok(());
    }

    let days = days.unwrap_or(config.retention.days);
    if days == 0 {
        anyhow::bail!("--days must be at least 1");
    }

    let deleted = store
        .cleanup(days)
        .await
        .context("failed to delete old events")?;
    println!("Deleted {} old analytics records", deleted);
    Ok(())
}

async fn summary(
    store: &EventStore,
    days: Option<i64>,
    path: Option<&str>,
    format: &str,
) -> Result<()> {
    let filter = report_filter(None, None, days, path, Utc::now())?;

    let traffic = store
        .summary(filter.clone())
        .await
        .context("failed to compute traffic summary")?;
    let bandwidth = store
        .bandwidth(filter)
        .await
        .context("failed to compute bandwidth statistics")?;

    match format {
        "json" => {
            let report = serde_json::json!({
                "summary": traffic,
                "bandwidth": bandwidth.formatted(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "text" => print_summary(&traffic, &bandwidth),
        other => anyhow::bail!("Unknown format '{}'. Use 'text' or 'json'", other),
    }

    Ok(())
}

fn print_summary(traffic: &TrafficSummary, bandwidth: &BandwidthStats) {
    println!("Traffic Summary");
    println!("===============");
    println!("Total requests:     {}", traffic.total_requests);
    println!(
        "Total bandwidth:    {}",
        format_bytes(traffic.total_bandwidth as f64)
    );
    println!(
        "Avg response time:  {}",
        format_millis_opt(traffic.average_response_time_ms)
    );

    if traffic.total_requests == 0 {
        println!();
        println!("No requests recorded.");
        return;
    }

    println!();
    println!("By method:");
    for (method, count) in &traffic.requests_by_method {
        println!("  {:<8} {:>8}", method, count);
    }

    println!();
    println!("By status:");
    for (status, count) in &traffic.requests_by_status {
        println!("  {:<8} {:>8}", status, count);
    }

    let mut endpoints: Vec<_> = traffic.requests_by_endpoint.iter().collect();
    endpoints.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    println!();
    println!("Top endpoints:");
    for (path, count) in endpoints.into_iter().take(10) {
        println!("  {:>8}  {}", count, path);
    }

    println!();
    println!("Bandwidth");
    println!("---------");
    println!(
        "Requests:   total {:>12}  avg {:>12}  max {:>12}",
        format_bytes(bandwidth.total_request_size as f64),
        format_bytes(bandwidth.avg_request_size),
        format_bytes(bandwidth.max_request_size as f64)
    );
    println!(
        "Responses:  total {:>12}  avg {:>12}  max {:>12}",
        format_bytes(bandwidth.total_response_size as f64),
        format_bytes(bandwidth.avg_response_size),
        format_bytes(bandwidth.max_response_size as f64)
    );
}
