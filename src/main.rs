//! Storage liveness probe service entry point.

use std::net::SocketAddr;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use resource_probes::api::{create_router, AppState};
use resource_probes::config::Config;
use resource_probes::metrics;
use resource_probes::probe::{registry, ProbeExecutor, ProbeName};
use resource_probes::storage::StorageHandles;
use resource_probes::utils::shutdown_signal;

/// Liveness probes for document, blob, queue and table storage.
#[derive(Parser, Debug)]
#[command(name = "resource-probes")]
#[command(about = "HTTP smoke-test endpoints for cloud storage primitives")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true, env = "VERBOSE")]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "LOG_JSON")]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP server port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the probe endpoints (default).
    Serve {
        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Run one probe against the configured backend and print the outcome.
    Probe {
        /// Probe name, e.g. StorageQueueTestGet.
        name: ProbeName,

        /// Key for keyed probes (blob id).
        #[arg(long)]
        key: Option<String>,
    },

    /// List registered probe routes.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("resource_probes=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let fmt_layer = if args.json_logs {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .init();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::Probe { name, key }) => cmd_probe(name, key).await,
        Some(Command::List) => cmd_list(),
        Some(Command::Serve { port }) => cmd_serve(port.or(args.port)).await,
        None => cmd_serve(args.port).await,
    }
}

fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    Ok(config)
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<ExitCode> {
    println!("======================================================================");
    println!("RESOURCE PROBES - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    print!("Validating configuration... ");
    if let Err(e) = config.validate() {
        println!("FAILED");
        println!("  Error: {}", e);
        return Ok(ExitCode::FAILURE);
    }
    println!("OK");

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Port: {}", config.port);
    println!("  Storage Backend: {}", config.storage_backend);
    let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    println!("  Blob Service: {}", show(&config.blob_service_url));
    println!("  Queue Service: {}", show(&config.queue_service_url));
    println!("  Table Service: {}", show(&config.table_service_url));
    println!(
        "  SAS Token: {}",
        if config.storage_sas_token.is_some() { "present" } else { "absent" }
    );
    println!("  Cosmos DB: {}", show(&config.cosmosdb_uri));
    println!(
        "  Collection: {}/{}",
        show(&config.cosmosdb_name),
        config.cosmosdb_collection
    );
    println!("  HTTP Timeout: {}ms", config.http_timeout_ms);
    println!("  Log Filter: {} (verbose: {})", config.rust_log, config.verbose);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(ExitCode::SUCCESS)
}

/// Run one probe and print its outcome.
async fn cmd_probe(name: ProbeName, key: Option<String>) -> anyhow::Result<ExitCode> {
    let config = load_config()?;
    let executor = ProbeExecutor::new(StorageHandles::from_config(&config)?);

    let outcome = executor.run(name, key).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// List registered probe routes.
fn cmd_list() -> anyhow::Result<ExitCode> {
    for descriptor in registry() {
        println!(
            "{:<24} GET {:<40} {} {} (key: {})",
            descriptor.name.to_string(),
            descriptor.path,
            descriptor.target,
            descriptor.kind,
            descriptor.key_mode
        );
    }
    Ok(ExitCode::SUCCESS)
}

/// Serve the probe endpoints until a shutdown signal arrives.
async fn cmd_serve(port_override: Option<u16>) -> anyhow::Result<ExitCode> {
    info!("Loading configuration...");
    let mut config = load_config()?;
    if let Some(port) = port_override {
        config.port = port;
    }
    info!("Storage backend: {}", config.storage_backend);

    let mut app_state = AppState::new(ProbeExecutor::new(StorageHandles::from_config(&config)?));
    match metrics::install_prometheus() {
        Ok(handle) => app_state = app_state.with_metrics(handle),
        Err(e) => warn!("Prometheus recorder not installed: {}", e),
    }
    metrics::init_metrics();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    for descriptor in registry() {
        info!("  {} -> GET {}", descriptor.name, descriptor.path);
    }

    axum::serve(listener, create_router(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(ExitCode::SUCCESS)
}
