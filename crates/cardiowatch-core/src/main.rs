//! CardioWatch CLI
//!
//! Command-line interface for the CardioWatch alerting service.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cardiowatch::alerting::{alert_message, evaluate, gateway_from_config, FanOutDispatcher};
use cardiowatch::api::{start_heartbeat, AppState, HttpServer};
use cardiowatch::db::{AlertStore, MemoryStore, PgAlertStore, PostgresPool, SubjectDirectory};
use cardiowatch::ingest::IngestPipeline;
use cardiowatch::live::ConnectionRegistry;
use cardiowatch::models::{AlertSettings, Subject, NORMAL_RHYTHM};
use cardiowatch::Config;

/// CardioWatch - Heart-rate alerting for remote monitoring
#[derive(Parser)]
#[command(name = "cardiowatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "CARDIOWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API and live channel
    Serve {
        /// HTTP API port (overrides server.port)
        #[arg(long, env = "CARDIOWATCH_HTTP_PORT")]
        port: Option<u16>,

        /// Use the in-memory store instead of PostgreSQL
        #[arg(long)]
        in_memory: bool,

        /// JSON file of subjects to seed the in-memory store with
        #[arg(long, requires = "in_memory")]
        subjects: Option<PathBuf>,
    },

    /// Classify a single reading without storing it
    Evaluate {
        /// Heart rate in BPM
        #[arg(long)]
        heart_rate: i32,

        /// Rhythm classification
        #[arg(long, default_value = NORMAL_RHYTHM)]
        rhythm: String,

        /// Personalized high threshold
        #[arg(long)]
        high: Option<i32>,

        /// Personalized low threshold
        #[arg(long)]
        low: Option<i32>,
    },

    /// Database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    let result = match cli.command {
        Commands::Serve {
            port,
            in_memory,
            subjects,
        } => run_serve(config, port, in_memory, subjects.as_deref()).await,
        Commands::Evaluate {
            heart_rate,
            rhythm,
            high,
            low,
        } => run_evaluate(heart_rate, &rhythm, high, low),
        Commands::Db { command } => run_db(config, command).await,
        Commands::Config => run_config(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run_serve(
    mut config: Config,
    port: Option<u16>,
    in_memory: bool,
    subjects: Option<&Path>,
) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }

    if config.metrics.enabled {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.metrics.listen_port))
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(port = config.metrics.listen_port, "Metrics exporter listening");
    }

    let (store, directory): (Arc<dyn AlertStore>, Arc<dyn SubjectDirectory>) = if in_memory {
        let store = Arc::new(MemoryStore::with_subjects(load_subjects(subjects)?));
        warn!("Using in-memory store; data is lost on exit");
        (store.clone() as Arc<dyn AlertStore>, store as Arc<dyn SubjectDirectory>)
    } else {
        let pool = PostgresPool::new(&config.database)
            .await
            .context("failed to connect to PostgreSQL")?;
        pool.migrate().await.context("failed to run migrations")?;
        let store = Arc::new(PgAlertStore::new(&pool));
        (store.clone() as Arc<dyn AlertStore>, store as Arc<dyn SubjectDirectory>)
    };

    let registry = Arc::new(ConnectionRegistry::new());
    let gateway = gateway_from_config(&config.gateway)?;
    let dispatcher = FanOutDispatcher::new(Arc::clone(&registry), gateway);
    let pipeline = IngestPipeline::new(Arc::clone(&store), Arc::clone(&directory), dispatcher);

    let heartbeat = start_heartbeat(Arc::clone(&registry), config.live.heartbeat_interval);

    let state = AppState {
        pipeline,
        store,
        directory,
        registry,
        limits: config.store.clone(),
        session_buffer: config.live.session_buffer,
    };

    let addr = config.server.bind_addr();
    info!(addr = %addr, in_memory, "Starting CardioWatch");

    HttpServer::new(state)
        .serve(&addr, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down...");
        })
        .await?;

    heartbeat.abort();
    Ok(())
}

fn load_subjects(path: Option<&Path>) -> anyhow::Result<Vec<Subject>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let subjects: Vec<Subject> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse subjects from {}", path.display()))?;

    info!(count = subjects.len(), "Seeded subjects");
    Ok(subjects)
}

fn run_evaluate(
    heart_rate: i32,
    rhythm: &str,
    high: Option<i32>,
    low: Option<i32>,
) -> anyhow::Result<()> {
    let mut settings = AlertSettings::defaults_for(uuid::Uuid::nil());
    if let Some(high) = high {
        settings.high_heart_rate_threshold = high;
    }
    if let Some(low) = low {
        settings.low_heart_rate_threshold = low;
    }

    match evaluate(heart_rate, rhythm, Some(&settings)).alert() {
        None => println!("normal: {heart_rate} BPM, rhythm {rhythm}"),
        Some((alert_type, severity)) => {
            println!("{alert_type} ({severity})");
            println!("{}", alert_message(alert_type, heart_rate, rhythm));
        }
    }
    Ok(())
}

async fn run_db(config: Config, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Migrate => {
            let pool = PostgresPool::new(&config.database)
                .await
                .context("failed to connect to PostgreSQL")?;
            pool.migrate().await?;
            pool.health_check().await?;
            println!("Migrations applied");
        }
    }
    Ok(())
}

fn run_config(config: &Config) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
