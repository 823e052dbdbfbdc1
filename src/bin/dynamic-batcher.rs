//! Command-line entry point
//!
//! ```bash
//! # Run a batch engine with a built-in handler
//! dynamic-batcher serve add-one --batch-size 64 --batch-time 2
//!
//! # Submit one payload and print its result
//! dynamic-batcher send '{"nested": {"values": [1, 2, 3]}}'
//!
//! # Print the effective configuration, credentials redacted
//! dynamic-batcher info
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::{error, info};

use dynamic_batcher::handler::builtin;
use dynamic_batcher::logging::{init_tracing, LogFormat};
use dynamic_batcher::{BatchProcessor, BatcherConfig, DynamicBatcher, StreamProvider};

#[derive(Parser)]
#[command(name = "dynamic-batcher")]
#[command(about = "Dynamic batching over Redis streams")]
#[command(version)]
struct Cli {
    /// TOML configuration file, applied beneath environment variables
    #[arg(short, long, global = true, env = "DYNAMIC_BATCHER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter directive (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch engine until interrupted
    Serve(ServeArgs),
    /// Submit one JSON payload and print its result
    Send(SendArgs),
    /// Print the effective configuration
    Info,
}

#[derive(Args)]
struct ServeArgs {
    /// Built-in handler to run (echo, add-one, set-name)
    handler: String,

    /// Maximum number of requests per batch
    #[arg(short = 'b', long)]
    batch_size: Option<usize>,

    /// Seconds to wait for a batch to fill
    #[arg(short = 't', long)]
    batch_time: Option<f64>,

    /// Seconds a result stays readable
    #[arg(long)]
    response_ttl: Option<u64>,

    /// Seconds to sleep between claim attempts while collecting
    #[arg(long)]
    collect_delay: Option<f64>,

    /// Reclaim requests another engine left pending for this many seconds
    #[arg(long)]
    reclaim_idle: Option<f64>,

    /// Consumer name of this engine within the processor group
    #[arg(long)]
    consumer: Option<String>,
}

#[derive(Args)]
struct SendArgs {
    /// JSON payload
    payload: String,

    /// Seconds between polls
    #[arg(long)]
    delay: Option<f64>,

    /// Seconds to wait in each phase
    #[arg(long)]
    timeout: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_tracing(cli.log_level.as_deref(), format);

    let config = BatcherConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve(args) => serve(config, args).await,
        Commands::Send(args) => send(config, args).await,
        Commands::Info => {
            println!("{}", serde_json::to_string_pretty(&config.info())?);
            Ok(())
        }
    }
}

fn seconds(value: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("invalid number of seconds: {value}"))
}

async fn serve(config: BatcherConfig, args: ServeArgs) -> anyhow::Result<()> {
    let mut settings = config.dynamic_batcher.processor();
    if let Some(batch_size) = args.batch_size {
        settings = settings.with_batch_size(batch_size);
    }
    if let Some(batch_time) = args.batch_time {
        settings = settings.with_batch_time(seconds(batch_time)?);
    }
    if let Some(ttl) = args.response_ttl {
        settings = settings.with_response_ttl(Duration::from_secs(ttl));
    }
    if let Some(delay) = args.collect_delay {
        settings = settings.with_collect_delay(seconds(delay)?);
    }
    if let Some(idle) = args.reclaim_idle {
        settings = settings.with_reclaim_idle(seconds(idle)?);
    }
    let broker = match args.consumer {
        Some(consumer) => config.redis.with_consumer(consumer),
        None => config.redis,
    };

    let registry = builtin::registry();
    let handler = registry.get(&args.handler).ok_or_else(|| {
        anyhow!(
            "unknown handler `{}`, expected one of: {}",
            args.handler,
            registry.registered_handlers().join(", ")
        )
    })?;

    let provider = Arc::new(
        StreamProvider::redis(&broker)
            .await
            .with_context(|| format!("connecting to {}", broker.redacted_url()))?,
    );
    let processor = BatchProcessor::new(provider, &broker, settings).await?;

    info!(
        handler = handler.name(),
        consumer = processor.consumer(),
        retention_len = processor.config().retention_len(),
        "Serving until Ctrl-C"
    );
    processor
        .start_daemon_until(handler.as_ref(), shutdown_signal())
        .await;
    Ok(())
}

async fn send(config: BatcherConfig, args: SendArgs) -> anyhow::Result<()> {
    let payload: Value =
        serde_json::from_str(&args.payload).context("payload is not valid JSON")?;

    let mut settings = config.dynamic_batcher.dispatcher();
    if let Some(delay) = args.delay {
        settings = settings.with_delay(seconds(delay)?);
    }
    if let Some(timeout) = args.timeout {
        settings = settings.with_timeout(seconds(timeout)?);
    }

    let provider = Arc::new(
        StreamProvider::redis(&config.redis)
            .await
            .with_context(|| format!("connecting to {}", config.redis.redacted_url()))?,
    );
    let batcher = DynamicBatcher::new(provider, &config.redis, settings).await?;

    let result: Value = batcher.try_send(&payload).await.with_context(|| {
        format!(
            "no result (waited up to {:.1}s per phase)",
            batcher.config().timeout.as_secs_f64()
        )
    })?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Unable to listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}
