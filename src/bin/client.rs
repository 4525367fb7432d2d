//! # noeq Binary Entry Point
//!
//! Thin command-line wrapper around [`IdClient`]: fetches ids from a pool of
//! servers and prints them.
//!
//! ## Usage
//!
//! ```bash
//! noeq --servers 10.0.0.1:4444,10.0.0.2 --count 10
//! noeq --config config/client.toml --count 100 --batches 50 \
//!   --metrics-output ./metrics/noeq.json
//! ```
//!
//! Each batch is one request. A failed batch is logged and counted; the
//! next batch reconnects, possibly to a different server.

use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Builder;
use log::{error, info, LevelFilter};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use noeq_client::common::config::{ClientConfig, ClientSection};
use noeq_client::{ClientMetrics, IdClient};

/// Command-line arguments for the noeq binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a client configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma-separated host[:port] list, overrides the config file
    #[arg(short, long)]
    servers: Option<String>,

    /// Authentication token, overrides the config file
    #[arg(short, long)]
    token: Option<String>,

    /// Per-attempt connect timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Bound on each request/response exchange in milliseconds
    #[arg(long)]
    request_timeout_ms: Option<u64>,

    /// Ids per request (1-255)
    #[arg(short = 'n', long, default_value_t = 1)]
    count: i32,

    /// Number of requests to send
    #[arg(short, long, default_value_t = 1)]
    batches: u32,

    /// Print ids as a JSON array instead of one per line
    #[arg(long)]
    json: bool,

    /// Path to write metrics JSON output (optional)
    #[arg(long)]
    metrics_output: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Initialize the logging system with timestamp, level, and message formatting.
///
/// Logs go to stderr so stdout carries only ids.
/// Format: `[HH:MM:SS] [LEVEL] message`
fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(level)
        .init();
}

/// Merge the config file (if any) with command-line overrides.
fn build_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig {
            client: ClientSection::default(),
        },
    };

    if let Some(servers) = &args.servers {
        config.client.servers = servers.split(',').map(str::to_string).collect();
    }
    if let Some(token) = &args.token {
        config.client.token = Some(token.clone());
    }
    if let Some(timeout) = args.timeout_ms {
        config.client.connect_timeout_ms = timeout;
    }
    if let Some(timeout) = args.request_timeout_ms {
        config.client.request_timeout_ms = Some(timeout);
    }

    if config.client.servers.is_empty() {
        bail!("No servers configured: pass --servers or a --config file with [client].servers");
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let config = build_config(&args)?;
    let client = IdClient::from_config(&config).context("Failed to create id client")?;

    for rejected in client.pool().rejected() {
        info!("Skipped server '{}': {}", rejected.token, rejected.reason);
    }

    let mut metrics = ClientMetrics::new("noeq");
    let mut ids = Vec::new();
    let mut failures = 0u32;

    for batch in 1..=args.batches {
        let started = Instant::now();
        match client.get_ids(args.count).await {
            Ok(batch_ids) => {
                let server = client.connected_server().await.map(|s| s.to_string());
                metrics.record_success(started.elapsed(), batch_ids.len(), server);
                ids.extend(batch_ids);
            }
            Err(e) => {
                error!("Batch {}/{} failed: {}", batch, args.batches, e);
                metrics.record_failure(started.elapsed(), args.count.max(1) as usize, e.category());
                failures += 1;
                if !e.is_transient() {
                    break;
                }
            }
        }
    }

    if let Err(e) = client.disconnect().await {
        error!("Failed to close connection: {}", e);
    }

    if args.json {
        println!("{}", serde_json::to_string(&ids)?);
    } else {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for id in &ids {
            writeln!(out, "{}", id)?;
        }
    }

    if let Some(path) = &args.metrics_output {
        metrics
            .export_to_json(path)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        info!("Metrics exported to: {}", path.display());
    }

    if ids.is_empty() && failures > 0 {
        bail!("All {} request(s) failed", failures);
    }

    Ok(())
}
