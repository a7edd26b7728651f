//! # Votifier Binary Entry Point
//!
//! Sends test votes to a Votifier (v1) server.
//!
//! ## Usage
//!
//! ```bash
//! votifier --target play.example.com:8192 --key public.key --username Steve
//! ```
//!
//! Repeated votes with a report:
//! ```bash
//! votifier --config votifier.toml --count 5 --delay 2s \
//!   --metrics-output ./metrics/session.json
//! ```
//!
//! The binary will:
//! 1. Load configuration from the TOML file, if one is given
//! 2. Apply command-line overrides and validate the result
//! 3. Load the server's public key
//! 4. Send each vote on its own connection
//! 5. Export metrics to JSON (if metrics-output specified)
//! 6. Exit non-zero if any vote failed

use anyhow::{bail, Context};
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;
use std::sync::{Arc, Mutex};

use votifier_sender::client::{ClientCore, ClientMetrics, ClientMiddleware};
use votifier_sender::common::config::VoteConfig;
use votifier_sender::common::crypto::load_public_key;

/// Command-line arguments; each one overrides the matching config file value.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// The public key file location (base64, from the Votifier plugin folder)
    #[arg(long)]
    key: Option<String>,

    /// The target (host:port) to send the vote to
    #[arg(short, long)]
    target: Option<String>,

    /// The username of the player who voted
    #[arg(short, long)]
    username: Option<String>,

    /// The name of the website sending the vote
    #[arg(long)]
    site: Option<String>,

    /// The address of the person making the vote
    #[arg(long)]
    address: Option<String>,

    /// The number of votes to send
    #[arg(long)]
    count: Option<u32>,

    /// Time between votes in succession (e.g. 1s, 500ms)
    #[arg(long)]
    delay: Option<String>,

    /// Seconds allowed for one connect-and-send exchange
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Path to write metrics JSON output (optional)
    #[arg(long)]
    metrics_output: Option<String>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

/// Initialize the logging system with timestamp, level, and message formatting.
///
/// Format: `[HH:MM:SS] [LEVEL] message`
fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let mut config = match &args.config {
        Some(path) => VoteConfig::from_file(path)?,
        None => VoteConfig::default(),
    };

    if let Some(target) = args.target {
        config.target.address = target;
    }
    if let Some(key) = args.key {
        config.target.key_file = key;
    }
    if let Some(username) = args.username {
        config.vote.username = username;
    }
    if let Some(site) = args.site {
        config.vote.service_name = site;
    }
    if let Some(address) = args.address {
        config.vote.voter_address = address;
    }
    if let Some(count) = args.count {
        config.session.count = count;
    }
    if let Some(delay) = args.delay {
        config.session.delay = delay;
    }
    if let Some(timeout_secs) = args.timeout_secs {
        config.session.timeout_secs = timeout_secs;
    }

    let settings = config.validate()?;
    let key = load_public_key(&settings.key_file)
        .context("expecting the public.key file from your Votifier plugin folder")?;

    let target = settings.target.to_string();
    let total = settings.count;
    let core = Arc::new(ClientCore::new(key));
    let mut middleware = ClientMiddleware::new(settings, core);

    let metrics = if args.metrics_output.is_some() {
        let m = Arc::new(Mutex::new(ClientMetrics::new(target)));
        middleware = middleware.with_metrics(m.clone());
        Some(m)
    } else {
        None
    };

    let summary = middleware.run().await;

    if let (Some(metrics), Some(output_path)) = (metrics, args.metrics_output) {
        let metrics = metrics
            .lock()
            .map_err(|_| anyhow::anyhow!("metrics lock poisoned"))?;
        metrics
            .export_to_json(&output_path)
            .with_context(|| format!("writing metrics to {}", output_path))?;
        println!("Metrics exported to: {}", output_path);
    }

    if !summary.all_sent() {
        bail!("{} of {} votes failed", summary.failed, total);
    }

    Ok(())
}
