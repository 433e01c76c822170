//! SITL telemetry producer.
//!
//! Streams a synthetic flight dashboard to a flightdeck server once per
//! interval until interrupted.

mod link;
mod telemetry;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use link::{connect_with_retry, RetryPolicy};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flight-sim-client")]
#[command(about = "Simulated SITL vehicle streaming telemetry to flightdeck")]
struct Args {
    /// Server host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = 5760)]
    port: u16,

    /// Connection attempts before giving up
    #[arg(short, long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    retries: u32,

    /// Seconds between connection attempts
    #[arg(long, default_value_t = 2)]
    retry_delay: u64,

    /// Seconds between telemetry updates
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,
}

impl Args {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retries,
            delay: Duration::from_secs(self.retry_delay),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    tokio::select! {
        result = stream_telemetry(&args) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Stopping simulator");
            Ok(())
        }
    }
}

async fn stream_telemetry(args: &Args) -> Result<()> {
    let policy = args.retry_policy();
    let started = Local::now();
    let mut stream = connect_with_retry(&args.host, args.port, &policy).await?;

    let mut ticker = interval(Duration::from_secs(args.interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sent: u64 = 0;

    loop {
        ticker.tick().await;
        let line = telemetry::encode_line(&telemetry::sample_payload(started));

        if let Err(e) = stream.write_all(line.as_bytes()).await {
            warn!(sent, "Error sending telemetry: {}", e);
            info!("Attempting to reconnect...");
            stream = connect_with_retry(&args.host, args.port, &policy).await?;
            continue;
        }

        sent += 1;
        debug!(sent, bytes = line.len(), "Telemetry sent");
    }
}
