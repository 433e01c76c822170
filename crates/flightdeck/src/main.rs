//! flightdeck: live telemetry console for SITL vehicle simulators.
//!
//! Listens for newline-delimited JSON telemetry and prints a status block for
//! every valid update.

mod cli;
mod config;
mod logging;
mod signals;

use anyhow::{anyhow, Context, Result};
use cli::CliArgs;
use config::AppConfig;
use std::future::Future;
use std::io;
use std::time::Duration;
use telemetry_server::{create_console_server, TelemetryServer};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

/// How long to wait for the accept loop after a shutdown request.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

struct Application {
    config: AppConfig,
    server: TelemetryServer,
}

impl Application {
    async fn new(args: CliArgs) -> Result<Self> {
        let config_existed = args.config_path.exists();
        let mut config = AppConfig::load_from_file(&args.config_path)
            .await
            .with_context(|| format!("Failed to load {}", args.config_path.display()))?;

        config.apply_cli(&args);
        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {e}"))?;

        logging::setup_logging(&config.logging)?;
        if !config_existed {
            info!(
                "Created default configuration file: {}",
                args.config_path.display()
            );
        }

        let server = create_console_server(config.to_server_config());
        Ok(Self { config, server })
    }

    async fn run(self) -> Result<()> {
        info!(
            host = %self.config.server.host,
            port = self.config.server.port,
            backlog = self.config.server.backlog,
            read_chunk_size = self.config.server.read_chunk_size,
            "Starting flightdeck v{}",
            env!("CARGO_PKG_VERSION")
        );

        let acceptor = self
            .server
            .bind()
            .await
            .context("Failed to start telemetry server")?;
        let accept_loop = tokio::spawn(acceptor.run());
        info!("Press Ctrl+C to stop");

        serve_until(&self.server, accept_loop, signals::wait_for_shutdown_signal()).await?;

        info!(
            active = self.server.state().active_connections(),
            "Server stopped"
        );
        Ok(())
    }
}

/// Waits for `shutdown_signal`, then stops the server and gives the accept
/// loop [`SHUTDOWN_GRACE`] to return.
///
/// An accept loop that ends before the signal is an error: the process would
/// otherwise carry on without a listener.
async fn serve_until<F>(
    server: &TelemetryServer,
    mut accept_loop: JoinHandle<()>,
    shutdown_signal: F,
) -> Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    tokio::select! {
        result = shutdown_signal => {
            result.context("Failed to install signal handlers")?;
        }
        joined = &mut accept_loop => {
            return match joined {
                Ok(()) => Err(anyhow!("Accept loop exited before shutdown was requested")),
                Err(e) => Err(anyhow::Error::new(e).context("Accept loop task failed")),
            };
        }
    }

    server.shutdown();
    match timeout(SHUTDOWN_GRACE, accept_loop).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Accept loop task failed: {}", e),
        Err(_) => warn!("Accept loop did not stop within {:?}", SHUTDOWN_GRACE),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let app = Application::new(args).await?;
    app.run().await
}
