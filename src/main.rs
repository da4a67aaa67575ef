mod cli;
mod config;
mod error;
mod gateway;
mod orchestrator;
mod printer;
mod state_machine;
mod ui;

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Command};
use config::ControllerConfig;
use error::ControllerError;
use gateway::GatewayClient;
use orchestrator::{JobOrchestrator, OrchestratorSettings};
use printer::{BambuPrinter, FtpsClient, FtpsOptions, PrinterStatus, StatusChannel, StatusChannelConfig};

// Time given to the MQTT event loop to flush a one-off command.
const COMMAND_FLUSH: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ControllerConfig::load(cli.config.as_deref())?;
    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    match cli.selected_command() {
        Command::Run => run(&config, shutdown, cli.progress).await,
        Command::Status => show_status(&config, &shutdown).await,
        Command::Upload { path, name } => upload(&config, &path, name).await,
        Command::Stop => stop(&config, &shutdown).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "printbridge=debug"
    } else {
        "printbridge=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

async fn run(config: &ControllerConfig, shutdown: CancellationToken, progress: bool) -> Result<()> {
    config.validate()?;
    tokio::fs::create_dir_all(&config.download_dir)
        .await
        .with_context(|| format!("failed to create {}", config.download_dir.display()))?;

    let gateway = GatewayClient::new(&config.api_url, config.api_key.clone())
        .map_err(ControllerError::from)?;
    let printer = BambuPrinter::new(config);
    printer.channel().connect(&shutdown).await?;

    let status_rx = printer.channel().subscribe();
    let mut orchestrator = JobOrchestrator::new(
        gateway,
        printer,
        OrchestratorSettings::from_config(config),
        shutdown.clone(),
    );

    let dashboard = if progress {
        let (tx, rx) = mpsc::channel(8);
        orchestrator = orchestrator.with_record_sink(tx);
        Some(tokio::spawn(ui::run_dashboard(status_rx, rx, shutdown.clone())))
    } else {
        None
    };

    let result = orchestrator.run().await;
    orchestrator.printer().channel().disconnect();

    shutdown.cancel();
    if let Some(handle) = dashboard {
        let _ = handle.await;
    }
    result.map_err(Into::into)
}

async fn connect_printer(
    config: &ControllerConfig,
    shutdown: &CancellationToken,
) -> Result<StatusChannel> {
    config.validate_printer()?;
    let channel = StatusChannel::new(StatusChannelConfig::from_config(config));
    channel.connect(shutdown).await?;
    Ok(channel)
}

async fn show_status(config: &ControllerConfig, shutdown: &CancellationToken) -> Result<()> {
    let channel = connect_printer(config, shutdown).await?;
    let received = first_status(&channel, config.connect_timeout()).await.is_some();
    channel.disconnect();

    if !received {
        bail!(
            "no status report within {}s",
            config.connect_timeout().as_secs()
        );
    }
    ui::print_status(channel.snapshot());
    Ok(())
}

async fn first_status(channel: &StatusChannel, limit: Duration) -> Option<PrinterStatus> {
    let mut rx = channel.subscribe();
    let wait = async {
        loop {
            if let Some(status) = rx.borrow_and_update().clone() {
                return Some(status);
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    };
    tokio::time::timeout(limit, wait).await.ok().flatten()
}

async fn upload(config: &ControllerConfig, path: &Path, name: Option<String>) -> Result<()> {
    config.validate_printer()?;
    let remote = match name {
        Some(name) => name,
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", path.display()))?,
    };

    let client = FtpsClient::new(FtpsOptions::from_config(config));
    let bytes = client
        .try_upload(path, &remote)
        .await
        .map_err(ControllerError::from)
        .with_context(|| format!("upload of {} failed", path.display()))?;
    tracing::info!(bytes, "upload complete");
    println!("uploaded {} as {remote}", path.display());
    Ok(())
}

async fn stop(config: &ControllerConfig, shutdown: &CancellationToken) -> Result<()> {
    let channel = connect_printer(config, shutdown).await?;
    let sent = channel.stop_print();
    tokio::time::sleep(COMMAND_FLUSH).await;
    channel.disconnect();
    sent?;
    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
    token.cancel();
}
