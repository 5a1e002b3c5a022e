// ABOUTME: Entry point for the dockhand CLI application.
// ABOUTME: Loads configuration, connects to the local engine, and drives the control surface.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use dockhand::config::Config;
use dockhand::control::{ControlError, ControlSurface, UpOutcome};
use dockhand::error::{Error, Result};
use dockhand::output::Output;
use dockhand::pipeline::{ContainerStatus, Pipeline, WebhookOutcome};
use dockhand::runtime::{BollardRuntime, connect_local};
use dockhand::webhook;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut output = Output::new(cli.output_mode());
    output.start_timer();

    if let Err(e) = run(cli, &output).await {
        output.error(&e.to_string());
        std::process::exit(if e.is_setup() { 2 } else { 1 });
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let config_path = cli.config;

    match cli.command {
        Commands::Up => {
            let control = open(config_path.as_deref()).await?;
            let pipeline = control.pipeline()?;
            output.progress(&format!("==> Deploying {}", pipeline.settings().project));
            let log = pipeline.log().subscribe();
            if let UpOutcome::Up(containers) = follow(log, output, control.up(true)).await? {
                report_up(output, &containers);
            }
        }
        Commands::Down => {
            let control = open(config_path.as_deref()).await?;
            let report = control.down().await?;
            output.result(&format!("Stopped {}", report.stopped.join(", ")), &report);
        }
        Commands::Status => {
            let control = open(config_path.as_deref()).await?;
            output.status(&control.status().await?);
        }
        Commands::Reset => {
            let control = open(config_path.as_deref()).await?;
            let report = control.reset().await?;
            for warning in report.diagnostics.warnings() {
                output.progress(&format!("warning: {}", warning.message));
            }
            output.result("Reset complete", &report);
        }
        Commands::Webhook { headers, payload } => {
            let body = tokio::fs::read(&payload).await?;
            let headers = headers
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str()));

            // A delivery we cannot use is answered, not failed, and needs no engine.
            let event = match webhook::parse(headers, &body) {
                Ok(event) => event,
                Err(e) => {
                    output.rejected(&format!("rejected: {}", e));
                    return Ok(());
                }
            };

            let control = open(config_path.as_deref()).await?;
            let log = control.pipeline()?.log().subscribe();
            match control.push(&event)? {
                WebhookOutcome::Started(handle) => {
                    output.progress("==> Push accepted, deploying");
                    let running = follow(log, output, handle.wait())
                        .await
                        .map_err(ControlError::from)?;
                    let containers: Vec<_> = running.iter().map(ContainerStatus::from).collect();
                    report_up(output, &containers);
                }
                outcome => output.success(&outcome.summary()),
            }
        }
    }
    Ok(())
}

/// Load configuration and connect to the local engine.
async fn open(config_path: Option<&Path>) -> Result<ControlSurface<BollardRuntime>> {
    let config = load_config(config_path)?;
    connect(&config).await
}

/// Read the config file if there is one, then apply `DOCKHAND_*` overrides.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path)?,
        None => {
            let cwd = std::env::current_dir()?;
            match Config::discover(&cwd) {
                Ok(config) => config,
                Err(Error::ConfigNotFound(_)) => Config::default(),
                Err(e) => return Err(e),
            }
        }
    };
    config.apply_env_overrides();
    Ok(config)
}

/// Validate before touching the engine so setup problems surface first.
async fn connect(config: &Config) -> Result<ControlSurface<BollardRuntime>> {
    let settings = config
        .validate()
        .map_err(|e| ControlError::Setup(e.to_string()))?;
    let runtime = connect_local(settings.runtime.as_ref()).await?;
    Ok(ControlSurface::from_pipeline(Pipeline::new(
        Arc::new(runtime),
        Arc::new(settings),
    )))
}

/// Print build output until `fut` completes.
async fn follow<F: Future>(
    mut log: broadcast::Receiver<String>,
    output: &Output,
    fut: F,
) -> F::Output {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            result = &mut fut => {
                while let Ok(line) = log.try_recv() {
                    output.build_line(&line);
                }
                return result;
            }
            line = log.recv() => match line {
                Ok(line) => output.build_line(&line),
                Err(RecvError::Lagged(skipped)) => {
                    output.build_line(&format!("[{} lines skipped]", skipped));
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    fut.await
}

fn report_up(output: &Output, containers: &[ContainerStatus]) {
    let names: Vec<_> = containers.iter().map(|c| c.name.as_str()).collect();
    output.result(&format!("Up: {}", names.join(", ")), &containers);
}
