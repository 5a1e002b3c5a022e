// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use dockhand::output::OutputMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dockhand")]
#[command(about = "Push-to-deploy for a single project on a Docker or Podman host")]
#[command(version)]
pub struct Cli {
    /// Config file (default: ./dockhand.yml, then DOCKHAND_* variables)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub json: bool,

    /// Print only the final result
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the project and start it, streaming build output
    Up,

    /// Stop the project's containers
    Down,

    /// Show running project containers.
    ///
    /// Pipeline state and build output cover runs in this process only, so a
    /// fresh invocation reports the live containers next to an idle pipeline.
    Status,

    /// Stop everything the project owns and clear its state
    Reset,

    /// Process a webhook delivery whose signature was already checked
    Webhook {
        /// Request header, e.g. "X-GitHub-Event: push" (repeatable)
        #[arg(long = "header", value_name = "NAME:VALUE", value_parser = parse_header, required = true)]
        headers: Vec<(String, String)>,

        /// File holding the raw request body
        #[arg(long, value_name = "FILE")]
        payload: PathBuf,
    },
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got {:?}", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("header name is empty".to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}
