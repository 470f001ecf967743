//! Foreman leaf worker.
//!
//! Launched by the supervisor as `foreman-worker <worker>`; reads commands
//! as JSON lines on stdin and reports on stdout. Logs go to stderr.

use std::path::PathBuf;

use clap::Parser;
use foreman_core::WorkerId;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod config;
mod error;
mod facilities;
mod programs;
mod runtime;

use config::{ToolCommand, WorkerConfig};
use error::LeafError;

/// Run one Foreman worker over stdio.
#[derive(Parser, Debug)]
#[command(name = "foreman-worker", about = "Foreman leaf worker")]
struct Args {
    /// Worker to run (bundler, dev_server, linter, test_runner, transpiler, watcher)
    worker: WorkerId,

    /// Source directory
    #[arg(long, default_value = "src")]
    src_dir: PathBuf,

    /// Output directory for transpiled files
    #[arg(long, default_value = "build")]
    out_dir: PathBuf,

    /// Files to transpile
    #[arg(long, default_value = "src/**/*.js?(x)")]
    pattern: String,

    /// Transpiler command
    #[arg(long, default_value = "babel")]
    transpiler: String,

    /// Do not emit source maps
    #[arg(long)]
    no_source_maps: bool,

    /// Lint command
    #[arg(long, default_value = "eslint src")]
    lint_command: String,

    /// Test command
    #[arg(long, default_value = "npm test")]
    test_command: String,

    /// Bundle command
    #[arg(long, default_value = "webpack")]
    bundle_command: String,

    /// Dev server command
    #[arg(long, default_value = "webpack-dev-server")]
    serve_command: String,
}

impl Args {
    fn config(&self) -> Result<WorkerConfig, LeafError> {
        Ok(WorkerConfig {
            src_dir: self.src_dir.clone(),
            out_dir: self.out_dir.clone(),
            pattern: self.pattern.clone(),
            transpiler: parse_command(&self.transpiler, "transpiler")?,
            source_maps: !self.no_source_maps,
            lint: parse_command(&self.lint_command, "linter")?,
            test: parse_command(&self.test_command, "test runner")?,
            bundle: parse_command(&self.bundle_command, "bundler")?,
            serve: parse_command(&self.serve_command, "dev server")?,
        })
    }
}

fn parse_command(line: &str, tool: &'static str) -> Result<ToolCommand, LeafError> {
    ToolCommand::parse(line).ok_or(LeafError::EmptyCommand(tool))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // stdout carries the protocol
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = args.config()?;
    info!(worker = %args.worker, src_dir = %config.src_dir.display(), "Starting worker");

    let program = programs::program_for(args.worker, &config);
    runtime::run(
        args.worker,
        program,
        tokio::io::stdin(),
        tokio::io::stdout(),
    )
    .await?;

    info!(worker = %args.worker, "Worker exited");
    Ok(())
}
