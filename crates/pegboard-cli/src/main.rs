use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pegboard_infrastructure::PegboardPaths;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod commands;

#[derive(Parser)]
#[command(name = "pegboard")]
#[command(about = "Pegboard CLI - inspect canvases and configuration", long_about = None)]
struct Cli {
    /// Use this directory instead of the platform config directory
    #[arg(long, global = true)]
    root: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runtime configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Saved canvases and layout queries
    Canvas {
        #[command(subcommand)]
        action: CanvasAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}

#[derive(Subcommand)]
enum CanvasAction {
    /// List canvases with their pane counts
    List {
        /// Print the raw snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Where a new pane of the given size would be placed
    Place {
        #[arg(long, default_value_t = 18)]
        width: i32,
        #[arg(long, default_value_t = 16)]
        height: i32,
        /// Canvas id; defaults to the active canvas
        #[arg(long)]
        canvas: Option<String>,
    },
    /// Zoom and pan that fit the active canvas into a window
    Fit {
        #[arg(long)]
        width: f64,
        #[arg(long)]
        height: f64,
    },
    /// Drop archived panes older than the retention period
    Purge,
}

/// Console output plus a daily log file in the logs directory.
fn init_logging(paths: &PegboardPaths) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let logs_dir = paths.logs_dir();
    if std::fs::create_dir_all(&logs_dir).is_err() {
        tracing_subscriber::registry().with(filter).with(console).init();
        tracing::warn!("Cannot create {}, logging to console only", logs_dir.display());
        return None;
    }

    let appender = tracing_appender::rolling::daily(&logs_dir, "pegboard.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = match cli.root {
        Some(root) => PegboardPaths::with_root(root),
        None => PegboardPaths::from_platform().context("Failed to resolve the Pegboard directory")?,
    };
    let _log_guard = init_logging(&paths);

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&paths)?,
            ConfigAction::Path => println!("{}", paths.config_file().display()),
        },
        Commands::Canvas { action } => match action {
            CanvasAction::List { json } => commands::canvas::list(&paths, json).await?,
            CanvasAction::Place {
                width,
                height,
                canvas,
            } => commands::canvas::place(&paths, width, height, canvas.as_deref()).await?,
            CanvasAction::Fit { width, height } => {
                commands::canvas::fit(&paths, width, height).await?
            }
            CanvasAction::Purge => commands::canvas::purge(&paths).await?,
        },
    }

    Ok(())
}
