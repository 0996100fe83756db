//! TicketTock CLI: turn a static ticket image into a ticking video.
//!
//! Usage:
//!   tickettock generate <IMAGE>   Render and encode a clip
//!   tickettock check              Check ffmpeg and codec availability
//!   tickettock layout             Print the overlay layout
//!   tickettock config             Show or save the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tickettock_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "tickettock",
    about = "Animated clock, countdown, and status bar for static ticket images",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a ticket image into a video clip
    Generate(commands::generate::GenerateArgs),

    /// Check ffmpeg and per-codec encoder availability
    Check {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the overlay layout as JSON
    Layout {
        /// Layout file to show instead of the default
        #[arg(long)]
        file: Option<PathBuf>,

        /// Resolve against this image width
        #[arg(long, requires = "height")]
        width: Option<u32>,

        /// Resolve against this image height
        #[arg(long, requires = "width")]
        height: Option<u32>,
    },

    /// Print the effective configuration
    Config {
        /// Write the configuration to the standard location
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app_config = AppConfig::load();

    let mut logging = app_config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    logging.json |= cli.json_logs;
    tickettock_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Generate(args) => commands::generate::run(args, &app_config.generation).await,
        Commands::Check { json } => commands::check::run(json),
        Commands::Layout {
            file,
            width,
            height,
        } => commands::layout::run(file, width.zip(height)),
        Commands::Config { save } => commands::config::run(&app_config, save),
    }
}
