//! Shortreel CLI: command-line interface for producing vertical highlight reels.
//!
//! Usage:
//!   shortreel produce <STRATEGY>    Cut, reframe, caption and merge every clip
//!   shortreel validate <STRATEGY>   Validate a strategy document
//!   shortreel plan <STRATEGY>       Show wrapped text and renderer commands without running them
//!   shortreel check                 Check that the renderer and font are available
//!   shortreel config                Show or write the effective configuration

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use shortreel_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "shortreel",
    about = "Turn landscape episodes into captioned vertical highlight reels",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Configuration file (defaults to $XDG_CONFIG_HOME/shortreel/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce the vertical deliverable for a strategy document
    Produce {
        /// Path to the strategy document (<Episode>-Strategy.json)
        strategy: PathBuf,

        /// Source video (defaults to <root>/downloads/<Episode>.{mp4,mkv,avi,mov})
        #[arg(long)]
        source: Option<PathBuf>,

        /// Deliverable path (defaults to <root>/output/<Episode>-Clip.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Scratch directory for per-clip files (defaults to <root>/temp_clips)
        #[arg(long)]
        scratch_dir: Option<PathBuf>,

        /// Avatar image (defaults to <root>/assets/avatar.png when present)
        #[arg(long, conflicts_with = "no_avatar")]
        avatar: Option<PathBuf>,

        /// Render without the avatar badge even if an avatar exists
        #[arg(long)]
        no_avatar: bool,
    },

    /// Validate a strategy document
    Validate {
        /// Path to the strategy document
        strategy: PathBuf,
    },

    /// Print the layout and renderer commands for each clip (dry run)
    Plan {
        /// Path to the strategy document
        strategy: PathBuf,

        /// Plan as if the avatar badge were drawn
        #[arg(long)]
        avatar: bool,
    },

    /// Check that the renderer and font are available
    Check,

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the standard location
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.log_json {
        config.logging.json = true;
    }
    shortreel_common::logging::init_logging(&config.logging);
    tracing::debug!(
        config_file = ?cli.config,
        renderer = %config.renderer.program,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Produce {
            strategy,
            source,
            output,
            scratch_dir,
            avatar,
            no_avatar,
        } => {
            commands::produce::run(
                strategy,
                commands::produce::PathOverrides {
                    source,
                    output,
                    scratch_dir,
                    avatar,
                    no_avatar,
                },
                config,
            )
            .await
        }
        Commands::Validate { strategy } => commands::validate::run(strategy),
        Commands::Plan { strategy, avatar } => commands::plan::run(strategy, avatar, &config),
        Commands::Check => commands::check::run(&config),
        Commands::Config { write } => commands::config::run(&config, write),
    }
}
