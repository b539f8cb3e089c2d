//! txlink CLI
//!
//! Command-line tools for inspecting and dry-running batched execution.
//!
//! # Commands
//!
//! - `plan` - Show how a command list would be split into round trips
//! - `run` - Execute a command script against the in-memory driver
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// txlink command-line tools.
#[derive(Parser)]
#[command(name = "txlink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the batch layout for a command list
    Plan {
        /// Number of commands (ignored when a script is given)
        #[arg(short = 'n', long, default_value = "0")]
        commands: usize,

        /// Read the command list from a JSON script
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// Batch size (0 = script override, else the default of 50)
        #[arg(short, long, default_value = "0")]
        batch_size: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Execute a JSON command script against the in-memory driver
    Run {
        /// Path to the script
        script: PathBuf,

        /// Target the context is bound to
        #[arg(short, long, default_value = "memory")]
        target: String,

        /// Batch size (0 = script override, else the default of 50)
        #[arg(short, long, default_value = "0")]
        batch_size: usize,

        /// Run the script this many times inside one transaction
        #[arg(short, long, default_value = "1")]
        repeat: usize,

        /// Cancel after this many round trips
        #[arg(long)]
        cancel_after: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Plan {
            commands,
            script,
            batch_size,
            format,
        } => {
            commands::plan::run(commands, script.as_deref(), batch_size, &format)?;
        }
        Commands::Run {
            script,
            target,
            batch_size,
            repeat,
            cancel_after,
            format,
        } => {
            let options = commands::run::RunOptions {
                target,
                batch_size,
                repeat,
                cancel_after,
            };
            commands::run::run(&script, &options, &format)?;
        }
        Commands::Version => {
            println!("txlink CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("default batch size: {}", txlink_core::DEFAULT_BATCH_SIZE);
        }
    }

    Ok(())
}
