use clap::{Parser, Subcommand};
use colored::*;
use nao_core::error::NaoResult;
use std::path::PathBuf;
use std::time::Duration;

use nao_manager::commands;

#[derive(Parser)]
#[command(name = "nao")]
#[command(about = "NAO - modules, blackboards and waves")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase output verbosity (show debug messages)
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Only report errors
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive console, optionally preceded by a script
    Console {
        /// Script of console commands to execute first
        script: Option<PathBuf>,

        /// Extra directories searched for module units
        #[arg(short = 'L', long = "search-path")]
        search_paths: Vec<PathBuf>,
    },

    /// Build a topology, validate it and run it until Ctrl+C
    Run {
        /// Topology file (YAML)
        topology: PathBuf,

        /// Stop after this many seconds
        #[arg(short = 'd', long = "duration-secs")]
        duration_secs: Option<u64>,
    },

    /// Build a topology and validate it without running
    Check {
        /// Topology file (YAML)
        topology: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    log::debug!("NAO CLI v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_command(cli.command) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(i32::from(e.exit_code()));
    }
}

fn run_command(command: Commands) -> NaoResult<()> {
    match command {
        Commands::Console {
            script,
            search_paths,
        } => commands::console::run_console(script, search_paths),
        Commands::Run {
            topology,
            duration_secs,
        } => commands::run::run_topology(&topology, duration_secs.map(Duration::from_secs)),
        Commands::Check { topology } => commands::check::check_topology(&topology),
    }
}
