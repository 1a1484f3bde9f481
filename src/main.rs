//! Binary entry point for feedgroups.
//!
//! This binary provides the CLI interface for managing feed source groups.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use commands::{App, GroupsAction, SourcesAction, cmd_export, cmd_groups, cmd_import, cmd_sources};
use feedgroups::config::FeedGroupsConfig;
use feedgroups::observability::{self, InitOptions};
use std::path::PathBuf;
use std::process::ExitCode;

/// Feedgroups - organize feed subscriptions into groups, with OPML import and export.
#[derive(Parser)]
#[command(name = "feedgroups")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config and environment).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Import sources and groups from an OPML file.
    Import {
        /// OPML file to read.
        file: PathBuf,
    },

    /// Export sources and groups to an OPML file.
    Export {
        /// OPML file to write.
        file: PathBuf,
    },

    /// Manage groups.
    Groups {
        #[command(subcommand)]
        action: GroupsAction,
    },

    /// Manage sources.
    Sources {
        #[command(subcommand)]
        action: SourcesAction,
    },
}

/// Main entry point.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match FeedGroupsConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };
    if let Some(data_dir) = cli.data_dir.clone() {
        config = config.with_data_dir(data_dir);
    }

    if let Err(e) = observability::init(
        &config.logging,
        InitOptions {
            verbose: cli.verbose,
        },
    ) {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }

    let app = match App::open(config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to open data directory: {e}");
            return ExitCode::FAILURE;
        },
    };

    let result = run_command(&app, cli.command).await;
    app.store.flush().await;
    app.catalog.flush().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
async fn run_command(app: &App, command: Commands) -> feedgroups::Result<()> {
    match command {
        Commands::Import { file } => cmd_import(app, &file).await,
        Commands::Export { file } => cmd_export(app, &file),
        Commands::Groups { action } => cmd_groups(app, action),
        Commands::Sources { action } => cmd_sources(app, action),
    }
}
