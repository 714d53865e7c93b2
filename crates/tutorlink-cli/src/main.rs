//! Tutorlink CLI - command-line client for the tutoring marketplace.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use client_config_and_utils::{init_logging, Config, Paths};
use std::path::PathBuf;
use tracing::debug;

/// Tutorlink CLI - manage your marketplace session and profile.
#[derive(Parser)]
#[command(name = "tutorlink")]
#[command(about = "Tutorlink client for authentication and profile management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Base directory for runtime files (config, session). Defaults to ~/.tutorlink
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password
    Login,

    /// Register a new student account
    Register,

    /// Logout and clear the stored session
    Logout,

    /// Check session status
    Status,

    /// Show the signed-in user
    Whoami,

    /// Manage the aggregated profile on the user service
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show the profile
    Show,
    /// Update profile fields
    Set {
        /// First name
        #[arg(long)]
        first_name: String,
        /// Last name
        #[arg(long)]
        last_name: String,
        /// Display name shown to other users
        #[arg(long)]
        display_name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;
    debug!(auth_host = %config.auth_host, user_host = %config.user_host, "Loaded configuration");

    let manager = commands::build_session_manager(&config, &paths)?;

    match cli.command {
        Commands::Login => commands::auth::login(&manager, &cli.format).await?,
        Commands::Register => commands::auth::register(&manager, &cli.format).await?,
        Commands::Logout => commands::auth::logout(&manager, &cli.format).await?,
        Commands::Status => commands::auth::status(&manager, &cli.format)?,
        Commands::Whoami => commands::auth::whoami(&manager, &cli.format).await?,
        Commands::Profile { command } => match command {
            ProfileCommands::Show => commands::profile::show(&manager, &cli.format).await?,
            ProfileCommands::Set {
                first_name,
                last_name,
                display_name,
            } => {
                commands::profile::set(&manager, first_name, last_name, display_name, &cli.format)
                    .await?
            }
        },
    }

    Ok(())
}
