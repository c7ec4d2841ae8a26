//! # Main: CLI Entry Point
//!
//! Routes subcommands to the server and to schema maintenance.
//!
//! ## Subcommands
//!
//! - `serve`: run the HTTP server (`--migrate` applies pending steps first).
//! - `migrate`, `rollback`, `migrate-status`: schema maintenance.
//! - `hash-password`: print the digest to put in `ADMIN_PASSWORD_HASH`.
//!
//! ## Global Options
//!
//! - `--database-url` / `DATABASE_URL`: PostgreSQL connection URL.
//! - `LOG_FORMAT=json` switches logs to JSON lines; `RUST_LOG` filters them.

mod cli;

use ai_tutor::config::ServerArgs;
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ai-tutor", version, about = "AI tutor back office and admin gateway")]
struct Cli {
    /// PostgreSQL connection URL (or set DATABASE_URL env var)
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Apply pending migrations before accepting traffic
        #[arg(long)]
        migrate: bool,

        #[command(flatten)]
        server: ServerArgs,
    },
    /// Apply all pending migrations
    Migrate,
    /// Revert applied migrations
    Rollback {
        /// Revert down to this version (0 reverts everything)
        #[arg(long, conflicts_with = "steps")]
        to: Option<i64>,

        /// Revert this many of the most recent steps
        #[arg(long)]
        steps: Option<usize>,
    },
    /// Show which migrations are applied
    MigrateStatus,
    /// Print the SHA-256 digest of a password for ADMIN_PASSWORD_HASH
    HashPassword {
        password: String,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // LOG_FORMAT=json for log shippers, human-readable otherwise
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").unwrap_or_default() == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::HashPassword { password } => {
            cli::hash_password(&password);
            Ok(())
        }
        Commands::Serve { migrate, server } => {
            let database_url = cli::require_database_url(cli.database_url.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::serve(database_url, server, migrate))
        }
        Commands::Migrate => {
            let database_url = cli::require_database_url(cli.database_url.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::migrate(database_url))
        }
        Commands::Rollback { to, steps } => {
            let database_url = cli::require_database_url(cli.database_url.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::rollback(database_url, to, steps))
        }
        Commands::MigrateStatus => {
            let database_url = cli::require_database_url(cli.database_url.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::migrate_status(database_url))
        }
    }
}
