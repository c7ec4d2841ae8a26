//! # CLI Execution Functions
//!
//! The work behind each subcommand, kept out of `main.rs`.

use ai_tutor::config::{hash_password as digest_password, ServerArgs};
use ai_tutor::{admin, db, migrations};
use anyhow::{Context, Result};
use tracing::info;

pub fn require_database_url(url: Option<&str>) -> Result<&str> {
    url.filter(|u| !u.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required (set via --database-url or env)"))
}

pub fn hash_password(password: &str) {
    println!("{}", digest_password(password));
}

/// Validate settings before connecting, so a misconfigured server fails
/// without touching the database.
pub async fn serve(database_url: &str, server: ServerArgs, migrate: bool) -> Result<()> {
    let mut settings = server.into_settings().context("invalid server configuration")?;
    settings.database_host = db::display_host(database_url);

    let database = db::Database::connect(database_url)
        .await
        .with_context(|| format!("connecting to database at {}", settings.database_host))?;
    if migrate {
        migrations::run_pending(database.pool()).await?;
    }
    admin::run(settings, database).await
}

pub async fn migrate(database_url: &str) -> Result<()> {
    let database = db::Database::connect(database_url).await?;
    migrations::run_pending(database.pool()).await
}

pub async fn rollback(database_url: &str, to: Option<i64>, steps: Option<usize>) -> Result<()> {
    let database = db::Database::connect(database_url).await?;
    match (to, steps) {
        (Some(target), _) => migrations::revert_to(database.pool(), target).await?,
        (None, steps) => {
            let now_at = match steps {
                Some(n) => migrations::revert_steps(database.pool(), n).await?,
                None => migrations::revert_last(database.pool()).await?,
            };
            info!(version = now_at, "schema now at version");
        }
    }
    Ok(())
}

pub async fn migrate_status(database_url: &str) -> Result<()> {
    let database = db::Database::connect(database_url).await?;
    let statuses = migrations::status(database.pool()).await?;
    println!("{:<16} {:<8} {:<26} DESCRIPTION", "VERSION", "STATE", "INSTALLED");
    for s in statuses {
        let state = match (s.applied, s.checksum_ok) {
            (false, _) => "pending",
            (true, Some(false)) => "changed",
            (true, _) => "applied",
        };
        let installed = s
            .installed_on
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<16} {:<8} {:<26} {}", s.version, state, installed, s.description);
    }
    Ok(())
}
