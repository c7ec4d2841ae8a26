//! # Migrations: Versioned, Reversible Schema Steps
//!
//! The schema lives in `migrations/<version>_<name>.{up,down}.sql` and is
//! embedded at compile time with `sqlx::migrate!`. Each step runs inside its
//! own transaction (PostgreSQL supports transactional DDL), so a failing step
//! leaves nothing half-created behind.
//!
//! Every `up` has a `down` that drops what the `up` created in reverse
//! dependency order. [`schema_snapshot`] captures the catalog state of the
//! `public` schema so a forward step followed by its reverse step can be
//! checked for an empty diff.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use std::collections::BTreeSet;
use tracing::info;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Bookkeeping table owned by sqlx; excluded from schema snapshots.
const BOOKKEEPING_TABLE: &str = "_sqlx_migrations";

#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub version: i64,
    pub description: String,
    pub applied: bool,
    pub installed_on: Option<chrono::DateTime<chrono::Utc>>,
    /// `None` when not applied; `Some(false)` when the file changed after it was applied.
    pub checksum_ok: Option<bool>,
}

#[derive(sqlx::FromRow)]
struct AppliedRow {
    version: i64,
    checksum: Vec<u8>,
    installed_on: chrono::DateTime<chrono::Utc>,
}

/// Versions of all forward steps, ascending.
pub fn available_versions() -> Vec<i64> {
    let mut versions: Vec<i64> = MIGRATOR
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .map(|m| m.version)
        .collect();
    versions.sort_unstable();
    versions.dedup();
    versions
}

/// Apply every pending forward step.
pub async fn run_pending(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("applying pending migrations")?;
    info!(latest = ?available_versions().last(), "schema up to date");
    Ok(())
}

/// Revert applied steps until the newest applied version is `target`.
/// `target = 0` reverts everything.
pub async fn revert_to(pool: &PgPool, target: i64) -> Result<()> {
    MIGRATOR
        .undo(pool, target)
        .await
        .with_context(|| format!("reverting migrations down to version {}", target))?;
    info!(target, "schema reverted");
    Ok(())
}

/// Revert `steps` of the most recently applied forward steps.
/// Returns the version the schema now sits at (0 when empty).
pub async fn revert_steps(pool: &PgPool, steps: usize) -> Result<i64> {
    let applied = applied_versions(pool).await?;
    let target = target_after_reverting(&applied, steps);
    if applied.last().copied().unwrap_or(0) != target {
        revert_to(pool, target).await?;
    }
    Ok(target)
}

/// Revert the most recently applied step.
pub async fn revert_last(pool: &PgPool) -> Result<i64> {
    revert_steps(pool, 1).await
}

/// Compute the version that remains after reverting `steps` of `applied`
/// (ascending). Reverting more steps than exist lands on 0.
pub fn target_after_reverting(applied: &[i64], steps: usize) -> i64 {
    if steps >= applied.len() {
        0
    } else {
        applied[applied.len() - steps - 1]
    }
}

async fn bookkeeping_exists(pool: &PgPool) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT to_regclass($1) IS NOT NULL")
        .bind(format!("public.{}", BOOKKEEPING_TABLE))
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

async fn applied_rows(pool: &PgPool) -> Result<Vec<AppliedRow>> {
    if !bookkeeping_exists(pool).await? {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, AppliedRow>(
        "SELECT version, checksum, installed_on
         FROM _sqlx_migrations WHERE success ORDER BY version",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Successfully applied versions, ascending.
pub async fn applied_versions(pool: &PgPool) -> Result<Vec<i64>> {
    Ok(applied_rows(pool).await?.into_iter().map(|r| r.version).collect())
}

/// Available steps joined with what the database has recorded.
pub async fn status(pool: &PgPool) -> Result<Vec<MigrationStatus>> {
    let applied = applied_rows(pool).await?;
    let statuses = MIGRATOR
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .map(|m| {
            let row = applied.iter().find(|r| r.version == m.version);
            MigrationStatus {
                version: m.version,
                description: m.description.to_string(),
                applied: row.is_some(),
                installed_on: row.map(|r| r.installed_on),
                checksum_ok: row.map(|r| r.checksum.as_slice() == m.checksum.as_ref()),
            }
        })
        .collect();
    Ok(statuses)
}

// ── Schema snapshots ────────────────────────────────────────────

/// Catalog view of the `public` schema, each list sorted and rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<String>,
    pub columns: Vec<String>,
    pub constraints: Vec<String>,
    pub indexes: Vec<String>,
    pub triggers: Vec<String>,
    pub functions: Vec<String>,
    pub enum_types: Vec<String>,
}

impl SchemaSnapshot {
    /// Lines present in `other` but not `self` are prefixed `+`, the reverse `-`.
    pub fn diff(&self, other: &SchemaSnapshot) -> Vec<String> {
        let sections: [(&str, &Vec<String>, &Vec<String>); 7] = [
            ("table", &self.tables, &other.tables),
            ("column", &self.columns, &other.columns),
            ("constraint", &self.constraints, &other.constraints),
            ("index", &self.indexes, &other.indexes),
            ("trigger", &self.triggers, &other.triggers),
            ("function", &self.functions, &other.functions),
            ("type", &self.enum_types, &other.enum_types),
        ];
        let mut out = Vec::new();
        for (label, before, after) in sections {
            let before: BTreeSet<&String> = before.iter().collect();
            let after: BTreeSet<&String> = after.iter().collect();
            for gone in before.difference(&after) {
                out.push(format!("- {} {}", label, gone));
            }
            for added in after.difference(&before) {
                out.push(format!("+ {} {}", label, added));
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.columns.is_empty()
            && self.constraints.is_empty()
            && self.indexes.is_empty()
            && self.triggers.is_empty()
            && self.functions.is_empty()
            && self.enum_types.is_empty()
    }
}

async fn catalog_lines(pool: &PgPool, sql: &str) -> Result<Vec<String>> {
    let rows = sqlx::query_scalar::<_, String>(sql)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Capture tables, columns, constraints, indexes, triggers, functions and
/// enum types of the `public` schema, ignoring sqlx's bookkeeping table.
pub async fn schema_snapshot(pool: &PgPool) -> Result<SchemaSnapshot> {
    let tables = catalog_lines(
        pool,
        "SELECT table_name::text FROM information_schema.tables
         WHERE table_schema = 'public' AND table_type = 'BASE TABLE' AND table_name <> '_sqlx_migrations'
         ORDER BY 1",
    )
    .await?;
    let columns = catalog_lines(
        pool,
        "SELECT table_name || '.' || column_name || ' ' || data_type || ' '
                || is_nullable || ' ' || COALESCE(column_default, '')
         FROM information_schema.columns
         WHERE table_schema = 'public' AND table_name <> '_sqlx_migrations'
         ORDER BY 1",
    )
    .await?;
    let constraints = catalog_lines(
        pool,
        "SELECT c.conrelid::regclass::text || ' ' || c.conname || ' ' || pg_get_constraintdef(c.oid)
         FROM pg_constraint c
         JOIN pg_namespace n ON n.oid = c.connamespace
         WHERE n.nspname = 'public' AND c.conrelid::regclass::text <> '_sqlx_migrations'
         ORDER BY 1",
    )
    .await?;
    let indexes = catalog_lines(
        pool,
        "SELECT indexname || ' ' || indexdef FROM pg_indexes
         WHERE schemaname = 'public' AND tablename <> '_sqlx_migrations'
         ORDER BY 1",
    )
    .await?;
    let triggers = catalog_lines(
        pool,
        "SELECT DISTINCT event_object_table || ' ' || trigger_name || ' ' || action_timing
         FROM information_schema.triggers
         WHERE trigger_schema = 'public' AND event_object_table <> '_sqlx_migrations'
         ORDER BY 1",
    )
    .await?;
    let functions = catalog_lines(
        pool,
        "SELECT p.proname::text FROM pg_proc p
         JOIN pg_namespace n ON n.oid = p.pronamespace
         WHERE n.nspname = 'public'
         ORDER BY 1",
    )
    .await?;
    let enum_types = catalog_lines(
        pool,
        "SELECT t.typname::text FROM pg_type t
         JOIN pg_namespace n ON n.oid = t.typnamespace
         WHERE n.nspname = 'public' AND t.typtype = 'e'
         ORDER BY 1",
    )
    .await?;
    Ok(SchemaSnapshot {
        tables,
        columns,
        constraints,
        indexes,
        triggers,
        functions,
        enum_types,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_forward_step_has_a_reverse_step() {
        let ups = available_versions();
        assert!(!ups.is_empty());
        for version in &ups {
            assert!(
                MIGRATOR
                    .iter()
                    .any(|m| m.version == *version && m.migration_type.is_down_migration()),
                "migration {} has no down step",
                version
            );
        }
    }

    #[test]
    fn versions_are_strictly_ascending() {
        let ups = available_versions();
        for pair in ups.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn no_native_enum_types_are_created() {
        for m in MIGRATOR.iter() {
            assert!(
                !m.sql.to_uppercase().contains("CREATE TYPE"),
                "migration {} creates a native enum type",
                m.version
            );
        }
    }

    #[test]
    fn target_after_reverting_steps() {
        let applied = [1, 2, 3];
        assert_eq!(target_after_reverting(&applied, 0), 3);
        assert_eq!(target_after_reverting(&applied, 1), 2);
        assert_eq!(target_after_reverting(&applied, 2), 1);
        assert_eq!(target_after_reverting(&applied, 3), 0);
        assert_eq!(target_after_reverting(&applied, 10), 0);
        assert_eq!(target_after_reverting(&[], 1), 0);
    }

    #[test]
    fn snapshot_diff_reports_both_directions() {
        let before = SchemaSnapshot {
            tables: vec!["programs".into(), "students".into()],
            indexes: vec!["idx_a".into()],
            ..Default::default()
        };
        let after = SchemaSnapshot {
            tables: vec!["programs".into(), "topics".into()],
            indexes: vec!["idx_a".into()],
            ..Default::default()
        };
        let diff = before.diff(&after);
        assert_eq!(diff, vec!["- table students", "+ table topics"]);
        assert!(before.diff(&before.clone()).is_empty());
    }

    #[test]
    fn empty_snapshot() {
        assert!(SchemaSnapshot::default().is_empty());
    }
}
