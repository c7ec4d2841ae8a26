//! Generic row access for the admin gateway.
//!
//! Every query here is assembled from the static identifiers of an
//! [`EntityView`]; values always travel as bound parameters. Rows come back
//! as JSON objects built by `jsonb_build_object` over the view's columns, so
//! deferred columns (file payloads) are never read.

use super::Database;
use crate::admin::fields::FieldValue;
use crate::admin::views::EntityView;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::query::QueryScalar;
use sqlx::Postgres;

pub const DEFAULT_PER_PAGE: i64 = 50;
pub const MAX_PER_PAGE: i64 = 200;
/// Upper bound on rows in one export.
pub const EXPORT_LIMIT: i64 = 100_000;

#[derive(Debug)]
pub struct ExportRows {
    pub rows: Vec<Value>,
    /// More rows exist than the export carries.
    pub truncated: bool,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
    pub search: Option<String>,
}

impl ListQuery {
    /// Whitelist the sort column against the view. Unknown values fall back to "id".
    pub(crate) fn safe_sort_column(&self, view: &EntityView) -> &'static str {
        self.sort_by
            .as_deref()
            .and_then(|s| view.sortable_columns.iter().find(|c| **c == s))
            .copied()
            .unwrap_or("id")
    }

    /// Only "asc"/"ASC" sort ascending; everything else is "DESC".
    pub(crate) fn safe_sort_dir(&self) -> &'static str {
        match self.sort_dir.as_deref() {
            Some("asc") | Some("ASC") => "ASC",
            _ => "DESC",
        }
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }

    /// ILIKE pattern for the search term, with wildcards in the term escaped.
    pub(crate) fn search_pattern(&self) -> Option<String> {
        let term = self.search.as_deref()?.trim();
        if term.is_empty() {
            return None;
        }
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        Some(format!("%{}%", escaped))
    }
}

#[derive(Debug, Serialize)]
pub struct Page {
    pub rows: Vec<Value>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CascadeDependent {
    pub table_name: String,
    pub depth: i32,
}

/// `jsonb_build_object('a', a, 'b', b)` over the given columns.
fn json_object_sql(columns: &[&str]) -> String {
    let pairs: Vec<String> = columns
        .iter()
        .map(|c| format!("'{}', {}", c, c))
        .collect();
    format!("jsonb_build_object({})", pairs.join(", "))
}

/// `WHERE (a::text ILIKE $n OR b::text ILIKE $n)` or empty.
fn search_clause(view: &EntityView, pattern: Option<&str>, param: usize) -> String {
    if pattern.is_none() || view.search_columns.is_empty() {
        return String::new();
    }
    let ors: Vec<String> = view
        .search_columns
        .iter()
        .map(|c| format!("{}::text ILIKE ${}", c, param))
        .collect();
    format!(" WHERE ({})", ors.join(" OR "))
}

fn bind_value<'q>(
    query: QueryScalar<'q, Postgres, Value, PgArguments>,
    value: &FieldValue,
) -> QueryScalar<'q, Postgres, Value, PgArguments> {
    match value.clone() {
        FieldValue::Text(v) => query.bind(v),
        FieldValue::Int(v) => query.bind(v),
        FieldValue::Bool(v) => query.bind(v),
        FieldValue::Date(v) => query.bind(v),
        FieldValue::Time(v) => query.bind(v),
    }
}

pub(crate) fn insert_sql(view: &EntityView, columns: &[&str]) -> String {
    let returning = json_object_sql(view.detail_columns);
    if columns.is_empty() {
        return format!(
            "WITH t AS (INSERT INTO {} DEFAULT VALUES RETURNING *) SELECT {} FROM t",
            view.table(),
            returning
        );
    }
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    format!(
        "WITH t AS (INSERT INTO {} ({}) VALUES ({}) RETURNING *) SELECT {} FROM t",
        view.table(),
        columns.join(", "),
        placeholders.join(", "),
        returning
    )
}

pub(crate) fn update_sql(view: &EntityView, columns: &[&str]) -> String {
    let sets: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", c, i + 2))
        .collect();
    format!(
        "WITH t AS (UPDATE {} SET {} WHERE id = $1 RETURNING *) SELECT {} FROM t",
        view.table(),
        sets.join(", "),
        json_object_sql(view.detail_columns)
    )
}

impl Database {
    /// One page of rows plus the total matching the search.
    pub async fn list_entities(&self, view: &EntityView, query: &ListQuery) -> Result<Page> {
        let pattern = query.search_pattern();
        let filter = search_clause(view, pattern.as_deref(), 1);
        let uses_pattern = !filter.is_empty();

        let count_sql = format!("SELECT COUNT(*) FROM {}{}", view.table(), filter);
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        if uses_pattern {
            count_q = count_q.bind(pattern.clone());
        }
        let total = count_q.fetch_one(&self.pool).await?;

        let (limit_param, offset_param) = if uses_pattern { (2, 3) } else { (1, 2) };
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {} {}, id {} LIMIT ${} OFFSET ${}",
            json_object_sql(view.list_columns),
            view.table(),
            filter,
            query.safe_sort_column(view),
            query.safe_sort_dir(),
            query.safe_sort_dir(),
            limit_param,
            offset_param
        );
        let mut rows_q = sqlx::query_scalar::<_, Value>(&sql);
        if uses_pattern {
            rows_q = rows_q.bind(pattern);
        }
        let rows = rows_q
            .bind(query.per_page())
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            rows,
            total,
            page: query.page(),
            per_page: query.per_page(),
        })
    }

    /// Every row with its detail columns, oldest first, for export.
    pub async fn export_entities(&self, view: &EntityView) -> Result<ExportRows> {
        self.export_entities_capped(view, EXPORT_LIMIT).await
    }

    /// At most `limit` rows; one extra row is read to tell whether the
    /// table holds more.
    pub async fn export_entities_capped(&self, view: &EntityView, limit: i64) -> Result<ExportRows> {
        let mut rows = sqlx::query_scalar::<_, Value>(&format!(
            "SELECT {} FROM {} ORDER BY id LIMIT $1",
            json_object_sql(view.detail_columns),
            view.table()
        ))
        .bind(limit + 1)
        .fetch_all(&self.pool)
        .await?;
        let truncated = rows.len() as i64 > limit;
        rows.truncate(limit.max(0) as usize);
        Ok(ExportRows { rows, truncated })
    }

    pub async fn get_entity(&self, view: &EntityView, id: i64) -> Result<Option<Value>> {
        let row = sqlx::query_scalar::<_, Value>(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            json_object_sql(view.detail_columns),
            view.table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Insert one row from validated values and return its detail object.
    pub async fn create_entity(
        &self,
        view: &EntityView,
        values: &[(&'static str, FieldValue)],
    ) -> Result<Value> {
        let columns: Vec<&str> = values.iter().map(|(c, _)| *c).collect();
        let sql = insert_sql(view, &columns);
        let mut q = sqlx::query_scalar::<_, Value>(&sql);
        for (_, value) in values {
            q = bind_value(q, value);
        }
        let row = q.fetch_one(&self.pool).await?;
        Ok(row)
    }

    /// Apply a partial edit. `None` when the row does not exist.
    pub async fn update_entity(
        &self,
        view: &EntityView,
        id: i64,
        values: &[(&'static str, FieldValue)],
    ) -> Result<Option<Value>> {
        if values.is_empty() {
            return self.get_entity(view, id).await;
        }
        let columns: Vec<&str> = values.iter().map(|(c, _)| *c).collect();
        let sql = update_sql(view, &columns);
        let mut q = sqlx::query_scalar::<_, Value>(&sql).bind(id);
        for (_, value) in values {
            q = bind_value(q, value);
        }
        let row = q.fetch_optional(&self.pool).await?;
        Ok(row)
    }

    pub async fn delete_entity(&self, view: &EntityView, id: i64) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", view.table()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all listed ids in one transaction. Returns the number removed;
    /// ids that do not exist are ignored.
    pub async fn bulk_delete_entities(&self, view: &EntityView, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ANY($1)", view.table()))
            .bind(ids)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Tables that a delete on this entity cascades into, nearest first.
    pub async fn cascade_dependents(&self, view: &EntityView) -> Result<Vec<CascadeDependent>> {
        let rows = sqlx::query_as::<_, CascadeDependent>(
            "WITH RECURSIVE deps(child, depth) AS (
                 SELECT c.conrelid, 1
                 FROM pg_constraint c
                 WHERE c.contype = 'f' AND c.confdeltype = 'c'
                   AND c.confrelid = $1::text::regclass
                 UNION
                 SELECT c.conrelid, d.depth + 1
                 FROM pg_constraint c
                 JOIN deps d ON c.confrelid = d.child
                 WHERE c.contype = 'f' AND c.confdeltype = 'c' AND d.depth < 8
             )
             SELECT child::regclass::text AS table_name, MIN(depth)::int4 AS depth
             FROM deps
             WHERE child <> $1::text::regclass
             GROUP BY child
             ORDER BY depth, table_name",
        )
        .bind(view.table())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
