//! Admin gateway sessions. Rows hold a keyed digest of the cookie token,
//! never the token itself.

use super::Database;
use anyhow::Result;
use chrono::{DateTime, Utc};

impl Database {
    pub async fn create_admin_session(
        &self,
        token_digest: &str,
        username: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO admin_sessions (token_digest, username, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(token_digest)
        .bind(username)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Username of the live session with this digest, if any.
    pub async fn find_admin_session(&self, token_digest: &str) -> Result<Option<String>> {
        let username = sqlx::query_scalar::<_, String>(
            "SELECT username FROM admin_sessions WHERE token_digest = $1 AND expires_at > NOW()",
        )
        .bind(token_digest)
        .fetch_optional(&self.pool)
        .await?;
        Ok(username)
    }

    pub async fn delete_admin_session(&self, token_digest: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM admin_sessions WHERE token_digest = $1")
            .bind(token_digest)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn prune_expired_sessions(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM admin_sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_admin_sessions(&self) -> Result<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM admin_sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}
