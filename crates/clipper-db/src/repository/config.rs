//! # Site Configuration Repository
//!
//! Key/value configuration persisted alongside the ledger.
//!
//! The register keeps operational settings in the database rather than the
//! environment so every terminal sharing the store sees the same values.
//! The void security pin lives here under the `void-pin` key.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// Repository for site configuration values.
#[derive(Debug, Clone)]
pub struct ConfigRepository {
    pool: SqlitePool,
}

impl ConfigRepository {
    /// Creates a new ConfigRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ConfigRepository { pool }
    }

    /// Gets a configuration value, or None if the key is not set.
    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM site_config WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(value)
    }

    /// Sets a configuration value, overwriting any existing one.
    pub async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        debug!(key = %key, "Setting config value");

        sqlx::query(
            r#"
            INSERT INTO site_config (key, value)
            VALUES (?1, ?2)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Removes a configuration value.
    pub async fn unset(&self, key: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM site_config WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn get_set_unset_roundtrip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.config();

        assert!(repo.get("void-pin").await.unwrap().is_none());

        repo.set("void-pin", "1234").await.unwrap();
        assert_eq!(repo.get("void-pin").await.unwrap().as_deref(), Some("1234"));

        // Overwrite
        repo.set("void-pin", "4321").await.unwrap();
        assert_eq!(repo.get("void-pin").await.unwrap().as_deref(), Some("4321"));

        repo.unset("void-pin").await.unwrap();
        assert!(repo.get("void-pin").await.unwrap().is_none());
    }
}
