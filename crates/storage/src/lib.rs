use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::SessionToken;

/// Well-known key under which the single session token row is persisted.
const SESSION_TOKEN_KEY: &str = "session_token";

/// Durable home of the session token. Reads and writes go through this
/// trait so the client core never touches the database directly.
#[async_trait]
pub trait SessionTokenStore: Send + Sync {
    async fn load_token(&self) -> Result<Option<SessionToken>>;
    async fn save_token(&self, token: &SessionToken) -> Result<()>;
    async fn clear_token(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

#[async_trait]
impl SessionTokenStore for Storage {
    async fn load_token(&self) -> Result<Option<SessionToken>> {
        let row = sqlx::query("SELECT value FROM client_settings WHERE key = ?")
            .bind(SESSION_TOKEN_KEY)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| SessionToken(r.get::<String, _>(0))))
    }

    async fn save_token(&self, token: &SessionToken) -> Result<()> {
        sqlx::query(
            "INSERT INTO client_settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(SESSION_TOKEN_KEY)
        .bind(token.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_token(&self) -> Result<()> {
        sqlx::query("DELETE FROM client_settings WHERE key = ?")
            .bind(SESSION_TOKEN_KEY)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
