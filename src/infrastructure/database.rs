// Database - SQLite pool, schema and the retrying transaction wrapper
// Every request-triggered write runs through `execute_tx`, which re-runs the
// whole transaction body when SQLite reports lock contention.

use futures::future::BoxFuture;
use rand::Rng;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::{DatabaseConfig, RetryConfig};
use crate::error::{AppError, AppResult};

/// Schema statements, executed in order by `initialize`
const SCHEMA: &[(&str, &str)] = &[
    (
        "users table",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            avatar TEXT
        )
        "#,
    ),
    (
        "follows table",
        r#"
        CREATE TABLE IF NOT EXISTS follows (
            follower_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            followee_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            PRIMARY KEY (follower_id, followee_id)
        )
        "#,
    ),
    (
        "follows followee index",
        "CREATE INDEX IF NOT EXISTS idx_follows_followee ON follows(followee_id)",
    ),
    (
        "posts table",
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            spoiler_of TEXT,
            nsfw INTEGER NOT NULL DEFAULT 0,
            likes_count INTEGER NOT NULL DEFAULT 0 CHECK (likes_count >= 0),
            comments_count INTEGER NOT NULL DEFAULT 0 CHECK (comments_count >= 0),
            created_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "posts author index",
        "CREATE INDEX IF NOT EXISTS idx_posts_user_created ON posts(user_id, created_at DESC, id DESC)",
    ),
    (
        "post subscriptions table",
        r#"
        CREATE TABLE IF NOT EXISTS post_subscriptions (
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            PRIMARY KEY (user_id, post_id)
        )
        "#,
    ),
    (
        "post subscriptions post index",
        "CREATE INDEX IF NOT EXISTS idx_post_subscriptions_post ON post_subscriptions(post_id)",
    ),
    (
        "post likes table",
        r#"
        CREATE TABLE IF NOT EXISTS post_likes (
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            PRIMARY KEY (user_id, post_id)
        )
        "#,
    ),
    (
        "post likes post index",
        "CREATE INDEX IF NOT EXISTS idx_post_likes_post ON post_likes(post_id)",
    ),
    (
        "timeline table",
        r#"
        CREATE TABLE IF NOT EXISTS timeline (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            UNIQUE (user_id, post_id)
        )
        "#,
    ),
    (
        "timeline post index",
        "CREATE INDEX IF NOT EXISTS idx_timeline_post ON timeline(post_id)",
    ),
    (
        "comments table",
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "comments post index",
        "CREATE INDEX IF NOT EXISTS idx_comments_post_created ON comments(post_id, created_at DESC, id DESC)",
    ),
    (
        "notifications table",
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            actor_ids TEXT NOT NULL,
            kind TEXT NOT NULL,
            post_id INTEGER REFERENCES posts(id) ON DELETE CASCADE,
            read_at INTEGER,
            issued_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "notifications recipient index",
        "CREATE INDEX IF NOT EXISTS idx_notifications_user_issued ON notifications(user_id, issued_at DESC, id DESC)",
    ),
    (
        "unread notifications unique index",
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS unique_unread_notifications
        ON notifications(user_id, kind, COALESCE(post_id, 0))
        WHERE read_at IS NULL
        "#,
    ),
    (
        "verification codes table",
        r#"
        CREATE TABLE IF NOT EXISTS verification_codes (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    ),
];

/// Connection pool plus the retry policy applied to write transactions
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    retry: RetryConfig,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig, retry: RetryConfig) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| AppError::Internal(format!("Invalid database url {}: {}", config.url, e)))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to connect to {}: {}", config.url, e)))?;

        info!("Connected to {} (max {} connections)", config.url, config.max_connections);
        Ok(Self { pool, retry })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates tables and indexes that do not exist yet
    pub async fn initialize(&self) -> AppResult<()> {
        for (name, statement) in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to create {}: {}", name, e)))?;
        }
        debug!("Schema initialized ({} statements)", SCHEMA.len());
        Ok(())
    }

    /// Runs `body` in a transaction, re-running it from scratch on conflict.
    ///
    /// The body is called once per attempt, so it must not move captured state
    /// out; clone what the future needs. Any error other than `Conflict`
    /// rolls back and is returned as-is. Exhausting the attempts yields
    /// `Internal`.
    pub async fn execute_tx<T, F>(&self, op: &'static str, mut body: F) -> AppResult<T>
    where
        T: Send,
        F: for<'c> FnMut(&'c mut Transaction<'static, Sqlite>) -> BoxFuture<'c, AppResult<T>>
            + Send,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.run_once(&mut body).await {
                Err(err) if err.is_conflict() => {
                    if attempt >= max_attempts {
                        error!("{} gave up after {} attempts: {}", op, attempt, err);
                        return Err(AppError::Internal(format!(
                            "{}: retries exhausted: {}",
                            op, err
                        )));
                    }
                    let delay = backoff_delay(&self.retry, attempt);
                    debug!("{} conflicted (attempt {}), retrying in {:?}", op, attempt, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn run_once<T, F>(&self, body: &mut F) -> AppResult<T>
    where
        F: for<'c> FnMut(&'c mut Transaction<'static, Sqlite>) -> BoxFuture<'c, AppResult<T>>,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::storage("could not begin tx", e))?;

        // Dropping the transaction on error rolls it back.
        let value = body(&mut tx).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::storage("could not commit tx", e))?;
        Ok(value)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Exponential backoff with up to 50% random jitter, capped at `max_delay_ms`
fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let base = retry
        .base_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(retry.max_delay_ms);
    let jitter = if base > 1 {
        rand::rng().random_range(0..=base / 2)
    } else {
        0
    };
    Duration::from_millis(base.saturating_add(jitter).min(retry.max_delay_ms.max(1)))
}
