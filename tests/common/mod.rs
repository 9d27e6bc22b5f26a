// Shared harness: a fully wired AppState over a throwaway SQLite file
#![allow(dead_code)]

use feedline::{
    config::{AuthConfig, Config, DatabaseConfig, RetryConfig, WorkerConfig},
    core::{PostId, UserId},
    AppState,
};
use tempfile::TempDir;

pub struct TestApp {
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = Config {
            database: DatabaseConfig {
                url: format!("sqlite:{}", dir.path().join("feedline.db").display()),
                ..DatabaseConfig::default()
            },
            worker: WorkerConfig {
                workers: 2,
                queue_capacity: 1024,
            },
            retry: RetryConfig {
                max_attempts: 20,
                base_delay_ms: 2,
                max_delay_ms: 50,
            },
            auth: AuthConfig { dev_tokens: true },
            ..Config::default()
        };
        let state = AppState::new(config).await.unwrap();
        Self { state, _dir: dir }
    }

    /// Inserts a user the way the identity service would
    pub async fn user(&self, id: i64, username: &str) -> UserId {
        sqlx::query("INSERT INTO users (id, username) VALUES (?, ?)")
            .bind(id)
            .bind(username)
            .execute(self.state.db.pool())
            .await
            .unwrap();
        UserId(id)
    }

    pub async fn follow(&self, follower: UserId, followee: UserId) {
        sqlx::query("INSERT INTO follows (follower_id, followee_id) VALUES (?, ?)")
            .bind(follower)
            .bind(followee)
            .execute(self.state.db.pool())
            .await
            .unwrap();
    }

    /// Publishes a post and returns its id
    pub async fn post(&self, author: UserId, content: &str) -> PostId {
        self.state
            .posts
            .create_post(author, content, None, false)
            .await
            .unwrap()
            .post_id
    }

    /// Writes a post row directly with a fixed timestamp, bypassing fan-out
    pub async fn post_at(&self, id: i64, author: UserId, created_at: i64) -> PostId {
        sqlx::query("INSERT INTO posts (id, user_id, content, created_at) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(author)
            .bind(format!("post {}", id))
            .bind(created_at)
            .execute(self.state.db.pool())
            .await
            .unwrap();
        PostId(id)
    }

    /// Waits for every queued background job to finish. The queue accepts
    /// nothing afterwards.
    pub async fn drain(&self) {
        self.state.queue.shutdown().await;
    }

    pub async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar(sql)
            .fetch_one(self.state.db.pool())
            .await
            .unwrap()
    }

    pub async fn timeline_owners(&self, post_id: PostId) -> Vec<UserId> {
        sqlx::query_scalar("SELECT user_id FROM timeline WHERE post_id = ? ORDER BY user_id")
            .bind(post_id)
            .fetch_all(self.state.db.pool())
            .await
            .unwrap()
    }
}
