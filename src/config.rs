use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub worker: WorkerConfig,
    pub retry: RetryConfig,
    pub sweeper: SweeperConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:data/feedline.db".to_string(),
            max_connections: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Node id embedded in generated identifiers; unique per running process
    pub node_id: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            node_id: 1,
        }
    }
}

/// Background queue sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
        }
    }
}

/// Bounded retry for conflicting transactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Base delay for exponential backoff (ms)
    pub base_delay_ms: u64,
    /// Maximum backoff delay (ms)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 10,
            max_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    pub interval_secs: u64,
    /// How long a verification code stays valid
    pub code_lifespan_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: 24 * 60 * 60, // 24 hours
            code_lifespan_secs: 15 * 60, // 15 minutes
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Accept raw user ids as bearer tokens. Development only.
    pub dev_tokens: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database = DatabaseConfig::default();
        let server = ServerConfig::default();
        let worker = WorkerConfig::default();
        let retry = RetryConfig::default();
        let sweeper = SweeperConfig::default();

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(database.url),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", database.max_connections),
                busy_timeout_ms: env_or("DATABASE_BUSY_TIMEOUT_MS", database.busy_timeout_ms),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(server.host),
                port: env_or("SERVER_PORT", server.port),
                node_id: env_or("NODE_ID", server.node_id),
            },
            worker: WorkerConfig {
                workers: env_or("WORKER_COUNT", worker.workers),
                queue_capacity: env_or("WORKER_QUEUE_CAPACITY", worker.queue_capacity),
            },
            retry: RetryConfig {
                max_attempts: env_or("TX_MAX_ATTEMPTS", retry.max_attempts),
                base_delay_ms: env_or("TX_BASE_DELAY_MS", retry.base_delay_ms),
                max_delay_ms: env_or("TX_MAX_DELAY_MS", retry.max_delay_ms),
            },
            sweeper: SweeperConfig {
                interval_secs: env_or("SWEEPER_INTERVAL_SECS", sweeper.interval_secs),
                code_lifespan_secs: env_or("VERIFICATION_CODE_LIFESPAN_SECS", sweeper.code_lifespan_secs),
            },
            auth: AuthConfig {
                dev_tokens: env_or("AUTH_DEV_TOKENS", false),
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Reads and parses an environment variable, falling back to `default` when it
/// is unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
