// Verification Sweeper - periodic deletion of expired verification codes

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::SweeperConfig;
use crate::core::current_time_millis;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::Database;

/// Deletes every code whose lifespan has elapsed at `now_millis`.
/// Returns the number of deleted codes.
pub async fn delete_expired_verification_codes(
    db: &Database,
    lifespan: Duration,
    now_millis: i64,
) -> AppResult<u64> {
    let lifespan_millis = i64::try_from(lifespan.as_millis()).unwrap_or(i64::MAX);
    let cutoff = now_millis.saturating_sub(lifespan_millis);

    let result = sqlx::query("DELETE FROM verification_codes WHERE created_at <= ?")
        .bind(cutoff)
        .execute(db.pool())
        .await
        .map_err(|e| AppError::storage("could not delete expired verification codes", e))?;

    Ok(result.rows_affected())
}

/// Handle to the running sweeper task
pub struct VerificationSweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl VerificationSweeper {
    /// Spawns the sweeper. The first sweep runs immediately.
    pub fn start(db: Database, config: &SweeperConfig) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let period = Duration::from_secs(config.interval_secs.max(1));
        let lifespan = Duration::from_secs(config.code_lifespan_secs);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match delete_expired_verification_codes(&db, lifespan, current_time_millis()).await {
                            Ok(0) => debug!("No expired verification codes"),
                            Ok(deleted) => info!("Deleted {} expired verification codes", deleted),
                            Err(e) => error!("Verification code sweep failed: {}", e),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Verification sweeper stopped");
        });

        info!("Verification sweeper started (every {:?})", period);
        Self { shutdown, handle }
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            error!("Verification sweeper task failed: {}", e);
        }
    }
}
