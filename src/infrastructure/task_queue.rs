// Task Queue - bounded background worker pool for post-commit side effects
// Requests submit jobs without waiting; when the queue is full the job is
// dropped and logged. Shutdown closes the queue and waits for queued jobs.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::core::{PostId, UserId};

/// Work scheduled after a write commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Copy a new post into every follower's timeline
    FanOut { post_id: PostId, author_id: UserId },
    /// Notify users mentioned in a new post
    PostMentions {
        post_id: PostId,
        author_id: UserId,
        content: String,
    },
    /// Notify subscribers and mentioned users about a new comment
    CommentCreated {
        post_id: PostId,
        commenter_id: UserId,
        content: String,
    },
    /// Notify the post author about a like
    PostLiked { post_id: PostId, liker_id: UserId },
    /// Notify a user about a new follower
    FollowCreated {
        follower_id: UserId,
        followee_id: UserId,
    },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::FanOut { .. } => "fan_out",
            Job::PostMentions { .. } => "post_mentions",
            Job::CommentCreated { .. } => "comment_created",
            Job::PostLiked { .. } => "post_liked",
            Job::FollowCreated { .. } => "follow_created",
        }
    }
}

/// Executes jobs. Failures are the handler's to log; nothing is retried.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: Job);
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub submitted: u64,
    pub dropped: u64,
    pub completed: u64,
}

pub struct TaskQueue {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl TaskQueue {
    /// Spawns the worker pool. Must be called from within a tokio runtime.
    pub fn start(config: &WorkerConfig, handler: Arc<dyn JobHandler>) -> Self {
        let capacity = config.queue_capacity.max(1);
        let worker_count = config.workers.max(1);
        let (sender, receiver) = mpsc::channel::<Job>(capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let counters = Arc::new(Counters::default());

        let workers = (0..worker_count)
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let handler = Arc::clone(&handler);
                let counters = Arc::clone(&counters);
                tokio::spawn(async move {
                    loop {
                        let job = { receiver.lock().await.recv().await };
                        let Some(job) = job else {
                            break;
                        };
                        debug!("worker {} running {}", worker_id, job.name());
                        handler.handle(job).await;
                        counters.completed.fetch_add(1, Ordering::Relaxed);
                    }
                    debug!("worker {} stopped", worker_id);
                })
            })
            .collect();

        info!(
            "Task queue started with {} workers (capacity {})",
            worker_count, capacity
        );

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            counters,
        }
    }

    /// Enqueues a job without waiting. Returns false when the job was shed.
    pub fn submit(&self, job: Job) -> bool {
        let sender = match self.sender.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let Some(sender) = sender else {
            warn!("Task queue is shut down, dropping {}", job.name());
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        match sender.try_send(job) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(job)) => {
                warn!("Task queue full, dropping {}", job.name());
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(job)) => {
                warn!("Task queue closed, dropping {}", job.name());
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Closes the queue and waits for the workers to finish what was queued
    pub async fn shutdown(&self) {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(sender);

        let workers = match self.workers.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Task queue worker failed: {}", e);
            }
        }
        info!("Task queue drained: {:?}", self.stats());
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
        }
    }
}
