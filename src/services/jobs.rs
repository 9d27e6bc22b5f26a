// Job dispatch - routes background jobs to the fan-out and notification services

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::infrastructure::{Job, JobHandler};
use crate::services::fanout_service::FanOutService;
use crate::services::notification_service::NotificationService;

/// Runs queued jobs. Failures are logged and dropped.
#[derive(Clone)]
pub struct PostCommitJobs {
    fanout: FanOutService,
    notifications: NotificationService,
}

impl PostCommitJobs {
    pub fn new(fanout: FanOutService, notifications: NotificationService) -> Self {
        Self {
            fanout,
            notifications,
        }
    }
}

#[async_trait]
impl JobHandler for PostCommitJobs {
    async fn handle(&self, job: Job) {
        let name = job.name();
        let result = match job {
            Job::FanOut { post_id, author_id } => {
                self.fanout.fan_out(post_id, author_id).await.map(|_| ())
            }
            Job::PostMentions {
                post_id,
                author_id,
                content,
            } => self
                .notifications
                .post_mentions(post_id, author_id, &content)
                .await
                .map(|notified| debug!("{} mention notifications for post {}", notified, post_id)),
            Job::CommentCreated {
                post_id,
                commenter_id,
                content,
            } => self
                .notifications
                .comment_created(post_id, commenter_id, &content)
                .await
                .map(|notified| debug!("{} comment notifications for post {}", notified, post_id)),
            Job::PostLiked { post_id, liker_id } => self
                .notifications
                .post_liked(post_id, liker_id)
                .await
                .map(|_| ()),
            Job::FollowCreated {
                follower_id,
                followee_id,
            } => self
                .notifications
                .follow_created(follower_id, followee_id)
                .await
                .map(|_| ()),
        };

        if let Err(e) = result {
            warn!("Background job {} failed: {}", name, e);
        }
    }
}
