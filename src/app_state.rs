use std::sync::Arc;
use tracing::info;

use crate::{
    config::Config,
    core::{TextRules, UserId},
    infrastructure::{
        middleware::HasTokenVerifier, Database, DevTokenVerifier, DisabledTokenVerifier,
        IdGenerator, Job, TaskQueue, TokenVerifier,
    },
    services::{
        CommentService, EngagementService, FanOutService, MentionParser, NotificationService,
        PostCommitJobs, PostService, RegexMentionParser, SocialGraph, SqliteSocialGraph,
        TimelineService,
    },
};

/// Everything the handlers need. Built once at startup; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub queue: Arc<TaskQueue>,
    pub posts: PostService,
    pub engagement: EngagementService,
    pub comments: CommentService,
    pub timeline: TimelineService,
    pub notifications: NotificationService,
    pub fanout: FanOutService,
    pub token_verifier: Arc<dyn TokenVerifier>,
}

impl AppState {
    /// Connects to the database, creates the schema, compiles the text rules
    /// and starts the background workers.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db = Database::connect(&config.database, config.retry.clone()).await?;
        db.initialize().await?;

        let graph: Arc<dyn SocialGraph> = Arc::new(SqliteSocialGraph::new(db.clone()));
        Self::with_graph(config, db, graph)
    }

    /// Builds the state on an initialized database with the given follower source
    pub fn with_graph(
        config: Config,
        db: Database,
        graph: Arc<dyn SocialGraph>,
    ) -> anyhow::Result<Self> {
        let ids = Arc::new(IdGenerator::new(config.server.node_id));
        let rules = Arc::new(TextRules::new()?);
        let mentions: Arc<dyn MentionParser> = Arc::new(RegexMentionParser::new()?);

        let notifications = NotificationService::new(db.clone(), Arc::clone(&ids), mentions);
        let fanout = FanOutService::new(db.clone(), Arc::clone(&ids), graph);

        let jobs = Arc::new(PostCommitJobs::new(fanout.clone(), notifications.clone()));
        let queue = Arc::new(TaskQueue::start(&config.worker, jobs));

        let posts = PostService::new(
            db.clone(),
            Arc::clone(&ids),
            Arc::clone(&rules),
            Arc::clone(&queue),
        );
        let engagement = EngagementService::new(db.clone(), Arc::clone(&queue));
        let comments = CommentService::new(db.clone(), ids, rules, Arc::clone(&queue));
        let timeline = TimelineService::new(db.clone());

        let token_verifier: Arc<dyn TokenVerifier> = if config.auth.dev_tokens {
            info!("Development bearer tokens enabled");
            Arc::new(DevTokenVerifier)
        } else {
            Arc::new(DisabledTokenVerifier)
        };

        Ok(Self {
            config,
            db,
            queue,
            posts,
            engagement,
            comments,
            timeline,
            notifications,
            fanout,
            token_verifier,
        })
    }

    /// Reported by the identity service when `follower` starts following `followee`
    pub fn follow_created(&self, follower_id: UserId, followee_id: UserId) -> bool {
        self.queue.submit(Job::FollowCreated {
            follower_id,
            followee_id,
        })
    }

    /// Drains the background queue and closes the pool
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
        self.db.close().await;
    }
}

impl HasTokenVerifier for AppState {
    fn token_verifier(&self) -> &Arc<dyn TokenVerifier> {
        &self.token_verifier
    }
}
