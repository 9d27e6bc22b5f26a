// Services - the feed's business logic on top of the database

pub mod comment_service;
pub mod engagement_service;
pub mod fanout_service;
pub mod jobs;
pub mod mentions;
pub mod notification_service;
pub mod post_service;
pub mod queries;
pub mod social_graph;
pub mod timeline_service;

pub use comment_service::CommentService;
pub use engagement_service::EngagementService;
pub use fanout_service::{FanOutReport, FanOutService};
pub use jobs::PostCommitJobs;
pub use mentions::{MentionParser, RegexMentionParser};
pub use notification_service::NotificationService;
pub use post_service::PostService;
pub use social_graph::{SocialGraph, SqliteSocialGraph};
pub use timeline_service::TimelineService;
