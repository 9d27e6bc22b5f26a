// Domain records returned by the stores and serialized at the HTTP boundary

pub mod comment;
pub mod notification;
pub mod post;
pub mod timeline;
pub mod user;

pub use comment::Comment;
pub use notification::{Notification, NotificationKind};
pub use post::{Post, ToggleLikeOutput, ToggleSubscriptionOutput, UpdatePost, UpdatedPostFields};
pub use timeline::TimelineItem;
pub use user::UserSummary;
