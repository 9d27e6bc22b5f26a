// Core types and primitives
pub mod pagination;
pub mod strong_types;
pub mod text;

pub use pagination::{decode_cursor, normalize_page_size, Cursor, Keyed, Page};
pub use strong_types::{
    current_time_millis, millis_to_datetime, CommentId, NotificationId, PostId, TimelineItemId,
    UserId,
};
pub use text::TextRules;
