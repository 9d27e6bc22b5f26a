// Queries - viewer-aware read statements
// Two fixed post projections: one computes the viewer flags with bound
// parameters, the other returns constant false. Nothing user-supplied is
// ever spliced into SQL text.

use sqlx::{QueryBuilder, Sqlite};

use crate::core::{Cursor, UserId};

const POST_COLUMNS: &str = "posts.id, posts.content, posts.spoiler_of, posts.nsfw, \
    posts.likes_count, posts.comments_count, posts.created_at, \
    users.id AS author_id, users.username, users.avatar";

const ANONYMOUS_POST_FLAGS: &str = ", 0 AS mine, 0 AS liked, 0 AS subscribed";

const POST_JOIN: &str = " FROM posts INNER JOIN users ON users.id = posts.user_id";

fn push_post_projection(qb: &mut QueryBuilder<'static, Sqlite>, viewer: Option<UserId>) {
    qb.push(POST_COLUMNS);
    match viewer {
        Some(viewer) => {
            qb.push(", (posts.user_id = ")
                .push_bind(viewer)
                .push(") AS mine")
                .push(", EXISTS (SELECT 1 FROM post_likes WHERE post_likes.post_id = posts.id AND post_likes.user_id = ")
                .push_bind(viewer)
                .push(") AS liked")
                .push(", EXISTS (SELECT 1 FROM post_subscriptions WHERE post_subscriptions.post_id = posts.id AND post_subscriptions.user_id = ")
                .push_bind(viewer)
                .push(") AS subscribed");
        }
        None => {
            qb.push(ANONYMOUS_POST_FLAGS);
        }
    }
}

/// `SELECT <post projection> FROM posts JOIN users WHERE 1 = 1`; callers
/// append `AND ...` filters.
pub fn select_posts(viewer: Option<UserId>) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new("SELECT ");
    push_post_projection(&mut qb, viewer);
    qb.push(POST_JOIN).push(" WHERE 1 = 1");
    qb
}

/// The owner's feed: timeline items joined with their posts and authors
pub fn select_timeline(owner: UserId) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new(
        "SELECT timeline.id AS timeline_item_id, timeline.user_id AS timeline_user_id, ",
    );
    push_post_projection(&mut qb, Some(owner));
    qb.push(" FROM timeline INNER JOIN posts ON posts.id = timeline.post_id")
        .push(" INNER JOIN users ON users.id = posts.user_id")
        .push(" WHERE timeline.user_id = ")
        .push_bind(owner);
    qb
}

/// Comments of one post with their authors
pub fn select_comments(viewer: Option<UserId>) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new(
        "SELECT comments.id, comments.post_id, comments.content, comments.created_at, \
         users.id AS author_id, users.username, users.avatar",
    );
    match viewer {
        Some(viewer) => {
            qb.push(", (comments.user_id = ").push_bind(viewer).push(") AS mine");
        }
        None => {
            qb.push(", 0 AS mine");
        }
    }
    qb.push(" FROM comments INNER JOIN users ON users.id = comments.user_id WHERE 1 = 1");
    qb
}

/// Appends the keyset predicate (when paging past a cursor), newest-first
/// ordering and the page limit.
pub fn push_page(
    qb: &mut QueryBuilder<'static, Sqlite>,
    before: Option<&Cursor>,
    created_at_column: &'static str,
    id_column: &'static str,
    page_size: u32,
) {
    if let Some(cursor) = before {
        cursor.push_before(qb, created_at_column, id_column);
    }
    qb.push(" ORDER BY ")
        .push(created_at_column)
        .push(" DESC, ")
        .push(id_column)
        .push(" DESC LIMIT ")
        .push_bind(i64::from(page_size));
}
