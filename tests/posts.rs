mod common;

use common::TestApp;
use feedline::core::{Cursor, PostId, UserId};
use feedline::models::UpdatePost;
use feedline::AppError;
use std::collections::HashSet;

#[tokio::test]
async fn test_create_post_and_list_it() {
    let app = TestApp::new().await;
    let rei = app.user(1, "rei").await;

    let item = app
        .state
        .posts
        .create_post(rei, "  hello  ", None, false)
        .await
        .unwrap();
    assert_eq!(item.user_id, rei);
    let post = item.post.unwrap();
    assert_eq!(post.content, "hello");
    assert!(post.mine);
    assert!(post.subscribed);
    assert!(!post.liked);
    assert_eq!(post.likes_count, 0);
    assert_eq!(post.comments_count, 0);
    assert_eq!(post.author.username, "rei");

    let page = app.state.posts.list_posts(Some(rei), "rei", 10, None).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, post.id);
    assert_eq!(page.items[0].content, "hello");
    assert!(page.items[0].mine);
    assert!(page.items[0].subscribed);

    let cursor = Cursor::decode(page.end_cursor.as_deref().unwrap()).unwrap();
    assert_eq!(cursor.id, post.id.value());
    assert_eq!(cursor.created_at, post.created_at);

    // Author subscription and own timeline item exist.
    assert_eq!(app.count("SELECT COUNT(*) FROM post_subscriptions").await, 1);
    assert_eq!(app.timeline_owners(post.id).await, vec![rei]);
}

#[tokio::test]
async fn test_create_post_validation() {
    let app = TestApp::new().await;
    let rei = app.user(1, "rei").await;
    let posts = &app.state.posts;

    assert_eq!(
        posts.create_post(rei, "   ", None, false).await.unwrap_err(),
        AppError::invalid_content()
    );
    assert_eq!(
        posts.create_post(rei, &"x".repeat(481), None, false).await.unwrap_err(),
        AppError::invalid_content()
    );
    assert_eq!(
        posts.create_post(rei, "ok", Some("  "), false).await.unwrap_err(),
        AppError::invalid_spoiler()
    );
    assert_eq!(
        posts.create_post(rei, "ok", Some(&"s".repeat(65)), false).await.unwrap_err(),
        AppError::invalid_spoiler()
    );

    // Nothing was written by the rejected calls.
    assert_eq!(app.count("SELECT COUNT(*) FROM posts").await, 0);

    let item = posts
        .create_post(rei, &"x".repeat(480), Some(" Evangelion "), true)
        .await
        .unwrap();
    let post = item.post.unwrap();
    assert_eq!(post.spoiler_of.as_deref(), Some("Evangelion"));
    assert!(post.nsfw);
}

#[tokio::test]
async fn test_create_post_for_missing_user_is_gone() {
    let app = TestApp::new().await;
    let err = app
        .state
        .posts
        .create_post(UserId(404), "hello", None, false)
        .await
        .unwrap_err();
    assert_eq!(err, AppError::user_gone());
    assert_eq!(app.count("SELECT COUNT(*) FROM posts").await, 0);
    assert_eq!(app.count("SELECT COUNT(*) FROM timeline").await, 0);
}

#[tokio::test]
async fn test_list_posts_validation() {
    let app = TestApp::new().await;
    let posts = &app.state.posts;

    assert_eq!(
        posts.list_posts(None, "1rei", 10, None).await.unwrap_err(),
        AppError::invalid_username()
    );
    assert_eq!(
        posts.list_posts(None, "rei", 10, Some("garbage!")).await.unwrap_err(),
        AppError::invalid_cursor()
    );

    // Unknown users simply have no posts.
    let page = posts.list_posts(None, " nobody ", 0, None).await.unwrap();
    assert!(page.items.is_empty());
    assert!(page.end_cursor.is_none());
}

#[tokio::test]
async fn test_pagination_visits_every_post_once() {
    let app = TestApp::new().await;
    let rei = app.user(1, "rei").await;

    let mut created = HashSet::new();
    for n in 0..23 {
        created.insert(app.post(rei, &format!("post {}", n)).await);
    }

    for page_size in [1u32, 5, 7, 23, 50] {
        let mut seen = Vec::new();
        let mut before: Option<String> = None;
        loop {
            let page = app
                .state
                .posts
                .list_posts(None, "rei", page_size, before.as_deref())
                .await
                .unwrap();
            if page.items.is_empty() {
                assert!(page.end_cursor.is_none());
                break;
            }
            assert!(page.items.len() <= page_size as usize);
            seen.extend(page.items.iter().map(|post| (post.created_at, post.id)));
            before = page.end_cursor.clone();
        }

        assert_eq!(seen.len(), 23, "page size {}", page_size);
        let unique: HashSet<PostId> = seen.iter().map(|(_, id)| *id).collect();
        assert_eq!(unique, created);

        // Newest first, ties broken by id.
        let mut sorted = seen.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(seen, sorted);
    }
}

#[tokio::test]
async fn test_pagination_within_one_timestamp() {
    let app = TestApp::new().await;
    let rei = app.user(1, "rei").await;
    for id in [4, 1, 7, 3, 6, 2, 5] {
        app.post_at(id, rei, 1_000).await;
    }

    let mut seen = Vec::new();
    let mut before: Option<String> = None;
    loop {
        let page = app
            .state
            .posts
            .list_posts(None, "rei", 2, before.as_deref())
            .await
            .unwrap();
        if page.is_empty() {
            break;
        }
        assert!(page.items.len() <= 2);
        seen.extend(page.items.iter().map(|post| post.id.0));
        before = page.end_cursor.clone();
    }
    assert_eq!(seen, vec![7, 6, 5, 4, 3, 2, 1]);
}

#[tokio::test]
async fn test_page_size_defaults_and_clamps() {
    let app = TestApp::new().await;
    let rei = app.user(1, "rei").await;
    for n in 0..12 {
        app.post(rei, &format!("post {}", n)).await;
    }

    let page = app.state.posts.list_posts(None, "rei", 0, None).await.unwrap();
    assert_eq!(page.items.len(), 10);
    let page = app.state.posts.list_posts(None, "rei", 1000, None).await.unwrap();
    assert_eq!(page.items.len(), 12);
}

#[tokio::test]
async fn test_get_post_viewer_fields() {
    let app = TestApp::new().await;
    let rei = app.user(1, "rei").await;
    let shinji = app.user(2, "shinji").await;
    let post_id = app.post(rei, "hello").await;
    app.state.engagement.toggle_post_like(shinji, post_id).await.unwrap();

    let anonymous = app.state.posts.get_post(None, post_id).await.unwrap();
    assert!(!anonymous.mine && !anonymous.liked && !anonymous.subscribed);
    assert_eq!(anonymous.likes_count, 1);
    assert_eq!(anonymous.author.username, "rei");

    let as_shinji = app.state.posts.get_post(Some(shinji), post_id).await.unwrap();
    assert!(!as_shinji.mine);
    assert!(as_shinji.liked);
    assert!(!as_shinji.subscribed);

    let as_rei = app.state.posts.get_post(Some(rei), post_id).await.unwrap();
    assert!(as_rei.mine && as_rei.subscribed && !as_rei.liked);

    assert_eq!(
        app.state.posts.get_post(None, PostId(999)).await.unwrap_err(),
        AppError::post_not_found()
    );
}

#[tokio::test]
async fn test_update_post() {
    let app = TestApp::new().await;
    let rei = app.user(1, "rei").await;
    let shinji = app.user(2, "shinji").await;
    let post_id = app.post(rei, "hello").await;
    let posts = &app.state.posts;

    assert_eq!(
        posts.update_post(rei, post_id, UpdatePost::default()).await.unwrap_err(),
        AppError::invalid_update_post_params()
    );
    assert_eq!(
        posts
            .update_post(
                rei,
                post_id,
                UpdatePost {
                    content: Some("  ".to_string()),
                    ..UpdatePost::default()
                }
            )
            .await
            .unwrap_err(),
        AppError::invalid_content()
    );

    let updated = posts
        .update_post(
            rei,
            post_id,
            UpdatePost {
                content: Some(" edited ".to_string()),
                spoiler_of: Some("Eva".to_string()),
                nsfw: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.content, "edited");
    assert_eq!(updated.spoiler_of.as_deref(), Some("Eva"));
    assert!(!updated.nsfw);

    let updated = posts
        .update_post(
            rei,
            post_id,
            UpdatePost {
                nsfw: Some(true),
                ..UpdatePost::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.content, "edited");
    assert!(updated.nsfw);

    // Someone else's post looks missing and stays untouched.
    let err = posts
        .update_post(
            shinji,
            post_id,
            UpdatePost {
                content: Some("hijacked".to_string()),
                ..UpdatePost::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, AppError::post_not_found());
    assert_eq!(posts.get_post(None, post_id).await.unwrap().content, "edited");
}

#[tokio::test]
async fn test_delete_post() {
    let app = TestApp::new().await;
    let rei = app.user(1, "rei").await;
    let shinji = app.user(2, "shinji").await;
    let post_id = app.post(rei, "hello").await;
    app.state.engagement.toggle_post_like(shinji, post_id).await.unwrap();
    app.state
        .comments
        .create_comment(shinji, post_id, "nice")
        .await
        .unwrap();
    app.drain().await;

    // Not the owner: silently nothing.
    app.state.posts.delete_post(shinji, post_id).await.unwrap();
    assert!(app.state.posts.get_post(None, post_id).await.is_ok());

    app.state.posts.delete_post(rei, post_id).await.unwrap();
    assert_eq!(
        app.state.posts.get_post(None, post_id).await.unwrap_err(),
        AppError::post_not_found()
    );

    // Dependent rows went with it.
    for table in ["timeline", "post_likes", "post_subscriptions", "comments", "notifications"] {
        let count = app.count(&format!("SELECT COUNT(*) FROM {}", table)).await;
        assert_eq!(count, 0, "{} not cleaned up", table);
    }

    // Deleting again is still fine.
    app.state.posts.delete_post(rei, post_id).await.unwrap();
}
