mod common;

use async_trait::async_trait;
use common::TestApp;
use feedline::core::{TimelineItemId, UserId};
use feedline::infrastructure::IdGenerator;
use feedline::services::{FanOutReport, FanOutService, SocialGraph};
use feedline::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Follower list fixed up front, including users the store has never seen
struct StaticGraph(Vec<UserId>);

#[async_trait]
impl SocialGraph for StaticGraph {
    async fn followers(&self, _user_id: UserId) -> AppResult<Vec<UserId>> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_followers_receive_new_posts() {
    let app = TestApp::new().await;
    let rei = app.user(1, "rei").await;
    let shinji = app.user(2, "shinji").await;
    let asuka = app.user(3, "asuka").await;
    let misato = app.user(4, "misato").await;
    app.follow(shinji, rei).await;
    app.follow(asuka, rei).await;
    app.follow(rei, misato).await;

    let post_id = app.post(rei, "hello").await;
    app.drain().await;

    assert_eq!(app.timeline_owners(post_id).await, vec![rei, shinji, asuka]);

    // Followers see the post, not the author's own flags.
    let page = app.state.timeline.list_timeline(shinji, 10, None).await.unwrap();
    assert_eq!(page.items.len(), 1);
    let item = &page.items[0];
    assert_eq!(item.user_id, shinji);
    assert_eq!(item.post_id, post_id);
    let post = item.post.as_ref().unwrap();
    assert_eq!(post.content, "hello");
    assert!(!post.mine);
    assert!(!post.subscribed);

    let page = app.state.timeline.list_timeline(misato, 10, None).await.unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_fan_out_is_idempotent() {
    let app = TestApp::new().await;
    let rei = app.user(1, "rei").await;
    let shinji = app.user(2, "shinji").await;
    let asuka = app.user(3, "asuka").await;
    app.follow(shinji, rei).await;
    app.follow(asuka, rei).await;

    let post_id = app.post(rei, "hello").await;
    app.drain().await;

    let report = app.state.fanout.fan_out(post_id, rei).await.unwrap();
    assert_eq!(
        report,
        FanOutReport {
            inserted: 0,
            already_present: 2,
            failed: 0
        }
    );
    assert_eq!(app.count("SELECT COUNT(*) FROM timeline").await, 3);
}

#[tokio::test]
async fn test_fan_out_skips_author_and_survives_failures() {
    let app = TestApp::new().await;
    let rei = app.user(1, "rei").await;
    let shinji = app.user(2, "shinji").await;
    let post_id = app.post(rei, "hello").await;
    app.drain().await;

    let graph = StaticGraph(vec![rei, UserId(404), shinji]);
    let fanout = FanOutService::new(
        app.state.db.clone(),
        Arc::new(IdGenerator::new(7)),
        Arc::new(graph),
    );

    let report = fanout.fan_out(post_id, rei).await.unwrap();
    assert_eq!(
        report,
        FanOutReport {
            inserted: 1,
            already_present: 0,
            failed: 1
        }
    );
    assert_eq!(app.timeline_owners(post_id).await, vec![rei, shinji]);
}

#[tokio::test]
async fn test_timeline_order_and_paging() {
    let app = TestApp::new().await;
    let rei = app.user(1, "rei").await;
    let shinji = app.user(2, "shinji").await;
    app.follow(shinji, rei).await;

    let mut expected = Vec::new();
    for n in 0..5 {
        expected.push(app.post(rei, &format!("rei {}", n)).await);
        tokio::time::sleep(Duration::from_millis(3)).await;
        expected.push(app.post(shinji, &format!("shinji {}", n)).await);
        tokio::time::sleep(Duration::from_millis(3)).await;
    }
    expected.reverse();
    app.drain().await;

    let mut seen = Vec::new();
    let mut before: Option<String> = None;
    loop {
        let page = app
            .state
            .timeline
            .list_timeline(shinji, 3, before.as_deref())
            .await
            .unwrap();
        if page.is_empty() {
            break;
        }
        before = page.end_cursor.clone();
        seen.extend(page.items.into_iter().map(|item| item.post_id));
    }
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_timeline_paging_within_one_timestamp() {
    let app = TestApp::new().await;
    let rei = app.user(1, "rei").await;
    let shinji = app.user(2, "shinji").await;

    // Item ids disagree with post ids on purpose; items order by their own id.
    let rows = [(11, 105), (12, 101), (13, 104), (14, 102), (15, 106), (16, 103)];
    for (item_id, post_id) in rows {
        app.post_at(post_id, rei, 1_000).await;
        sqlx::query("INSERT INTO timeline (id, user_id, post_id) VALUES (?, ?, ?)")
            .bind(item_id)
            .bind(shinji)
            .bind(post_id)
            .execute(app.state.db.pool())
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut before: Option<String> = None;
    loop {
        let page = app
            .state
            .timeline
            .list_timeline(shinji, 2, before.as_deref())
            .await
            .unwrap();
        if page.is_empty() {
            break;
        }
        before = page.end_cursor.clone();
        seen.extend(page.items.into_iter().map(|item| (item.id.0, item.post_id.0)));
    }
    assert_eq!(
        seen,
        vec![(16, 103), (15, 106), (14, 102), (13, 104), (12, 101), (11, 105)]
    );
}

#[tokio::test]
async fn test_delete_timeline_item() {
    let app = TestApp::new().await;
    let rei = app.user(1, "rei").await;
    let shinji = app.user(2, "shinji").await;
    app.follow(shinji, rei).await;
    let post_id = app.post(rei, "hello").await;
    app.drain().await;

    let page = app.state.timeline.list_timeline(shinji, 10, None).await.unwrap();
    let item_id = page.items[0].id;

    // Someone else's item is left alone.
    app.state.timeline.delete_timeline_item(rei, item_id).await.unwrap();
    assert_eq!(app.timeline_owners(post_id).await, vec![rei, shinji]);

    app.state.timeline.delete_timeline_item(shinji, item_id).await.unwrap();
    assert!(app.state.timeline.list_timeline(shinji, 10, None).await.unwrap().is_empty());

    // The post and the author's feed are untouched.
    assert!(app.state.posts.get_post(None, post_id).await.is_ok());
    assert_eq!(app.timeline_owners(post_id).await, vec![rei]);

    app.state
        .timeline
        .delete_timeline_item(shinji, TimelineItemId(1))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_timeline_rejects_bad_cursor() {
    let app = TestApp::new().await;
    let shinji = app.user(2, "shinji").await;
    let err = app
        .state
        .timeline
        .list_timeline(shinji, 10, Some("not a cursor"))
        .await
        .unwrap_err();
    assert_eq!(err, AppError::invalid_cursor());
}
