mod common;

use common::{test_config, TestApp};
use social_service::domain::{ContentKind, Counter, NotificationType};
use social_service::error::ServiceError;
use social_service::repository::ContentStore;

#[tokio::test]
async fn like_is_idempotent_and_notifies_once() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let post = app.post(&alice, "hello").await;

    let first = app.state.counters.like(Some(&bob), post.reference()).await.unwrap();
    assert_eq!(first.amt_likes, 1);
    let second = app.state.counters.like(Some(&bob), post.reference()).await.unwrap();
    assert_eq!(second.amt_likes, 1);

    let likes = app.notifications_of(NotificationType::Like, alice.id).await;
    assert_eq!(likes.len(), 1);
    assert_eq!(likes[0].sender_id, bob.id);
    assert!(app.user(bob.id).await.posts.liked.contains(&post.id));
}

#[tokio::test]
async fn like_then_unlike_restores_state() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let post = app.post(&alice, "hello").await;

    app.state.counters.like(Some(&bob), post.reference()).await.unwrap();
    let after = app.state.counters.unlike(Some(&bob), post.reference()).await.unwrap();

    assert_eq!(after.amt_likes, 0);
    assert!(app.user(bob.id).await.posts.liked.is_empty());
    assert!(app.notifications_of(NotificationType::Like, alice.id).await.is_empty());
}

#[tokio::test]
async fn unlike_never_goes_below_zero() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let post = app.post(&alice, "hello").await;

    let content = app.state.counters.unlike(Some(&bob), post.reference()).await.unwrap();
    assert_eq!(content.amt_likes, 0);

    // Even a stray membership without a counted like cannot push it negative.
    app.store
        .add_user_ref(bob.id, social_service::domain::RefSet::Liked, post.reference())
        .await
        .unwrap();
    let content = app.state.counters.unlike(Some(&bob), post.reference()).await.unwrap();
    assert_eq!(content.amt_likes, 0);
}

#[tokio::test]
async fn self_like_counts_without_notification() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let post = app.post(&alice, "mine").await;

    let content = app.state.counters.like(Some(&alice), post.reference()).await.unwrap();
    assert_eq!(content.amt_likes, 1);
    assert_eq!(app.store.notification_count().await, 0);
}

#[tokio::test]
async fn like_requires_principal_and_existing_content() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let post = app.post(&alice, "hello").await;

    let err = app.state.counters.like(None, post.reference()).await.unwrap_err();
    assert!(matches!(err, ServiceError::AuthenticationRequired(_)));

    let missing = social_service::domain::ContentRef::post(uuid::Uuid::new_v4());
    let err = app.state.counters.like(Some(&alice), missing).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn duplicate_repost_is_a_conflict() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let post = app.post(&alice, "share me").await;

    let view = app.state.counters.repost(Some(&bob), post.reference()).await.unwrap();
    assert_eq!(view.amt_reposts, 1);
    assert_eq!(view.original_author_id, alice.id);

    let err = app.state.counters.repost(Some(&bob), post.reference()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let stored = app.content(post.reference()).await.unwrap();
    assert_eq!(stored.amt_reposts, 1);
    assert_eq!(app.notifications_of(NotificationType::Repost, alice.id).await.len(), 1);
    assert!(app.user(bob.id).await.posts.reposted.contains(&post.id));
}

#[tokio::test]
async fn unrepost_reverses_repost() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let post = app.post(&alice, "share me").await;

    app.state.counters.repost(Some(&bob), post.reference()).await.unwrap();
    app.state.counters.unrepost(Some(&bob), post.id).await.unwrap();

    assert_eq!(app.content(post.reference()).await.unwrap().amt_reposts, 0);
    assert!(app.user(bob.id).await.posts.reposted.is_empty());
    assert!(app.notifications_of(NotificationType::Repost, alice.id).await.is_empty());

    let err = app.state.counters.unrepost(Some(&bob), post.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn unrepost_clamps_at_zero_by_default() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let post = app.post(&alice, "drifted").await;

    app.state.counters.repost(Some(&bob), post.reference()).await.unwrap();
    // Simulate drift: the counter was already lost elsewhere.
    app.store
        .adjust_counter(post.reference(), Counter::Reposts, -1, true)
        .await
        .unwrap();

    app.state.counters.unrepost(Some(&bob), post.id).await.unwrap();
    assert_eq!(app.content(post.reference()).await.unwrap().amt_reposts, 0);
}

#[tokio::test]
async fn legacy_unrepost_can_go_negative() {
    let app = TestApp::with_config(test_config(&[("COUNTERS_LEGACY_UNCLAMPED_UNREPOST", "true")]));
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let post = app.post(&alice, "drifted").await;

    app.state.counters.repost(Some(&bob), post.reference()).await.unwrap();
    app.store
        .adjust_counter(post.reference(), Counter::Reposts, -1, true)
        .await
        .unwrap();

    app.state.counters.unrepost(Some(&bob), post.id).await.unwrap();
    assert_eq!(app.content(post.reference()).await.unwrap().amt_reposts, -1);
}

#[tokio::test]
async fn follow_then_unfollow_restores_both_sets() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;

    let followee = app.state.counters.follow(Some(&alice), bob.id).await.unwrap();
    assert!(followee.followers.contains(&alice.id));
    assert!(app.user(alice.id).await.following.contains(&bob.id));
    assert_eq!(app.notifications_of(NotificationType::Follow, bob.id).await.len(), 1);

    app.state.counters.unfollow(Some(&alice), bob.id).await.unwrap();
    assert!(app.user(alice.id).await.following.is_empty());
    assert!(app.user(bob.id).await.followers.is_empty());
    assert!(app.notifications_of(NotificationType::Follow, bob.id).await.is_empty());
}

#[tokio::test]
async fn follow_conflicts() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;

    let err = app.state.counters.follow(Some(&alice), alice.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    app.state.counters.follow(Some(&alice), bob.id).await.unwrap();
    let err = app.state.counters.follow(Some(&alice), bob.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let err = app.state.counters.unfollow(Some(&bob), alice.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let err = app
        .state
        .counters
        .follow(Some(&alice), uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn concurrent_likes_apply_once() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let post = app.post(&alice, "race").await;

    let counters = app.state.counters.clone();
    let attempts = (0..8).map(|_| {
        let counters = counters.clone();
        let bob = bob.clone();
        let target = post.reference();
        tokio::spawn(async move { counters.like(Some(&bob), target).await })
    });
    for handle in futures::future::join_all(attempts).await {
        handle.unwrap().unwrap();
    }

    assert_eq!(app.content(post.reference()).await.unwrap().amt_likes, 1);
    assert_eq!(app.notifications_of(NotificationType::Like, alice.id).await.len(), 1);
}

#[tokio::test]
async fn reconcile_repairs_drift() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let post = app.post(&alice, "counted").await;

    app.state.counters.like(Some(&bob), post.reference()).await.unwrap();
    app.comment(&bob, post.reference(), "reply").await;

    app.store
        .adjust_counter(post.reference(), Counter::Likes, 5, false)
        .await
        .unwrap();
    app.store
        .adjust_counter(post.reference(), Counter::Comments, -3, false)
        .await
        .unwrap();

    let repaired = app.state.counters.reconcile_counters(ContentKind::Post).await.unwrap();
    assert_eq!(repaired, 1);

    let stored = app.content(post.reference()).await.unwrap();
    assert_eq!((stored.amt_likes, stored.amt_comments, stored.amt_reposts), (1, 1, 0));

    let repaired = app.state.counters.reconcile_counters(ContentKind::Post).await.unwrap();
    assert_eq!(repaired, 0);
}
