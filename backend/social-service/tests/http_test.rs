mod common;

use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};

use common::TestApp;
use social_service::handlers::{self, USER_ID_HEADER};

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(handlers::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn health_endpoint() {
    let ctx = TestApp::new();
    let app = app!(ctx.state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn create_like_and_read_back() {
    let ctx = TestApp::new();
    let alice = ctx.register("alice").await;
    let bob = ctx.register("bob").await;
    let app = app!(ctx.state);

    let req = test::TestRequest::post()
        .uri("/api/v1/contents")
        .insert_header((USER_ID_HEADER, alice.id.to_string()))
        .set_json(json!({ "body": "hello #fun @bob" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let post: Value = test::read_body_json(resp).await;
    let post_id = post["id"].as_str().unwrap().to_string();
    assert_eq!(post["hashtags"], json!(["fun"]));

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/contents/post/{}/like", post_id))
        .insert_header((USER_ID_HEADER, bob.id.to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let liked: Value = test::read_body_json(resp).await;
    assert_eq!(liked["amt_likes"], 1);

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications")
        .insert_header((USER_ID_HEADER, alice.id.to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let inbox: Value = test::read_body_json(resp).await;
    assert_eq!(inbox.as_array().unwrap().len(), 1);

    let req = test::TestRequest::get()
        .uri("/api/v1/feed?filter=popular&limit=5")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let feed: Value = test::read_body_json(resp).await;
    assert_eq!(feed[0]["type"], "POST");
    assert_eq!(feed[0]["id"], post_id.as_str());
}

#[actix_web::test]
async fn anonymous_mutation_is_unauthorized() {
    let ctx = TestApp::new();
    let app = app!(ctx.state);

    let req = test::TestRequest::post()
        .uri("/api/v1/contents")
        .set_json(json!({ "body": "hi" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], 401);

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications")
        .insert_header((USER_ID_HEADER, "not-a-uuid"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn follow_by_username() {
    let ctx = TestApp::new();
    let alice = ctx.register("alice").await;
    ctx.register("bob").await;
    let app = app!(ctx.state);

    let follow = || {
        test::TestRequest::post()
            .uri("/api/v1/users/bob/follow")
            .insert_header((USER_ID_HEADER, alice.id.to_string()))
            .to_request()
    };

    let resp = test::call_service(&app, follow()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = test::call_service(&app, follow()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::delete()
        .uri("/api/v1/users/bob/follow")
        .insert_header((USER_ID_HEADER, alice.id.to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/v1/users/nobody/follow")
        .insert_header((USER_ID_HEADER, alice.id.to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn register_validates_username() {
    let ctx = TestApp::new();
    let app = app!(ctx.state);

    let req = test::TestRequest::post()
        .uri("/api/v1/users")
        .set_json(json!({ "username": "ok_name", "verification": "VERIFIED" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/api/v1/users")
        .set_json(json!({ "username": "OK_NAME" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/api/v1/users")
        .set_json(json!({ "username": "x" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unknown_feed_filter_is_bad_request() {
    let ctx = TestApp::new();
    let app = app!(ctx.state);

    let req = test::TestRequest::get()
        .uri("/api/v1/feed?filter=newest")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn delete_notification_is_recipient_only() {
    let ctx = TestApp::new();
    let alice = ctx.register("alice").await;
    let bob = ctx.register("bob").await;
    ctx.state.counters.follow(Some(&bob), alice.id).await.unwrap();
    let notification = ctx.store.all_notifications().await.remove(0);
    let app = app!(ctx.state);

    let uri = format!("/api/v1/notifications/{}", notification.id);
    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header((USER_ID_HEADER, bob.id.to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header((USER_ID_HEADER, alice.id.to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(ctx.store.notification_count().await, 0);
}

#[actix_web::test]
async fn oversized_paging_is_bad_request() {
    let ctx = TestApp::new();
    let alice = ctx.register("alice").await;
    let post = ctx.post(&alice, "root").await;
    let app = app!(ctx.state);

    for uri in [
        "/api/v1/feed?page=18446744073709551615".to_string(),
        "/api/v1/hashtags/trending?page=9223372036854775807&limit=100".to_string(),
        format!("/api/v1/contents/post/{}/comments?limit=1000", post.id),
        format!("/api/v1/contents/post/{}/comments?page=18446744073709551615", post.id),
    ] {
        let req = test::TestRequest::get().uri(&uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[actix_web::test]
async fn profile_and_account_lifecycle() {
    let ctx = TestApp::new();
    let alice = ctx.register("alice").await;
    let bob = ctx.register("bob").await;
    let app = app!(ctx.state);

    let req = test::TestRequest::put()
        .uri("/api/v1/profile")
        .insert_header((USER_ID_HEADER, alice.id.to_string()))
        .set_json(json!({ "first_name": "Alice", "biography": "hi" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let user: Value = test::read_body_json(resp).await;
    assert_eq!(user["profile"]["first_name"], "Alice");

    let req = test::TestRequest::put()
        .uri("/api/v1/profile/picture")
        .insert_header((USER_ID_HEADER, alice.id.to_string()))
        .set_json(json!({ "media": { "filename": "me.png", "data": "AQID" } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let user: Value = test::read_body_json(resp).await;
    assert_eq!(user["profile"]["profile_picture"], "/uploads/alice.png");

    let req = test::TestRequest::put()
        .uri("/api/v1/profile/background")
        .insert_header((USER_ID_HEADER, alice.id.to_string()))
        .set_json(json!({ "media": null }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::delete()
        .uri("/api/v1/users/alice")
        .insert_header((USER_ID_HEADER, bob.id.to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri("/api/v1/users/alice")
        .insert_header((USER_ID_HEADER, alice.id.to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/v1/users/alice").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(!ctx.uploads.path().join("alice.png").exists());
}

#[actix_web::test]
async fn hashtag_contents_endpoint() {
    let ctx = TestApp::new();
    let alice = ctx.register("alice").await;
    let post = ctx.post(&alice, "party #Fun").await;
    ctx.comment(&alice, post.reference(), "more #fun").await;
    ctx.post(&alice, "#other").await;
    let app = app!(ctx.state);

    let req = test::TestRequest::get()
        .uri("/api/v1/hashtags/fun/contents")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let found: Value = test::read_body_json(resp).await;
    assert_eq!(found.as_array().unwrap().len(), 2);
}
