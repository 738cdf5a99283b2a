mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::Value;

use blog_service::db::BlogStore;
use blog_service::models::NewComment;
use common::{auth, init_app, TestContext};

fn texts(page: &Value) -> Vec<String> {
    page["items"]
        .as_array()
        .expect("items")
        .iter()
        .map(|p| p["text"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[actix_web::test]
async fn index_pages_by_ten_newest_first() {
    let ctx = TestContext::new();
    let leo = ctx.user("leo").await;
    for i in 0..13 {
        ctx.post(&leo, &format!("post {}", i), None).await;
    }
    let app = init_app(&ctx).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let page = &body["page"];
    assert_eq!(page["count"], 13);
    assert_eq!(page["num_pages"], 2);
    assert_eq!(page["has_next"], true);
    let first = texts(page);
    assert_eq!(first.len(), 10);
    assert_eq!(first[0], "post 12");
    assert_eq!(first[9], "post 3");

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/?page=2").to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(texts(&body["page"]), vec!["post 2", "post 1", "post 0"]);
}

#[actix_web::test]
async fn index_page_fallbacks() {
    let ctx = TestContext::new();
    let leo = ctx.user("leo").await;
    for i in 0..13 {
        ctx.post(&leo, &format!("post {}", i), None).await;
    }
    let app = init_app(&ctx).await;

    for (uri, expected) in [("/?page=abc", 1), ("/?page=99", 2), ("/?page=0", 2)] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["page"]["number"], expected, "{}", uri);
    }
}

#[actix_web::test]
async fn empty_index_has_one_empty_page() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["page"]["num_pages"], 1);
    assert_eq!(body["page"]["number"], 1);
    assert!(texts(&body["page"]).is_empty());
}

#[actix_web::test]
async fn group_feed_shows_twelve_most_recent_two_per_page() {
    let ctx = TestContext::new();
    let leo = ctx.user("leo").await;
    let cats = ctx.group("cats").await;
    let dogs = ctx.group("dogs").await;
    for i in 0..15 {
        ctx.post(&leo, &format!("cat {}", i), Some(cats.id)).await;
    }
    ctx.post(&leo, "dog 0", Some(dogs.id)).await;
    let app = init_app(&ctx).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/group/cats/").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["group"]["slug"], "cats");
    assert_eq!(body["page"]["count"], 12);
    assert_eq!(body["page"]["num_pages"], 6);
    assert_eq!(texts(&body["page"]), vec!["cat 14", "cat 13"]);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/group/cats/?page=6").to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(texts(&body["page"]), vec!["cat 4", "cat 3"]);
    assert_eq!(body["page"]["has_next"], false);
}

#[actix_web::test]
async fn unknown_group_is_not_found() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/group/nope/").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn profile_pages_by_five_and_reports_follow_state() {
    let ctx = TestContext::new();
    let leo = ctx.user("leo").await;
    let ann = ctx.user("ann").await;
    for i in 0..7 {
        ctx.post(&leo, &format!("leo {}", i), None).await;
    }
    ctx.post(&ann, "ann 0", None).await;
    ctx.store.create_follow(ann.id, leo.id).await.unwrap();
    let app = init_app(&ctx).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/leo/")
            .insert_header(auth(&ann))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user_profile"]["username"], "leo");
    assert_eq!(body["following"], true);
    assert_eq!(body["followers_count"], 1);
    assert_eq!(body["posts_count"], 7);
    assert_eq!(body["page"]["num_pages"], 2);
    assert_eq!(texts(&body["page"]).len(), 5);

    // anonymous and self views never report following
    let resp = test::call_service(&app, test::TestRequest::get().uri("/leo/").to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["following"], false);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/leo/")
            .insert_header(auth(&leo))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["following"], false);
}

#[actix_web::test]
async fn unknown_profile_is_not_found() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/ghost/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn post_page_lists_comments_oldest_first() {
    let ctx = TestContext::new();
    let leo = ctx.user("leo").await;
    let ann = ctx.user("ann").await;
    let post = ctx.post(&leo, "hello", None).await;
    for text in ["first!", "second"] {
        ctx.store
            .create_comment(&NewComment {
                post_id: post.id,
                author_id: ann.id,
                text: text.to_string(),
            })
            .await
            .unwrap();
    }
    let app = init_app(&ctx).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/leo/{}/", post.id))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["post"]["text"], "hello");
    assert_eq!(body["user_profile"]["username"], "leo");
    assert_eq!(body["comments_count"], 2);
    assert_eq!(body["comments"][0]["text"], "first!");
    assert_eq!(body["comments"][1]["text"], "second");

    // a post is only reachable under its author's name
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/ann/{}/", post.id))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn unknown_route_returns_path_context() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/leo/abc/def/ghi/").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["path"], "/leo/abc/def/ghi/");
}

#[actix_web::test]
async fn health_endpoints_respond() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;

    for uri in ["/health", "/health/live", "/health/ready"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
    }
}
