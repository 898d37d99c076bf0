//! ルーター結合テスト
//!
//! インメモリのリポジトリとトランスポートでルーターを組み立て、
//! `tower::ServiceExt::oneshot` で HTTP リクエストを 1 件ずつ流す。

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use notify_relay_domain::{post::PostId, publication::PublicationInfo, subscriber::Subscriber};
use notify_relay_infra::{
    dispatch::BatchDispatcher,
    mock::{MockPublicationRepository, MockSubscriberRepository, MockTransport},
};
use notify_relay_service::{
    handler::{NotifyResponse, WebhookState},
    router,
    usecase::NotifyUseCase,
};
use notify_relay_shared::{ErrorResponse, HealthResponse};
use pretty_assertions::assert_eq;
use serde_json::json;
use tower::ServiceExt;

struct TestApp {
    router:       Router,
    subscribers:  MockSubscriberRepository,
    publications: MockPublicationRepository,
    transport:    MockTransport,
}

fn test_app() -> TestApp {
    let subscribers = MockSubscriberRepository::new();
    let publications = MockPublicationRepository::new();
    let transport = MockTransport::new();
    let usecase = NotifyUseCase::new(
        subscribers.clone(),
        publications.clone(),
        Arc::new(BatchDispatcher::new(transport.clone())),
        "https://blog.example.com",
    );

    TestApp {
        router: router(Arc::new(WebhookState { usecase })),
        subscribers,
        publications,
        transport,
    }
}

fn webhook_request(post_id: &str) -> Request<Body> {
    let body = json!({
        "post": { "current": {
            "id": post_id,
            "slug": "hello-world",
            "title": "Hello World",
            "html": "<p>本文</p>",
            "feature_image": null,
            "url": "https://blog.example.com/hello-world/",
            "primary_author": { "name": "Alice", "profile_image": null }
        }}
    });

    Request::builder()
        .method("POST")
        .uri("/webhooks/post-published")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn subscribers(n: usize) -> Vec<Subscriber> {
    (0..n)
        .map(|i| {
            Subscriber::new(
                format!("user{i}@example.com"),
                format!("User {i}"),
                format!("member-{i}"),
            )
        })
        .collect()
}

async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_healthが200を返す() {
    let app = test_app();

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: HealthResponse = body_json(response.into_body()).await;
    assert_eq!(body.status, "healthy");
}

#[tokio::test]
async fn test_レスポンスにリクエストidが付与される() {
    let app = test_app();

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_全員に送信できたら200と件数を返す() {
    let app = test_app();
    app.subscribers
        .add_subscribers(PostId::new("42"), subscribers(3));
    app.publications
        .add_publication(PostId::new("42"), PublicationInfo::new("Weekly", "nl-1"));

    let response = app.router.oneshot(webhook_request("42")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: NotifyResponse = body_json(response.into_body()).await;
    assert_eq!(
        body,
        NotifyResponse {
            batches:   1,
            attempted: 3,
            succeeded: 3,
            failed:    0,
        }
    );
}

#[tokio::test]
async fn test_1200人中1人失敗すると500を返す() {
    let app = test_app();
    let mut recipients = subscribers(1200);
    recipients[750].email = "bad@example.com".to_string();
    app.subscribers.add_subscribers(PostId::new("42"), recipients);
    app.publications
        .add_publication(PostId::new("42"), PublicationInfo::new("Weekly", "nl-1"));
    app.transport.reject("bad@example.com");

    let response = app.router.oneshot(webhook_request("42")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorResponse = body_json(response.into_body()).await;
    assert_eq!(
        body.error_type,
        "https://notify-relay.example.com/errors/partial-delivery"
    );
    assert!(body.detail.contains("1199"));
    assert_eq!(app.transport.sent_batches().len(), 3);
}

#[tokio::test]
async fn test_ニュースレターがなければ404を返す() {
    let app = test_app();
    app.subscribers
        .add_subscribers(PostId::new("42"), subscribers(3));

    let response = app.router.oneshot(webhook_request("42")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.transport.sent_batches().is_empty());
}

#[tokio::test]
async fn test_db_エラーは500を返す() {
    let app = test_app();
    app.subscribers.fail_with_database_error();

    let response = app.router.oneshot(webhook_request("42")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorResponse = body_json(response.into_body()).await;
    assert_eq!(body, ErrorResponse::internal_error());
}

#[tokio::test]
async fn test_postオブジェクトのないボディは422を返す() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/post-published")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"hello":"world"}"#))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_投稿idが空なら400を返しdbを参照しない() {
    let app = test_app();

    let response = app.router.oneshot(webhook_request("")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = body_json(response.into_body()).await;
    assert_eq!(body.status, 400);
    assert_eq!(app.subscribers.call_count(), 0);
    assert!(app.transport.sent_batches().is_empty());
}
