use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use content_comments::{
    AppState, InMemoryRepository, create_router,
    config::AppConfig,
    error::ErrorBody,
    models::{Comment, CommentNode, User},
    repository::RepositoryState,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

// --- TEST UTILITIES ---

const USER_ID: Uuid = Uuid::from_u128(123);
const ADMIN_ID: Uuid = Uuid::from_u128(456);

fn app() -> Router {
    let repo = InMemoryRepository::with_users([
        User {
            id: USER_ID,
            email: "user@example.com".to_string(),
            roles: vec!["user".to_string()],
        },
        User {
            id: ADMIN_ID,
            email: "admin@example.com".to_string(),
            roles: vec!["user".to_string(), "admin".to_string()],
        },
    ]);
    // Default config is Env::Local, so `x-user-id` authenticates.
    create_router(AppState::new(
        Arc::new(repo) as RepositoryState,
        AppConfig::default(),
    ))
}

async fn send(app: &Router, method: Method, uri: &str, as_user: Option<Uuid>, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = as_user {
        builder = builder.header("x-user-id", id.to_string());
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
    serde_json::from_slice(bytes).expect("response body should be valid JSON")
}

async fn create(app: &Router, as_user: Uuid, content_id: &str, body: &str) -> Comment {
    let (status, bytes) = send(
        app,
        Method::POST,
        "/api/v1/comments",
        Some(as_user),
        Some(json!({ "body": body, "contentId": content_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    parse(&bytes)
}

// --- GUARD BEHAVIOUR ---

#[tokio::test]
async fn test_open_routes_need_no_subject() {
    let app = app();
    let c = create(&app, USER_ID, "c1", "hello").await;

    for uri in [
        "/api/v1/comments".to_string(),
        format!("/api/v1/comments/{}", c.id),
        format!("/api/v1/comments/parent/{}", c.id),
        format!("/api/v1/comments/thread/{}", c.id),
        "/api/v1/comments/content/c1".to_string(),
    ] {
        let (status, _) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK, "GET {uri}");
    }
}

#[tokio::test]
async fn test_protected_route_without_subject_is_bad_request() {
    let app = app();

    let (status, bytes) = send(
        &app,
        Method::POST,
        "/api/v1/comments",
        None,
        Some(json!({ "body": "hi", "contentId": "c1" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err: ErrorBody = parse(&bytes);
    assert_eq!(err.code, "invalid_request");
    assert_eq!(err.message, "User not found");
}

#[tokio::test]
async fn test_delete_by_plain_user_is_forbidden_and_lists_admin() {
    let app = app();
    let c = create(&app, USER_ID, "c1", "hello").await;

    let (status, bytes) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/comments/{}", c.id),
        Some(USER_ID),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    let err: ErrorBody = parse(&bytes);
    assert_eq!(err.code, "forbidden");
    assert!(err.message.contains("admin"));
    assert_eq!(err.details.unwrap()["requiredRoles"], json!(["admin"]));

    // Still there.
    let (status, _) = send(&app, Method::GET, &format!("/api/v1/comments/{}", c.id), None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_by_admin_succeeds() {
    let app = app();
    let c = create(&app, USER_ID, "c1", "hello").await;
    let uri = format!("/api/v1/comments/{}", c.id);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(ADMIN_ID), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, bytes) = send(&app, Method::DELETE, &uri, Some(ADMIN_ID), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse::<ErrorBody>(&bytes).code, "not_found");
}

#[tokio::test]
async fn test_invalid_bearer_token_is_unauthorized() {
    let app = app();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/v1/comments/user")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// --- COMMENT FLOWS ---

#[tokio::test]
async fn test_reply_flow_and_replies_listing() {
    let app = app();
    let a = create(&app, USER_ID, "c1", "root").await;

    let (status, bytes) = send(
        &app,
        Method::POST,
        &format!("/api/v1/comments/reply/{}", a.id),
        Some(ADMIN_ID),
        Some(json!({ "body": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let b: Comment = parse(&bytes);
    assert_eq!(b.parent_id, Some(a.id));
    assert_eq!(b.content_id, "c1");
    assert_eq!(b.user_id, ADMIN_ID);

    let (status, bytes) = send(&app, Method::GET, &format!("/api/v1/comments/parent/{}", a.id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<Vec<Comment>>(&bytes), vec![b.clone()]);

    let (_, bytes) = send(&app, Method::GET, &format!("/api/v1/comments/thread/{}", a.id), None, None).await;
    let thread: CommentNode = parse(&bytes);
    assert_eq!(thread.comment.id, a.id);
    assert_eq!(thread.replies[0].comment, b);
}

#[tokio::test]
async fn test_reply_to_unknown_parent_is_not_found() {
    let app = app();

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/comments/reply/{}", Uuid::new_v4()),
        Some(USER_ID),
        Some(json!({ "body": "hi", "contentId": "c1" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, bytes) = send(&app, Method::GET, "/api/v1/comments", None, None).await;
    assert!(parse::<Vec<Comment>>(&bytes).is_empty());
}

#[tokio::test]
async fn test_create_with_missing_fields_is_bad_request() {
    let app = app();

    let (status, bytes) = send(
        &app,
        Method::POST,
        "/api/v1/comments",
        Some(USER_ID),
        Some(json!({ "body": "no content id" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse::<ErrorBody>(&bytes).code, "invalid_request");
}

#[tokio::test]
async fn test_ill_typed_body_is_bad_request_envelope() {
    let app = app();
    let parent = create(&app, USER_ID, "c1", "root").await;

    for (method, uri, body) in [
        (Method::POST, "/api/v1/comments".to_string(), json!({ "body": 5, "contentId": "c1" })),
        (
            Method::POST,
            format!("/api/v1/comments/reply/{}", parent.id),
            json!({ "body": ["hi"], "contentId": "c1" }),
        ),
        (
            Method::PATCH,
            format!("/api/v1/comments/{}", parent.id),
            json!({ "body": false }),
        ),
    ] {
        let (status, bytes) = send(&app, method, &uri, Some(USER_ID), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(parse::<ErrorBody>(&bytes).code, "invalid_request");
    }
}

#[tokio::test]
async fn test_unreadable_body_is_bad_request_envelope() {
    let app = app();

    let broken_json = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/comments")
        .header("x-user-id", USER_ID.to_string())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"body\": "))
        .unwrap();
    let no_content_type = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/comments")
        .header("x-user-id", USER_ID.to_string())
        .body(Body::from(json!({ "body": "x", "contentId": "c1" }).to_string()))
        .unwrap();

    for request in [broken_json, no_content_type] {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ErrorBody = parse(&bytes);
        assert_eq!(error.code, "invalid_request");
        assert!(!error.message.is_empty());
    }
}

#[tokio::test]
async fn test_create_on_behalf_of_other_user_requires_admin() {
    let app = app();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/comments",
        Some(USER_ID),
        Some(json!({ "body": "x", "contentId": "c1", "userId": ADMIN_ID })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, bytes) = send(
        &app,
        Method::POST,
        "/api/v1/comments",
        Some(ADMIN_ID),
        Some(json!({ "body": "x", "contentId": "c1", "userId": USER_ID })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(parse::<Comment>(&bytes).user_id, USER_ID);
}

#[tokio::test]
async fn test_patch_updates_body() {
    let app = app();
    let c = create(&app, USER_ID, "c1", "before").await;

    let (status, bytes) = send(
        &app,
        Method::PATCH,
        &format!("/api/v1/comments/{}", c.id),
        Some(USER_ID),
        Some(json!({ "body": "after" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<Comment>(&bytes).body, "after");

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/v1/comments/{}", Uuid::new_v4()),
        Some(USER_ID),
        Some(json!({ "body": "after" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_my_comments_and_user_comments() {
    let app = app();
    let mine = create(&app, USER_ID, "c1", "mine").await;
    create(&app, ADMIN_ID, "c1", "theirs").await;

    let (status, bytes) = send(&app, Method::GET, "/api/v1/comments/user", Some(USER_ID), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<Vec<Comment>>(&bytes), vec![mine.clone()]);

    let (status, bytes) = send(
        &app,
        Method::GET,
        &format!("/api/v1/comments/user/{USER_ID}"),
        Some(ADMIN_ID),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<Vec<Comment>>(&bytes), vec![mine]);

    let (status, _) = send(&app, Method::GET, "/api/v1/comments/user", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_content_listing_scenario() {
    let app = app();
    let one = create(&app, USER_ID, "c1", "one").await;
    let two = create(&app, ADMIN_ID, "c1", "two").await;
    create(&app, USER_ID, "c2", "three").await;

    let (status, bytes) = send(&app, Method::GET, "/api/v1/comments/content/c1", None, None).await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<Uuid> = parse::<Vec<Comment>>(&bytes).iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![one.id, two.id]);
}

#[tokio::test]
async fn test_malformed_id_is_bad_request() {
    let app = app();
    let (status, bytes) = send(&app, Method::GET, "/api/v1/comments/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse::<ErrorBody>(&bytes).code, "invalid_request");
}

#[tokio::test]
async fn test_comment_json_uses_camel_case() {
    let app = app();
    let c = create(&app, USER_ID, "c1", "hello").await;

    let (_, bytes) = send(&app, Method::GET, &format!("/api/v1/comments/{}", c.id), None, None).await;
    let raw: Value = parse(&bytes);

    for key in ["id", "userId", "contentId", "body", "parentId", "createdAt", "updatedAt"] {
        assert!(raw.get(key).is_some(), "missing key {key}");
    }
}

#[tokio::test]
async fn test_health_and_openapi() {
    let app = app();

    let (status, bytes) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"ok");

    let (status, bytes) = send(&app, Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let doc: Value = parse(&bytes);
    assert!(doc["paths"].get("/api/v1/comments/reply/{id}").is_some());
}
