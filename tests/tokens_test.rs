use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use rust_link_backend::config::AppConfig;
use rust_link_backend::services::rate_limit::RateLimiter;
use rust_link_backend::{AppState, create_app};
use sea_orm::Database;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_app() -> Router {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    rust_link_backend::infrastructure::database::create_schema(&db)
        .await
        .unwrap();

    let state = AppState {
        db,
        storage: None,
        rate_limiter: Arc::new(RateLimiter::new()),
        config: Arc::new(AppConfig::default()),
    };
    create_app(state)
}

async fn json_body(response: axum::http::Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/register")
                .method("POST")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "username": "alice",
                        "email": "alice@example.com",
                        "password": "hunter22"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await["token"].as_str().unwrap().to_string()
}

async fn create_key(app: &Router, session: &str, payload: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/tokens")
                .method("POST")
                .header("content-type", "application/json")
                .header("Authorization", format!("Bearer {}", session))
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, json_body(response).await)
}

async fn list_files_with(app: &Router, bearer: &str) -> StatusCode {
    app.clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/files")
                .header("Authorization", format!("Bearer {}", bearer))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn test_api_key_authenticates_file_endpoints() {
    let app = setup_app().await;
    let session = login(&app).await;

    let (status, body) = create_key(&app, &session, json!({"name": "ci"})).await;
    assert_eq!(status, StatusCode::CREATED);
    let key = body["token"].as_str().unwrap().to_string();
    // The plaintext is a 64-char hex string and the record never echoes it
    assert_eq!(key.len(), 64);
    assert!(body["api_key"].get("key_hash").is_none());

    assert_eq!(list_files_with(&app, &key).await, StatusCode::OK);
}

#[tokio::test]
async fn test_api_key_does_not_open_session_only_endpoints() {
    let app = setup_app().await;
    let session = login(&app).await;

    let (_, body) = create_key(&app, &session, json!({})).await;
    let key = body["token"].as_str().unwrap().to_string();

    // Link management takes sessions only
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/links")
                .header("Authorization", format!("Bearer {}", key))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_api_key_is_invalid() {
    let app = setup_app().await;
    let session = login(&app).await;

    let (_, body) = create_key(
        &app,
        &session,
        json!({"name": "stale", "expires_at": "2000-01-01T00:00:00Z"}),
    )
    .await;
    let key = body["token"].as_str().unwrap().to_string();

    assert_eq!(list_files_with(&app, &key).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_api_key_use_stamps_last_used() {
    let app = setup_app().await;
    let session = login(&app).await;

    let (_, body) = create_key(&app, &session, json!({"name": "stamped"})).await;
    let key = body["token"].as_str().unwrap().to_string();
    assert!(body["api_key"]["last_used_at"].is_null());

    assert_eq!(list_files_with(&app, &key).await, StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/tokens")
                .header("Authorization", format!("Bearer {}", session))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let keys = json_body(response).await;
    assert!(keys[0]["last_used_at"].is_string());
}

#[tokio::test]
async fn test_revoked_api_key_stops_working() {
    let app = setup_app().await;
    let session = login(&app).await;

    let (_, body) = create_key(&app, &session, json!({})).await;
    let key = body["token"].as_str().unwrap().to_string();
    let key_id = body["api_key"]["id"].as_str().unwrap().to_string();

    assert_eq!(list_files_with(&app, &key).await, StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/tokens/{}", key_id))
                .method("DELETE")
                .header("Authorization", format!("Bearer {}", session))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert_eq!(list_files_with(&app, &key).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_key_collapses_to_generic_unauthorized() {
    let app = setup_app().await;
    login(&app).await;

    // Well-formed but unknown key and a malformed one answer identically
    let unknown = "a".repeat(64);
    let status_a = list_files_with(&app, &unknown).await;
    let status_b = list_files_with(&app, "malformed!!").await;
    assert_eq!(status_a, StatusCode::UNAUTHORIZED);
    assert_eq!(status_b, StatusCode::UNAUTHORIZED);
}
