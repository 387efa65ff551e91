use anyhow::anyhow;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use rust_link_backend::config::AppConfig;
use rust_link_backend::services::rate_limit::RateLimiter;
use rust_link_backend::services::storage::StorageService;
use rust_link_backend::{AppState, create_app};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::Arc;
use tower::ServiceExt;

/// In-memory stand-in for the object store.
#[derive(Default)]
struct MockStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl StorageService for MockStorage {
    async fn upload(&self, key: &str, data: Vec<u8>, _content_type: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn download(&self, key: &str) -> anyhow::Result<ByteStream> {
        let data = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("no such key: {}", key))?;
        Ok(ByteStream::from(data))
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }
}

impl MockStorage {
    fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

async fn setup_app_with(config: AppConfig) -> (Router, DatabaseConnection, Arc<MockStorage>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    rust_link_backend::infrastructure::database::create_schema(&db)
        .await
        .unwrap();

    let storage = Arc::new(MockStorage::default());
    let state = AppState {
        db: db.clone(),
        storage: Some(storage.clone() as Arc<dyn StorageService>),
        rate_limiter: Arc::new(RateLimiter::new()),
        config: Arc::new(config),
    };
    (create_app(state), db, storage)
}

async fn setup_app() -> (Router, DatabaseConnection, Arc<MockStorage>) {
    setup_app_with(AppConfig::default()).await
}

async fn json_body(response: axum::http::Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router, username: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/register")
                .method("POST")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "username": username,
                        "email": format!("{}@example.com", username),
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

const BOUNDARY: &str = "x-test-boundary";

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, data)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: text/plain\r\n\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn upload(
    app: &Router,
    token: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/files")
                .method("POST")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(multipart_body(fields, file)))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = if status == StatusCode::NO_CONTENT {
        Value::Null
    } else {
        json_body(response).await
    };
    (status, body)
}

async fn get_public(app: &Router, path: &str) -> axum::http::Response<Body> {
    app.clone()
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn get_file_record(app: &Router, token: &str, file_id: &str) -> Value {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/files/{}", file_id))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

#[tokio::test]
async fn test_public_file_upload_and_download() {
    let (app, _db, storage) = setup_app().await;
    let token = login(&app, "alice").await;

    let (status, body) = upload(
        &app,
        &token,
        &[("short_codes", "my-notes"), ("analytics", "true")],
        Some(("notes.txt", b"line one\nline two\n")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["original_name"], "notes.txt");
    assert_eq!(body["is_public"], true);
    assert_eq!(body["has_password"], false);
    assert_eq!(storage.object_count(), 1);

    let response = get_public(&app, "/f/my-notes").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/plain"
    );
    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("attachment"));
    assert!(disposition.contains("notes.txt"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"line one\nline two\n");
}

#[tokio::test]
async fn test_password_protected_file_flow() {
    let (app, db, _storage) = setup_app().await;
    let token = login(&app, "alice").await;

    let (status, body) = upload(
        &app,
        &token,
        &[
            ("short_codes", "locked"),
            ("is_public", "false"),
            ("password", "secret123"),
            ("analytics", "true"),
        ],
        Some(("secret.txt", b"the payload")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let file_id = body["id"].as_str().unwrap().to_string();

    // No password: a challenge, distinguishable from a denial
    let response = get_public(&app, "/f/locked").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["password_required"], true);

    // Wrong password: denial without the challenge marker
    let response = get_public(&app, "/f/locked?password=wrongpw").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert!(body.get("password_required").is_none());

    // Empty password re-challenges rather than denying
    let response = get_public(&app, "/f/locked?password=").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["password_required"], true);

    // Correct password: served, counted exactly once, one event row
    let response = get_public(&app, "/f/locked?password=secret123").await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"the payload");

    let record = get_file_record(&app, &token, &file_id).await;
    assert_eq!(record["downloads"], 1);

    let events = db
        .query_all(sea_orm::Statement::from_string(
            db.get_database_backend(),
            "SELECT COUNT(*) AS n FROM file_downloads".to_string(),
        ))
        .await
        .unwrap();
    let n: i64 = events[0].try_get("", "n").unwrap();
    assert_eq!(n, 1);
}

#[tokio::test]
async fn test_private_file_without_password_is_always_forbidden() {
    let (app, _db, _storage) = setup_app().await;
    let token = login(&app, "alice").await;

    let (status, _) = upload(
        &app,
        &token,
        &[("short_codes", "vaulted"), ("is_public", "false")],
        Some(("vault.txt", b"unreachable")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let response = get_public(&app, "/f/vaulted").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    // Supplying a password cannot unlock it
    let response = get_public(&app, "/f/vaulted?password=anything").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_expired_file_is_gone() {
    let (app, _db, _storage) = setup_app().await;
    let token = login(&app, "alice").await;

    let (status, _) = upload(
        &app,
        &token,
        &[
            ("short_codes", "stale"),
            ("expires_at", "2000-01-01T00:00:00Z"),
        ],
        Some(("old.txt", b"old")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let response = get_public(&app, "/f/stale").await;
    assert_eq!(response.status(), StatusCode::GONE);
}

#[tokio::test]
async fn test_info_does_not_count_a_download() {
    let (app, _db, _storage) = setup_app().await;
    let token = login(&app, "alice").await;

    let (_, body) = upload(
        &app,
        &token,
        &[("short_codes", "peeked")],
        Some(("data.txt", b"data")),
    )
    .await;
    let file_id = body["id"].as_str().unwrap().to_string();

    let response = get_public(&app, "/f/peeked?info=true").await;
    assert_eq!(response.status(), StatusCode::OK);
    let info = json_body(response).await;
    assert_eq!(info["original_name"], "data.txt");
    assert_eq!(info["file_size"], 4);

    let record = get_file_record(&app, &token, &file_id).await;
    assert_eq!(record["downloads"], 0);
}

#[tokio::test]
async fn test_analytics_failure_does_not_break_the_download() {
    let (app, db, _storage) = setup_app().await;
    let token = login(&app, "alice").await;

    let (_, body) = upload(
        &app,
        &token,
        &[("short_codes", "resilient"), ("analytics", "true")],
        Some(("data.txt", b"still served")),
    )
    .await;
    let file_id = body["id"].as_str().unwrap().to_string();

    // Force every event insert to fail
    db.execute(sea_orm::Statement::from_string(
        db.get_database_backend(),
        "DROP TABLE file_downloads".to_string(),
    ))
    .await
    .unwrap();

    let response = get_public(&app, "/f/resilient").await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"still served");

    // The independent counter increment still happened
    let record = get_file_record(&app, &token, &file_id).await;
    assert_eq!(record["downloads"], 1);
}

#[tokio::test]
async fn test_short_codes_are_unique_across_namespaces() {
    let (app, _db, storage) = setup_app().await;
    let token = login(&app, "alice").await;

    // Claim the code with a link first
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/links")
                .method("POST")
                .header("content-type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(
                    json!({"original_url": "https://example.com", "short_codes": ["shared-ns"]})
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // A file upload reusing it must fail before any row or object is written
    let (status, _) = upload(
        &app,
        &token,
        &[("short_codes", "shared-ns")],
        Some(("clash.txt", b"clash")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(storage.object_count(), 0);

    // And the code still redirects as a link
    let response = get_public(&app, "/f/shared-ns").await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_upload_rate_limit_rejects_after_threshold() {
    let config = AppConfig {
        upload_rate_limit: 3,
        ..AppConfig::default()
    };
    let (app, _db, _storage) = setup_app_with(config).await;
    let token = login(&app, "alice").await;

    for i in 0..3 {
        let (status, _) = upload(&app, &token, &[], Some(("f.txt", b"x"))).await;
        assert_eq!(status, StatusCode::CREATED, "upload {}", i);
    }
    let (status, _) = upload(&app, &token, &[], Some(("f.txt", b"x"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // A different client IP is admitted independently
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/files")
                .method("POST")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .header("Authorization", format!("Bearer {}", token))
                .header("x-forwarded-for", "203.0.113.9")
                .body(Body::from(multipart_body(&[], Some(("f.txt", b"x")))))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_missing_object_store_degrades_to_unavailable() {
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
    let app = create_app(state);
    let token = login(&app, "alice").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/files")
                .method("POST")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(multipart_body(&[], Some(("f.txt", b"x")))))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_delete_removes_record_and_object() {
    let (app, _db, storage) = setup_app().await;
    let token = login(&app, "alice").await;

    let (_, body) = upload(
        &app,
        &token,
        &[("short_codes", "doomed")],
        Some(("bye.txt", b"bye")),
    )
    .await;
    let file_id = body["id"].as_str().unwrap().to_string();
    assert_eq!(storage.object_count(), 1);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/files/{}", file_id))
                .method("DELETE")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(storage.object_count(), 0);

    let response = get_public(&app, "/f/doomed").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_rotates_password_and_visibility() {
    let (app, _db, _storage) = setup_app().await;
    let token = login(&app, "alice").await;

    let (_, body) = upload(
        &app,
        &token,
        &[("short_codes", "mutable"), ("is_public", "false"), ("password", "first-pass")],
        Some(("doc.txt", b"doc")),
    )
    .await;
    let file_id = body["id"].as_str().unwrap().to_string();

    // Rotate the password
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/files/{}", file_id))
                .method("PUT")
                .header("content-type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(json!({"password": "second-pass"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = get_public(&app, "/f/mutable?password=first-pass").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = get_public(&app, "/f/mutable?password=second-pass").await;
    assert_eq!(response.status(), StatusCode::OK);

    // Make it public; no password needed anymore
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/files/{}", file_id))
                .method("PUT")
                .header("content-type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(json!({"is_public": true}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = get_public(&app, "/f/mutable").await;
    assert_eq!(response.status(), StatusCode::OK);
}
