//! Web API File Tests
//!
//! Integration tests for the upload, list, download and delete endpoints.

use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use filehost::file::{MemoryBlobStore, SqliteFileRegistry};
use filehost::web::handlers::AppState;
use filehost::web::router::{create_health_router, create_router};
use filehost::{Database, FileService, ManualClock, PasswordHasher};
use serde_json::Value;

/// Upload limit used by the test router.
const TEST_UPLOAD_LIMIT: usize = 64 * 1024;

struct TestApp {
    server: TestServer,
    clock: Arc<ManualClock>,
    blobs: Arc<MemoryBlobStore>,
    _db: Database,
}

/// Create a test server with an in-memory database and blob store.
async fn create_test_server() -> TestApp {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    let blobs = Arc::new(MemoryBlobStore::new());
    let clock = Arc::new(ManualClock::starting_now());

    let files = FileService::new(
        Arc::new(SqliteFileRegistry::new(db.pool().clone())),
        blobs.clone(),
    )
    .with_clock(clock.clone())
    .with_password_hasher(PasswordHasher::with_params(256, 1, 1).unwrap());

    let router = create_router(Arc::new(AppState::new(Arc::new(files))), TEST_UPLOAD_LIMIT)
        .merge(create_health_router());
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        clock,
        blobs,
        _db: db,
    }
}

fn file_part(name: &str, content: &[u8]) -> Part {
    Part::bytes(content.to_vec())
        .file_name(name.to_string())
        .mime_type("text/plain")
}

/// Upload a file and return the `data` object of the response.
async fn upload(app: &TestApp, name: &str, duration: &str, password: Option<&str>) -> Value {
    let mut form = MultipartForm::new()
        .add_text("duration", duration.to_string())
        .add_part("file", file_part(name, b"hello world"));
    if let Some(password) = password {
        form = form.add_text("password", password.to_string());
    }

    let response = app.server.post("/api/upload").multipart(form).await;
    response.assert_status_ok();
    response.json::<Value>()["data"].clone()
}

fn file_id(data: &Value) -> String {
    data["id"].as_str().unwrap().to_string()
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_upload_returns_metadata() {
    let app = create_test_server().await;

    let data = upload(&app, "hello.txt", "1h", None).await;

    assert_eq!(data["name"], "hello.txt");
    assert_eq!(data["size"], 11);
    assert_eq!(data["contentType"], "text/plain");
    assert!(data["uploadDate"].is_string());
    assert!(data["expiryDate"].is_string());
    assert!(data.get("passwordHash").is_none());
    assert!(data.get("password_hash").is_none());
}

#[tokio::test]
async fn test_upload_permanent_omits_expiry() {
    let app = create_test_server().await;

    let data = upload(&app, "hello.txt", "permanent", None).await;

    assert!(data.get("expiryDate").is_none());
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let app = create_test_server().await;

    let form = MultipartForm::new().add_text("duration", "1d");
    let response = app.server.post("/api/upload").multipart(form).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(body["error"]["message"], "No file provided");
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let app = create_test_server().await;

    let big = vec![b'x'; TEST_UPLOAD_LIMIT * 2];
    let form = MultipartForm::new().add_part("file", file_part("big.txt", &big));
    let response = app.server.post("/api/upload").multipart(form).await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let body = response.json::<Value>();
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
    assert!(app.blobs.is_empty());
    assert_eq!(
        app.server.get("/api/files").await.json::<Value>()["data"],
        serde_json::json!([])
    );
}

// ============================================================================
// List
// ============================================================================

#[tokio::test]
async fn test_list_files() {
    let app = create_test_server().await;
    upload(&app, "a.txt", "1d", None).await;
    upload(&app, "b.txt", "1d", Some("secret")).await;

    let response = app.server.get("/api/files").await;
    response.assert_status_ok();

    let body = response.json::<Value>();
    let files = body["data"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["name"], "a.txt");
    assert_eq!(files[1]["name"], "b.txt");
    assert!(!response.text().contains("argon2"));
}

#[tokio::test]
async fn test_list_files_empty() {
    let app = create_test_server().await;

    let response = app.server.get("/api/files").await;
    response.assert_status_ok();

    let body = response.json::<Value>();
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

// ============================================================================
// Download
// ============================================================================

#[tokio::test]
async fn test_download_file() {
    let app = create_test_server().await;
    let data = upload(&app, "hello.txt", "1d", None).await;

    let response = app
        .server
        .get(&format!("/api/files/{}", file_id(&data)))
        .await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"hello world");
    assert_eq!(response.header(header::CONTENT_TYPE), "text/plain");
    assert_eq!(
        response.header(header::CONTENT_DISPOSITION),
        "attachment; filename=\"hello.txt\""
    );
}

#[tokio::test]
async fn test_download_with_password() {
    let app = create_test_server().await;
    let data = upload(&app, "secret.txt", "1d", Some("p")).await;
    let path = format!("/api/files/{}", file_id(&data));

    let response = app.server.get(&path).add_query_param("password", "p").await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"hello world");
}

#[tokio::test]
async fn test_download_failures_are_indistinguishable() {
    let app = create_test_server().await;
    let protected = upload(&app, "secret.txt", "1d", Some("p")).await;
    let expiring = upload(&app, "soon.txt", "1h", None).await;
    app.clock.advance(chrono::Duration::hours(2));

    let protected_path = format!("/api/files/{}", file_id(&protected));
    let responses = vec![
        app.server.get(&protected_path).await,
        app.server
            .get(&protected_path)
            .add_query_param("password", "wrong")
            .await,
        app.server
            .get(&format!("/api/files/{}", file_id(&expiring)))
            .await,
        app.server
            .get("/api/files/00000000-0000-4000-8000-000000000000")
            .await,
        app.server.get("/api/files/not-a-valid-id").await,
    ];

    let bodies: Vec<Value> = responses
        .iter()
        .map(|r| {
            r.assert_status(StatusCode::NOT_FOUND);
            r.json::<Value>()
        })
        .collect();
    for body in &bodies {
        assert_eq!(body, &bodies[0]);
    }
    assert_eq!(
        bodies[0]["error"]["message"],
        "File not found or incorrect password"
    );
}

#[tokio::test]
async fn test_download_expired_removes_file() {
    let app = create_test_server().await;
    upload(&app, "soon.txt", "1h", None).await;
    app.clock.advance(chrono::Duration::hours(2));

    let data = app.server.get("/api/files").await.json::<Value>();
    let id = data["data"][0]["id"].as_str().unwrap().to_string();

    app.server
        .get(&format!("/api/files/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let listed = app.server.get("/api/files").await.json::<Value>();
    assert_eq!(listed["data"].as_array().unwrap().len(), 0);
    assert!(app.blobs.is_empty());
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_file() {
    let app = create_test_server().await;
    let data = upload(&app, "a.txt", "1d", None).await;
    let path = format!("/api/files/{}", file_id(&data));

    app.server.delete(&path).await.assert_status_ok();
    app.server
        .get(&path)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .delete(&path)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    assert!(app.blobs.is_empty());
}

#[tokio::test]
async fn test_health() {
    let app = create_test_server().await;

    let response = app.server.get("/health").await;

    response.assert_status_ok();
    response.assert_text("OK");
}
