//! Router-level tests exercising the HTTP surface end to end.

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tower::util::ServiceExt;

use cybermitra_assist::SopGuidanceEngine;
use cybermitra_auth::{Authenticator, Identifier, OtpDelivery};
use cybermitra_config::AppConfig;
use cybermitra_database::run_migrations;
use cybermitra_gateway::{create_router, GatewayState};

#[derive(Default)]
struct CaptureDelivery {
    sent: Mutex<Vec<String>>,
}

impl CaptureDelivery {
    fn last_code(&self) -> String {
        self.sent.lock().unwrap().last().cloned().expect("code delivered")
    }
}

impl OtpDelivery for CaptureDelivery {
    fn deliver(&self, _identifier: &Identifier, code: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(code.to_string());
        Ok(())
    }
}

struct TestApp {
    router: Router,
    delivery: Arc<CaptureDelivery>,
    pool: SqlitePool,
    _evidence_dir: tempfile::TempDir,
}

async fn test_app() -> TestApp {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();

    let evidence_dir = tempfile::TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.evidence.storage_root = evidence_dir.path().display().to_string();
    config.evidence.max_file_bytes = 4096;

    let delivery = Arc::new(CaptureDelivery::default());
    let authenticator = Authenticator::new(pool.clone(), &config.auth, delivery.clone());
    let state = GatewayState::new(
        pool.clone(),
        &config,
        authenticator,
        Arc::new(SopGuidanceEngine::new()),
    );

    TestApp {
        router: create_router(state),
        delivery,
        pool,
        _evidence_dir: evidence_dir,
    }
}

async fn send_json(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// Register a user through the HTTP flow and return a session token.
async fn register_user(app: &TestApp, identifier: &str, name: &str) -> String {
    let (status, _) = send_json(
        &app.router,
        "POST",
        "/api/auth/otp/request",
        None,
        Some(serde_json::json!({ "identifier": identifier })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_json(
        &app.router,
        "POST",
        "/api/auth/otp/verify",
        None,
        Some(serde_json::json!({
            "identifier": identifier,
            "code": app.delivery.last_code(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "needs_registration");

    let (status, body) = send_json(
        &app.router,
        "POST",
        "/api/auth/register",
        None,
        Some(serde_json::json!({
            "registration_token": body["registration_token"],
            "name": name,
            "pincode": "411001",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

fn parse_ndjson(bytes: &[u8]) -> Vec<serde_json::Value> {
    std::str::from_utf8(bytes)
        .unwrap()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn health_endpoint_is_public() {
    let app = test_app().await;
    let (status, body) = send_json(&app.router, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let app = test_app().await;

    let (status, _) = send_json(&app.router, "GET", "/api/chats", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_json(&app.router, "GET", "/api/chats", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn otp_flow_registers_then_logs_in_directly() {
    let app = test_app().await;
    let token = register_user(&app, "9876543210", "Asha Kulkarni").await;

    let (status, body) = send_json(&app.router, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Asha Kulkarni");
    assert_eq!(body["phone"], "+919876543210");

    // Second login with the same identifier completes without registration.
    sqlx::query("DELETE FROM otp_codes").execute(&app.pool).await.unwrap();
    send_json(
        &app.router,
        "POST",
        "/api/auth/otp/request",
        None,
        Some(serde_json::json!({ "identifier": "9876543210" })),
    )
    .await;
    let (status, body) = send_json(
        &app.router,
        "POST",
        "/api/auth/otp/verify",
        None,
        Some(serde_json::json!({
            "identifier": "9876543210",
            "code": app.delivery.last_code(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "registered");
    assert!(body["token"].as_str().is_some());
}

#[tokio::test]
async fn resend_inside_cooldown_is_throttled() {
    let app = test_app().await;
    send_json(
        &app.router,
        "POST",
        "/api/auth/otp/request",
        None,
        Some(serde_json::json!({ "identifier": "9876543210" })),
    )
    .await;

    let (status, _) = send_json(
        &app.router,
        "POST",
        "/api/auth/otp/request",
        None,
        Some(serde_json::json!({ "identifier": "9876543210" })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn chat_turn_streams_the_documented_event_sequence() {
    let app = test_app().await;
    let token = register_user(&app, "9876543210", "Asha").await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/chats/messages")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "message": "I lost money via UPI" }).to_string(),
        ))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/x-ndjson"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let events = parse_ndjson(&bytes);

    assert_eq!(events.first().unwrap()["type"], "meta");
    let chat_id = events[0]["chat_id"].as_i64().unwrap();
    assert_eq!(events.last().unwrap()["type"], "done");

    let content: String = events
        .iter()
        .filter(|e| e["type"] == "content")
        .map(|e| e["data"].as_str().unwrap())
        .collect();
    assert!(content.contains("call the national cybercrime helpline 1930"));

    let sources_events: Vec<_> = events.iter().filter(|e| e["type"] == "sources").collect();
    assert_eq!(sources_events.len(), 1);
    assert!(!events.iter().any(|e| e["type"] == "error"));

    // The turn is persisted and attributed to the same chat id.
    let (status, body) = send_json(
        &app.router,
        "GET",
        &format!("/api/chats/{chat_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"].as_str().unwrap(), content);
}

#[tokio::test]
async fn continuing_a_chat_does_not_reassign_the_id() {
    let app = test_app().await;
    let token = register_user(&app, "9876543210", "Asha").await;

    let first = Request::builder()
        .method("POST")
        .uri("/api/chats/messages")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "message": "I lost money via UPI" }).to_string(),
        ))
        .unwrap();
    let response = app.router.clone().oneshot(first).await.unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let chat_id = parse_ndjson(&bytes)[0]["chat_id"].as_i64().unwrap();

    let second = Request::builder()
        .method("POST")
        .uri("/api/chats/messages")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "message": "what next?", "chat_id": chat_id }).to_string(),
        ))
        .unwrap();
    let response = app.router.clone().oneshot(second).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let events = parse_ndjson(&bytes);

    assert!(!events.iter().any(|e| e["type"] == "meta"));
    assert_eq!(events.last().unwrap()["type"], "done");
}

#[tokio::test]
async fn streaming_into_a_foreign_chat_is_denied_before_any_bytes() {
    let app = test_app().await;
    let owner = register_user(&app, "9876543210", "Asha").await;
    let intruder = register_user(&app, "9123456780", "Ravi").await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/chats/messages")
        .header(header::AUTHORIZATION, format!("Bearer {owner}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "message": "I lost money via UPI" }).to_string(),
        ))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let chat_id = parse_ndjson(&bytes)[0]["chat_id"].as_i64().unwrap();

    let (status, _) = send_json(
        &app.router,
        "POST",
        "/api/chats/messages",
        Some(&intruder),
        Some(serde_json::json!({ "message": "hi", "chat_id": chat_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn complaints_round_trip_with_evidence() {
    let app = test_app().await;
    let token = register_user(&app, "9876543210", "Asha").await;

    let (status, complaint) = send_json(
        &app.router,
        "POST",
        "/api/complaints",
        Some(&token),
        Some(serde_json::json!({
            "category": "financial_fraud",
            "description": "Unauthorised UPI debit of 15000",
            "incident_date": "2026-07-30",
            "loss_amount_inr": 15000,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let complaint_id = complaint["id"].as_str().unwrap().to_string();

    // Multipart evidence upload.
    let boundary = "cybermitra-test-boundary";
    let file_bytes = b"fake png bytes";
    let mut multipart_body = Vec::new();
    multipart_body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"shot.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    multipart_body.extend_from_slice(file_bytes);
    multipart_body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/complaints/{complaint_id}/evidence"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(multipart_body))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let uploaded: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let evidence_id = uploaded["id"].as_str().unwrap();

    // Download round-trips the content.
    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/evidence/{evidence_id}/download"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], file_bytes);

    // Submit, then edits are refused.
    let (status, _) = send_json(
        &app.router,
        "PUT",
        &format!("/api/complaints/{complaint_id}"),
        Some(&token),
        Some(serde_json::json!({ "status": "submitted" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(
        &app.router,
        "PUT",
        &format!("/api/complaints/{complaint_id}"),
        Some(&token),
        Some(serde_json::json!({ "description": "edited" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn stations_and_emergency_are_public() {
    let app = test_app().await;

    // Seed through the service the binary uses.
    {
        use cybermitra_assist::DirectoryService;
        use cybermitra_database::StationRepository;
        DirectoryService::new(StationRepository::new(app.pool.clone()))
            .seed_if_empty()
            .await
            .unwrap();
    }

    let (status, body) = send_json(
        &app.router,
        "GET",
        "/api/stations?state=Telangana",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send_json(&app.router, "GET", "/api/emergency", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["number"], "1930");
}

#[tokio::test]
async fn audit_questions_are_public_but_runs_need_auth() {
    let app = test_app().await;

    let (status, questions) =
        send_json(&app.router, "GET", "/api/audit/questions", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let questions = questions.as_array().unwrap().clone();
    assert!(!questions.is_empty());

    let answers: serde_json::Map<String, serde_json::Value> = questions
        .iter()
        .map(|q| (q["id"].as_str().unwrap().to_string(), serde_json::json!(true)))
        .collect();

    let (status, _) = send_json(
        &app.router,
        "POST",
        "/api/audit/run",
        None,
        Some(serde_json::json!({ "answers": answers })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = register_user(&app, "9876543210", "Asha").await;
    let (status, report) = send_json(
        &app.router,
        "POST",
        "/api/audit/run",
        Some(&token),
        Some(serde_json::json!({ "answers": answers })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["score"], 100);
    assert_eq!(report["risk_band"], "low");
}
