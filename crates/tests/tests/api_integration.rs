use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use villa_api::{build_app, ApiConfig};
use villa_connectors::SheetsConfig;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app() -> Router {
    build_app(&ApiConfig::default()).expect("app should build")
}

fn app_with_sheets(server: &MockServer) -> Router {
    let config = ApiConfig {
        sheets: SheetsConfig {
            availability_url: Some(format!("{}/availability", server.uri())),
            bookings_url: Some(format!("{}/bookings", server.uri())),
            contact_url: Some(format!("{}/contact", server.uri())),
        },
        ..ApiConfig::default()
    };
    build_app(&config).expect("app should build")
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, parsed)
}

async fn open_booking(app: &Router) -> String {
    let (status, body) = call(app, "POST", "/v1/booking/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_unconfigured_services() {
    let app = app();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert!(response.headers().get("x-request-id").is_some());

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["status"], "ok");
    assert_eq!(parsed["capabilities"]["nlu"], false);
    assert_eq!(parsed["capabilities"]["bookings"], false);
}

#[tokio::test]
async fn packages_lists_both_tiers() {
    let (status, body) = call(&app(), "GET", "/v1/packages", None).await;

    assert_eq!(status, StatusCode::OK);
    let packages = body.as_array().unwrap();
    assert_eq!(packages.len(), 2);
    assert_eq!(packages[0]["name"], "Standard Stay");
    assert_eq!(packages[0]["min_nights"], 7);
    assert_eq!(packages[1]["price"], 27);
}

#[tokio::test]
async fn nlu_without_detector_apologises_with_ok() {
    let (status, body) = call(
        &app(),
        "POST",
        "/v1/nlu",
        Some(json!({
            "message": "do you have a pool?",
            "sessionId": "web-1",
            "isSettingCheckInDate": false
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], "Error");
    assert_eq!(body["confidence"], 0.0);
    assert!(body["fulfillmentText"]
        .as_str()
        .unwrap()
        .contains("+94 77 794 3393"));
}

#[tokio::test]
async fn nlu_requires_message_and_session() {
    let (status, body) = call(
        &app(),
        "POST",
        "/v1/nlu",
        Some(json!({ "message": "", "sessionId": "web-1" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn nlu_unreadable_body_still_answers() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/nlu")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn chat_buttons_drive_the_dialogue() {
    let app = app();

    let (status, opened) = call(&app, "POST", "/v1/chat/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = opened["session_id"].as_str().unwrap().to_string();
    assert!(opened["transcript"][0]["text"]
        .as_str()
        .unwrap()
        .starts_with("Hello! Welcome to Villa Shaa!"));

    let button_uri = format!("/v1/chat/sessions/{session_id}/button");
    let (status, yes) = call(
        &app,
        "POST",
        &button_uri,
        Some(json!({ "label": "Yes", "value": "NEW_BOOKING_YES" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(yes["delegated"], false);
    assert_eq!(yes["messages"][1]["buttons"][0]["value"], "BOOK_NOW");

    let (_, book_now) = call(
        &app,
        "POST",
        &button_uri,
        Some(json!({ "label": "Book Now", "value": "BOOK_NOW" })),
    )
    .await;
    assert_eq!(book_now["awaiting_check_in"], true);
    assert_eq!(book_now["awaiting_check_out"], false);

    let (_, confirm_in) = call(
        &app,
        "POST",
        &button_uri,
        Some(json!({ "label": "Confirm", "value": "CONFIRM_CHECKIN_DATE" })),
    )
    .await;
    assert_eq!(confirm_in["state"], "awaiting_check_out");

    let (_, transcript) = call(&app, "GET", &format!("/v1/chat/sessions/{session_id}"), None).await;
    let messages = transcript["transcript"].as_array().unwrap();
    assert_eq!(messages.len(), 7);
    assert!(messages
        .iter()
        .all(|message| message.get("buttons").is_none()));
}

#[tokio::test]
async fn unknown_button_is_delegated_and_keeps_state() {
    let app = app();
    let (_, opened) = call(&app, "POST", "/v1/chat/sessions", None).await;
    let session_id = opened["session_id"].as_str().unwrap();

    let (status, exchange) = call(
        &app,
        "POST",
        &format!("/v1/chat/sessions/{session_id}/button"),
        Some(json!({ "label": "Proceed", "value": "PROCEED_CHECK_AVAILABILITY" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(exchange["delegated"], true);
    assert_eq!(exchange["state"], "idle");
    assert!(exchange["messages"][1]["text"]
        .as_str()
        .unwrap()
        .contains("technical difficulties"));
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let (status, body) = call(
        &app(),
        "POST",
        "/v1/chat/sessions/missing/message",
        Some(json!({ "text": "hello" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "session_not_found");
}

#[tokio::test]
async fn booking_flow_ends_with_pdf() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/availability"))
        .and(query_param("checkIn", "2025-07-01"))
        .and(query_param("checkOut", "2025-07-08"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "available": true,
            "message": "All clear"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bookings"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let app = app_with_sheets(&server);
    let session_id = open_booking(&app).await;
    let base = format!("/v1/booking/sessions/{session_id}");

    let (status, checked_in) = call(
        &app,
        "POST",
        &format!("{base}/check_in"),
        Some(json!({ "date": "2025-07-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checked_in["session"]["check_out"], "2025-07-08");
    assert_eq!(checked_in["session"]["total_cost"], 210);

    let (_, premium) = call(
        &app,
        "POST",
        &format!("{base}/package"),
        Some(json!({ "package": "premium" })),
    )
    .await;
    assert_eq!(premium["session"]["package"], "standard");
    assert_eq!(premium["notice"]["level"], "error");

    let (_, availability) = call(&app, "POST", &format!("{base}/availability"), None).await;
    assert_eq!(availability["session"]["availability"], true);
    assert_eq!(availability["notice"]["title"], "Dates Available!");
    assert_eq!(availability["notice"]["description"], "All clear");

    let (status, confirmed) = call(&app, "POST", &format!("{base}/confirm"), None).await;
    assert_eq!(status, StatusCode::OK);
    let reference = confirmed["session"]["reference"].as_str().unwrap().to_string();
    assert!(reference.starts_with("VS-"));
    assert_eq!(reference.len(), 17);
    assert!(reference[3..].chars().all(|c| c.is_ascii_digit()));

    let (status, submitted) = call(
        &app,
        "POST",
        &format!("{base}/submit"),
        Some(json!({
            "name": "Ana Perera",
            "email": "ana@example.com",
            "phone": "+94 70 123 4567",
            "adults": 2,
            "children": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submitted["booking_ref"], reference.as_str());
    let handoff = submitted["handoff_id"].as_str().unwrap().to_string();

    let (status, record) = call(&app, "GET", &format!("/v1/confirmations/{handoff}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["total_amount"], 210);
    assert_eq!(record["status"], "REQUESTED");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/v1/confirmations/{handoff}/pdf"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/pdf"
    );
    let pdf = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(pdf.starts_with(b"%PDF-1.4"));
    assert!(pdf
        .windows(reference.len())
        .any(|window| window == reference.as_bytes()));
}

#[tokio::test]
async fn availability_script_error_becomes_notice() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "Sheet 'Bookings' not found"
        })))
        .mount(&server)
        .await;

    let app = app_with_sheets(&server);
    let session_id = open_booking(&app).await;
    let base = format!("/v1/booking/sessions/{session_id}");
    call(
        &app,
        "POST",
        &format!("{base}/check_in"),
        Some(json!({ "date": "2025-07-01" })),
    )
    .await;

    let (status, outcome) = call(&app, "POST", &format!("{base}/availability"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["notice"]["description"], "Sheet 'Bookings' not found");
    assert!(outcome["session"]["availability"].is_null());
}

#[tokio::test]
async fn confirm_without_dates_is_bad_request() {
    let app = app();
    let session_id = open_booking(&app).await;

    let (status, body) = call(
        &app,
        "POST",
        &format!("/v1/booking/sessions/{session_id}/confirm"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please select valid dates to book.");
}

#[tokio::test]
async fn malformed_date_is_bad_request() {
    let app = app();
    let session_id = open_booking(&app).await;

    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/booking/sessions/{session_id}/check_in"),
        Some(json!({ "date": "07/01/2025" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsaved_booking_is_bad_gateway() {
    let app = app();
    let session_id = open_booking(&app).await;
    let base = format!("/v1/booking/sessions/{session_id}");
    call(
        &app,
        "POST",
        &format!("{base}/check_in"),
        Some(json!({ "date": "2025-07-01" })),
    )
    .await;
    call(&app, "POST", &format!("{base}/confirm"), None).await;

    let (status, body) = call(
        &app,
        "POST",
        &format!("{base}/submit"),
        Some(json!({
            "name": "Ana Perera",
            "email": "ana@example.com",
            "phone": "+94 70 123 4567"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["notice"]["title"], "Error saving booking details!");
}

#[tokio::test]
async fn contact_message_is_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/contact"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let app = app_with_sheets(&server);

    let (status, body) = call(
        &app,
        "POST",
        "/v1/contact",
        Some(json!({
            "name": "Ana",
            "email": "ana@example.com",
            "subject": "Airport pickup",
            "message": "Can you arrange a pickup?"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notice"]["description"], "Your message sent successfully.");
}

#[tokio::test]
async fn contact_requires_message_text() {
    let (status, body) = call(
        &app(),
        "POST",
        "/v1/contact",
        Some(json!({ "name": "Ana", "email": "ana@example.com", "message": " " })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please fill in a message.");
}

#[tokio::test]
async fn rate_limit_applies_per_client() {
    let config = ApiConfig {
        rate_limit_max: 2,
        ..ApiConfig::default()
    };
    let app = build_app(&config).expect("app should build");

    for _ in 0..2 {
        let (status, _) = call(&app, "GET", "/v1/packages", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/packages")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get("retry-after").is_some());

    let (status, _) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}
