mod config;
mod rate_limit;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::{Body, Bytes};
use axum::extract::{Json, Path, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use villa_agents::{BookingAgent, ChatAgent, ContactOutcome, NluAgent, SubmitOutcome};
use villa_connectors::{build_http_client, Detector, SheetsClient};
use villa_core::{
    BookingError, ButtonValue, ContactMessage, GuestDetails, NluRequest, Package, PackageInfo,
    VillaPolicies,
};
use villa_observability::{AppMetrics, MetricsSnapshot};
use villa_storage::{ExpiringRepository, MemoryStore};

pub use crate::config::ApiConfig;
use crate::rate_limit::{Decision, IpRateLimiter};

pub const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Clone)]
pub struct ApiState {
    pub nlu: Arc<NluAgent<Detector>>,
    pub chat: Arc<ChatAgent<MemoryStore, Detector>>,
    pub booking: Arc<BookingAgent<MemoryStore>>,
    pub store: Arc<MemoryStore>,
    pub metrics: Arc<AppMetrics>,
    pub limiter: IpRateLimiter,
    pub allowed_origins: Arc<Vec<String>>,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Capabilities {
    pub nlu: bool,
    pub availability: bool,
    pub bookings: bool,
    pub contact: bool,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    capabilities: Capabilities,
}

#[derive(Debug, Deserialize)]
struct ChatMessageRequest {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ButtonClickRequest {
    #[serde(default)]
    label: Option<String>,
    value: ButtonValue,
}

#[derive(Debug, Deserialize)]
struct DateRequest {
    #[serde(default)]
    date: String,
}

#[derive(Debug, Deserialize)]
struct PackageRequest {
    #[serde(default)]
    package: String,
}

pub fn build_state(config: &ApiConfig) -> Result<ApiState> {
    let metrics = AppMetrics::shared();
    let http = build_http_client().context("failed to build HTTP client")?;
    let session_ttl =
        chrono::Duration::from_std(config.session_ttl).context("session ttl is out of range")?;

    let policies = Arc::new(
        VillaPolicies::default().with_contact(config.phone.clone(), config.email.clone()),
    );
    let detector = match config.nlu.clone() {
        Some(nlu) => Detector::dialogflow(http.clone(), nlu),
        None => Detector::Unconfigured,
    };
    let capabilities = Capabilities {
        nlu: detector.is_configured(),
        availability: config.sheets.availability_url.is_some(),
        bookings: config.sheets.bookings_url.is_some(),
        contact: config.sheets.contact_url.is_some(),
    };

    let store = Arc::new(MemoryStore::new());
    let nlu = NluAgent::new(Arc::new(detector), policies.clone(), metrics.clone());
    let chat = ChatAgent::new(store.clone(), nlu.clone(), metrics.clone(), session_ttl);
    let booking = BookingAgent::new(
        store.clone(),
        SheetsClient::new(http, config.sheets.clone()),
        policies,
        metrics.clone(),
        session_ttl,
    );

    Ok(ApiState {
        nlu: Arc::new(nlu),
        chat: Arc::new(chat),
        booking: Arc::new(booking),
        store,
        metrics,
        limiter: IpRateLimiter::new(config.rate_limit_window, config.rate_limit_max),
        allowed_origins: Arc::new(config.allowed_origins.clone()),
        capabilities,
    })
}

pub fn build_app(config: &ApiConfig) -> Result<Router> {
    Ok(build_router(build_state(config)?))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/packages", get(packages))
        .route("/v1/nlu", post(nlu))
        .route("/v1/chat/sessions", post(open_chat_session))
        .route("/v1/chat/sessions/{id}", get(chat_transcript))
        .route("/v1/chat/sessions/{id}/message", post(chat_message))
        .route("/v1/chat/sessions/{id}/button", post(chat_button))
        .route("/v1/booking/sessions", post(open_booking_session))
        .route("/v1/booking/sessions/{id}", get(booking_snapshot))
        .route("/v1/booking/sessions/{id}/check_in", post(booking_check_in))
        .route("/v1/booking/sessions/{id}/check_out", post(booking_check_out))
        .route("/v1/booking/sessions/{id}/package", post(booking_package))
        .route(
            "/v1/booking/sessions/{id}/availability",
            post(booking_availability),
        )
        .route("/v1/booking/sessions/{id}/confirm", post(booking_confirm))
        .route("/v1/booking/sessions/{id}/submit", post(booking_submit))
        .route("/v1/confirmations/{handoff}", get(confirmation))
        .route("/v1/confirmations/{handoff}/pdf", get(confirmation_pdf))
        .route("/v1/contact", post(contact))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

/// Purges expired sessions and idle rate-limit windows on a fixed period.
pub fn spawn_session_janitor(state: &ApiState, every: Duration) -> JoinHandle<()> {
    let store = state.store.clone();
    let limiter = state.limiter.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.purge_expired(chrono::Utc::now()).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "expired sessions purged"),
                Err(err) => warn!(error = %err, "session purge failed"),
            }
            limiter.prune();
        }
    })
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        capabilities: state.capabilities,
    };
    (StatusCode::OK, Json(payload))
}

async fn packages() -> impl IntoResponse {
    Json(Package::ALL.map(PackageInfo::from))
}

/// Malformed bodies still get the apology with HTTP 200; only missing
/// fields are rejected.
async fn nlu(State(state): State<ApiState>, body: Bytes) -> Response {
    let request = match serde_json::from_slice::<NluRequest>(&body) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "unreadable nlu request");
            state.metrics.inc_nlu_fallback();
            return (StatusCode::OK, Json(state.nlu.fallback())).into_response();
        }
    };

    if request.message.trim().is_empty() || request.session_id.trim().is_empty() {
        return bad_request("Message and sessionId are required");
    }

    (StatusCode::OK, Json(state.nlu.handle(&request).await)).into_response()
}

async fn open_chat_session(State(state): State<ApiState>) -> Response {
    match state.chat.open_session().await {
        Ok(transcript) => (StatusCode::CREATED, Json(transcript)).into_response(),
        Err(err) => internal_error(err),
    }
}

async fn chat_transcript(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.chat.transcript(&id).await {
        Ok(Some(transcript)) => (StatusCode::OK, Json(transcript)).into_response(),
        Ok(None) => session_not_found(&id),
        Err(err) => internal_error(err),
    }
}

async fn chat_message(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<ChatMessageRequest>,
) -> Response {
    let text = request.text.trim();
    if text.is_empty() {
        return bad_request("text is required");
    }

    match state.chat.send_message(&id, text).await {
        Ok(Some(exchange)) => (StatusCode::OK, Json(exchange)).into_response(),
        Ok(None) => session_not_found(&id),
        Err(err) => internal_error(err),
    }
}

async fn chat_button(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<ButtonClickRequest>,
) -> Response {
    if request.value.as_str().trim().is_empty() {
        return bad_request("value is required");
    }
    let label = request
        .label
        .filter(|label| !label.trim().is_empty())
        .unwrap_or_else(|| request.value.as_str().to_string());

    match state.chat.click_button(&id, &label, &request.value).await {
        Ok(Some(exchange)) => (StatusCode::OK, Json(exchange)).into_response(),
        Ok(None) => session_not_found(&id),
        Err(err) => internal_error(err),
    }
}

async fn open_booking_session(State(state): State<ApiState>) -> Response {
    match state.booking.open_session().await {
        Ok(snapshot) => (StatusCode::CREATED, Json(snapshot)).into_response(),
        Err(err) => internal_error(err),
    }
}

async fn booking_snapshot(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.booking.snapshot(&id).await {
        Ok(Some(snapshot)) => (StatusCode::OK, Json(snapshot)).into_response(),
        Ok(None) => session_not_found(&id),
        Err(err) => internal_error(err),
    }
}

async fn booking_check_in(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<DateRequest>,
) -> Response {
    let Some(date) = parse_date(&request.date) else {
        return bad_request("date must be formatted as YYYY-MM-DD");
    };
    outcome_response(&id, state.booking.set_check_in(&id, date).await)
}

async fn booking_check_out(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<DateRequest>,
) -> Response {
    let Some(date) = parse_date(&request.date) else {
        return bad_request("date must be formatted as YYYY-MM-DD");
    };
    outcome_response(&id, state.booking.set_check_out(&id, date).await)
}

async fn booking_package(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<PackageRequest>,
) -> Response {
    let Some(package) = Package::parse(&request.package) else {
        return bad_request("package must be standard or premium");
    };
    outcome_response(&id, state.booking.select_package(&id, package).await)
}

async fn booking_availability(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    outcome_response(&id, state.booking.check_availability(&id).await)
}

async fn booking_confirm(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    outcome_response(&id, state.booking.confirm(&id).await)
}

async fn booking_submit(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(guest): Json<GuestDetails>,
) -> Response {
    match state.booking.submit(&id, guest).await {
        Ok(Some(SubmitOutcome::Saved {
            handoff_id,
            record,
            notice,
        })) => (
            StatusCode::OK,
            Json(json!({
                "handoff_id": handoff_id,
                "booking_ref": record.booking_ref,
                "record": record,
                "notice": notice,
            })),
        )
            .into_response(),
        Ok(Some(SubmitOutcome::Failed { notice })) => upstream_failed(notice),
        Ok(None) => session_not_found(&id),
        Err(err) => domain_or_internal_error(err),
    }
}

async fn confirmation(State(state): State<ApiState>, Path(handoff): Path<String>) -> Response {
    match state.booking.confirmation(&handoff).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => confirmation_not_found(&handoff),
        Err(err) => internal_error(err),
    }
}

async fn confirmation_pdf(State(state): State<ApiState>, Path(handoff): Path<String>) -> Response {
    match state.booking.confirmation_pdf(&handoff).await {
        Ok(Some((reference, pdf))) => {
            let disposition = format!("attachment; filename=\"Villa_Shaa_Booking_{reference}.pdf\"");
            let disposition = HeaderValue::from_str(&disposition)
                .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                pdf,
            )
                .into_response()
        }
        Ok(None) => confirmation_not_found(&handoff),
        Err(err) => internal_error(err),
    }
}

async fn contact(State(state): State<ApiState>, Json(message): Json<ContactMessage>) -> Response {
    match state.booking.send_contact(message).await {
        Ok(ContactOutcome::Sent(notice)) => {
            (StatusCode::OK, Json(json!({ "notice": notice }))).into_response()
        }
        Ok(ContactOutcome::Failed(notice)) => upstream_failed(notice),
        Err(err) => domain_or_internal_error(err),
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn outcome_response<T: Serialize>(id: &str, result: Result<Option<T>>) -> Response {
    match result {
        Ok(Some(outcome)) => (StatusCode::OK, Json(outcome)).into_response(),
        Ok(None) => session_not_found(id),
        Err(err) => domain_or_internal_error(err),
    }
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": "invalid_request",
            "message": message
        })),
    )
        .into_response()
}

fn session_not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "session_not_found",
            "message": format!("no active session {id}")
        })),
    )
        .into_response()
}

fn confirmation_not_found(handoff: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "confirmation_not_found",
            "message": format!("no booking stored under {handoff}")
        })),
    )
        .into_response()
}

fn upstream_failed(notice: villa_core::Notice) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({
            "error": "upstream_failed",
            "message": notice.description,
            "notice": notice
        })),
    )
        .into_response()
}

fn domain_or_internal_error(err: anyhow::Error) -> Response {
    match err.downcast_ref::<BookingError>() {
        Some(booking_error) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_booking",
                "message": booking_error.to_string()
            })),
        )
            .into_response(),
        None => internal_error(err),
    }
}

fn internal_error(err: anyhow::Error) -> Response {
    error!(error = %err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "internal_error",
            "message": "unexpected server error"
        })),
    )
        .into_response()
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-request-id"),
        ])
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    if let Decision::Limited { retry_after } = state.limiter.check(&ip) {
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "rate_limited",
                "message": "rate limit exceeded for this IP"
            })),
        )
            .into_response();
        if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().max(1).to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    next.run(request).await
}

fn request_ip(request: &Request<Body>) -> String {
    let headers = request.headers();
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
        })
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'; base-uri 'none'"),
    );

    response
}
