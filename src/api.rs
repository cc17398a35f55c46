use crate::api_util::ApiError;
use crate::dispatch::NotificationQueue;
use crate::state_actor::StatusLogHandle;
use crate::view::StatusPage;
use crate::{DoorReport, NewStatus, NotificationOutcome};
use askama::Template;
use axum::{
    body::Bytes,
    extract::State,
    response::{Html, Redirect},
    routing::{get, post},
    Router,
};
use tracing::{info, warn};

pub const STATUS_PAGE_PATH: &str = "/api/door_logs";

pub const USAGE: &str = "Hello! This server accepts POST at /api/door_status from the ESP32, \
and you can GET /api/door_logs to see events.";

/// Shared by every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub log: StatusLogHandle,
    pub notifications: NotificationQueue,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/door_status", post(post_status))
        .route(STATUS_PAGE_PATH, get(get_status_page))
        .with_state(state)
}

async fn index() -> &'static str {
    USAGE
}

async fn post_status(State(state): State<AppState>, body: Bytes) -> Result<Redirect, ApiError> {
    let report = parse_report(&body)?;

    let mut new = NewStatus::now(report.status());
    if !state.notifications.is_enabled() {
        new.notification = NotificationOutcome::Disabled;
    }
    let record = state.log.append(new).await?;
    info!(status = %record.status, timestamp = %record.timestamp, "Door status");

    if let Err(e) = state.notifications.enqueue(&record).await {
        warn!(error = %e, id = record.id, "Could not record notification outcome");
    }

    Ok(Redirect::to(STATUS_PAGE_PATH))
}

/// The sensor does not always send a JSON content type, so the body is
/// parsed whatever the header says.
fn parse_report(body: &[u8]) -> Result<DoorReport, ApiError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| ApiError::BadReport(e.to_string()))?;
    if !value.is_object() {
        return Err(ApiError::BadReport("expected a JSON object".to_string()));
    }
    serde_json::from_value(value).map_err(|e| ApiError::BadReport(e.to_string()))
}

async fn get_status_page(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let latest = state.log.latest().await?;
    let html = StatusPage::latest(latest.as_ref()).render()?;
    Ok(Html(html))
}
