//! Router tests -- drive the HTTP surface end to end with in-process requests.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use doorstat::{
    api::{self, AppState, USAGE},
    dispatch::{NotificationQueue, RetryPolicy},
    notifier::{Notification, Notifier, NotifyError},
    state_actor::StatusLogHandle,
    NotificationOutcome, TIMESTAMP_FORMAT,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;

/// Records every notification it is asked to send.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("535 authentication failed".to_string()))
    }
}

fn app_without_mail() -> (Router, StatusLogHandle) {
    let log = StatusLogHandle::new(16, 8);
    let state = AppState {
        log: log.clone(),
        notifications: NotificationQueue::disabled(log.clone()),
    };
    (api::router(state), log)
}

fn app_with_notifier(notifier: Arc<dyn Notifier>) -> (Router, StatusLogHandle) {
    let log = StatusLogHandle::new(16, 8);
    let notifications = NotificationQueue::spawn(
        notifier,
        log.clone(),
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
        },
        Duration::from_secs(5),
        8,
    );
    let state = AppState {
        log: log.clone(),
        notifications,
    };
    (api::router(state), log)
}

async fn post_status(app: &Router, body: &str) -> Response {
    app.clone()
        .oneshot(
            Request::post("/api/door_status")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn get_page(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn assert_redirects_to_status_page(response: &Response) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/api/door_logs"
    );
}

#[tokio::test]
async fn index_serves_usage_banner() {
    let (app, _) = app_without_mail();
    let (status, body) = get_page(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, USAGE);
}

#[tokio::test]
async fn status_page_before_any_report_shows_closed() {
    let (app, _) = app_without_mail();
    let (status, body) = get_page(&app, "/api/door_logs").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"class="door closed""#));
    assert!(body.contains("Door is closed"));
    assert!(body.contains("Timestamp: --"));
}

#[tokio::test]
async fn open_report_is_logged_and_rendered() {
    let (app, log) = app_without_mail();

    let response = post_status(&app, r#"{"door_status":"open"}"#).await;
    assert_redirects_to_status_page(&response);

    let records = log.records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, "open");
    assert!(chrono::NaiveTime::parse_from_str(&records[0].timestamp, TIMESTAMP_FORMAT).is_ok());

    let (_, body) = get_page(&app, "/api/door_logs").await;
    assert!(body.contains(r#"class="door open""#));
    assert!(body.contains("Door is open"));
    assert!(body.contains(&format!("Timestamp: {}", records[0].timestamp)));
}

#[tokio::test]
async fn report_without_status_is_unknown() {
    let (app, log) = app_without_mail();

    let response = post_status(&app, "{}").await;
    assert_redirects_to_status_page(&response);
    assert_eq!(log.latest().await.unwrap().unwrap().status, "unknown");

    let (_, body) = get_page(&app, "/api/door_logs").await;
    assert!(body.contains(r#"class="door unknown""#));
    assert!(body.contains(r#"class="wall wall-unknown""#));
    assert!(body.contains("Door is unknown"));
}

#[tokio::test]
async fn latest_report_wins() {
    let (app, log) = app_without_mail();

    post_status(&app, r#"{"door_status":"open"}"#).await;
    post_status(&app, r#"{"door_status":"closed"}"#).await;

    assert_eq!(log.records().await.unwrap().len(), 2);
    let (_, body) = get_page(&app, "/api/door_logs").await;
    assert!(body.contains("Door is closed"));
    assert!(body.contains(r#"class="door closed""#));
    assert!(!body.contains("Door is open"));
}

#[tokio::test]
async fn near_miss_statuses_are_neutral() {
    let (app, _) = app_without_mail();

    for status in ["Open ", "", "OPENED"] {
        let body = serde_json::json!({ "door_status": status }).to_string();
        post_status(&app, &body).await;
        let (_, page) = get_page(&app, "/api/door_logs").await;
        assert!(page.contains(r#"class="door unknown""#), "status {status:?}");
    }

    post_status(&app, r#"{"door_status":"OPEN"}"#).await;
    let (_, page) = get_page(&app, "/api/door_logs").await;
    assert!(page.contains(r#"class="door open""#));
}

#[tokio::test]
async fn malformed_report_is_rejected_and_not_logged() {
    let (app, log) = app_without_mail();

    for body in ["door_status=open", "", "[]", r#"{"door_status":42}"#] {
        let response = post_status(&app, body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");
    }
    assert!(log.records().await.unwrap().is_empty());
}

#[tokio::test]
async fn report_without_content_type_is_accepted() {
    let (app, log) = app_without_mail();

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/door_status")
                .body(Body::from(r#"{"door_status":"closed"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_redirects_to_status_page(&response);
    assert_eq!(log.latest().await.unwrap().unwrap().status, "closed");
}

#[tokio::test]
async fn unconfigured_mail_is_marked_disabled() {
    let (app, log) = app_without_mail();
    post_status(&app, r#"{"door_status":"open"}"#).await;
    assert_eq!(
        log.latest().await.unwrap().unwrap().notification,
        NotificationOutcome::Disabled
    );
}

#[tokio::test(start_paused = true)]
async fn status_change_is_emailed() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (app, log) = app_with_notifier(notifier.clone());

    post_status(&app, r#"{"door_status":"open"}"#).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let record = log.latest().await.unwrap().unwrap();
    assert_eq!(
        record.notification,
        NotificationOutcome::Delivered { attempts: 1 }
    );

    let sent = notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Door is OPEN");
    assert_eq!(
        sent[0].body,
        format!("The door changed to open at {}.", record.timestamp)
    );
}

#[tokio::test(start_paused = true)]
async fn failing_mail_does_not_change_response() {
    let (app, log) = app_with_notifier(Arc::new(FailingNotifier));

    let response = post_status(&app, r#"{"door_status":"open"}"#).await;
    assert_redirects_to_status_page(&response);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(
        log.latest().await.unwrap().unwrap().notification,
        NotificationOutcome::Failed {
            attempts: 2,
            reason: "Failed to send email: 535 authentication failed".to_string(),
        }
    );

    let (status, body) = get_page(&app, "/api/door_logs").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Notification failed after 2 attempts"));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (app, _) = app_without_mail();
    let (status, _) = get_page(&app, "/api/door_history").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
