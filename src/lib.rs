pub mod api;
pub mod api_util;
pub mod config;
pub mod dispatch;
pub mod notifier;
pub mod state_actor;
pub mod view;

use serde::Deserialize;

/// Status assumed when a report carries no `door_status`.
pub const UNKNOWN_STATUS: &str = "unknown";

/// Format of the receipt time shown to users.
pub const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

/// One report received from the door sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    /// Sequence number assigned by the log, starting at 1.
    pub id: u64,
    pub status: String,
    /// Local receipt time, `HH:MM:SS`.
    pub timestamp: String,
    pub notification: NotificationOutcome,
}

/// A record before the log has numbered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStatus {
    pub status: String,
    pub timestamp: String,
    pub notification: NotificationOutcome,
}

impl NewStatus {
    /// Stamps `status` with the current local time.
    #[must_use]
    pub fn now(status: String) -> Self {
        Self {
            status,
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            notification: NotificationOutcome::Pending,
        }
    }
}

/// What happened to the email sent for a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Pending,
    Delivered { attempts: u32 },
    Failed { attempts: u32, reason: String },
    /// Mail is not configured.
    Disabled,
}

/// Visual state of the door, derived from the free-form status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorClass {
    Open,
    Closed,
    Unknown,
}

impl DoorClass {
    /// Exact match ignoring ASCII case. Whitespace is significant.
    #[must_use]
    pub fn from_status(status: &str) -> Self {
        if status.eq_ignore_ascii_case("open") {
            Self::Open
        } else if status.eq_ignore_ascii_case("closed") {
            Self::Closed
        } else {
            Self::Unknown
        }
    }

    #[must_use]
    pub fn door_class(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub fn wall_class(self) -> &'static str {
        match self {
            Self::Open => "wall-open",
            Self::Closed => "wall-closed",
            Self::Unknown => "wall-unknown",
        }
    }
}

/// Body posted by the sensor.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct DoorReport {
    pub door_status: Option<String>,
}

impl DoorReport {
    #[must_use]
    pub fn status(self) -> String {
        self.door_status.unwrap_or_else(|| UNKNOWN_STATUS.to_string())
    }
}
