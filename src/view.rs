use crate::{DoorClass, NotificationOutcome, StatusRecord};
use askama::Template;

/// Seconds between browser reloads of the status page.
pub const REFRESH_SECS: u32 = 2;

const DEFAULT_STATUS: &str = "closed";
const DEFAULT_TIMESTAMP: &str = "--";

/// The live status page. Text fields are HTML-escaped on render.
#[derive(Template, Debug)]
#[template(path = "status.html")]
pub struct StatusPage<'a> {
    pub status: &'a str,
    pub timestamp: &'a str,
    pub door_class: &'static str,
    pub wall_class: &'static str,
    pub notice: Option<String>,
    pub refresh_secs: u32,
}

impl<'a> StatusPage<'a> {
    /// Page for the latest record, or the closed/`--` placeholder if there is none.
    #[must_use]
    pub fn latest(record: Option<&'a StatusRecord>) -> Self {
        let (status, timestamp, notice) = match record {
            Some(record) => (
                record.status.as_str(),
                record.timestamp.as_str(),
                notice(&record.notification),
            ),
            None => (DEFAULT_STATUS, DEFAULT_TIMESTAMP, None),
        };
        let class = DoorClass::from_status(status);

        Self {
            status,
            timestamp,
            door_class: class.door_class(),
            wall_class: class.wall_class(),
            notice,
            refresh_secs: REFRESH_SECS,
        }
    }
}

fn notice(outcome: &NotificationOutcome) -> Option<String> {
    match outcome {
        NotificationOutcome::Pending => Some("Notification pending".to_string()),
        NotificationOutcome::Delivered { attempts: 1 } => Some("Notification sent".to_string()),
        NotificationOutcome::Delivered { attempts } => {
            Some(format!("Notification sent after {attempts} attempts"))
        }
        NotificationOutcome::Failed {
            attempts: 0,
            reason,
        } => Some(format!("Notification not sent: {reason}")),
        NotificationOutcome::Failed { attempts, reason } => Some(format!(
            "Notification failed after {attempts} attempts: {reason}"
        )),
        NotificationOutcome::Disabled => None,
    }
}
