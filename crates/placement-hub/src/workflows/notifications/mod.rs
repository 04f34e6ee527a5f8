//! In-process fan-out of workflow events to connected recipients.

mod bus;
pub mod router;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::requirements::domain::{AgencyId, ClientId};

pub use bus::{NotificationBus, Subscription};
pub use router::notification_router;

/// Addressable audience of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recipient {
    Admin,
    Client(ClientId),
    Agency(AgencyId),
}

impl Recipient {
    /// Stable key used to address the recipient's channel, e.g. `agency:agency-000001`.
    pub fn key(&self) -> String {
        match self {
            Recipient::Admin => "admin".to_string(),
            Recipient::Client(id) => format!("client:{id}"),
            Recipient::Agency(id) => format!("agency:{id}"),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("admin") {
            return Some(Recipient::Admin);
        }
        let (kind, id) = raw.split_once(':')?;
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        match kind.trim().to_ascii_lowercase().as_str() {
            "client" => Some(Recipient::Client(ClientId::from(id))),
            "agency" => Some(Recipient::Agency(AgencyId::from(id))),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    RequirementStatusChanged,
    RequirementForwarded,
    ForwardAnswered,
    AssignmentCreated,
    AssignmentReviewed,
    StageAdvanced,
    Reminder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub recipient: Recipient,
    pub kind: NotificationKind,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    /// Id of the entity the notification is about.
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient: Recipient,
        kind: NotificationKind,
        priority: Priority,
        title: impl Into<String>,
        message: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            recipient,
            kind,
            priority,
            title: title.into(),
            message: message.into(),
            reference: reference.into(),
            created_at: Utc::now(),
        }
    }
}

/// Outbound hook used by the workflow service.
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Mail collaborator for high-priority events; address lookup is the gateway's concern.
pub trait EmailGateway: Send + Sync {
    fn send(&self, email: EmailMessage) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub recipient: Recipient,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification bus unavailable")]
    Unavailable,
    #[error("email transport unavailable: {0}")]
    Email(String),
}
