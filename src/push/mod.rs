//! Push notifications forwarded to a third-party relay.

pub mod onesignal;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use onesignal::OneSignalClient;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push relay is not configured")]
    NotConfigured,

    #[error("push relay returned {status}: {body}")]
    Relay { status: u16, body: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Event,
    Todo,
    Note,
    Shopping,
}

impl NotificationKind {
    pub fn default_heading(&self) -> &'static str {
        match self {
            NotificationKind::Event => "New calendar event",
            NotificationKind::Todo => "New to-do",
            NotificationKind::Note => "New note",
            NotificationKind::Shopping => "Shopping list updated",
        }
    }

    pub fn default_body(&self) -> &'static str {
        match self {
            NotificationKind::Event => "Your partner added an event to the calendar",
            NotificationKind::Todo => "Your partner added a to-do",
            NotificationKind::Note => "Your partner shared a note",
            NotificationKind::Shopping => "Your partner added something to the shopping list",
        }
    }

    /// Client route opened when the notification is tapped
    pub fn route(&self) -> &'static str {
        match self {
            NotificationKind::Event => "/calendar",
            NotificationKind::Todo => "/todos",
            NotificationKind::Note => "/notes",
            NotificationKind::Shopping => "/shopping",
        }
    }
}

/// Body of `POST /functions/send-push`
#[derive(Debug, Clone, Deserialize)]
pub struct SendPushRequest {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Notification ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub kind: NotificationKind,
    pub heading: String,
    pub body: String,
    pub data: Value,
}

impl PushMessage {
    pub fn from_request(request: &SendPushRequest, sender: Uuid) -> Self {
        let heading = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(request.kind.default_heading())
            .to_string();
        let body = request
            .body
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(request.kind.default_body())
            .to_string();

        let mut data = match &request.data {
            Some(Value::Object(map)) => map.clone(),
            _ => serde_json::Map::new(),
        };
        data.insert("type".to_string(), serde_json::json!(request.kind));
        data.insert("route".to_string(), Value::String(request.kind.route().to_string()));
        data.insert("sender_id".to_string(), Value::String(sender.to_string()));

        Self {
            kind: request.kind,
            heading,
            body,
            data: Value::Object(data),
        }
    }
}

/// Outcome of a relay call
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PushReceipt {
    pub sent: usize,
    pub relay_id: Option<String>,
}

#[async_trait]
pub trait PushRelay: Send + Sync {
    async fn send(&self, player_ids: &[String], message: &PushMessage) -> Result<PushReceipt, PushError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: Value) -> SendPushRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parses_type_field() {
        let req = request(json!({ "type": "shopping", "user_id": Uuid::nil() }));
        assert_eq!(req.kind, NotificationKind::Shopping);
        assert!(serde_json::from_value::<SendPushRequest>(json!({ "type": "dog", "user_id": Uuid::nil() })).is_err());
    }

    #[test]
    fn falls_back_to_defaults_for_blank_text() {
        let req = request(json!({ "type": "event", "user_id": Uuid::nil(), "title": "  " }));
        let msg = PushMessage::from_request(&req, Uuid::nil());
        assert_eq!(msg.heading, "New calendar event");
        assert_eq!(msg.body, NotificationKind::Event.default_body());
    }

    #[test]
    fn merges_caller_data_with_routing() {
        let sender = Uuid::new_v4();
        let req = request(json!({
            "type": "note",
            "user_id": Uuid::nil(),
            "title": "Packing list",
            "body": "Don't forget the tent",
            "data": { "note_id": "n1" }
        }));
        let msg = PushMessage::from_request(&req, sender);
        assert_eq!(msg.heading, "Packing list");
        assert_eq!(msg.data["note_id"], "n1");
        assert_eq!(msg.data["type"], "note");
        assert_eq!(msg.data["route"], "/notes");
        assert_eq!(msg.data["sender_id"], sender.to_string());
    }
}
