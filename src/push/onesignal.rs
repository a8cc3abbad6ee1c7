use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{PushError, PushMessage, PushReceipt, PushRelay};
use crate::config;

/// OneSignal REST API client
#[derive(Debug, Clone)]
pub struct OneSignalClient {
    client: Client,
    api_base: String,
    app_id: String,
    rest_api_key: String,
}

#[derive(Debug, Deserialize)]
struct NotificationResponse {
    id: Option<String>,
    #[serde(default)]
    recipients: Option<usize>,
}

impl OneSignalClient {
    pub fn new(api_base: impl Into<String>, app_id: impl Into<String>, rest_api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            rest_api_key: rest_api_key.into(),
        }
    }

    pub fn from_config() -> Result<Self, PushError> {
        let push = &config::config().push;
        match (&push.app_id, &push.rest_api_key) {
            (Some(app_id), Some(key)) => Ok(Self::new(push.api_base.clone(), app_id.clone(), key.clone())),
            _ => Err(PushError::NotConfigured),
        }
    }

    /// JSON body for `POST /notifications`
    pub fn payload(&self, player_ids: &[String], message: &PushMessage) -> Value {
        json!({
            "app_id": self.app_id,
            "include_player_ids": player_ids,
            "headings": { "en": message.heading },
            "contents": { "en": message.body },
            "data": message.data,
        })
    }
}

#[async_trait]
impl PushRelay for OneSignalClient {
    async fn send(&self, player_ids: &[String], message: &PushMessage) -> Result<PushReceipt, PushError> {
        let response = self
            .client
            .post(format!("{}/notifications", self.api_base))
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", self.rest_api_key))
            .json(&self.payload(player_ids, message))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Relay {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: NotificationResponse = response.json().await?;
        info!(
            "Push relay accepted {:?} notification for {} device(s)",
            message.kind,
            player_ids.len()
        );
        Ok(PushReceipt {
            sent: parsed.recipients.unwrap_or(player_ids.len()),
            relay_id: parsed.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::NotificationKind;

    #[test]
    fn payload_targets_player_ids() {
        let client = OneSignalClient::new("https://onesignal.com/api/v1/", "app-1", "key");
        let message = PushMessage {
            kind: NotificationKind::Todo,
            heading: "New to-do".to_string(),
            body: "Buy dog food".to_string(),
            data: json!({ "route": "/todos" }),
        };
        let payload = client.payload(&["p1".to_string(), "p2".to_string()], &message);

        assert_eq!(payload["app_id"], "app-1");
        assert_eq!(payload["include_player_ids"], json!(["p1", "p2"]));
        assert_eq!(payload["headings"]["en"], "New to-do");
        assert_eq!(payload["contents"]["en"], "Buy dog food");
        assert_eq!(payload["data"]["route"], "/todos");
        assert_eq!(client.api_base, "https://onesignal.com/api/v1");
    }
}
