use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::push::PushSubscription;
use crate::database::DatabaseError;
use crate::push::{OneSignalClient, PushMessage, PushReceipt, PushRelay, SendPushRequest};

use super::{load_viewer, required_text, ServiceError, ServiceResult};

/// Hand `message` to the relay unless there is nobody to reach
pub async fn deliver<R: PushRelay + ?Sized>(
    relay: &R,
    player_ids: &[String],
    message: &PushMessage,
) -> ServiceResult<PushReceipt> {
    if player_ids.is_empty() {
        debug!("No registered devices, skipping push relay");
        return Ok(nothing_sent());
    }
    Ok(relay.send(player_ids, message).await?)
}

fn nothing_sent() -> PushReceipt {
    PushReceipt {
        sent: 0,
        relay_id: None,
    }
}

pub struct PushService {
    pool: PgPool,
}

impl PushService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Remember a device; registering the same player id twice is a no-op
    pub async fn register(&self, user_id: Uuid, player_id: &str) -> ServiceResult<PushSubscription> {
        let player_id = required_text("player_id", player_id, 128)?;
        let subscription = sqlx::query_as::<_, PushSubscription>(
            "INSERT INTO push_subscriptions (user_id, player_id) VALUES ($1, $2)
             ON CONFLICT (user_id, player_id) DO UPDATE SET player_id = EXCLUDED.player_id
             RETURNING user_id, player_id, created_at",
        )
        .bind(user_id)
        .bind(player_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(subscription)
    }

    pub async fn unregister(&self, user_id: Uuid, player_id: &str) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE user_id = $1 AND player_id = $2")
            .bind(user_id)
            .bind(player_id.trim())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Device not registered".to_string()));
        }
        Ok(())
    }

    /// Notify `request.user_id` through the configured relay. With no registered devices
    /// the relay is neither needed nor called.
    pub async fn send(&self, sender: Uuid, request: SendPushRequest) -> ServiceResult<PushReceipt> {
        let players = self.reachable_players(sender, request.user_id).await?;
        let message = PushMessage::from_request(&request, sender);
        let receipt = match OneSignalClient::from_config() {
            Ok(relay) => deliver(&relay, &players, &message).await?,
            Err(_) if players.is_empty() => nothing_sent(),
            Err(err) => return Err(err.into()),
        };
        info!(
            "Push {:?} from {} to {}: {} sent",
            message.kind, sender, request.user_id, receipt.sent
        );
        Ok(receipt)
    }

    /// Player ids of `target`, provided the sender may notify them: themselves, a partner
    /// or someone sharing a group.
    async fn reachable_players(&self, sender: Uuid, target: Uuid) -> ServiceResult<Vec<String>> {
        if sender != target {
            let viewer = load_viewer(&self.pool, sender).await?;
            let shares_group: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM group_members WHERE user_id = $1 AND group_id = ANY($2))",
            )
            .bind(target)
            .bind(viewer.group_ids())
            .fetch_one(&self.pool)
            .await?;
            if !viewer.is_partner(target) && !shares_group {
                return Err(ServiceError::Forbidden(
                    "You can only notify your partners and group members".to_string(),
                ));
            }
        }

        let players: Vec<String> =
            sqlx::query_scalar("SELECT player_id FROM push_subscriptions WHERE user_id = $1 ORDER BY created_at")
                .bind(target)
                .fetch_all(&self.pool)
                .await?;
        Ok(players)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::{NotificationKind, PushError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRelay {
        calls: Mutex<Vec<Vec<String>>>,
        reject: bool,
    }

    #[async_trait]
    impl PushRelay for RecordingRelay {
        async fn send(&self, player_ids: &[String], _message: &PushMessage) -> Result<PushReceipt, PushError> {
            self.calls.lock().unwrap().push(player_ids.to_vec());
            if self.reject {
                return Err(PushError::Relay {
                    status: 400,
                    body: "invalid player ids".to_string(),
                });
            }
            Ok(PushReceipt {
                sent: player_ids.len(),
                relay_id: Some("n-1".to_string()),
            })
        }
    }

    fn message() -> PushMessage {
        let request: SendPushRequest = serde_json::from_value(serde_json::json!({
            "type": "shopping",
            "user_id": Uuid::new_v4(),
        }))
        .unwrap();
        PushMessage::from_request(&request, Uuid::new_v4())
    }

    #[tokio::test]
    async fn no_devices_means_no_relay_call() {
        let relay = RecordingRelay::default();
        let receipt = deliver(&relay, &[], &message()).await.unwrap();
        assert_eq!(receipt.sent, 0);
        assert!(relay.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn devices_are_forwarded_to_relay() {
        let relay = RecordingRelay::default();
        let players = vec!["a".to_string(), "b".to_string()];
        let msg = message();
        assert_eq!(msg.kind, NotificationKind::Shopping);

        let receipt = deliver(&relay, &players, &msg).await.unwrap();
        assert_eq!(receipt.sent, 2);
        assert_eq!(receipt.relay_id.as_deref(), Some("n-1"));
        assert_eq!(*relay.calls.lock().unwrap(), vec![players]);
    }

    #[tokio::test]
    async fn relay_errors_propagate() {
        let relay = RecordingRelay {
            reject: true,
            ..Default::default()
        };
        let result = deliver(&relay, &["a".to_string()], &message()).await;
        assert!(matches!(result, Err(ServiceError::Push(PushError::Relay { status: 400, .. }))));
    }
}
