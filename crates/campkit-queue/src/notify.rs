//! Creator notification channel.
//!
//! The pipeline never assumes a creator is watching. It asks the registry
//! for the creator's live connection; `None` means offline and every emit
//! for that job is skipped.

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::Serialize;
use tracing::{debug, warn};

use campkit_models::CreatorEvent;

use crate::error::QueueResult;

/// A live connection to one creator's client.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Emit one event. Emission failures are logged by callers, never fatal.
    async fn emit(&self, event: &CreatorEvent) -> QueueResult<()>;
}

pub type ConnectionHandle = Box<dyn Connection>;

/// Looks up the live connection for a creator, if one exists.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Returns the creator's connection, or `None` when they are offline.
    async fn get(&self, user_id: &str) -> QueueResult<Option<ConnectionHandle>>;
}

/// Frame published on the creator's channel. The gateway that holds the
/// actual client sockets fans these out by event name.
#[derive(Debug, Serialize)]
struct NotifyFrame<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

fn channel_for(user_id: &str) -> String {
    format!("creator:{}", user_id)
}

/// Registry backed by Redis pub/sub.
///
/// Presence is PUBSUB NUMSUB on the creator's channel: a gateway instance
/// subscribes while the client socket is open, so a nonzero subscriber
/// count means online.
#[derive(Clone)]
pub struct RedisConnectionRegistry {
    client: redis::Client,
}

impl RedisConnectionRegistry {
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    pub fn from_env() -> QueueResult<Self> {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        Self::new(&redis_url)
    }
}

#[async_trait]
impl ConnectionRegistry for RedisConnectionRegistry {
    async fn get(&self, user_id: &str) -> QueueResult<Option<ConnectionHandle>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let channel = channel_for(user_id);
        let reply: Vec<(String, u64)> = redis::cmd("PUBSUB")
            .arg("NUMSUB")
            .arg(&channel)
            .query_async(&mut conn)
            .await?;

        let subscribers = reply.first().map(|(_, n)| *n).unwrap_or(0);
        if subscribers == 0 {
            debug!(user = %user_id, "Creator offline, progress events will be skipped");
            return Ok(None);
        }

        Ok(Some(Box::new(RedisConnection {
            client: self.client.clone(),
            channel,
        })))
    }
}

/// Publishes events to one creator's channel.
struct RedisConnection {
    client: redis::Client,
    channel: String,
}

#[async_trait]
impl Connection for RedisConnection {
    async fn emit(&self, event: &CreatorEvent) -> QueueResult<()> {
        let frame = NotifyFrame {
            event: event.event_name(),
            data: event.payload(),
        };
        let payload = serde_json::to_string(&frame)?;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let receivers: u64 = conn.publish(&self.channel, payload).await?;
        if receivers == 0 {
            // Client disconnected between the presence check and this emit.
            warn!(channel = %self.channel, "Published event reached no subscribers");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_name_is_per_user() {
        assert_eq!(channel_for("user_42"), "creator:user_42");
    }

    #[test]
    fn frame_omits_missing_payload() {
        let frame = NotifyFrame {
            event: "updateSubmission",
            data: None,
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, "{\"event\":\"updateSubmission\"}");
    }

    #[test]
    fn frame_carries_event_payload() {
        let event = CreatorEvent::processing("clip.mov", 50);
        let frame = NotifyFrame {
            event: event.event_name(),
            data: event.payload(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&frame).unwrap()).unwrap();
        assert_eq!(json["event"], "progress");
        assert_eq!(json["data"]["fileName"], "clip.mov");
    }
}
