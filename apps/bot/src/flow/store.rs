//! Session persistence, keyed by chat.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, warn};

use super::session::Session;
use crate::errors::AppError;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the live session for `chat_id`, if any.
    async fn load(&self, chat_id: i64) -> Result<Option<Session>, AppError>;

    /// Overwrites the session and refreshes its expiry.
    async fn save(&self, chat_id: i64, session: &Session) -> Result<(), AppError>;

    /// Returns whether a session existed.
    async fn clear(&self, chat_id: i64) -> Result<bool, AppError>;
}

/// Sessions as JSON strings under `session:<chat_id>`, expiring after `ttl_secs`
/// of inactivity.
#[derive(Clone)]
pub struct RedisSessionStore {
    connection: MultiplexedConnection,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub async fn connect(client: &redis::Client, ttl_secs: u64) -> Result<Self, AppError> {
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            connection,
            ttl_secs,
        })
    }
}

pub(crate) fn session_key(chat_id: i64) -> String {
    format!("session:{chat_id}")
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, chat_id: i64) -> Result<Option<Session>, AppError> {
        let key = session_key(chat_id);
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(&key).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                // Unreadable state (e.g. written by an older release) is dropped.
                warn!("Discarding corrupt session for chat {chat_id}: {e}");
                let _: i64 = conn.del(&key).await?;
                Ok(None)
            }
        }
    }

    async fn save(&self, chat_id: i64, session: &Session) -> Result<(), AppError> {
        let payload = serde_json::to_string(session)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("session encode failed: {e}")))?;
        let mut conn = self.connection.clone();
        let _: () = conn
            .set_ex(session_key(chat_id), payload, self.ttl_secs)
            .await?;
        debug!("Saved session for chat {chat_id}");
        Ok(())
    }

    async fn clear(&self, chat_id: i64) -> Result<bool, AppError> {
        let mut conn = self.connection.clone();
        let removed: i64 = conn.del(session_key(chat_id)).await?;
        Ok(removed > 0)
    }
}
