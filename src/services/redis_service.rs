// src/services/redis_service.rs
use crate::errors::AppError;
use crate::session::{SessionState, SessionStore};
use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use uuid::Uuid;

/// Session store shared between server instances through Redis.
pub struct RedisSessionStore {
    client: Client,
    ttl_secs: usize,
}

impl RedisSessionStore {
    pub async fn new(redis_url: &str, ttl_secs: usize) -> Result<Self, AppError> {
        let client = Client::open(redis_url).map_err(|e| AppError::Session(e.to_string()))?;

        // Test connection
        let mut conn = client
            .get_async_connection()
            .await
            .map_err(|e| AppError::Session(e.to_string()))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Session(e.to_string()))?;

        Ok(Self { client, ttl_secs })
    }

    fn key(id: &Uuid) -> String {
        format!("session:{}", id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, id: &Uuid) -> Result<Option<SessionState>, AppError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| AppError::Session(e.to_string()))?;

        let value: Option<String> = conn
            .get(Self::key(id))
            .await
            .map_err(|e| AppError::Session(e.to_string()))?;

        value
            .map(|v| serde_json::from_str(&v).map_err(|e| AppError::Serialization(e.to_string())))
            .transpose()
    }

    async fn save(&self, state: &SessionState) -> Result<(), AppError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| AppError::Session(e.to_string()))?;

        let value =
            serde_json::to_string(state).map_err(|e| AppError::Serialization(e.to_string()))?;

        // Every save refreshes the expiry
        conn.set_ex::<_, _, ()>(Self::key(&state.session_id), value, self.ttl_secs)
            .await
            .map_err(|e| AppError::Session(e.to_string()))?;

        Ok(())
    }

    async fn remove(&self, id: &Uuid) -> Result<(), AppError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| AppError::Session(e.to_string()))?;

        conn.del::<_, ()>(Self::key(id))
            .await
            .map_err(|e| AppError::Session(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_session() {
        let id = Uuid::nil();
        assert_eq!(
            RedisSessionStore::key(&id),
            "session:00000000-0000-0000-0000-000000000000"
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_a_session_error() {
        let err = RedisSessionStore::new("redis://127.0.0.1:1", 60)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Session(_)));
    }
}
