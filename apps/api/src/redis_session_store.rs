use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tower_sessions::SessionStore;
use tower_sessions::cookie::time::OffsetDateTime;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, Error as SessionStoreError};

/// Session records stored as JSON strings with a TTL matching their expiry.
#[derive(Debug, Clone)]
pub struct RedisSessionStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisSessionStore {
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, session_id: &Id) -> String {
        format!("{}:{session_id}", self.key_prefix)
    }

    async fn connection(&self) -> session_store::Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend_error)
    }
}

fn backend_error(error: impl std::fmt::Display) -> SessionStoreError {
    SessionStoreError::Backend(error.to_string())
}

fn remaining_ttl_seconds(record: &Record, now: OffsetDateTime) -> Option<u64> {
    let seconds = (record.expiry_date - now).whole_seconds();
    u64::try_from(seconds).ok().filter(|seconds| *seconds > 0)
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn save(&self, session_record: &Record) -> session_store::Result<()> {
        let key = self.key_for(&session_record.id);
        let mut connection = self.connection().await?;

        let Some(ttl_seconds) = remaining_ttl_seconds(session_record, OffsetDateTime::now_utc())
        else {
            let _: i64 = connection.del(key).await.map_err(backend_error)?;
            return Ok(());
        };

        let encoded = serde_json::to_string(session_record)
            .map_err(|error| SessionStoreError::Encode(error.to_string()))?;

        connection
            .set_ex::<_, _, ()>(key, encoded, ttl_seconds)
            .await
            .map_err(backend_error)
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let mut connection = self.connection().await?;

        let encoded: Option<String> = connection
            .get(self.key_for(session_id))
            .await
            .map_err(backend_error)?;

        encoded
            .as_deref()
            .map(|value| {
                serde_json::from_str::<Record>(value)
                    .map_err(|error| SessionStoreError::Decode(error.to_string()))
            })
            .transpose()
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        let mut connection = self.connection().await?;
        let _: i64 = connection
            .del(self.key_for(session_id))
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}
