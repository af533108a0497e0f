//! Redis TemporalBucketStore.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use uuid::Uuid;

use super::DEFAULT_KEY_PREFIX;
use crate::domain::Signal;
use crate::storage::{Result, TemporalBucketStore};

/// One sorted set per component, scored by occurrence time in milliseconds.
///
/// Key format: `{prefix}:signals:{component_id}`
/// Member format: `{SEVERITY}:{occurred_millis}:{uuid}`
pub struct RedisTemporalBucketStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisTemporalBucketStore {
    pub fn new(conn: ConnectionManager, key_prefix: Option<&str>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.unwrap_or(DEFAULT_KEY_PREFIX).to_string(),
        }
    }

    fn bucket_key(&self, signal: &Signal) -> String {
        format!("{}:signals:{}", self.key_prefix, signal.component_id)
    }
}

#[async_trait]
impl TemporalBucketStore for RedisTemporalBucketStore {
    async fn add(&self, signal: &Signal) -> Result<()> {
        let mut conn = self.conn.clone();
        let millis = signal.occurred_at.timestamp_millis();
        let member = format!("{}:{}:{}", signal.severity, millis, Uuid::new_v4());

        let _: () = conn
            .zadd(self.bucket_key(signal), member, millis as f64)
            .await?;
        Ok(())
    }
}
