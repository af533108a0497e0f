//! Redis DirtyComponentStore.

use std::collections::BTreeSet;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use tracing::debug;

use super::DEFAULT_KEY_PREFIX;
use crate::domain::ComponentId;
use crate::storage::{DirtyComponentStore, Result};

/// Dirty set stored as a Redis set.
///
/// Key format: `{prefix}:dirty:components`
pub struct RedisDirtyComponentStore {
    conn: ConnectionManager,
    key: String,
}

impl RedisDirtyComponentStore {
    pub fn new(conn: ConnectionManager, key_prefix: Option<&str>) -> Self {
        Self {
            conn,
            key: format!(
                "{}:dirty:components",
                key_prefix.unwrap_or(DEFAULT_KEY_PREFIX)
            ),
        }
    }
}

#[async_trait]
impl DirtyComponentStore for RedisDirtyComponentStore {
    async fn mark_dirty(&self, component_id: &ComponentId) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(&self.key, component_id.to_string()).await?;
        Ok(())
    }

    async fn drain(&self) -> Result<BTreeSet<ComponentId>> {
        let mut conn = self.conn.clone();

        // SMEMBERS + DEL in one MULTI so no SADD lands between them.
        let (members, _): (Vec<String>, i64) = redis::pipe()
            .atomic()
            .smembers(&self.key)
            .del(&self.key)
            .query_async(&mut conn)
            .await?;

        let mut drained = BTreeSet::new();
        for member in members {
            drained.insert(member.parse::<ComponentId>()?);
        }

        if !drained.is_empty() {
            debug!(count = drained.len(), "Drained dirty components from Redis");
        }
        Ok(drained)
    }
}
