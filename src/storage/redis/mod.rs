//! Redis-backed dirty set and temporal signal buckets.
//!
//! Lets several ingestion processes share one dirty set with the evaluator.

mod buckets;
mod dirty;

use redis::{aio::ConnectionManager, Client};
use tracing::info;

use crate::storage::Result;

pub use buckets::RedisTemporalBucketStore;
pub use dirty::RedisDirtyComponentStore;

/// Default key prefix for every Redis key written by this crate.
pub const DEFAULT_KEY_PREFIX: &str = "dozor";

/// Open a managed connection.
pub async fn connect(url: &str) -> Result<ConnectionManager> {
    let client = Client::open(url)?;
    let conn = ConnectionManager::new(client).await?;
    info!(url = %url, "Connected to Redis");
    Ok(conn)
}
