//! In-memory alert delivery log.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::alert::AlertDeliveryRecord;
use crate::storage::{AlertDeliveryRecorder, Result};

#[derive(Default)]
pub struct InMemoryAlertDeliveryRecorder {
    records: RwLock<Vec<AlertDeliveryRecord>>,
}

impl InMemoryAlertDeliveryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AlertDeliveryRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl AlertDeliveryRecorder for InMemoryAlertDeliveryRecorder {
    async fn record(&self, records: &[AlertDeliveryRecord]) -> Result<()> {
        self.records.write().await.extend_from_slice(records);
        Ok(())
    }
}
