//! In-memory storage backends.
//!
//! Used for `storage.type: memory`, for tests, and as the default dirty set
//! and bucket store when Redis is disabled.

mod alert_records;
mod buckets;
mod dirty;
mod incidents;
mod signals;
mod states;

pub use alert_records::InMemoryAlertDeliveryRecorder;
pub use buckets::{InMemoryTemporalBucketStore, NoopTemporalBucketStore};
pub use dirty::InMemoryDirtyComponentStore;
pub use incidents::InMemoryIncidentRepository;
pub use signals::InMemorySignalStore;
pub use states::InMemoryStateRepository;
