//! Pluggable journal persistence.
//!
//! Correctness never depends on this: the in-memory journal is
//! authoritative and process-local. An adapter only mirrors committed
//! records, e.g. for audit or offline analysis.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::game::journal::ChangeRecord;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Mirror one committed record. Failures are logged, never fatal.
    async fn append(&self, room_id: &str, record: &ChangeRecord) -> anyhow::Result<()>;

    /// All mirrored records for a room, in version order.
    async fn load(&self, room_id: &str) -> anyhow::Result<Vec<ChangeRecord>>;
}

/// The shipped adapter: a process-local mirror, mostly useful to tests and
/// the replay property.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    records: RwLock<HashMap<String, Vec<ChangeRecord>>>,
}

impl InMemoryEventStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, room_id: &str, record: &ChangeRecord) -> anyhow::Result<()> {
        let mut records = self.records.write().await;
        records
            .entry(room_id.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn load(&self, room_id: &str) -> anyhow::Result<Vec<ChangeRecord>> {
        let records = self.records.read().await;
        Ok(records.get(room_id).cloned().unwrap_or_default())
    }
}
