//! Detection persistence.
//!
//! Completed detections are recorded after the response is decided. A store
//! failure is logged and counted by the caller, never surfaced to the client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::detection::DetectionResult;

/// A detection as stored: the result plus the analysed text.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRecord {
    #[serde(flatten)]
    pub result: DetectionResult,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counters over stored detections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionStats {
    pub total_processed: u64,
    pub spam_count: u64,
    pub ham_count: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("detection store unavailable: {0}")]
    Unavailable(String),
    #[error("duplicate detection id {0}")]
    Duplicate(Uuid),
}

#[async_trait]
pub trait DetectionStore: Send + Sync {
    async fn record(&self, record: DetectionRecord) -> Result<(), StoreError>;

    async fn stats(&self) -> Result<DetectionStats, StoreError>;

    /// Short label for the health endpoint.
    fn describe(&self) -> &'static str;
}

/// In-process store keyed by detection id.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<Uuid, DetectionRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl DetectionStore for MemoryStore {
    async fn record(&self, record: DetectionRecord) -> Result<(), StoreError> {
        let id = record.result.detection_id;
        match self.records.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::Duplicate(id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn stats(&self) -> Result<DetectionStats, StoreError> {
        let mut stats = DetectionStats::default();
        for r in self.records.iter() {
            stats.total_processed += 1;
            match r.value().result.classification.as_str() {
                "spam" => stats.spam_count += 1,
                "ham" => stats.ham_count += 1,
                _ => {}
            }
        }
        Ok(stats)
    }

    fn describe(&self) -> &'static str {
        "memory"
    }
}
