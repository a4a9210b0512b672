//! Per-clip import records.

use chrono::{DateTime, Utc};
use clipcard_core::ContentKind;
use serde::Serialize;
use uuid::Uuid;

use crate::importer::ImportStatus;

/// Outcome of processing one clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub content_hash: String,
    pub kind: Option<ContentKind>,
    pub status: ImportStatus,
    pub error: Option<String>,
}

impl ImportRecord {
    pub fn new(content_hash: impl Into<String>, kind: Option<ContentKind>, status: ImportStatus) -> Self {
        let error = status.reason().map(str::to_string);
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            content_hash: content_hash.into(),
            kind,
            status,
            error,
        }
    }
}

/// Destination for import records.
pub trait ImportRecorder: Send + Sync {
    fn record(&self, record: &ImportRecord);
}

/// Emits records as structured events on the `clipcard::audit` target.
#[derive(Debug, Default)]
pub struct TracingRecorder;

impl ImportRecorder for TracingRecorder {
    fn record(&self, record: &ImportRecord) {
        let json = serde_json::to_string(record).unwrap_or_default();
        tracing::info!(
            target: "clipcard::audit",
            id = %record.id,
            hash = %record.content_hash,
            status = record.status.label(),
            error = record.error.as_deref(),
            record = %json,
            "Import record"
        );
    }
}
