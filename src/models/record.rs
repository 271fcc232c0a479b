use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A confirmed scan. Immutable once created; `timestamp` is the moment the
/// operator validated, not the original detection time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ScanRecord {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}
