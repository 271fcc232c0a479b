use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single successful decode produced by the decode loop. Transient:
/// consumed by the scan controller on arrival, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeEvent {
    pub payload: String,
    pub timestamp: DateTime<Utc>,
}

impl DecodeEvent {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }
}
