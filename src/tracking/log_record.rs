//! Log Record - values logged on a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single value recorded through `SubmittedRun::log`.
///
/// Values are arbitrary JSON so that both numeric metrics and string
/// annotations (such as the algorithm name) share one record type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    run_id: String,
    key: String,
    value: serde_json::Value,
    timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// Create a new log record stamped with the current time.
    ///
    /// # Arguments
    ///
    /// * `run_id` - ID of the run the value belongs to
    /// * `key` - Name of the logged value (e.g., "`run_algorithm`")
    /// * `value` - Logged value
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            value,
            timestamp: Utc::now(),
        }
    }

    /// Replace the timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the logged value.
    #[must_use]
    pub const fn value(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get the timestamp when the value was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
