//! Error types for automl-scoring
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// automl-scoring error types
#[derive(Error, Debug)]
pub enum Error {
    /// Environment could not be fetched from the run nor recovered from its run definition
    #[error("Environment unresolvable for run {run_id}: {source}\nThe run definition carries no environment to fall back on")]
    EnvironmentUnresolvable {
        /// Training run whose environment was requested
        run_id: String,
        /// The original environment fetch failure
        #[source]
        source: Box<Error>,
    },

    /// Required run property absent
    #[error("Run {run_id} is missing required property '{key}'")]
    MissingProperty {
        /// Run that was inspected
        run_id: String,
        /// Property key
        key: String,
    },

    /// Required tag absent on a submitted run
    #[error("Run {run_id} is missing tag '{key}'")]
    MissingTag {
        /// Run that was inspected
        run_id: String,
        /// Tag key
        key: String,
    },

    /// Score property is not a float
    #[error("Run {run_id} has a non-numeric score: {value:?}")]
    InvalidScore {
        /// Run that was inspected
        run_id: String,
        /// Raw property value
        value: String,
    },

    /// Child runs declare goals in both directions (strict policy only)
    #[error("Child runs disagree on goal direction: minimize declared by {minimize:?}, maximize declared by {maximize:?}")]
    ConflictingGoals {
        /// Runs whose goal ends in `_min`
        minimize: Vec<String>,
        /// Runs whose goal does not end in `_min`
        maximize: Vec<String>,
    },

    /// Run lookup failed
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// Remote tracking/execution service failure
    #[error("Tracking service error: {0}")]
    Service(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl Error {
    pub(crate) fn missing_property(run_id: &str, key: &str) -> Self {
        Self::MissingProperty {
            run_id: run_id.to_string(),
            key: key.to_string(),
        }
    }
}
