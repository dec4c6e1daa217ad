//! Tracking Service Capabilities
//!
//! The operations in this crate talk to a remote experiment-tracking and
//! job-submission service only through the traits below. Each trait is a
//! capability: a training run must hand back its environment, a parent run
//! must list its descendants, a submitted run must accept log entries.
//!
//! ## Schema Overview
//!
//! ```text
//! Experiment ──submit──> SubmittedRun (tags, log)
//!
//! TrainingRun (id, properties, environment, details)
//!
//! ParentRun ──get_children──< ChildRun (id, properties)
//! ```
//!
//! [`MemoryWorkspace`] implements every capability in memory.
//!
//! ## Usage
//!
//! ```rust
//! use automl_scoring::tracking::{ChildRun, MemoryWorkspace, ParentRun, RunRecord};
//!
//! let workspace = MemoryWorkspace::new();
//! workspace.add_run(RunRecord::new("automl_parent"));
//! workspace.add_run(
//!     RunRecord::builder("automl_parent_0")
//!         .parent("automl_parent")
//!         .property("run_algorithm", "LightGBM")
//!         .property("score", "0.91")
//!         .build(),
//! );
//!
//! let parent = workspace.run("automl_parent")?;
//! let children: Vec<ChildRun> = parent.get_children(true)?;
//! assert_eq!(children.len(), 1);
//! # Ok::<(), automl_scoring::Error>(())
//! ```

mod log_record;
mod memory;

pub use log_record::LogRecord;
pub use memory::{
    MemoryDataset, MemoryExperiment, MemoryRun, MemoryWorkspace, RunRecord, RunRecordBuilder,
    Submission,
};

use crate::environment::{Environment, RunDetails};
use crate::submit::RunConfiguration;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// String-keyed run properties, set once by the service.
pub type Properties = BTreeMap<String, String>;

/// String-keyed run tags, writable by clients.
pub type Tags = BTreeMap<String, String>;

/// Algorithm that produced a candidate model.
pub const PROPERTY_RUN_ALGORITHM: &str = "run_algorithm";
/// Validation score of the candidate, as a decimal string.
pub const PROPERTY_SCORE: &str = "score";
/// Metric the score was measured with.
pub const PROPERTY_PRIMARY_METRIC: &str = "primary_metric";
/// Optimization goal, `<metric>_min` or `<metric>_max`.
pub const PROPERTY_GOAL: &str = "goal";

/// Identity and metadata of a run.
pub trait RunMetadata {
    /// Run identifier.
    fn id(&self) -> &str;

    /// Properties recorded by the service.
    fn properties(&self) -> &Properties;

    /// Tags attached to the run.
    fn tags(&self) -> &Tags;
}

/// A completed training run whose model is being scored.
pub trait TrainingRun: RunMetadata {
    /// Fetch the environment the run executed in.
    ///
    /// # Errors
    /// Returns error if the service cannot reconstruct the environment
    fn get_environment(&self) -> Result<Environment>;

    /// Fetch the run details document.
    ///
    /// # Errors
    /// Returns error if the details cannot be retrieved
    fn get_details(&self) -> Result<RunDetails>;
}

/// A run with descendants, e.g. an AutoML parent run.
pub trait ParentRun {
    /// List child runs. With `recursive`, every descendant at any depth is
    /// returned as one flat list.
    ///
    /// # Errors
    /// Returns error if the listing fails
    fn get_children(&self, recursive: bool) -> Result<Vec<ChildRun>>;
}

/// A run handed back by [`Experiment::submit`].
pub trait SubmittedRun: RunMetadata {
    /// Record a named value on the run.
    ///
    /// # Errors
    /// Returns error if the service rejects the entry
    fn log(&self, key: &str, value: serde_json::Value) -> Result<()>;
}

/// Submission endpoint for new runs.
pub trait Experiment {
    /// Handle type of submitted runs.
    type Run: SubmittedRun;

    /// Submit `config` as a new run carrying `tags`.
    ///
    /// # Errors
    /// Returns error if the service refuses the submission
    fn submit(&self, config: &RunConfiguration, tags: Tags) -> Result<Self::Run>;
}

/// A registered dataset that can be bound to a job input.
pub trait Dataset {
    /// Bind the dataset to the symbolic input `name`.
    fn as_named_input(&self, name: &str) -> NamedInput;
}

/// A dataset bound to a symbolic input name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedInput {
    dataset_id: String,
    name: String,
}

impl NamedInput {
    /// Bind `dataset_id` to `name`.
    #[must_use]
    pub fn new(dataset_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            name: name.into(),
        }
    }

    /// Identifier of the bound dataset.
    #[must_use]
    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    /// Symbolic input name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for NamedInput {
    /// Renders the data reference the job sees on its command line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$AZUREML_DATAREFERENCE_{}", self.name)
    }
}

/// Metadata-only view of a descendant run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRun {
    id: String,
    properties: Properties,
}

impl ChildRun {
    /// Create a child run view.
    #[must_use]
    pub const fn new(id: String, properties: Properties) -> Self {
        Self { id, properties }
    }

    /// Child run with a single property set, for quick construction.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Run identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Properties recorded by the service.
    #[must_use]
    pub const fn properties(&self) -> &Properties {
        &self.properties
    }
}
