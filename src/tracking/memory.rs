//! Memory Workspace - in-memory tracking service
//!
//! Implements every capability trait over hash maps so the inference and
//! summary operations can run without a remote service.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    ChildRun, Dataset, Experiment, LogRecord, NamedInput, ParentRun, Properties, RunMetadata,
    SubmittedRun, Tags, TrainingRun,
};
use crate::environment::{Environment, RunDetails};
use crate::submit::RunConfiguration;
use crate::{Error, Result};

/// A run as stored by [`MemoryWorkspace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    run_id: String,
    parent_id: Option<String>,
    properties: Properties,
    tags: Tags,
    environment: Option<Environment>,
    details: Option<RunDetails>,
}

impl RunRecord {
    /// Create a top-level run record with no metadata.
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        RunRecordBuilder::new(run_id).build()
    }

    /// Create a builder for constructing a run record with optional fields.
    #[must_use]
    pub fn builder(run_id: impl Into<String>) -> RunRecordBuilder {
        RunRecordBuilder::new(run_id)
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parent run ID, if any.
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
}

/// Builder for `RunRecord`.
#[derive(Debug)]
pub struct RunRecordBuilder {
    record: RunRecord,
}

impl RunRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            record: RunRecord {
                run_id: run_id.into(),
                parent_id: None,
                properties: Properties::new(),
                tags: Tags::new(),
                environment: None,
                details: None,
            },
        }
    }

    /// Attach the run under `parent_id`.
    #[must_use]
    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.record.parent_id = Some(parent_id.into());
        self
    }

    /// Set a property.
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.record.properties.insert(key.into(), value.into());
        self
    }

    /// Set a tag.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.record.tags.insert(key.into(), value.into());
        self
    }

    /// Make `get_environment` succeed with `environment`.
    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.record.environment = Some(environment);
        self
    }

    /// Make `get_details` succeed with `details`.
    #[must_use]
    pub fn details(mut self, details: RunDetails) -> Self {
        self.record.details = Some(details);
        self
    }

    /// Build the `RunRecord`.
    #[must_use]
    pub fn build(self) -> RunRecord {
        self.record
    }
}

/// A configuration accepted by [`MemoryExperiment::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Experiment the run was submitted to
    pub experiment: String,
    /// ID assigned to the new run
    pub run_id: String,
    /// Submitted configuration
    pub config: RunConfiguration,
    /// Tags passed at submission
    pub tags: Tags,
}

#[derive(Debug, Default)]
struct WorkspaceState {
    runs: HashMap<String, RunRecord>,
    // parent -> children in insertion order
    children: HashMap<String, Vec<String>>,
    submissions: Vec<Submission>,
    logs: Vec<LogRecord>,
}

/// In-memory tracking workspace.
///
/// ## Design
///
/// Runs live in a hash map for O(1) lookups by ID; parent/child links are
/// kept in insertion order so descendant listings are deterministic. State
/// sits behind an `RwLock` so handles can borrow the workspace immutably.
#[derive(Debug, Default)]
pub struct MemoryWorkspace {
    state: RwLock<WorkspaceState>,
}

impl MemoryWorkspace {
    /// Create a new empty workspace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, WorkspaceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, WorkspaceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check if the workspace holds no runs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().runs.is_empty()
    }

    /// Get the number of runs, submitted runs included.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.read().runs.len()
    }

    /// Add a run, replacing any run with the same ID.
    ///
    /// A replacement under a different parent is unlinked from its old one.
    pub fn add_run(&self, record: RunRecord) {
        let mut state = self.write();
        let previous_parent = state
            .runs
            .get(&record.run_id)
            .and_then(|existing| existing.parent_id.clone())
            .filter(|previous| record.parent_id.as_ref() != Some(previous));
        if let Some(previous) = previous_parent {
            if let Some(siblings) = state.children.get_mut(&previous) {
                siblings.retain(|sibling| *sibling != record.run_id);
            }
        }
        if let Some(parent_id) = record.parent_id.clone() {
            let siblings = state.children.entry(parent_id).or_default();
            if !siblings.contains(&record.run_id) {
                siblings.push(record.run_id.clone());
            }
        }
        state.runs.insert(record.run_id.clone(), record);
    }

    /// Get a handle to a run by ID.
    ///
    /// # Errors
    /// Returns `Error::RunNotFound` if no run has this ID
    pub fn run(&self, run_id: &str) -> Result<MemoryRun<'_>> {
        let state = self.read();
        let record = state
            .runs
            .get(run_id)
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
        Ok(MemoryRun {
            workspace: self,
            id: record.run_id.clone(),
            properties: record.properties.clone(),
            tags: record.tags.clone(),
        })
    }

    /// Get a submission endpoint named `name`.
    #[must_use]
    pub fn experiment(&self, name: impl Into<String>) -> MemoryExperiment<'_> {
        MemoryExperiment {
            workspace: self,
            name: name.into(),
        }
    }

    /// All submissions, oldest first.
    #[must_use]
    pub fn submissions(&self) -> Vec<Submission> {
        self.read().submissions.clone()
    }

    /// Values logged on a run, ordered by timestamp.
    #[must_use]
    pub fn logs_for_run(&self, run_id: &str) -> Vec<LogRecord> {
        let mut logs: Vec<LogRecord> = self
            .read()
            .logs
            .iter()
            .filter(|record| record.run_id() == run_id)
            .cloned()
            .collect();

        logs.sort_by_key(LogRecord::timestamp);

        logs
    }

    fn descendants(&self, run_id: &str, recursive: bool) -> Vec<ChildRun> {
        let state = self.read();
        let mut found = Vec::new();
        let mut visited: HashSet<&str> = HashSet::from([run_id]);
        let mut pending: Vec<&str> = vec![run_id];

        // A run's direct children are listed together, in insertion order,
        // when the run is expanded; expansion then continues depth-first
        // from the first of them. Runs already seen (cycles) are skipped.
        while let Some(current) = pending.pop() {
            let Some(child_ids) = state.children.get(current) else {
                continue;
            };
            let mut expanded = Vec::new();
            for child_id in child_ids {
                if !visited.insert(child_id.as_str()) {
                    continue;
                }
                if let Some(child) = state.runs.get(child_id) {
                    found.push(ChildRun::new(child.run_id.clone(), child.properties.clone()));
                }
                expanded.push(child_id.as_str());
            }
            if recursive {
                pending.extend(expanded.into_iter().rev());
            }
        }

        found
    }
}

/// A dataset registered under a fixed ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDataset {
    dataset_id: String,
}

impl MemoryDataset {
    /// Create a dataset with the given ID.
    #[must_use]
    pub fn new(dataset_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
        }
    }
}

impl Dataset for MemoryDataset {
    fn as_named_input(&self, name: &str) -> NamedInput {
        NamedInput::new(self.dataset_id.as_str(), name)
    }
}

/// Handle to a run in a [`MemoryWorkspace`].
///
/// Metadata is a snapshot taken when the handle is created; logging goes
/// straight to the workspace.
#[derive(Debug, Clone)]
pub struct MemoryRun<'a> {
    workspace: &'a MemoryWorkspace,
    id: String,
    properties: Properties,
    tags: Tags,
}

impl RunMetadata for MemoryRun<'_> {
    fn id(&self) -> &str {
        &self.id
    }

    fn properties(&self) -> &Properties {
        &self.properties
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }
}

impl TrainingRun for MemoryRun<'_> {
    fn get_environment(&self) -> Result<Environment> {
        self.workspace
            .read()
            .runs
            .get(&self.id)
            .and_then(|record| record.environment.clone())
            .ok_or_else(|| {
                Error::Service(format!(
                    "environment of run {} could not be reconstructed",
                    self.id
                ))
            })
    }

    fn get_details(&self) -> Result<RunDetails> {
        self.workspace
            .read()
            .runs
            .get(&self.id)
            .and_then(|record| record.details.clone())
            .ok_or_else(|| Error::Service(format!("details of run {} are unavailable", self.id)))
    }
}

impl ParentRun for MemoryRun<'_> {
    fn get_children(&self, recursive: bool) -> Result<Vec<ChildRun>> {
        Ok(self.workspace.descendants(&self.id, recursive))
    }
}

impl SubmittedRun for MemoryRun<'_> {
    fn log(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut state = self.workspace.write();
        if !state.runs.contains_key(&self.id) {
            return Err(Error::RunNotFound(self.id.clone()));
        }
        state.logs.push(LogRecord::new(self.id.as_str(), key, value));
        Ok(())
    }
}

/// Submission endpoint of a [`MemoryWorkspace`].
#[derive(Debug, Clone)]
pub struct MemoryExperiment<'a> {
    workspace: &'a MemoryWorkspace,
    name: String,
}

impl MemoryExperiment<'_> {
    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<'a> Experiment for MemoryExperiment<'a> {
    type Run = MemoryRun<'a>;

    fn submit(&self, config: &RunConfiguration, tags: Tags) -> Result<MemoryRun<'a>> {
        let mut state = self.workspace.write();
        // next index whose ID is not taken by an existing run
        let run_id = (state.submissions.len()..)
            .map(|index| format!("{}_{index}", self.name))
            .find(|candidate| !state.runs.contains_key(candidate))
            .ok_or_else(|| Error::Service(format!("no free run ID in {}", self.name)))?;

        state.runs.insert(
            run_id.clone(),
            RunRecord {
                run_id: run_id.clone(),
                parent_id: None,
                properties: Properties::new(),
                tags: tags.clone(),
                environment: Some(config.environment().clone()),
                details: None,
            },
        );
        state.submissions.push(Submission {
            experiment: self.name.clone(),
            run_id: run_id.clone(),
            config: config.clone(),
            tags: tags.clone(),
        });

        Ok(MemoryRun {
            workspace: self.workspace,
            id: run_id,
            properties: Properties::new(),
            tags,
        })
    }
}
