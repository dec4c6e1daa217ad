//! Inference submission for trained AutoML models
//!
//! Scores a training run's model against a held-out dataset by submitting
//! `infer.py` from a script folder as a new run. The new run is tagged with
//! the training run's identity and validation score so its results can be
//! compared against the leaderboard later.
//!
//! ## Environment resolution
//!
//! 1. `train_run.get_environment()`
//! 2. on any failure: `runDefinition.environment` from the run details,
//!    reconstructed through an [`EnvironmentLoader`]
//! 3. no embedded environment: the failure from step 1 is returned inside
//!    [`Error::EnvironmentUnresolvable`]

use crate::config::InferenceConfig;
use crate::environment::{DefinitionLoader, Environment, EnvironmentLoader};
use crate::tracking::{
    Dataset, Experiment, NamedInput, RunMetadata, SubmittedRun, Tags, TrainingRun,
    PROPERTY_PRIMARY_METRIC, PROPERTY_RUN_ALGORITHM, PROPERTY_SCORE,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Tag holding the source training run ID.
pub const TAG_TRAINING_RUN_ID: &str = "training_run_id";
/// Tag holding the algorithm of the scored model.
pub const TAG_RUN_ALGORITHM: &str = "run_algorithm";
/// Tag holding the training run's validation score.
pub const TAG_VALID_SCORE: &str = "valid_score";
/// Tag holding the metric the validation score was measured with.
pub const TAG_PRIMARY_METRIC: &str = "primary_metric";

/// Compute cluster a run is scheduled on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComputeTarget(String);

impl ComputeTarget {
    /// Reference the compute target named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the target name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// One entry of a script's argument list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptArgument {
    /// Passed through verbatim
    Literal(String),
    /// Resolved by the service to the bound dataset
    Input(NamedInput),
}

impl From<&str> for ScriptArgument {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<NamedInput> for ScriptArgument {
    fn from(input: NamedInput) -> Self {
        Self::Input(input)
    }
}

impl fmt::Display for ScriptArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.write_str(value),
            Self::Input(input) => fmt::Display::fmt(input, f),
        }
    }
}

/// A script run ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfiguration {
    source_directory: PathBuf,
    script: String,
    arguments: Vec<ScriptArgument>,
    compute_target: ComputeTarget,
    environment: Environment,
}

impl RunConfiguration {
    /// Create a configuration with an empty argument list.
    #[must_use]
    pub fn new(
        source_directory: impl Into<PathBuf>,
        script: impl Into<String>,
        compute_target: ComputeTarget,
        environment: Environment,
    ) -> Self {
        Self {
            source_directory: source_directory.into(),
            script: script.into(),
            arguments: Vec::new(),
            compute_target,
            environment,
        }
    }

    /// Append an argument.
    #[must_use]
    pub fn arg(mut self, argument: impl Into<ScriptArgument>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    /// Directory uploaded with the run.
    #[must_use]
    pub fn source_directory(&self) -> &Path {
        &self.source_directory
    }

    /// Entry script, relative to the source directory.
    #[must_use]
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Arguments in submission order.
    #[must_use]
    pub fn arguments(&self) -> &[ScriptArgument] {
        &self.arguments
    }

    /// Target the run is scheduled on.
    #[must_use]
    pub const fn compute_target(&self) -> &ComputeTarget {
        &self.compute_target
    }

    /// Environment the run executes in.
    #[must_use]
    pub const fn environment(&self) -> &Environment {
        &self.environment
    }

    /// The argv the job will see (`python`, the script, then the
    /// arguments), data references rendered.
    #[must_use]
    pub fn command_line(&self) -> Vec<String> {
        ["python".to_string(), self.script.clone()]
            .into_iter()
            .chain(self.arguments.iter().map(ToString::to_string))
            .collect()
    }
}

/// Submits scoring runs for trained models.
#[derive(Debug, Clone, Default)]
pub struct InferenceSubmitter<L = DefinitionLoader> {
    config: InferenceConfig,
    loader: L,
}

impl InferenceSubmitter {
    /// Submitter with default config and in-memory environment loading.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<L: EnvironmentLoader> InferenceSubmitter<L> {
    /// Submitter with explicit config and environment loader.
    #[must_use]
    pub const fn with_loader(config: InferenceConfig, loader: L) -> Self {
        Self { config, loader }
    }

    /// Get the config.
    #[must_use]
    pub const fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Resolve the environment a training run executed in.
    ///
    /// # Errors
    /// Returns `Error::EnvironmentUnresolvable` wrapping the original fetch
    /// failure when the run definition carries no environment, or the
    /// loader's error when the embedded definition cannot be loaded
    pub fn resolve_environment<R: TrainingRun + ?Sized>(
        &self,
        train_run: &R,
    ) -> Result<Environment> {
        let original = match train_run.get_environment() {
            Ok(environment) => return Ok(environment),
            Err(e) => e,
        };

        warn!(
            run_id = train_run.id(),
            error = %original,
            "Environment fetch failed, recovering from run definition"
        );

        let definition = match train_run.get_details() {
            Ok(details) => details.environment_definition(),
            Err(details_error) => {
                warn!(
                    run_id = train_run.id(),
                    error = %details_error,
                    "Run details unavailable"
                );
                None
            }
        };

        let Some(definition) = definition else {
            return Err(Error::EnvironmentUnresolvable {
                run_id: train_run.id().to_string(),
                source: Box::new(original),
            });
        };

        self.loader.load(definition)
    }

    /// Submit `infer.py` from `script_folder` to score `train_run`'s model
    /// on `test_dataset`.
    ///
    /// The submitted run is tagged with `training_run_id`, `run_algorithm`,
    /// `valid_score` and `primary_metric`, and logs its `run_algorithm` tag.
    ///
    /// # Errors
    /// Returns error if the environment cannot be resolved, `train_run`
    /// lacks `run_algorithm`, `score` or `primary_metric`, or the service
    /// fails to submit or log
    #[allow(clippy::too_many_arguments)]
    pub fn run_inference<E, R, D>(
        &self,
        test_experiment: &E,
        compute_target: &ComputeTarget,
        script_folder: &Path,
        train_run: &R,
        test_dataset: &D,
        target_column_name: &str,
        model_name: &str,
    ) -> Result<E::Run>
    where
        E: Experiment + ?Sized,
        R: TrainingRun + ?Sized,
        D: Dataset + ?Sized,
    {
        let environment = self.resolve_environment(train_run)?;

        let config = RunConfiguration::new(
            script_folder,
            self.config.script.as_str(),
            compute_target.clone(),
            environment,
        )
        .arg("--target_column_name")
        .arg(target_column_name)
        .arg("--model_name")
        .arg(model_name)
        .arg("--input-data")
        .arg(test_dataset.as_named_input(&self.config.input_name));

        let tags = training_tags(train_run)?;
        let run = test_experiment.submit(&config, tags)?;

        let algorithm = run
            .tags()
            .get(TAG_RUN_ALGORITHM)
            .cloned()
            .ok_or_else(|| Error::MissingTag {
                run_id: run.id().to_string(),
                key: TAG_RUN_ALGORITHM.to_string(),
            })?;
        run.log(TAG_RUN_ALGORITHM, serde_json::Value::String(algorithm.clone()))?;

        info!(
            run_id = run.id(),
            training_run_id = train_run.id(),
            run_algorithm = %algorithm,
            compute_target = compute_target.name(),
            "Submitted inference run"
        );

        Ok(run)
    }
}

/// Tags copied from a training run onto its inference run.
///
/// # Errors
/// Returns `Error::MissingProperty` if `run_algorithm`, `score` or
/// `primary_metric` is absent
pub fn training_tags<R: RunMetadata + ?Sized>(train_run: &R) -> Result<Tags> {
    let property = |key: &str| {
        train_run
            .properties()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::missing_property(train_run.id(), key))
    };

    let mut tags = Tags::new();
    tags.insert(TAG_TRAINING_RUN_ID.to_string(), train_run.id().to_string());
    tags.insert(TAG_RUN_ALGORITHM.to_string(), property(PROPERTY_RUN_ALGORITHM)?);
    tags.insert(TAG_VALID_SCORE.to_string(), property(PROPERTY_SCORE)?);
    tags.insert(TAG_PRIMARY_METRIC.to_string(), property(PROPERTY_PRIMARY_METRIC)?);
    Ok(tags)
}

/// Submit an inference run with the default [`InferenceSubmitter`].
///
/// # Errors
/// See [`InferenceSubmitter::run_inference`]
#[allow(clippy::too_many_arguments)]
pub fn run_inference<E, R, D>(
    test_experiment: &E,
    compute_target: &ComputeTarget,
    script_folder: &Path,
    train_run: &R,
    test_dataset: &D,
    target_column_name: &str,
    model_name: &str,
) -> Result<E::Run>
where
    E: Experiment + ?Sized,
    R: TrainingRun + ?Sized,
    D: Dataset + ?Sized,
{
    InferenceSubmitter::new().run_inference(
        test_experiment,
        compute_target,
        script_folder,
        train_run,
        test_dataset,
        target_column_name,
        model_name,
    )
}
