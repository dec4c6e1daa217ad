//! Inference submission tests against the in-memory workspace

use automl_scoring::environment::{DirectoryLoader, RunDetails};
use automl_scoring::submit::{
    ScriptArgument, TAG_PRIMARY_METRIC, TAG_RUN_ALGORITHM, TAG_TRAINING_RUN_ID, TAG_VALID_SCORE,
};
use automl_scoring::tracking::{
    MemoryDataset, MemoryWorkspace, NamedInput, RunMetadata, RunRecord, RunRecordBuilder, Tags,
};
use automl_scoring::{
    run_inference, ComputeTarget, Environment, Error, InferenceConfig, InferenceSubmitter,
};
use serde_json::json;
use std::path::{Path, PathBuf};

fn trained(builder: RunRecordBuilder) -> RunRecord {
    builder
        .property("run_algorithm", "VotingEnsemble")
        .property("score", "0.9342")
        .property("primary_metric", "accuracy")
        .property("goal", "accuracy_max")
        .build()
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "automl-scoring-it-{}-{name}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// =============================================================================
// Submission contract
// =============================================================================

#[test]
fn test_arguments_in_exact_order() {
    let workspace = MemoryWorkspace::new();
    workspace.add_run(trained(
        RunRecord::builder("train-1").environment(Environment::new("AzureML-AutoML")),
    ));
    let train_run = workspace.run("train-1").unwrap();

    run_inference(
        &workspace.experiment("automl-test"),
        &ComputeTarget::new("cpu-cluster"),
        Path::new("./inference"),
        &train_run,
        &MemoryDataset::new("test-ds"),
        "y",
        "model.pkl",
    )
    .unwrap();

    let submissions = workspace.submissions();
    assert_eq!(submissions.len(), 1);
    let config = &submissions[0].config;

    assert_eq!(
        config.arguments(),
        &[
            ScriptArgument::Literal("--target_column_name".to_string()),
            ScriptArgument::Literal("y".to_string()),
            ScriptArgument::Literal("--model_name".to_string()),
            ScriptArgument::Literal("model.pkl".to_string()),
            ScriptArgument::Literal("--input-data".to_string()),
            ScriptArgument::Input(NamedInput::new("test-ds", "data")),
        ]
    );
    assert_eq!(config.script(), "infer.py");
    assert_eq!(config.source_directory(), Path::new("./inference"));
    assert_eq!(config.compute_target(), &ComputeTarget::new("cpu-cluster"));
    assert_eq!(config.environment().name(), "AzureML-AutoML");
}

#[test]
fn test_tags_copied_from_training_run() {
    let workspace = MemoryWorkspace::new();
    workspace.add_run(trained(
        RunRecord::builder("train-1").environment(Environment::new("env")),
    ));
    let train_run = workspace.run("train-1").unwrap();

    let run = run_inference(
        &workspace.experiment("automl-test"),
        &ComputeTarget::new("cpu-cluster"),
        Path::new("."),
        &train_run,
        &MemoryDataset::new("test-ds"),
        "y",
        "model.pkl",
    )
    .unwrap();

    let expected: Tags = [
        (TAG_TRAINING_RUN_ID, "train-1"),
        (TAG_RUN_ALGORITHM, "VotingEnsemble"),
        (TAG_VALID_SCORE, "0.9342"),
        (TAG_PRIMARY_METRIC, "accuracy"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    assert_eq!(run.tags(), &expected);
    assert_eq!(workspace.submissions()[0].tags, expected);
}

#[test]
fn test_algorithm_logged_on_new_run() {
    let workspace = MemoryWorkspace::new();
    workspace.add_run(trained(
        RunRecord::builder("train-1").environment(Environment::new("env")),
    ));
    let train_run = workspace.run("train-1").unwrap();

    let run = run_inference(
        &workspace.experiment("automl-test"),
        &ComputeTarget::new("cpu-cluster"),
        Path::new("."),
        &train_run,
        &MemoryDataset::new("test-ds"),
        "y",
        "model.pkl",
    )
    .unwrap();

    let logs = workspace.logs_for_run(run.id());
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].key(), "run_algorithm");
    assert_eq!(logs[0].value(), &json!("VotingEnsemble"));
    assert!(workspace.logs_for_run("train-1").is_empty());
}

// =============================================================================
// Environment fallback
// =============================================================================

#[test]
fn test_environment_recovered_from_run_definition() {
    let definition = json!({
        "name": "AutoML-Recovered",
        "version": "7",
        "python": {"userManagedDependencies": false}
    });
    let workspace = MemoryWorkspace::new();
    workspace.add_run(trained(
        RunRecord::builder("train-1").details(RunDetails::with_environment(definition.clone())),
    ));
    let train_run = workspace.run("train-1").unwrap();

    run_inference(
        &workspace.experiment("automl-test"),
        &ComputeTarget::new("cpu-cluster"),
        Path::new("."),
        &train_run,
        &MemoryDataset::new("test-ds"),
        "y",
        "model.pkl",
    )
    .unwrap();

    let submitted = workspace.submissions()[0].config.environment().clone();
    let expected: Environment = serde_json::from_value(definition).unwrap();
    assert_eq!(submitted, expected);
}

#[test]
fn test_environment_recovered_through_directory() {
    let definition = json!({"name": "AutoML-Disk", "docker": {"enabled": true}});
    let dir = scratch_dir("fallback");
    let workspace = MemoryWorkspace::new();
    workspace.add_run(trained(
        RunRecord::builder("train-1").details(RunDetails::with_environment(definition.clone())),
    ));
    let train_run = workspace.run("train-1").unwrap();

    let submitter =
        InferenceSubmitter::with_loader(InferenceConfig::default(), DirectoryLoader::new(&dir));
    submitter
        .run_inference(
            &workspace.experiment("automl-test"),
            &ComputeTarget::new("cpu-cluster"),
            Path::new("."),
            &train_run,
            &MemoryDataset::new("test-ds"),
            "y",
            "model.pkl",
        )
        .unwrap();

    let on_disk: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.join("azureml_environment.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(on_disk, definition);
    assert_eq!(
        workspace.submissions()[0].config.environment(),
        &Environment::load_from_directory(&dir).unwrap()
    );

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_unresolvable_environment_propagates_original_error() {
    let workspace = MemoryWorkspace::new();
    workspace.add_run(trained(
        RunRecord::builder("train-1").details(RunDetails::without_environment()),
    ));
    let train_run = workspace.run("train-1").unwrap();

    let err = run_inference(
        &workspace.experiment("automl-test"),
        &ComputeTarget::new("cpu-cluster"),
        Path::new("."),
        &train_run,
        &MemoryDataset::new("test-ds"),
        "y",
        "model.pkl",
    )
    .unwrap_err();

    match err {
        Error::EnvironmentUnresolvable { run_id, source } => {
            assert_eq!(run_id, "train-1");
            assert!(source.to_string().contains("environment of run train-1"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(workspace.submissions().is_empty());
}

// =============================================================================
// Missing properties
// =============================================================================

#[test]
fn test_missing_property_submits_nothing() {
    let workspace = MemoryWorkspace::new();
    workspace.add_run(
        RunRecord::builder("train-1")
            .environment(Environment::new("env"))
            .property("run_algorithm", "LightGBM")
            .property("score", "0.8")
            .build(),
    );
    let train_run = workspace.run("train-1").unwrap();

    let err = run_inference(
        &workspace.experiment("automl-test"),
        &ComputeTarget::new("cpu-cluster"),
        Path::new("."),
        &train_run,
        &MemoryDataset::new("test-ds"),
        "y",
        "model.pkl",
    )
    .unwrap_err();

    assert!(
        matches!(err, Error::MissingProperty { ref key, .. } if key == "primary_metric"),
        "unexpected error: {err}"
    );
    assert!(workspace.submissions().is_empty());
    assert_eq!(workspace.run_count(), 1);
}
