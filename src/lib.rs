//! # automl-scoring: Inference Runs and Leaderboards for AutoML Experiments
//!
//! Two helpers for notebook-driven AutoML workflows on top of a remote
//! experiment-tracking service:
//!
//! - [`run_inference`]: submit a scoring job for a trained model against a
//!   held-out dataset, tagged with the training run's identity and score
//! - [`get_result_df`]: reduce an AutoML parent run's descendants to a
//!   best-score-per-algorithm leaderboard
//!
//! The service is reached only through the capability traits in
//! [`tracking`]; [`tracking::MemoryWorkspace`] implements all of them in
//! memory.
//!
//! ## Example Usage
//!
//! ```rust
//! use automl_scoring::get_result_df;
//! use automl_scoring::tracking::{MemoryWorkspace, RunRecord};
//!
//! let workspace = MemoryWorkspace::new();
//! workspace.add_run(RunRecord::new("AutoML_1"));
//! let candidates = [
//!     ("AutoML_1_0", "LightGBM", "0.91"),
//!     ("AutoML_1_1", "XGBoost", "0.88"),
//! ];
//! for (id, algorithm, score) in candidates {
//!     workspace.add_run(
//!         RunRecord::builder(id)
//!             .parent("AutoML_1")
//!             .property("run_algorithm", algorithm)
//!             .property("score", score)
//!             .property("primary_metric", "AUC_weighted")
//!             .property("goal", "AUC_weighted_max")
//!             .build(),
//!     );
//! }
//!
//! let leaderboard = get_result_df(&workspace.run("AutoML_1")?)?;
//! assert_eq!(leaderboard.index(), vec!["LightGBM", "XGBoost"]);
//! # Ok::<(), automl_scoring::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod environment;
pub mod error;
pub mod submit;
pub mod summary;
pub mod tracking;

pub use config::{GoalPolicy, InferenceConfig, SummaryConfig};
pub use environment::{Environment, EnvironmentLoader};
pub use error::{Error, Result};
pub use submit::{run_inference, ComputeTarget, InferenceSubmitter, RunConfiguration};
pub use summary::{get_result_df, Goal, ResultSummarizer, SummaryRow, SummaryTable};
