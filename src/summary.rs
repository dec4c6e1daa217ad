//! Best-per-algorithm leaderboard over AutoML child runs
//!
//! **Problem**: an AutoML parent run fans out into many candidate runs,
//! often several per algorithm. Notebooks want one row per algorithm.
//!
//! **Solution**: collect every descendant that reports both an algorithm
//! and a score, rank by score in the goal direction, keep the first row
//! per algorithm.
//!
//! The direction is global, not per algorithm. Under the default
//! [`GoalPolicy::LastDeclared`] the last qualifying child that declares a
//! `goal` decides it; [`GoalPolicy::Strict`] refuses mixed directions.

use crate::config::{GoalPolicy, SummaryConfig};
use crate::tracking::{
    ParentRun, PROPERTY_GOAL, PROPERTY_PRIMARY_METRIC, PROPERTY_RUN_ALGORITHM, PROPERTY_SCORE,
};
use crate::{Error, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::compute::SortOptions;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Column holding the child run ID.
pub const COLUMN_RUN_ID: &str = "run_id";
/// Column holding the algorithm; the table index.
pub const COLUMN_RUN_ALGORITHM: &str = "run_algorithm";
/// Column holding the primary metric name.
pub const COLUMN_PRIMARY_METRIC: &str = "primary_metric";
/// Column holding the parsed score.
pub const COLUMN_SCORE: &str = "Score";

/// Optimization direction of the primary metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Goal {
    /// Lower scores rank first
    Minimize,
    /// Higher scores rank first
    #[default]
    Maximize,
}

impl Goal {
    /// Parse a `<metric>_min` / `<metric>_max` goal string.
    ///
    /// Only a final underscore-delimited token of exactly `min` means
    /// minimize; anything else, malformed strings included, maximizes.
    #[must_use]
    pub fn parse(goal: &str) -> Self {
        if goal.rsplit('_').next() == Some("min") {
            Self::Minimize
        } else {
            Self::Maximize
        }
    }

    /// Compare two scores so the better one sorts first. NaN sorts last.
    #[must_use]
    pub fn compare(self, a: f64, b: f64) -> Ordering {
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => match self {
                Self::Minimize => a.total_cmp(&b),
                Self::Maximize => b.total_cmp(&a),
            },
        }
    }
}

impl From<Goal> for SortOptions {
    fn from(goal: Goal) -> Self {
        Self {
            descending: matches!(goal, Goal::Maximize),
            nulls_first: false,
        }
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// Child run ID
    pub run_id: String,
    /// Algorithm of the candidate
    pub run_algorithm: String,
    /// Metric the score was measured with
    pub primary_metric: String,
    /// Parsed validation score
    #[serde(rename = "Score")]
    pub score: f64,
}

/// Leaderboard indexed by `run_algorithm`, best row first.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    rows: Vec<SummaryRow>,
    batch: RecordBatch,
    goal: Goal,
}

/// Arrow schema of a [`SummaryTable`].
#[must_use]
pub fn summary_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(COLUMN_RUN_ID, DataType::Utf8, false),
        Field::new(COLUMN_RUN_ALGORITHM, DataType::Utf8, false),
        Field::new(COLUMN_PRIMARY_METRIC, DataType::Utf8, false),
        Field::new(COLUMN_SCORE, DataType::Float64, false),
    ]))
}

impl SummaryTable {
    /// Build a table from rows already ranked and deduplicated.
    ///
    /// # Errors
    /// Returns error if the Arrow batch cannot be assembled
    pub fn from_rows(rows: Vec<SummaryRow>, goal: Goal) -> Result<Self> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| &r.run_id))),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| &r.run_algorithm),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| &r.primary_metric),
            )),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.score))),
        ];
        let batch = RecordBatch::try_new(summary_schema(), columns)?;

        Ok(Self { rows, batch, goal })
    }

    /// Number of rows (distinct algorithms).
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if no child qualified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in schema order.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|field| field.name().as_str())
            .collect()
    }

    /// Algorithms in rank order.
    #[must_use]
    pub fn index(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.run_algorithm.as_str()).collect()
    }

    /// Look up the best row for `algorithm`.
    #[must_use]
    pub fn get(&self, algorithm: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.run_algorithm == algorithm)
    }

    /// The overall best row.
    #[must_use]
    pub fn best(&self) -> Option<&SummaryRow> {
        self.rows.first()
    }

    /// Rows in rank order.
    #[must_use]
    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    /// Direction the table was ranked in.
    #[must_use]
    pub const fn goal(&self) -> Goal {
        self.goal
    }

    /// Columnar view of the table.
    #[must_use]
    pub const fn record_batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Render the table as an ASCII grid.
    ///
    /// # Errors
    /// Returns error if Arrow fails to format a column
    pub fn to_pretty_string(&self) -> Result<String> {
        let rendered = arrow::util::pretty::pretty_format_batches(&[self.batch.clone()])?;
        Ok(rendered.to_string())
    }
}

/// Builds [`SummaryTable`]s from a parent run's descendants.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultSummarizer {
    config: SummaryConfig,
}

impl ResultSummarizer {
    /// Summarizer with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Summarizer with explicit config.
    #[must_use]
    pub const fn with_config(config: SummaryConfig) -> Self {
        Self { config }
    }

    /// Summarize every descendant of `remote_run`.
    ///
    /// # Errors
    /// Returns error if listing children fails, a qualifying child lacks
    /// `primary_metric` or has a non-numeric score, or (strict policy)
    /// declared goals disagree
    pub fn summarize<P: ParentRun + ?Sized>(&self, remote_run: &P) -> Result<SummaryTable> {
        let children = remote_run.get_children(true)?;
        let mut rows = Vec::new();
        let mut goals = GoalTracker::default();

        for child in &children {
            let properties = child.properties();
            let (Some(algorithm), Some(score)) = (
                properties.get(PROPERTY_RUN_ALGORITHM),
                properties.get(PROPERTY_SCORE),
            ) else {
                debug!(run_id = child.id(), "Skipping child without algorithm or score");
                continue;
            };

            let primary_metric = properties
                .get(PROPERTY_PRIMARY_METRIC)
                .ok_or_else(|| Error::missing_property(child.id(), PROPERTY_PRIMARY_METRIC))?;

            rows.push(SummaryRow {
                run_id: child.id().to_string(),
                run_algorithm: algorithm.clone(),
                primary_metric: primary_metric.clone(),
                score: parse_score(child.id(), score)?,
            });

            if let Some(goal) = properties.get(PROPERTY_GOAL) {
                goals.declare(child.id(), Goal::parse(goal));
            }
        }

        let goal = goals.resolve(self.config.goal_policy)?;
        let candidates = rows.len();
        let rows = best_per_algorithm(rows, goal);

        info!(
            children = children.len(),
            candidates,
            algorithms = rows.len(),
            goal = ?goal,
            "Summarized child runs"
        );

        SummaryTable::from_rows(rows, goal)
    }
}

/// Summarize `remote_run` with the default [`ResultSummarizer`].
///
/// # Errors
/// See [`ResultSummarizer::summarize`]
pub fn get_result_df<P: ParentRun + ?Sized>(remote_run: &P) -> Result<SummaryTable> {
    ResultSummarizer::new().summarize(remote_run)
}

/// Rank `rows` for `goal` (stable) and keep the first row per algorithm.
#[must_use]
pub fn best_per_algorithm(mut rows: Vec<SummaryRow>, goal: Goal) -> Vec<SummaryRow> {
    rows.sort_by(|a, b| goal.compare(a.score, b.score));

    let mut seen = HashSet::new();
    rows.retain(|row| seen.insert(row.run_algorithm.clone()));
    rows
}

/// Parse a score property the way the service writes it.
///
/// Surrounding whitespace is ignored; `nan` and `inf` spellings parse.
fn parse_score(run_id: &str, raw: &str) -> Result<f64> {
    raw.trim().parse().map_err(|_| Error::InvalidScore {
        run_id: run_id.to_string(),
        value: raw.to_string(),
    })
}

/// Goals declared by qualifying children, in traversal order.
#[derive(Debug, Default)]
struct GoalTracker {
    declared: Vec<(String, Goal)>,
}

impl GoalTracker {
    fn declare(&mut self, run_id: &str, goal: Goal) {
        self.declared.push((run_id.to_string(), goal));
    }

    fn runs_with(&self, goal: Goal) -> Vec<String> {
        self.declared
            .iter()
            .filter(|(_, declared)| *declared == goal)
            .map(|(run_id, _)| run_id.clone())
            .collect()
    }

    fn resolve(&self, policy: GoalPolicy) -> Result<Goal> {
        let minimize = self.runs_with(Goal::Minimize);
        let maximize = self.runs_with(Goal::Maximize);
        let mixed = !minimize.is_empty() && !maximize.is_empty();

        match policy {
            GoalPolicy::Strict if mixed => Err(Error::ConflictingGoals { minimize, maximize }),
            _ => {
                if mixed {
                    warn!(
                        minimize = minimize.len(),
                        maximize = maximize.len(),
                        "Child runs disagree on goal direction, last declared goal wins"
                    );
                }
                Ok(self
                    .declared
                    .last()
                    .map_or(Goal::Maximize, |(_, goal)| *goal))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::tracking::{ChildRun, Properties};

    struct Children(Vec<ChildRun>);

    impl ParentRun for Children {
        fn get_children(&self, _recursive: bool) -> Result<Vec<ChildRun>> {
            Ok(self.0.clone())
        }
    }

    fn candidate(id: &str, algorithm: &str, score: &str) -> ChildRun {
        ChildRun::new(id.to_string(), Properties::new())
            .with_property(PROPERTY_RUN_ALGORITHM, algorithm)
            .with_property(PROPERTY_SCORE, score)
            .with_property(PROPERTY_PRIMARY_METRIC, "accuracy")
    }

    fn row(algorithm: &str, score: f64) -> SummaryRow {
        SummaryRow {
            run_id: format!("{algorithm}-{score}"),
            run_algorithm: algorithm.to_string(),
            primary_metric: "accuracy".to_string(),
            score,
        }
    }

    #[test]
    fn test_goal_parse() {
        assert_eq!(Goal::parse("normalized_root_mean_squared_error_min"), Goal::Minimize);
        assert_eq!(Goal::parse("accuracy_max"), Goal::Maximize);
        assert_eq!(Goal::parse("min"), Goal::Minimize);
        assert_eq!(Goal::parse("minimize"), Goal::Maximize);
        assert_eq!(Goal::parse("loss_MIN"), Goal::Maximize);
        assert_eq!(Goal::parse(""), Goal::Maximize);
    }

    #[test]
    fn test_goal_sort_options() {
        assert!(SortOptions::from(Goal::Maximize).descending);
        assert!(!SortOptions::from(Goal::Minimize).descending);
    }

    #[test]
    fn test_goal_compare_nan_last() {
        assert_eq!(Goal::Maximize.compare(f64::NAN, 1.0), Ordering::Greater);
        assert_eq!(Goal::Minimize.compare(f64::NAN, 1.0), Ordering::Greater);
        assert_eq!(Goal::Maximize.compare(2.0, 1.0), Ordering::Less);
        assert_eq!(Goal::Minimize.compare(2.0, 1.0), Ordering::Greater);
    }

    #[test]
    fn test_best_per_algorithm_ties_keep_traversal_order() {
        let mut first = row("A", 0.5);
        first.run_id = "first".to_string();
        let mut second = row("A", 0.5);
        second.run_id = "second".to_string();

        let rows = best_per_algorithm(vec![first, second], Goal::Maximize);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].run_id, "first");
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("r", "0.25").unwrap(), 0.25);
        assert_eq!(parse_score("r", " 1e-3 ").unwrap(), 0.001);
        assert!(parse_score("r", "nan").unwrap().is_nan());
        assert!(parse_score("r", "inf").unwrap().is_infinite());
        assert!(matches!(
            parse_score("r", "high"),
            Err(Error::InvalidScore { .. })
        ));
    }

    #[test]
    fn test_last_declared_goal_wins() {
        let children = Children(vec![
            candidate("1", "A", "0.2").with_property(PROPERTY_GOAL, "loss_max"),
            candidate("2", "A", "0.4").with_property(PROPERTY_GOAL, "loss_min"),
            candidate("3", "B", "0.9"),
        ]);

        let table = get_result_df(&children).unwrap();
        assert_eq!(table.goal(), Goal::Minimize);
        assert_eq!(table.index(), vec!["A", "B"]);
        assert_eq!(table.get("A").unwrap().score, 0.2);
    }

    #[test]
    fn test_goal_on_skipped_child_is_ignored() {
        let children = Children(vec![
            candidate("1", "A", "0.2"),
            ChildRun::new("setup".to_string(), Properties::new())
                .with_property(PROPERTY_GOAL, "loss_min"),
        ]);

        assert_eq!(get_result_df(&children).unwrap().goal(), Goal::Maximize);
    }

    #[test]
    fn test_strict_policy_rejects_mixed_goals() {
        let children = Children(vec![
            candidate("1", "A", "0.2").with_property(PROPERTY_GOAL, "loss_max"),
            candidate("2", "B", "0.4").with_property(PROPERTY_GOAL, "loss_min"),
        ]);
        let summarizer = ResultSummarizer::with_config(SummaryConfig {
            goal_policy: GoalPolicy::Strict,
        });

        match summarizer.summarize(&children).unwrap_err() {
            Error::ConflictingGoals { minimize, maximize } => {
                assert_eq!(minimize, vec!["2"]);
                assert_eq!(maximize, vec!["1"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_strict_policy_accepts_agreeing_goals() {
        let children = Children(vec![
            candidate("1", "A", "0.2").with_property(PROPERTY_GOAL, "loss_min"),
            candidate("2", "B", "0.4").with_property(PROPERTY_GOAL, "rmse_min"),
        ]);
        let summarizer = ResultSummarizer::with_config(SummaryConfig {
            goal_policy: GoalPolicy::Strict,
        });

        let table = summarizer.summarize(&children).unwrap();
        assert_eq!(table.index(), vec!["A", "B"]);
    }

    #[test]
    fn test_qualifying_child_without_primary_metric_fails() {
        let children = Children(vec![ChildRun::new("1".to_string(), Properties::new())
            .with_property(PROPERTY_RUN_ALGORITHM, "A")
            .with_property(PROPERTY_SCORE, "0.5")]);

        let err = get_result_df(&children).unwrap_err();
        assert!(matches!(err, Error::MissingProperty { ref key, .. } if key == "primary_metric"));
    }

    #[test]
    fn test_invalid_score_fails() {
        let children = Children(vec![candidate("1", "A", "n/a")]);
        assert!(matches!(
            get_result_df(&children),
            Err(Error::InvalidScore { .. })
        ));
    }

    #[test]
    fn test_record_batch_matches_rows() {
        let table = SummaryTable::from_rows(vec![row("A", 0.9), row("B", 0.5)], Goal::Maximize)
            .unwrap();
        let batch = table.record_batch();

        assert_eq!(batch.num_rows(), 2);
        let scores = batch
            .column(3)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(scores.value(0), 0.9);
        assert_eq!(table.best().unwrap().run_algorithm, "A");
    }

    #[test]
    fn test_pretty_string() {
        let table = SummaryTable::from_rows(vec![row("LightGBM", 0.91)], Goal::Maximize).unwrap();
        let rendered = table.to_pretty_string().unwrap();
        assert!(rendered.contains("run_algorithm"));
        assert!(rendered.contains("LightGBM"));
        assert!(rendered.contains("0.91"));
    }

    #[test]
    fn test_row_serializes_score_column_name() {
        let json = serde_json::to_value(row("A", 0.5)).unwrap();
        assert_eq!(json["Score"], 0.5);
        assert_eq!(json["run_algorithm"], "A");
    }
}
