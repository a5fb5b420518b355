//! Cancellation classifier training.
//!
//! Fits a decision tree on the numeric columns of a model-ready table and
//! evaluates it on a held-out fifth of the rows. The split is deterministic:
//! every fifth row (index `i % 5 == 4`) goes to the test set.

use crate::error::{PipelineError, Result};
use crate::pipeline::column::{f64_values, i64_values, series};
use linfa::dataset::Labels;
use linfa::prelude::*;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, ArrayView1, Axis, Ix1};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const TEST_EVERY: usize = 5;

/// Training parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainOptions {
    /// Binary label column (0/1)
    pub target: String,
    pub max_depth: Option<usize>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            target: "is_canceled".to_owned(),
            max_depth: Some(10),
        }
    }
}

/// Held-out evaluation of a binary classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub rows_train: usize,
    pub rows_test: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// ROC AUC of the hard predictions, i.e. balanced accuracy
    pub roc_auc: f64,
}

impl TrainReport {
    pub fn summary(&self) -> String {
        format!(
            "accuracy {:.3}, precision {:.3}, recall {:.3}, F1 {:.3}, ROC AUC {:.3} ({} train / {} test rows)",
            self.accuracy,
            self.precision,
            self.recall,
            self.f1,
            self.roc_auc,
            self.rows_train,
            self.rows_test
        )
    }
}

/// Fitted tree plus the column order it expects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub target: String,
    pub feature_columns: Vec<String>,
    pub tree: DecisionTree<f64, usize>,
    pub report: TrainReport,
}

impl TrainedModel {
    /// Predict labels for every row of `df`.
    pub fn predict(&self, df: &DataFrame) -> Result<Vec<usize>> {
        let x = feature_matrix(df, &self.feature_columns)?;
        Ok(self.tree.predict(&x).to_vec())
    }
}

/// Numeric and boolean columns other than the target, in table order.
pub fn feature_columns(df: &DataFrame, target: &str) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| c.name().as_str() != target)
        .filter(|c| c.dtype().is_primitive_numeric() || c.dtype().is_bool())
        .map(|c| c.name().to_string())
        .collect()
}

/// Row-major feature matrix; nulls and NaN become 0.
fn feature_matrix(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let mut x = Array2::<f64>::zeros((df.height(), columns.len()));
    for (mut slot, name) in x.columns_mut().into_iter().zip(columns) {
        let values: Array1<f64> = f64_values(df, name)?
            .into_iter()
            .map(|v| v.filter(|v| !v.is_nan()).unwrap_or(0.0))
            .collect();
        slot.assign(&values);
    }
    Ok(x)
}

fn labels(df: &DataFrame, target: &str) -> Result<Array1<usize>> {
    i64_values(df, target)?
        .into_iter()
        .map(|v| match v {
            Some(0) => Ok(0),
            Some(1) => Ok(1),
            other => Err(PipelineError::coercion(
                target,
                other.map_or_else(|| "null".to_owned(), |v| v.to_string()),
            )),
        })
        .collect()
}

/// Train a decision tree on `df` and evaluate it on the held-out rows.
///
/// # Errors
///
/// - [`PipelineError::MissingColumn`] if the target is absent
/// - [`PipelineError::TypeCoercion`] if a label is not 0 or 1
/// - [`PipelineError::Training`] if there are no features, fewer than two
///   classes, or too few rows to hold out a test set
pub fn train_decision_tree(df: &DataFrame, options: &TrainOptions) -> Result<TrainedModel> {
    let target = options.target.as_str();
    series(df, target)?;

    let features = feature_columns(df, target);
    if features.is_empty() {
        return Err(PipelineError::Training(
            "no numeric feature columns found".to_owned(),
        ));
    }

    let x = feature_matrix(df, &features)?;
    let y = labels(df, target)?;

    if !(y.iter().any(|&c| c == 0) && y.iter().any(|&c| c == 1)) {
        return Err(PipelineError::Training(format!(
            "target column '{target}' must contain both classes"
        )));
    }

    let (train_idx, test_idx): (Vec<usize>, Vec<usize>) =
        (0..df.height()).partition(|i| i % TEST_EVERY != TEST_EVERY - 1);
    if test_idx.is_empty() {
        return Err(PipelineError::Training(format!(
            "need at least {TEST_EVERY} rows to hold out a test set, got {}",
            df.height()
        )));
    }

    let train = Dataset::new(x.select(Axis(0), &train_idx), y.select(Axis(0), &train_idx));
    let x_test = x.select(Axis(0), &test_idx);
    let y_test = y.select(Axis(0), &test_idx);

    tracing::info!(
        features = features.len(),
        rows_train = train_idx.len(),
        rows_test = test_idx.len(),
        "Training decision tree"
    );

    let tree = DecisionTree::params()
        .max_depth(options.max_depth)
        .fit(&train)
        .map_err(|e| PipelineError::Training(e.to_string()))?;

    let predicted = tree.predict(&x_test);
    let scores = HeldOutScores::evaluate(y_test, &predicted)?;

    let report = TrainReport {
        rows_train: train_idx.len(),
        rows_test: test_idx.len(),
        accuracy: scores.accuracy,
        precision: scores.precision,
        recall: scores.recall,
        f1: scores.f1,
        roc_auc: scores.balanced_accuracy,
    };
    tracing::info!("{}", report.summary());

    Ok(TrainedModel {
        target: target.to_owned(),
        feature_columns: features,
        tree,
        report,
    })
}

/// Ground-truth labels for linfa's confusion matrix.
///
/// linfa derives the class order from a hash set and reports binary
/// precision and recall for the first class, so the order is pinned here
/// with cancellations (1) first.
struct CancellationLabels(Array1<usize>);

impl AsTargets for CancellationLabels {
    type Elem = usize;
    type Ix = Ix1;

    fn as_targets(&self) -> ArrayView1<'_, usize> {
        self.0.view()
    }
}

impl Labels for CancellationLabels {
    type Elem = usize;

    fn label_count(&self) -> Vec<HashMap<usize, usize>> {
        self.0.label_count()
    }

    fn labels(&self) -> Vec<usize> {
        vec![1, 0]
    }
}

/// Held-out scores with cancellation as the positive class
#[derive(Debug, Clone, Copy, PartialEq)]
struct HeldOutScores {
    accuracy: f64,
    precision: f64,
    recall: f64,
    f1: f64,
    /// Mean per-class recall
    balanced_accuracy: f64,
}

impl HeldOutScores {
    fn evaluate(truth: Array1<usize>, predicted: &Array1<usize>) -> Result<Self> {
        let cm = CancellationLabels(truth)
            .confusion_matrix(predicted)
            .map_err(|e| PipelineError::Training(e.to_string()))?;

        let per_class = cm.split_one_vs_all();
        let balanced = per_class.iter().map(|c| score(c.recall())).sum::<f64>()
            / per_class.len() as f64;

        Ok(Self {
            accuracy: score(cm.accuracy()),
            precision: score(cm.precision()),
            recall: score(cm.recall()),
            f1: score(cm.f1_score()),
            balanced_accuracy: balanced,
        })
    }
}

/// linfa yields NaN for an empty class; report it as 0
fn score(value: f32) -> f64 {
    if value.is_nan() { 0.0 } else { f64::from(value) }
}
