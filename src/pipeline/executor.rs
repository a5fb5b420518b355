//! Pipeline execution engine.
//!
//! Runs a validated [`PipelineSpec`] over a raw table: normalize, impute,
//! derive features, drop columns, encode and scale. Produces the model-ready
//! table together with its fitted transform and a run report.

use super::encode::{FittedTransform, fit_transform};
use super::features::derive_features;
use super::impute::{ensure_required, impute};
use super::normalize::normalize;
use super::spec::{InputConfig, PipelineSpec};
use super::validation::validate_pipeline;
use crate::error::{PipelineError, Result};
use crate::schema::Schema;
use chrono::Local;
use polars::prelude::*;
use std::path::{Path, PathBuf};

/// Report generated after pipeline execution
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Number of rows before processing
    pub rows_before: usize,

    /// Number of columns before processing
    pub columns_before: usize,

    /// Number of rows after processing
    pub rows_after: usize,

    /// Number of columns after processing
    pub columns_after: usize,

    /// Nulls filled by imputation, summed over all columns
    pub nulls_imputed: usize,

    /// Number of feature steps applied
    pub features_derived: usize,

    /// Warnings generated during execution
    pub warnings: Vec<String>,

    /// Time taken for execution
    pub duration: std::time::Duration,
}

impl RunReport {
    /// Create a summary message
    pub fn summary(&self) -> String {
        format!(
            "Pipeline completed: {} rows, columns {} → {}, {} nulls imputed, {} feature steps, {:.2}s",
            self.rows_after,
            self.columns_before,
            self.columns_after,
            self.nulls_imputed,
            self.features_derived,
            self.duration.as_secs_f64()
        )
    }
}

/// Model-ready table plus everything needed to reproduce it
#[derive(Debug)]
pub struct PipelineOutput {
    pub table: DataFrame,
    pub fitted: FittedTransform,
    pub report: RunReport,
}

/// Read a raw delimited file with every column as text.
///
/// Empty fields and the configured null tokens become nulls.
pub fn load_raw(path: &Path, input: &InputConfig) -> Result<DataFrame> {
    let separator = u8::try_from(input.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| {
            PipelineError::config(format!(
                "delimiter '{}' must be a single ASCII character",
                input.delimiter
            ))
        })?;
    let null_values = NullValues::AllColumns(
        input
            .null_values
            .iter()
            .map(|token| token.as_str().into())
            .collect(),
    );

    let df = CsvReadOptions::default()
        .with_has_header(input.has_header)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|opts| {
            opts.with_separator(separator)
                .with_null_values(Some(null_values.clone()))
        })
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    tracing::info!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "Loaded raw input"
    );
    Ok(df)
}

/// Read a processed CSV table with inferred column types.
pub fn load_table(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Execute a pipeline spec on a raw table.
///
/// The spec is validated against `schema` first; any validation error aborts
/// the run before data is touched.
pub fn run_pipeline(spec: &PipelineSpec, schema: &Schema, raw: DataFrame) -> Result<PipelineOutput> {
    let start = std::time::Instant::now();
    let mut warnings = Vec::new();

    let validation_errors = validate_pipeline(spec, schema);
    if !validation_errors.is_empty() {
        return Err(PipelineError::config(format!(
            "Pipeline validation failed:\n{}",
            validation_errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        )));
    }

    let rows_before = raw.height();
    let columns_before = raw.width();

    for name in raw.get_column_names() {
        if !schema.contains(name) {
            warnings.push(format!("Column '{name}' is not in the schema and stays untyped"));
        }
    }

    let typed = normalize(raw, schema, &spec.schema.datetime_format)?;

    let nulls_before: usize = typed.get_columns().iter().map(Column::null_count).sum();
    let imputed = impute(typed, &spec.impute)?;
    let nulls_after: usize = imputed.get_columns().iter().map(Column::null_count).sum();
    ensure_required(&imputed, &spec.schema.required_columns)?;

    let mut features = derive_features(imputed, &spec.features)?;
    for name in &spec.drop_columns {
        features = features.drop(name)?;
    }

    let (table, fitted) = fit_transform(features, &spec.encode.categorical, &spec.encode.numeric)?;

    let report = RunReport {
        rows_before,
        columns_before,
        rows_after: table.height(),
        columns_after: table.width(),
        nulls_imputed: nulls_before.saturating_sub(nulls_after),
        features_derived: spec.features.len(),
        warnings,
        duration: start.elapsed(),
    };

    for warning in &report.warnings {
        tracing::warn!("{warning}");
    }
    tracing::info!(pipeline = %spec.name, "{}", report.summary());

    Ok(PipelineOutput {
        table,
        fitted,
        report,
    })
}

/// Expand path template variables: `{date}` (today, `YYYY-MM-DD`) and
/// `{version}`.
pub fn expand_path_template(template: &str, version: &str) -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    let expanded = template.replace("{date}", &today).replace("{version}", version);
    PathBuf::from(expanded)
}
