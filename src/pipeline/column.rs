//! Column access helpers shared by the pipeline stages.
//!
//! Most stages work on Polars expressions; the value-level parsers (type
//! normalization, date composition, model input) read columns into plain
//! `Vec<Option<T>>` buffers through these helpers. Missing columns surface as
//! [`PipelineError::MissingColumn`] instead of a generic Polars error.

use crate::error::{PipelineError, Result};
use chrono::{Datelike as _, NaiveDate};
use polars::prelude::*;

/// Days between 0001-01-01 (CE day 1) and the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub fn series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(Column::as_materialized_series)
        .map_err(|_| PipelineError::missing_column(name))
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// Fail with [`PipelineError::ColumnExists`] if `name` is already present.
pub fn ensure_absent(df: &DataFrame, name: &str) -> Result<()> {
    if has_column(df, name) {
        return Err(PipelineError::ColumnExists {
            column: name.to_owned(),
        });
    }
    Ok(())
}

/// Text rendering of every value; nulls stay `None`.
pub fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let s = series(df, name)?.cast(&DataType::String)?;
    Ok(s.str()?
        .into_iter()
        .map(|v| v.map(str::to_owned))
        .collect())
}

pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let s = series(df, name)?;
    if s.dtype() == &DataType::String {
        return parse_text(s, name, |v| v.trim().parse::<f64>().ok());
    }
    let s = s.cast(&DataType::Float64)?;
    Ok(s.f64()?.into_iter().collect())
}

/// Integer view of a column. Text columns (e.g. a categorical year) are
/// parsed; anything unparsable is a coercion error.
pub fn i64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let s = series(df, name)?;
    if s.dtype() == &DataType::String {
        return parse_text(s, name, parse_integer);
    }
    let s = s.cast(&DataType::Int64)?;
    Ok(s.i64()?.into_iter().collect())
}

pub fn date_series(name: &str, days: Vec<Option<i32>>) -> Result<Series> {
    Ok(Series::new(name.into(), days).cast(&DataType::Date)?)
}

pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Accepts plain integers and integral decimals such as `"2.0"`.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    let f = trimmed.parse::<f64>().ok()?;
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
    (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64)
        .then_some(f as i64)
}

fn parse_text<T>(
    s: &Series,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<Option<T>>> {
    s.str()?
        .into_iter()
        .map(|v| match v {
            None => Ok(None),
            Some(raw) => parse(raw)
                .map(Some)
                .ok_or_else(|| PipelineError::coercion(name, raw)),
        })
        .collect()
}
