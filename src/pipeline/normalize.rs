//! Per-column type enforcement.
//!
//! Every column named by the [`Schema`] is cast on its own, so a failure is
//! always attributable to exactly one column and the first offending value in
//! it. Columns the schema does not mention pass through untouched.

use super::column::{date_to_days, parse_integer, series};
use crate::error::{PipelineError, Result};
use crate::schema::{ColumnType, Schema};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

/// Cast every schema column of `df` to its declared type.
///
/// Categorical and string columns become `String`, integers `Int64`, floats
/// `Float64`, datetimes `Datetime(ms)`. Nulls stay null.
///
/// # Errors
///
/// - [`PipelineError::MissingColumn`] if a schema column is absent
/// - [`PipelineError::TypeCoercion`] for the first value that does not parse
pub fn normalize(df: DataFrame, schema: &Schema, datetime_format: &str) -> Result<DataFrame> {
    let mut df = df;

    for (name, kind) in schema.iter() {
        let casted = cast_column(series(&df, name)?, name, kind, datetime_format)?;
        df.with_column(casted)?;
    }

    tracing::debug!(columns = schema.len(), "Normalized columns to schema types");
    Ok(df)
}

fn cast_column(s: &Series, name: &str, kind: ColumnType, datetime_format: &str) -> Result<Series> {
    let text = s.cast(&DataType::String)?;
    let values = text.str()?;

    let out = match kind {
        ColumnType::Categorical | ColumnType::String => text.clone(),
        ColumnType::Integer => {
            let parsed = parse_each(values, name, parse_integer)?;
            Series::new(name.into(), parsed)
        }
        ColumnType::Float => {
            let parsed = parse_each(values, name, |raw| raw.trim().parse::<f64>().ok())?;
            Series::new(name.into(), parsed)
        }
        ColumnType::Datetime => {
            let parsed = parse_each(values, name, |raw| {
                parse_timestamp_millis(raw.trim(), datetime_format)
            })?;
            Series::new(name.into(), parsed)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        }
    };

    Ok(out)
}

fn parse_each<T>(
    values: &StringChunked,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<Option<T>>> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        match value {
            None => out.push(None),
            Some(raw) => {
                let parsed = parse(raw).ok_or_else(|| PipelineError::coercion(name, raw))?;
                out.push(Some(parsed));
            }
        }
    }
    Ok(out)
}

/// Milliseconds since the Unix epoch. Formats without a time component are
/// parsed as dates at midnight.
fn parse_timestamp_millis(raw: &str, format: &str) -> Option<i64> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
        return Some(dt.and_utc().timestamp_millis());
    }
    let date = NaiveDate::parse_from_str(raw, format).ok()?;
    Some(i64::from(date_to_days(date)) * 86_400_000)
}
