//! One-hot encoding and standardization.
//!
//! [`fit_transform`] learns the level sets and scaling parameters from a
//! table and applies them in one go. The learned [`FittedTransform`] can be
//! saved next to the output and re-applied to new data later.

use super::column::{ensure_absent, series};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Ordered level set of one nominal column.
///
/// `levels` is sorted ascending; the first entry is the reference level and
/// gets no indicator column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalLevels {
    pub column: String,
    pub levels: Vec<String>,
}

impl CategoricalLevels {
    pub fn reference(&self) -> Option<&str> {
        self.levels.first().map(String::as_str)
    }

    /// Levels that are represented by an indicator column
    pub fn encoded_levels(&self) -> &[String] {
        self.levels.get(1..).unwrap_or_default()
    }

    pub fn indicator_name(&self, level: &str) -> String {
        format!("{}_{level}", self.column)
    }

    pub fn indicator_names(&self) -> Vec<String> {
        self.encoded_levels()
            .iter()
            .map(|level| self.indicator_name(level))
            .collect()
    }
}

/// Mean and population standard deviation of one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub column: String,
    pub mean: f64,
    pub std: f64,
}

impl ScalerParams {
    /// Standardized value; a constant column maps to 0.
    pub fn apply(&self, value: f64) -> f64 {
        if self.std == 0.0 {
            0.0
        } else {
            (value - self.mean) / self.std
        }
    }

    pub fn inverse(&self, z: f64) -> f64 {
        z * self.std + self.mean
    }

    fn expr(&self) -> Expr {
        let value = col(self.column.as_str()).cast(DataType::Float64);
        let scaled = if self.std == 0.0 {
            when(value.is_null())
                .then(lit(NULL).cast(DataType::Float64))
                .otherwise(lit(0.0))
        } else {
            (value - lit(self.mean)) / lit(self.std)
        };
        scaled.alias(self.column.as_str())
    }
}

/// Parameters learned by [`fit_transform`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FittedTransform {
    pub categorical: Vec<CategoricalLevels>,
    pub numeric: Vec<ScalerParams>,
}

impl FittedTransform {
    /// Learn level sets and scaling parameters from `df`.
    ///
    /// Means and population standard deviations come from one aggregate
    /// query; a column with no values gets mean 0 and std 0.
    pub fn fit(df: &DataFrame, categorical: &[String], numeric: &[String]) -> Result<Self> {
        let mut fitted = Self::default();

        for name in numeric.iter().chain(categorical) {
            series(df, name)?;
        }

        if !numeric.is_empty() {
            let stats: Vec<Expr> = numeric
                .iter()
                .enumerate()
                .flat_map(|(idx, name)| {
                    let value = col(name.as_str()).cast(DataType::Float64);
                    [
                        value.clone().mean().alias(format!("mean_{idx}")),
                        value.std(0).alias(format!("std_{idx}")),
                    ]
                })
                .collect();
            let stats = df.clone().lazy().select(stats).collect()?;

            for (idx, name) in numeric.iter().enumerate() {
                fitted.numeric.push(ScalerParams {
                    column: name.clone(),
                    mean: scalar_f64(&stats, &format!("mean_{idx}"))?,
                    std: scalar_f64(&stats, &format!("std_{idx}"))?,
                });
            }
        }

        for name in categorical {
            let levels = df
                .clone()
                .lazy()
                .select([col(name.as_str())
                    .cast(DataType::String)
                    .unique()
                    .drop_nulls()
                    .sort(SortOptions::default())])
                .collect()?;
            let levels: Vec<String> = series(&levels, name)?
                .str()?
                .into_iter()
                .flatten()
                .map(str::to_owned)
                .collect();
            fitted.categorical.push(CategoricalLevels {
                column: name.clone(),
                levels,
            });
        }

        Ok(fitted)
    }

    /// Apply the recorded parameters to `df`.
    ///
    /// Numeric columns are replaced by their standardized `Float64` values.
    /// Each categorical column is replaced by `Int32` indicator columns; rows
    /// with a null or an unseen level get all zeros.
    pub fn transform(&self, df: DataFrame) -> Result<DataFrame> {
        let mut exprs: Vec<Expr> = self.numeric.iter().map(ScalerParams::expr).collect();

        for levels in &self.categorical {
            series(&df, &levels.column)?;
            for name in levels.indicator_names() {
                ensure_absent(&df, &name)?;
            }

            let value = col(levels.column.as_str()).cast(DataType::String);
            for level in levels.encoded_levels() {
                exprs.push(
                    when(value.clone().eq(lit(level.as_str())))
                        .then(lit(1i32))
                        .otherwise(lit(0i32))
                        .alias(levels.indicator_name(level)),
                );
            }
        }
        for params in &self.numeric {
            series(&df, &params.column)?;
        }

        let mut df = df.lazy().with_columns(exprs).collect()?;
        for levels in &self.categorical {
            df = df.drop(&levels.column)?;
        }

        Ok(df)
    }

    /// Recover the label of every row of an encoded column.
    ///
    /// Rows with no indicator set decode to the reference level.
    pub fn decode_levels(&self, df: &DataFrame, column: &str) -> Result<Vec<Option<String>>> {
        let levels = self
            .categorical
            .iter()
            .find(|l| l.column == column)
            .ok_or_else(|| {
                PipelineError::config(format!("column '{column}' is not one-hot encoded"))
            })?;

        let mut label = match levels.reference() {
            Some(reference) => lit(reference),
            None => lit(NULL).cast(DataType::String),
        };
        for level in levels.encoded_levels() {
            let indicator = levels.indicator_name(level);
            series(df, &indicator)?;
            label = when(col(indicator.as_str()).cast(DataType::Int32).eq(lit(1i32)))
                .then(lit(level.as_str()))
                .otherwise(label);
        }

        let decoded = df
            .clone()
            .lazy()
            .select([label.alias(column)])
            .collect()?;
        Ok(series(&decoded, column)?
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_owned))
            .collect())
    }

    pub fn scaler(&self, column: &str) -> Option<&ScalerParams> {
        self.numeric.iter().find(|p| p.column == column)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn scalar_f64(stats: &DataFrame, name: &str) -> Result<f64> {
    let value = series(stats, name)?.cast(&DataType::Float64)?;
    Ok(value.f64()?.get(0).unwrap_or(0.0))
}

/// Fit on `df` and return the transformed table with its parameters.
pub fn fit_transform(
    df: DataFrame,
    categorical: &[String],
    numeric: &[String],
) -> Result<(DataFrame, FittedTransform)> {
    let fitted = FittedTransform::fit(&df, categorical, numeric)?;
    let out = fitted.transform(df)?;

    tracing::debug!(
        categorical = fitted.categorical.len(),
        numeric = fitted.numeric.len(),
        columns = out.width(),
        "Encoded and scaled table"
    );
    Ok((out, fitted))
}
