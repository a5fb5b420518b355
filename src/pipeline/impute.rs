//! Missing-value imputation and the required-column contract.

use super::column::series;
use super::spec::ImputeStrategy;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Fill nulls in every column that has a configured strategy.
///
/// Columns without a strategy are passed through unchanged and may keep
/// their nulls. All fills run as one batch of `fill_null` expressions.
pub fn impute(df: DataFrame, strategies: &BTreeMap<String, ImputeStrategy>) -> Result<DataFrame> {
    let mut fills = Vec::new();

    for (name, strategy) in strategies {
        let s = series(&df, name)?;
        let nulls = s.null_count();
        if nulls == 0 {
            continue;
        }

        let fill = match strategy {
            ImputeStrategy::Zero => zero_fill(s)?,
            ImputeStrategy::Mode => match mode_value(s)? {
                Some(mode) => col(name.as_str()).fill_null(lit(mode)),
                // all null: nothing to take a mode from
                None => continue,
            },
        };
        tracing::debug!(column = %name, ?strategy, nulls, "Imputed missing values");
        fills.push(fill);
    }

    if fills.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(fills).collect()?)
}

/// Fail if any required column is absent or still holds nulls.
pub fn ensure_required(df: &DataFrame, required: &[String]) -> Result<()> {
    for name in required {
        let nulls = series(df, name)?.null_count();
        if nulls > 0 {
            return Err(PipelineError::RequiredColumnNull {
                column: name.clone(),
                nulls,
            });
        }
    }
    Ok(())
}

fn zero_fill(s: &Series) -> Result<Expr> {
    let expr = col(s.name().clone());
    let fill = match s.dtype() {
        dtype if dtype.is_primitive_numeric() => expr.fill_null(lit(0).cast(dtype.clone())),
        DataType::String => expr.fill_null(lit("0")),
        other => {
            return Err(PipelineError::config(format!(
                "zero imputation is not supported for column '{}' of type {other}",
                s.name()
            )));
        }
    };
    Ok(fill)
}

/// The column's mode as a typed scalar, counted on the text rendering so
/// floats and dates compare by value.
fn mode_value(s: &Series) -> Result<Option<Scalar>> {
    let rendered = s.cast(&DataType::String)?;
    let Some(idx) = mode_index(rendered.str()?) else {
        return Ok(None);
    };
    let value = s.get(idx)?.into_static();
    Ok(Some(Scalar::new(s.dtype().clone(), value)))
}

/// Row index of the first occurrence of the most frequent non-null value;
/// ties go to the value seen first.
pub fn mode_index<K, I>(values: I) -> Option<usize>
where
    K: Hash + Eq,
    I: IntoIterator<Item = Option<K>>,
{
    let mut counts: HashMap<K, (usize, usize)> = HashMap::new();
    for (idx, value) in values.into_iter().enumerate() {
        if let Some(v) = value {
            counts.entry(v).or_insert((0, idx)).0 += 1;
        }
    }

    counts
        .into_values()
        .max_by(|(count_a, first_a), (count_b, first_b)| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(_, first)| first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_ties_go_to_first_seen() {
        let values = vec![Some("PRT"), Some("GBR"), None, Some("GBR"), Some("PRT")];
        assert_eq!(mode_index(values), Some(0));

        let values = vec![None, Some(3), Some(1), Some(1), Some(3)];
        assert_eq!(mode_index(values), Some(1));

        assert_eq!(mode_index::<i64, _>(vec![None, None]), None);
    }

    #[test]
    fn test_mode_fill_keeps_float_and_date_types() -> Result<()> {
        let df = df!(
            "adr" => [Some(75.5), None, Some(75.5), Some(98.0)],
            "arrival" => [Some(3i32), Some(3), None, Some(4)]
        )?
        .lazy()
        .with_column(col("arrival").cast(DataType::Date))
        .collect()?;
        let strategies = BTreeMap::from([
            ("adr".to_owned(), ImputeStrategy::Mode),
            ("arrival".to_owned(), ImputeStrategy::Mode),
        ]);

        let out = impute(df, &strategies)?;
        let adr: Vec<Option<f64>> = out
            .column("adr")?
            .as_materialized_series()
            .f64()?
            .into_iter()
            .collect();
        assert_eq!(adr, vec![Some(75.5), Some(75.5), Some(75.5), Some(98.0)]);

        let arrival = out.column("arrival")?;
        assert_eq!(arrival.dtype(), &DataType::Date);
        let days: Vec<Option<i32>> = arrival
            .as_materialized_series()
            .cast(&DataType::Int32)?
            .i32()?
            .into_iter()
            .collect();
        assert_eq!(days, vec![Some(3), Some(3), Some(3), Some(4)]);
        Ok(())
    }

    #[test]
    fn test_all_null_column_is_left_alone() -> Result<()> {
        let df = df!("country" => [None::<&str>, None])?;
        let strategies = BTreeMap::from([("country".to_owned(), ImputeStrategy::Mode)]);

        let out = impute(df, &strategies)?;
        assert_eq!(out.column("country")?.null_count(), 2);
        Ok(())
    }

    #[test]
    fn test_impute_zero_and_mode() -> Result<()> {
        let df = df!(
            "agent" => [Some("9"), None, Some("240")],
            "children" => [Some(0i64), None, Some(2)],
            "country" => [Some("PRT"), None, Some("PRT")],
            "babies" => [Some(0i64), None, Some(1)]
        )?;
        let strategies = BTreeMap::from([
            ("agent".to_owned(), ImputeStrategy::Zero),
            ("children".to_owned(), ImputeStrategy::Mode),
            ("country".to_owned(), ImputeStrategy::Mode),
        ]);

        let out = impute(df, &strategies)?;

        let agent: Vec<Option<&str>> = out
            .column("agent")?
            .as_materialized_series()
            .str()?
            .into_iter()
            .collect();
        assert_eq!(agent, vec![Some("9"), Some("0"), Some("240")]);

        let country: Vec<Option<&str>> = out
            .column("country")?
            .as_materialized_series()
            .str()?
            .into_iter()
            .collect();
        assert_eq!(country, vec![Some("PRT"); 3]);

        // 0 and 2 tie; 0 was seen first
        let children: Vec<Option<i64>> = out
            .column("children")?
            .as_materialized_series()
            .i64()?
            .into_iter()
            .collect();
        assert_eq!(children, vec![Some(0), Some(0), Some(2)]);

        // no strategy, nulls remain
        assert_eq!(out.column("babies")?.null_count(), 1);
        Ok(())
    }

    #[test]
    fn test_zero_fill_on_float_column() -> Result<()> {
        let df = df!("adr" => [Some(1.5), None])?;
        let strategies = BTreeMap::from([("adr".to_owned(), ImputeStrategy::Zero)]);

        let out = impute(df, &strategies)?;
        let adr: Vec<Option<f64>> = out
            .column("adr")?
            .as_materialized_series()
            .f64()?
            .into_iter()
            .collect();
        assert_eq!(adr, vec![Some(1.5), Some(0.0)]);
        Ok(())
    }

    #[test]
    fn test_ensure_required() -> Result<()> {
        let df = df!(
            "hotel" => [Some("City Hotel"), None],
            "adr" => [1.0, 2.0]
        )?;

        assert!(ensure_required(&df, &["adr".to_owned()]).is_ok());
        assert!(matches!(
            ensure_required(&df, &["hotel".to_owned()]),
            Err(PipelineError::RequiredColumnNull { nulls: 1, .. })
        ));
        assert!(matches!(
            ensure_required(&df, &["lead_time".to_owned()]),
            Err(PipelineError::MissingColumn { .. })
        ));
        Ok(())
    }
}
