//! Declarative feature derivation.
//!
//! A feature pipeline is an ordered list of [`FeatureStep`]s. Each step reads
//! columns that are already present and appends new ones; it never rewrites
//! an existing column. Running the steps in list order is therefore enough to
//! guarantee an acyclic derivation.
//!
//! Steps other than [`FeatureStep::ComposeDate`] are Polars expressions
//! evaluated on a lazy frame. Group statistics ([`FeatureStep::GroupMean`])
//! are window means over the whole input, including the row they are
//! broadcast to.

use super::column::{
    date_series, date_to_days, ensure_absent, has_column, i64_values, series, text_values,
};
use crate::error::{PipelineError, Result};
use chrono::{Month, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One feature derivation step (tagged enum)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FeatureStep {
    /// Year + month (name or number) + day-of-month → date
    ComposeDate {
        output: String,
        year: String,
        month: String,
        day: String,
    },

    /// Day-of-week (0 = Monday) and month-of-year from a date
    CalendarParts {
        date: String,
        day_of_week: String,
        month: String,
    },

    /// Meteorological season label from a month number
    Season { month: String, output: String },

    /// 1 on Saturday/Sunday, else 0
    WeekendFlag { day_of_week: String, output: String },

    /// Row-wise sum of numeric columns
    Sum { output: String, inputs: Vec<String> },

    /// Mean of `value` per `group_by` key, broadcast back to every row
    GroupMean {
        output: String,
        group_by: String,
        value: String,
    },

    /// `left + separator + right`
    Concat {
        output: String,
        left: String,
        right: String,
        #[serde(default = "default_separator")]
        separator: String,
    },

    /// `numerator / denominator`, NaN on a zero denominator
    Ratio {
        output: String,
        numerator: String,
        denominator: String,
    },

    /// Date minus a whole number of days
    ShiftDateBack {
        output: String,
        date: String,
        days: String,
    },

    /// Whole weeks from `start` to `end`
    WeeksBetween {
        output: String,
        start: String,
        end: String,
    },

    /// 1 if the value is strictly below `threshold`, else 0
    BelowThreshold {
        output: String,
        column: String,
        threshold: f64,
    },

    /// 1 if the month is one of `months`, else 0
    MonthIn {
        output: String,
        month: String,
        months: Vec<u32>,
    },

    /// `<prefix>_year`, `<prefix>_month`, `<prefix>_day` from a date
    DateParts { date: String, prefix: String },
}

fn default_separator() -> String {
    "_".to_owned()
}

impl FeatureStep {
    /// Short operation name, matching the JSON tag
    pub fn op(&self) -> &'static str {
        match self {
            Self::ComposeDate { .. } => "compose_date",
            Self::CalendarParts { .. } => "calendar_parts",
            Self::Season { .. } => "season",
            Self::WeekendFlag { .. } => "weekend_flag",
            Self::Sum { .. } => "sum",
            Self::GroupMean { .. } => "group_mean",
            Self::Concat { .. } => "concat",
            Self::Ratio { .. } => "ratio",
            Self::ShiftDateBack { .. } => "shift_date_back",
            Self::WeeksBetween { .. } => "weeks_between",
            Self::BelowThreshold { .. } => "below_threshold",
            Self::MonthIn { .. } => "month_in",
            Self::DateParts { .. } => "date_parts",
        }
    }

    /// Columns the step reads
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Self::ComposeDate {
                year, month, day, ..
            } => vec![year.as_str(), month.as_str(), day.as_str()],
            Self::CalendarParts { date, .. } | Self::DateParts { date, .. } => vec![date.as_str()],
            Self::Season { month, .. } | Self::MonthIn { month, .. } => vec![month.as_str()],
            Self::WeekendFlag { day_of_week, .. } => vec![day_of_week.as_str()],
            Self::Sum { inputs, .. } => inputs.iter().map(String::as_str).collect(),
            Self::GroupMean {
                group_by, value, ..
            } => vec![group_by.as_str(), value.as_str()],
            Self::Concat { left, right, .. } => vec![left.as_str(), right.as_str()],
            Self::Ratio {
                numerator,
                denominator,
                ..
            } => vec![numerator.as_str(), denominator.as_str()],
            Self::ShiftDateBack { date, days, .. } => vec![date.as_str(), days.as_str()],
            Self::WeeksBetween { start, end, .. } => vec![start.as_str(), end.as_str()],
            Self::BelowThreshold { column, .. } => vec![column.as_str()],
        }
    }

    /// Columns the step appends
    pub fn outputs(&self) -> Vec<String> {
        match self {
            Self::CalendarParts {
                day_of_week, month, ..
            } => vec![day_of_week.clone(), month.clone()],
            Self::DateParts { prefix, .. } => vec![
                format!("{prefix}_year"),
                format!("{prefix}_month"),
                format!("{prefix}_day"),
            ],
            Self::ComposeDate { output, .. }
            | Self::Season { output, .. }
            | Self::WeekendFlag { output, .. }
            | Self::Sum { output, .. }
            | Self::GroupMean { output, .. }
            | Self::Concat { output, .. }
            | Self::Ratio { output, .. }
            | Self::ShiftDateBack { output, .. }
            | Self::WeeksBetween { output, .. }
            | Self::BelowThreshold { output, .. }
            | Self::MonthIn { output, .. } => vec![output.clone()],
        }
    }

    /// The booking feature set, in derivation order.
    pub fn hotel_bookings() -> Vec<Self> {
        vec![
            Self::ComposeDate {
                output: "arrival_date".into(),
                year: "arrival_date_year".into(),
                month: "arrival_date_month".into(),
                day: "arrival_date_day_of_month".into(),
            },
            Self::CalendarParts {
                date: "arrival_date".into(),
                day_of_week: "arrival_day_of_week".into(),
                month: "arrival_month".into(),
            },
            Self::Season {
                month: "arrival_month".into(),
                output: "season".into(),
            },
            Self::WeekendFlag {
                day_of_week: "arrival_day_of_week".into(),
                output: "is_weekend".into(),
            },
            Self::Sum {
                output: "total_nights".into(),
                inputs: vec![
                    "stays_in_weekend_nights".into(),
                    "stays_in_week_nights".into(),
                ],
            },
            Self::GroupMean {
                output: "customer_type_cancellation_rate".into(),
                group_by: "customer_type".into(),
                value: "is_canceled".into(),
            },
            Self::GroupMean {
                output: "avg_adr_for_room_type".into(),
                group_by: "reserved_room_type".into(),
                value: "adr".into(),
            },
            Self::Sum {
                output: "total_guests".into(),
                inputs: vec!["adults".into(), "children".into(), "babies".into()],
            },
            Self::Concat {
                output: "room_season".into(),
                left: "reserved_room_type".into(),
                right: "season".into(),
                separator: default_separator(),
            },
            Self::Concat {
                output: "customer_season".into(),
                left: "customer_type".into(),
                right: "season".into(),
                separator: default_separator(),
            },
            Self::Ratio {
                output: "adr_ratio".into(),
                numerator: "adr".into(),
                denominator: "avg_adr_for_room_type".into(),
            },
            Self::ShiftDateBack {
                output: "booking_date".into(),
                date: "arrival_date".into(),
                days: "lead_time".into(),
            },
            Self::WeeksBetween {
                output: "booking_to_arrival_weeks".into(),
                start: "booking_date".into(),
                end: "arrival_date".into(),
            },
            Self::BelowThreshold {
                output: "is_last_minute".into(),
                column: "lead_time".into(),
                threshold: 7.0,
            },
            Self::Sum {
                output: "total_special_requests".into(),
                inputs: vec![
                    "required_car_parking_spaces".into(),
                    "total_of_special_requests".into(),
                ],
            },
            Self::MonthIn {
                output: "is_high_season".into(),
                month: "arrival_month".into(),
                months: vec![6, 7, 8, 12],
            },
            Self::DateParts {
                date: "reservation_status_date".into(),
                prefix: "reservation".into(),
            },
        ]
    }
}

/// Apply `steps` in order, appending each step's output columns.
///
/// # Errors
///
/// - [`PipelineError::MissingColumn`] if a step reads a column that is not present
/// - [`PipelineError::ColumnExists`] if a step would overwrite a column
/// - [`PipelineError::TypeCoercion`] if an input value cannot be interpreted, or
///   a step yields null from non-null inputs (e.g. a date shifted out of range)
pub fn derive_features(df: DataFrame, steps: &[FeatureStep]) -> Result<DataFrame> {
    let mut df = df;

    for (idx, step) in steps.iter().enumerate() {
        for input in step.inputs() {
            if !has_column(&df, input) {
                return Err(PipelineError::missing_column(input));
            }
        }
        for output in step.outputs() {
            ensure_absent(&df, &output)?;
        }

        df = apply_step(df, step)?;
        tracing::debug!(step = idx + 1, op = step.op(), "Derived feature columns");
    }

    Ok(df)
}

fn apply_step(mut df: DataFrame, step: &FeatureStep) -> Result<DataFrame> {
    if let FeatureStep::ComposeDate {
        output,
        year,
        month,
        day,
    } = step
    {
        let composed = compose_date(&df, output, year, month, day)?;
        df.with_column(composed)?;
        return Ok(df);
    }

    for (name, dtype) in typed_inputs(&df, step)? {
        if let Some(value) = first_uncastable(&df, name, &dtype)? {
            return Err(PipelineError::coercion(name, value));
        }
    }

    let exprs = step_exprs(&df, step)?;
    let df = df.lazy().with_columns(exprs).collect()?;

    let inputs = step.inputs();
    for output in step.outputs() {
        if let Some(value) = first_unexplained_null(&df, &output, &inputs)? {
            return Err(PipelineError::coercion(output, value));
        }
    }

    Ok(df)
}

fn step_exprs(df: &DataFrame, step: &FeatureStep) -> Result<Vec<Expr>> {
    let exprs = match step {
        FeatureStep::ComposeDate { .. } => Vec::new(),

        FeatureStep::CalendarParts {
            date,
            day_of_week,
            month,
        } => {
            let date = as_date(date);
            vec![
                // ISO weekday is 1-based from Monday
                (date.clone().dt().weekday().cast(DataType::Int64) - lit(1i64))
                    .alias(day_of_week.as_str()),
                date.dt().month().cast(DataType::Int64).alias(month.as_str()),
            ]
        }

        FeatureStep::Season { month, output } => vec![season(month).alias(output.as_str())],

        FeatureStep::WeekendFlag {
            day_of_week,
            output,
        } => vec![
            flag(col(day_of_week.as_str()).cast(DataType::Int64).is_in(int_list(&[5, 6])))
                .alias(output.as_str()),
        ],

        FeatureStep::Sum { output, inputs } => {
            let dtype = sum_dtype(df, inputs)?;
            let total = inputs
                .iter()
                .map(|name| col(name.as_str()).cast(dtype.clone()))
                .reduce(|acc, next| acc + next)
                .unwrap_or_else(|| lit(0i64).cast(dtype));
            vec![total.alias(output.as_str())]
        }

        FeatureStep::GroupMean {
            output,
            group_by,
            value,
        } => vec![
            when(col(group_by.as_str()).is_null())
                .then(lit(NULL).cast(DataType::Float64))
                .otherwise(
                    col(value.as_str())
                        .cast(DataType::Float64)
                        .mean()
                        .over([col(group_by.as_str())]),
                )
                .alias(output.as_str()),
        ],

        FeatureStep::Concat {
            output,
            left,
            right,
            separator,
        } => vec![
            concat_str(
                [
                    col(left.as_str()).cast(DataType::String),
                    col(right.as_str()).cast(DataType::String),
                ],
                separator,
                false,
            )
            .alias(output.as_str()),
        ],

        FeatureStep::Ratio {
            output,
            numerator,
            denominator,
        } => {
            let denominator = col(denominator.as_str()).cast(DataType::Float64);
            vec![
                when(denominator.clone().eq(lit(0.0)))
                    .then(lit(f64::NAN))
                    .otherwise(col(numerator.as_str()).cast(DataType::Float64) / denominator)
                    .alias(output.as_str()),
            ]
        }

        FeatureStep::ShiftDateBack { output, date, days } => {
            // Out-of-range offsets and results become null and are reported afterwards
            let offset = col(days.as_str())
                .cast(DataType::Int32)
                .cast(DataType::Int64);
            vec![
                (epoch_days(date) - offset)
                    .cast(DataType::Int32)
                    .cast(DataType::Date)
                    .alias(output.as_str()),
            ]
        }

        FeatureStep::WeeksBetween { output, start, end } => vec![
            (epoch_days(end) - epoch_days(start))
                .floor_div(lit(7i64))
                .alias(output.as_str()),
        ],

        FeatureStep::BelowThreshold {
            output,
            column,
            threshold,
        } => vec![
            flag(col(column.as_str()).cast(DataType::Float64).lt(lit(*threshold)))
                .alias(output.as_str()),
        ],

        FeatureStep::MonthIn {
            output,
            month,
            months,
        } => {
            let months: Vec<i64> = months.iter().map(|&m| i64::from(m)).collect();
            vec![
                flag(col(month.as_str()).cast(DataType::Int64).is_in(int_list(&months)))
                    .alias(output.as_str()),
            ]
        }

        FeatureStep::DateParts { date, prefix } => {
            let date = as_date(date);
            vec![
                date.clone()
                    .dt()
                    .year()
                    .cast(DataType::Int64)
                    .alias(format!("{prefix}_year")),
                date.clone()
                    .dt()
                    .month()
                    .cast(DataType::Int64)
                    .alias(format!("{prefix}_month")),
                date.dt().day().cast(DataType::Int64).alias(format!("{prefix}_day")),
            ]
        }
    };

    Ok(exprs)
}

/// Inputs that must cast to a given type before the step's expressions run
fn typed_inputs<'a>(df: &DataFrame, step: &'a FeatureStep) -> Result<Vec<(&'a str, DataType)>> {
    let typed = match step {
        FeatureStep::CalendarParts { date, .. } | FeatureStep::DateParts { date, .. } => {
            vec![(date.as_str(), DataType::Date)]
        }
        FeatureStep::Season { month, .. } | FeatureStep::MonthIn { month, .. } => {
            vec![(month.as_str(), DataType::Int64)]
        }
        FeatureStep::WeekendFlag { day_of_week, .. } => {
            vec![(day_of_week.as_str(), DataType::Int64)]
        }
        FeatureStep::Sum { inputs, .. } => {
            let dtype = sum_dtype(df, inputs)?;
            inputs
                .iter()
                .map(|name| (name.as_str(), dtype.clone()))
                .collect()
        }
        FeatureStep::GroupMean { value, .. } => vec![(value.as_str(), DataType::Float64)],
        FeatureStep::Ratio {
            numerator,
            denominator,
            ..
        } => vec![
            (numerator.as_str(), DataType::Float64),
            (denominator.as_str(), DataType::Float64),
        ],
        FeatureStep::ShiftDateBack { date, days, .. } => {
            vec![(date.as_str(), DataType::Date), (days.as_str(), DataType::Int64)]
        }
        FeatureStep::WeeksBetween { start, end, .. } => {
            vec![(start.as_str(), DataType::Date), (end.as_str(), DataType::Date)]
        }
        FeatureStep::BelowThreshold { column, .. } => vec![(column.as_str(), DataType::Float64)],
        FeatureStep::ComposeDate { .. } | FeatureStep::Concat { .. } => Vec::new(),
    };
    Ok(typed)
}

/// First non-null value of `name` that does not cast to `dtype`, rendered as text.
fn first_uncastable(df: &DataFrame, name: &str, dtype: &DataType) -> Result<Option<String>> {
    if series(df, name)?.dtype() == dtype {
        return Ok(None);
    }
    let rejected = df
        .clone()
        .lazy()
        .filter(
            col(name)
                .is_not_null()
                .and(col(name).cast(dtype.clone()).is_null()),
        )
        .select([col(name).cast(DataType::String)])
        .limit(1)
        .collect()?;
    first_text(&rejected, name)
}

/// First row where `output` is null although every input is present,
/// rendered as the comma-joined input values.
fn first_unexplained_null(df: &DataFrame, output: &str, inputs: &[&str]) -> Result<Option<String>> {
    let Some(inputs_present) = inputs
        .iter()
        .map(|name| col(*name).is_not_null())
        .reduce(|acc, next| acc.and(next))
    else {
        return Ok(None);
    };
    let rendered: Vec<Expr> = inputs
        .iter()
        .map(|name| col(*name).cast(DataType::String))
        .collect();

    let unexplained = df
        .clone()
        .lazy()
        .filter(col(output).is_null().and(inputs_present))
        .select([concat_str(rendered, ", ", false).alias("value")])
        .limit(1)
        .collect()?;
    first_text(&unexplained, "value")
}

fn first_text(df: &DataFrame, name: &str) -> Result<Option<String>> {
    Ok(series(df, name)?.str()?.get(0).map(str::to_owned))
}

fn compose_date(df: &DataFrame, output: &str, year: &str, month: &str, day: &str) -> Result<Series> {
    let years = i64_values(df, year)?;
    let months = text_values(df, month)?;
    let days = i64_values(df, day)?;

    let mut out = Vec::with_capacity(years.len());
    for ((y, m), d) in years.into_iter().zip(months).zip(days) {
        let (Some(y), Some(m), Some(d)) = (y, m, d) else {
            out.push(None);
            continue;
        };
        let month_num = month_number(&m).ok_or_else(|| PipelineError::coercion(month, &m))?;
        let date = i32::try_from(y)
            .ok()
            .zip(u32::try_from(d).ok())
            .and_then(|(y, d)| NaiveDate::from_ymd_opt(y, month_num, d))
            .ok_or_else(|| PipelineError::coercion(output, format!("{y}-{m}-{d}")))?;
        out.push(Some(date_to_days(date)));
    }

    date_series(output, out)
}

/// Integer sums stay integer; any float or text input makes the sum float
fn sum_dtype(df: &DataFrame, inputs: &[String]) -> Result<DataType> {
    let mut all_integer = true;
    for name in inputs {
        all_integer &= series(df, name)?.dtype().is_integer();
    }
    Ok(if all_integer {
        DataType::Int64
    } else {
        DataType::Float64
    })
}

/// Month number from `"July"`, `"jul"` or `"7"`.
pub fn month_number(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    raw.parse::<Month>().ok().map(|m| m.number_from_month())
}

/// Meteorological season label; months outside 1-11 fall through to autumn
fn season(month: &str) -> Expr {
    let month = col(month).cast(DataType::Int64);
    when(month.clone().is_null())
        .then(lit(NULL).cast(DataType::String))
        .when(month.clone().is_in(int_list(&[12, 1, 2])))
        .then(lit("Winter"))
        .when(month.clone().is_in(int_list(&[3, 4, 5])))
        .then(lit("Spring"))
        .when(month.is_in(int_list(&[6, 7, 8])))
        .then(lit("Summer"))
        .otherwise(lit("Autumn"))
}

fn as_date(name: &str) -> Expr {
    col(name).cast(DataType::Date)
}

/// Days since the Unix epoch for a `Date` or `Datetime` column
fn epoch_days(name: &str) -> Expr {
    as_date(name).cast(DataType::Int64)
}

fn int_list(values: &[i64]) -> Expr {
    lit(Series::new("values".into(), values))
}

/// 0/1 indicator; a null condition counts as 0
fn flag(condition: Expr) -> Expr {
    condition.fill_null(lit(false)).cast(DataType::Int64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i64_col(df: &DataFrame, name: &str) -> Vec<Option<i64>> {
        df.column(name)
            .expect("column")
            .as_materialized_series()
            .i64()
            .expect("i64 column")
            .into_iter()
            .collect()
    }

    fn f64_col(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name)
            .expect("column")
            .as_materialized_series()
            .f64()
            .expect("f64 column")
            .into_iter()
            .collect()
    }

    fn str_col(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        df.column(name)
            .expect("column")
            .as_materialized_series()
            .str()
            .expect("str column")
            .into_iter()
            .map(|v| v.map(str::to_owned))
            .collect()
    }

    #[test]
    fn test_month_number() {
        assert_eq!(month_number("July"), Some(7));
        assert_eq!(month_number("dec"), Some(12));
        assert_eq!(month_number("3"), Some(3));
        assert_eq!(month_number("13"), None);
        assert_eq!(month_number("Juli"), None);
    }

    #[test]
    fn test_season_buckets() -> Result<()> {
        let df = df!("month" => [Some(12i64), Some(2), Some(4), Some(7), Some(9), Some(11), None])?;
        let steps = vec![FeatureStep::Season {
            month: "month".into(),
            output: "season".into(),
        }];

        let out = derive_features(df, &steps)?;
        let seasons = str_col(&out, "season");
        let seasons: Vec<Option<&str>> = seasons.iter().map(Option::as_deref).collect();
        assert_eq!(
            seasons,
            vec![
                Some("Winter"),
                Some("Winter"),
                Some("Spring"),
                Some("Summer"),
                Some("Autumn"),
                Some("Autumn"),
                None
            ]
        );
        Ok(())
    }

    #[test]
    fn test_group_mean_includes_own_row() -> Result<()> {
        let df = df!(
            "customer_type" => [Some("Transient"), Some("Transient"), Some("Transient"), Some("Transient"), Some("Group"), None],
            "is_canceled" => [Some(0i64), Some(0), Some(0), Some(1), None, Some(1)]
        )?;
        let steps = vec![FeatureStep::GroupMean {
            output: "rate".into(),
            group_by: "customer_type".into(),
            value: "is_canceled".into(),
        }];

        let out = derive_features(df, &steps)?;
        let means = f64_col(&out, "rate");
        assert_eq!(means[..4], [Some(0.25); 4]);
        // all-null group and null key both stay null
        assert_eq!(means[4..], [None::<f64>; 2]);
        Ok(())
    }

    #[test]
    fn test_flags_and_weeks_between() -> Result<()> {
        let df = df!(
            "lead_time" => [Some(3i64), Some(7), None],
            "month" => [Some(6i64), Some(9), None],
            "start" => [0i32, 10, 20],
            "end" => [14i32, 9, 26]
        )?
        .lazy()
        .with_columns([
            col("start").cast(DataType::Date),
            col("end").cast(DataType::Date),
        ])
        .collect()?;
        let steps = vec![
            FeatureStep::BelowThreshold {
                output: "is_last_minute".into(),
                column: "lead_time".into(),
                threshold: 7.0,
            },
            FeatureStep::MonthIn {
                output: "is_high_season".into(),
                month: "month".into(),
                months: vec![6, 7, 8, 12],
            },
            FeatureStep::WeeksBetween {
                output: "weeks".into(),
                start: "start".into(),
                end: "end".into(),
            },
        ];

        let out = derive_features(df, &steps)?;
        assert_eq!(i64_col(&out, "is_last_minute"), vec![Some(1), Some(0), Some(0)]);
        assert_eq!(i64_col(&out, "is_high_season"), vec![Some(1), Some(0), Some(0)]);
        // negative spans round toward the earlier week
        assert_eq!(i64_col(&out, "weeks"), vec![Some(2), Some(-1), Some(0)]);
        Ok(())
    }

    #[test]
    fn test_shift_date_back_out_of_range_fails() -> Result<()> {
        let df = df!("arrival" => [0i32, 1], "lead_time" => [3i64, 3_000_000_000])?
            .lazy()
            .with_column(col("arrival").cast(DataType::Date))
            .collect()?;
        let steps = vec![FeatureStep::ShiftDateBack {
            output: "booking_date".into(),
            date: "arrival".into(),
            days: "lead_time".into(),
        }];

        let err = derive_features(df, &steps).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::TypeCoercion { ref column, ref value }
                if column == "booking_date" && value == "1970-01-02, 3000000000"
        ));
        Ok(())
    }

    #[test]
    fn test_shift_date_back() -> Result<()> {
        let df = df!("arrival" => [10i32], "lead_time" => [3i64])?
            .lazy()
            .with_column(col("arrival").cast(DataType::Date))
            .collect()?;
        let steps = vec![FeatureStep::ShiftDateBack {
            output: "booking_date".into(),
            date: "arrival".into(),
            days: "lead_time".into(),
        }];

        let out = derive_features(df, &steps)?;
        let booked = out.column("booking_date")?.as_materialized_series().cast(&DataType::Int32)?;
        assert_eq!(booked.i32()?.get(0), Some(7));
        Ok(())
    }

    #[test]
    fn test_unparsable_threshold_input_fails() -> Result<()> {
        let df = df!("lead_time" => ["3", "soon"])?;
        let steps = vec![FeatureStep::BelowThreshold {
            output: "is_last_minute".into(),
            column: "lead_time".into(),
            threshold: 7.0,
        }];

        let err = derive_features(df, &steps).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::TypeCoercion { ref column, ref value }
                if column == "lead_time" && value == "soon"
        ));
        Ok(())
    }

    #[test]
    fn test_calendar_chain() -> Result<()> {
        let df = df!(
            "y" => ["2015", "2017"],
            "m" => ["July", "August"],
            "d" => [4i64, 14]
        )?;
        let steps = vec![
            FeatureStep::ComposeDate {
                output: "date".into(),
                year: "y".into(),
                month: "m".into(),
                day: "d".into(),
            },
            FeatureStep::CalendarParts {
                date: "date".into(),
                day_of_week: "dow".into(),
                month: "month".into(),
            },
            FeatureStep::WeekendFlag {
                day_of_week: "dow".into(),
                output: "weekend".into(),
            },
            FeatureStep::DateParts {
                date: "date".into(),
                prefix: "arrival".into(),
            },
        ];

        let out = derive_features(df, &steps)?;
        // 2015-07-04 was a Saturday, 2017-08-14 a Monday
        assert_eq!(i64_col(&out, "dow"), vec![Some(5), Some(0)]);
        assert_eq!(i64_col(&out, "month"), vec![Some(7), Some(8)]);
        assert_eq!(i64_col(&out, "weekend"), vec![Some(1), Some(0)]);
        assert_eq!(i64_col(&out, "arrival_year"), vec![Some(2015), Some(2017)]);
        assert_eq!(i64_col(&out, "arrival_day"), vec![Some(4), Some(14)]);
        assert_eq!(out.column("date")?.dtype(), &DataType::Date);
        Ok(())
    }

    #[test]
    fn test_invalid_calendar_date_fails() -> Result<()> {
        let df = df!("y" => [2015i64], "m" => ["February"], "d" => [30i64])?;
        let steps = vec![FeatureStep::ComposeDate {
            output: "date".into(),
            year: "y".into(),
            month: "m".into(),
            day: "d".into(),
        }];

        let err = derive_features(df, &steps).unwrap_err();
        assert!(matches!(err, PipelineError::TypeCoercion { ref column, .. } if column == "date"));
        Ok(())
    }

    #[test]
    fn test_ratio_with_zero_denominator_is_nan() -> Result<()> {
        let df = df!("adr" => [10.0, 0.0], "avg" => [5.0, 0.0])?;
        let steps = vec![FeatureStep::Ratio {
            output: "ratio".into(),
            numerator: "adr".into(),
            denominator: "avg".into(),
        }];

        let out = derive_features(df, &steps)?;
        let ratios = f64_col(&out, "ratio");
        assert_eq!(ratios[0], Some(2.0));
        assert!(ratios[1].is_some_and(f64::is_nan));
        Ok(())
    }

    #[test]
    fn test_sum_and_concat() -> Result<()> {
        let df = df!(
            "adults" => [2i64, 1],
            "children" => [Some(1i64), None],
            "adr" => [1.5, 2.0],
            "room" => ["A", "D"],
            "season" => ["Summer", "Winter"]
        )?;
        let steps = vec![
            FeatureStep::Sum {
                output: "guests".into(),
                inputs: vec!["adults".into(), "children".into()],
            },
            FeatureStep::Sum {
                output: "mixed".into(),
                inputs: vec!["adults".into(), "adr".into()],
            },
            FeatureStep::Concat {
                output: "room_season".into(),
                left: "room".into(),
                right: "season".into(),
                separator: "_".into(),
            },
        ];

        let out = derive_features(df, &steps)?;
        assert_eq!(i64_col(&out, "guests"), vec![Some(3), None]);
        assert_eq!(f64_col(&out, "mixed"), vec![Some(3.5), Some(3.0)]);
        assert_eq!(
            str_col(&out, "room_season"),
            vec![Some("A_Summer".to_owned()), Some("D_Winter".to_owned())]
        );
        Ok(())
    }

    #[test]
    fn test_missing_prerequisite_fails() -> Result<()> {
        let df = df!("lead_time" => [3i64])?;
        let steps = vec![FeatureStep::MonthIn {
            output: "is_high_season".into(),
            month: "arrival_month".into(),
            months: vec![6, 7, 8, 12],
        }];

        let err = derive_features(df, &steps).unwrap_err();
        assert!(
            matches!(err, PipelineError::MissingColumn { ref column } if column == "arrival_month")
        );
        Ok(())
    }

    #[test]
    fn test_existing_output_is_not_overwritten() -> Result<()> {
        let df = df!("lead_time" => [3i64], "is_last_minute" => [0i64])?;
        let steps = vec![FeatureStep::BelowThreshold {
            output: "is_last_minute".into(),
            column: "lead_time".into(),
            threshold: 7.0,
        }];

        let err = derive_features(df, &steps).unwrap_err();
        assert!(matches!(err, PipelineError::ColumnExists { .. }));
        Ok(())
    }

    #[test]
    fn test_step_json_tags() {
        let json = r#"{"op": "concat", "output": "o", "left": "a", "right": "b"}"#;
        let step: FeatureStep = serde_json::from_str(json).expect("valid step");
        assert_eq!(
            step,
            FeatureStep::Concat {
                output: "o".into(),
                left: "a".into(),
                right: "b".into(),
                separator: "_".into(),
            }
        );
        assert_eq!(step.inputs(), vec!["a", "b"]);
    }
}
