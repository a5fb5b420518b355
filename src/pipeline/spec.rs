//! Pipeline specification data structures.
//!
//! A [`PipelineSpec`] is the JSON description of one pipeline variant: how
//! to read the raw file, where the schema lives, which columns are imputed
//! and how, the ordered feature steps, and the encoding lists. Variants that
//! used to be separate scripts are separate spec files.

use super::features::FeatureStep;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Current pipeline spec version
pub const SPEC_VERSION: &str = "0.1";

/// Root pipeline specification structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Specification version for future migrations
    pub version: String,

    /// Human-readable pipeline name
    pub name: String,

    /// Raw input parsing options
    #[serde(default)]
    pub input: InputConfig,

    /// Schema location and column contracts
    pub schema: SchemaConfig,

    /// Per-column imputation strategy
    #[serde(default)]
    pub impute: BTreeMap<String, ImputeStrategy>,

    /// Ordered feature derivation steps
    #[serde(default)]
    pub features: Vec<FeatureStep>,

    /// Columns removed after feature derivation, before encoding
    #[serde(default)]
    pub drop_columns: Vec<String>,

    /// One-hot and standardization column lists
    #[serde(default)]
    pub encode: EncodeConfig,
}

impl PipelineSpec {
    /// Create an empty pipeline spec reading the given schema file
    pub fn new(name: impl Into<String>, schema_path: impl Into<PathBuf>) -> Self {
        Self {
            version: SPEC_VERSION.to_owned(),
            name: name.into(),
            input: InputConfig::default(),
            schema: SchemaConfig::new(schema_path),
            impute: BTreeMap::new(),
            features: Vec::new(),
            drop_columns: Vec::new(),
            encode: EncodeConfig::default(),
        }
    }

    /// The hotel-bookings v1 pipeline: zero-fill agent/company, mode-fill
    /// country/children, derive the booking features, encode and scale.
    pub fn hotel_bookings_v1() -> Self {
        let mut spec = Self::new(
            "hotel_bookings_v1",
            "schemas/hotel_bookings_v1.json",
        );

        spec.impute = BTreeMap::from([
            ("agent".to_owned(), ImputeStrategy::Zero),
            ("company".to_owned(), ImputeStrategy::Zero),
            ("country".to_owned(), ImputeStrategy::Mode),
            ("children".to_owned(), ImputeStrategy::Mode),
        ]);

        spec.schema.required_columns = to_owned_vec(&[
            "hotel",
            "is_canceled",
            "lead_time",
            "arrival_date_year",
            "arrival_date_month",
            "arrival_date_day_of_month",
            "stays_in_weekend_nights",
            "stays_in_week_nights",
            "adults",
            "children",
            "babies",
            "customer_type",
            "reserved_room_type",
            "adr",
            "required_car_parking_spaces",
            "total_of_special_requests",
        ]);

        spec.features = FeatureStep::hotel_bookings();
        // replaced by its year/month/day parts
        spec.drop_columns = to_owned_vec(&["reservation_status_date"]);

        spec.encode.categorical = to_owned_vec(&[
            "hotel",
            "arrival_date_year",
            "arrival_date_month",
            "meal",
            "country",
            "market_segment",
            "distribution_channel",
            "is_repeated_guest",
            "customer_type",
            "reserved_room_type",
            "assigned_room_type",
            "deposit_type",
            "agent",
            "company",
            "reservation_status",
            "season",
            "room_season",
            "customer_season",
        ]);

        spec.encode.numeric = to_owned_vec(&[
            "arrival_date_week_number",
            "arrival_date_day_of_month",
            "stays_in_weekend_nights",
            "stays_in_week_nights",
            "adults",
            "children",
            "babies",
            "previous_cancellations",
            "previous_bookings_not_canceled",
            "booking_changes",
            "days_in_waiting_list",
            "adr",
            "required_car_parking_spaces",
            "total_of_special_requests",
        ]);

        spec
    }

    /// Load a pipeline spec from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse a pipeline spec from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save pipeline spec to a JSON file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Serialize pipeline spec to JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn to_owned_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

/// Raw input parsing options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Whether the file has a header row
    #[serde(default = "default_true")]
    pub has_header: bool,

    /// Field delimiter character
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Tokens read as null in addition to empty fields
    #[serde(default = "default_null_values")]
    pub null_values: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            has_header: default_true(),
            delimiter: default_delimiter(),
            null_values: default_null_values(),
        }
    }
}

/// Schema location and column contracts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Path to the JSON schema file, relative to the working directory
    pub path: PathBuf,

    /// `chrono` format used for datetime columns
    #[serde(default = "default_datetime_format")]
    pub datetime_format: String,

    /// Columns that must hold no nulls once imputation has run
    #[serde(default)]
    pub required_columns: Vec<String>,
}

impl SchemaConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            datetime_format: default_datetime_format(),
            required_columns: Vec::new(),
        }
    }
}

/// Columns handed to the encoder/scaler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodeConfig {
    /// Nominal columns replaced by k-1 indicator columns
    #[serde(default)]
    pub categorical: Vec<String>,

    /// Numeric columns standardized to zero mean / unit variance
    #[serde(default)]
    pub numeric: Vec<String>,
}

/// Imputation strategy for missing values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImputeStrategy {
    /// Replace nulls with 0
    Zero,
    /// Replace nulls with the most frequent value
    Mode,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_delimiter() -> char {
    ','
}

fn default_null_values() -> Vec<String> {
    vec!["NA".to_owned(), "NULL".to_owned()]
}

fn default_datetime_format() -> String {
    "%Y-%m-%d".to_owned()
}
