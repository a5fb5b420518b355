//! Declarative column schema.
//!
//! A schema file is a flat JSON object mapping each column name to a type
//! tag:
//!
//! ```json
//! {
//!     "hotel": "categorical",
//!     "lead_time": "integer",
//!     "adr": "float",
//!     "reservation_status_date": "datetime"
//! }
//! ```
//!
//! Tags are matched case-insensitively and the pandas spellings used by the
//! historical schema files (`category`, `int64`, `datetime64[ns]`, ...) are
//! accepted as aliases.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Semantic type declared for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Categorical,
    Integer,
    Float,
    Datetime,
    String,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Categorical => "categorical",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Datetime => "datetime",
            Self::String => "string",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(tag: &str) -> std::result::Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "categorical" | "category" => Ok(Self::Categorical),
            "integer" | "int" | "int64" => Ok(Self::Integer),
            "float" | "float64" | "double" => Ok(Self::Float),
            "datetime" | "datetime64[ns]" | "date" => Ok(Self::Datetime),
            "string" | "str" | "text" => Ok(Self::String),
            other => Err(format!("unrecognized type tag '{other}'")),
        }
    }
}

/// Immutable column name → type mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: BTreeMap<String, ColumnType>,
}

impl Schema {
    /// Load a schema definition from a JSON file.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::SchemaNotFound`] if `path` is not a file
    /// - [`PipelineError::SchemaParse`] if the content is not a JSON object of
    ///   recognized type tags
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PipelineError::SchemaNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|reason| PipelineError::SchemaParse {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse a schema from its JSON text. The error is a human-readable reason.
    pub fn from_json(json: &str) -> std::result::Result<Self, String> {
        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(json).map_err(|e| format!("expected a JSON object: {e}"))?;

        let mut columns = BTreeMap::new();
        for (name, value) in raw {
            let tag = value
                .as_str()
                .ok_or_else(|| format!("type tag for column '{name}' must be a string"))?;
            let kind = tag
                .parse::<ColumnType>()
                .map_err(|e| format!("column '{name}': {e}"))?;
            columns.insert(name, kind);
        }

        Ok(Self { columns })
    }

    pub fn get(&self, column: &str) -> Option<ColumnType> {
        self.columns.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, ColumnType)> for Schema {
    fn from_iter<I: IntoIterator<Item = (String, ColumnType)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}
