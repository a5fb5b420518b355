//! Pipeline specification validation.
//!
//! Checks a [`PipelineSpec`] against its [`Schema`] before any data is read,
//! by simulating the column set through every stage.

use super::spec::{PipelineSpec, SPEC_VERSION};
use crate::schema::Schema;
use std::collections::BTreeSet;
use std::fmt;

/// Where in the spec a problem was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Spec,
    Schema,
    Impute,
    /// Zero-based index into `features`
    Step(usize),
    Drop,
    Encode,
}

/// Validation error with helpful context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub location: Location,
    pub message: String,
}

impl ValidationError {
    fn new(location: Location, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Location::Spec => write!(f, "Spec: {}", self.message),
            Location::Schema => write!(f, "Schema: {}", self.message),
            Location::Impute => write!(f, "Impute: {}", self.message),
            Location::Step(idx) => write!(f, "Step {}: {}", idx + 1, self.message),
            Location::Drop => write!(f, "Drop: {}", self.message),
            Location::Encode => write!(f, "Encode: {}", self.message),
        }
    }
}

/// Validate a pipeline spec against the schema it will run with.
///
/// Returns every problem found; an empty list means the spec is runnable as
/// far as column names go. Value-level problems (unparsable cells, nulls in
/// required columns) only surface at run time.
pub fn validate_pipeline(spec: &PipelineSpec, schema: &Schema) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if spec.version != SPEC_VERSION {
        errors.push(ValidationError::new(
            Location::Spec,
            format!(
                "Unsupported spec version '{}', expected '{SPEC_VERSION}'",
                spec.version
            ),
        ));
    }

    let mut columns: BTreeSet<String> = schema.iter().map(|(name, _)| name.to_owned()).collect();

    for required in &spec.schema.required_columns {
        if !columns.contains(required) {
            errors.push(ValidationError::new(
                Location::Schema,
                format!("Required column '{required}' is not declared in the schema"),
            ));
        }
    }

    for name in spec.impute.keys() {
        if !columns.contains(name) {
            errors.push(ValidationError::new(
                Location::Impute,
                format!("Cannot impute non-existent column '{name}'"),
            ));
        }
    }

    for (idx, step) in spec.features.iter().enumerate() {
        let location = Location::Step(idx);
        for input in step.inputs() {
            if !columns.contains(input) {
                errors.push(ValidationError::new(
                    location,
                    format!("{} reads non-existent column '{input}'", step.op()),
                ));
            }
        }
        for output in step.outputs() {
            if !columns.insert(output.clone()) {
                errors.push(ValidationError::new(
                    location,
                    format!("{} would overwrite existing column '{output}'", step.op()),
                ));
            }
        }
        validate_step_parameters(step, location, &mut errors);
    }

    for name in &spec.drop_columns {
        if !columns.remove(name) {
            errors.push(ValidationError::new(
                Location::Drop,
                format!("Cannot drop non-existent column '{name}'"),
            ));
        }
    }

    for name in spec.encode.categorical.iter().chain(&spec.encode.numeric) {
        if !columns.contains(name) {
            errors.push(ValidationError::new(
                Location::Encode,
                format!("Cannot encode non-existent column '{name}'"),
            ));
        }
    }
    let mut categorical: BTreeSet<&String> = BTreeSet::new();
    for name in &spec.encode.categorical {
        if !categorical.insert(name) {
            errors.push(ValidationError::new(
                Location::Encode,
                format!("Column '{name}' is listed twice as categorical"),
            ));
        }
    }
    let mut numeric: BTreeSet<&String> = BTreeSet::new();
    for name in &spec.encode.numeric {
        if !numeric.insert(name) {
            errors.push(ValidationError::new(
                Location::Encode,
                format!("Column '{name}' is listed twice as numeric"),
            ));
        } else if categorical.contains(name) {
            errors.push(ValidationError::new(
                Location::Encode,
                format!("Column '{name}' is listed as both categorical and numeric"),
            ));
        }
    }

    errors
}

fn validate_step_parameters(
    step: &super::FeatureStep,
    location: Location,
    errors: &mut Vec<ValidationError>,
) {
    use super::FeatureStep;

    match step {
        FeatureStep::Sum { inputs, .. } if inputs.is_empty() => {
            errors.push(ValidationError::new(location, "sum needs at least one input"));
        }
        FeatureStep::BelowThreshold { threshold, .. } if !threshold.is_finite() => {
            errors.push(ValidationError::new(
                location,
                format!("Invalid threshold: {threshold}"),
            ));
        }
        FeatureStep::MonthIn { months, .. } => {
            for month in months {
                if !(1..=12).contains(month) {
                    errors.push(ValidationError::new(
                        location,
                        format!("Invalid month: {month} (must be 1-12)"),
                    ));
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FeatureStep;
    use crate::pipeline::spec::ImputeStrategy;
    use crate::schema::ColumnType;

    fn create_test_schema() -> Schema {
        [
            ("lead_time", ColumnType::Integer),
            ("adr", ColumnType::Float),
            ("hotel", ColumnType::Categorical),
        ]
        .into_iter()
        .map(|(n, k)| (n.to_owned(), k))
        .collect()
    }

    #[test]
    fn test_valid_pipeline() {
        let mut spec = PipelineSpec::new("test", "schema.json");
        spec.impute.insert("adr".to_owned(), ImputeStrategy::Zero);
        spec.features.push(FeatureStep::BelowThreshold {
            output: "is_last_minute".into(),
            column: "lead_time".into(),
            threshold: 7.0,
        });
        spec.encode.categorical = vec!["hotel".to_owned()];
        spec.encode.numeric = vec!["adr".to_owned(), "is_last_minute".to_owned()];

        let errors = validate_pipeline(&spec, &create_test_schema());
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    #[test]
    fn test_step_order_matters() {
        let mut spec = PipelineSpec::new("test", "schema.json");
        spec.features = vec![
            FeatureStep::Ratio {
                output: "adr_ratio".into(),
                numerator: "adr".into(),
                denominator: "avg_adr".into(),
            },
            FeatureStep::GroupMean {
                output: "avg_adr".into(),
                group_by: "hotel".into(),
                value: "adr".into(),
            },
        ];

        let errors = validate_pipeline(&spec, &create_test_schema());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].location, Location::Step(0));
        assert!(errors[0].to_string().starts_with("Step 1: ratio reads"));
    }

    #[test]
    fn test_overwrite_and_drop_errors() {
        let mut spec = PipelineSpec::new("test", "schema.json");
        spec.features.push(FeatureStep::Sum {
            output: "adr".into(),
            inputs: vec!["lead_time".into()],
        });
        spec.drop_columns = vec!["nonexistent".to_owned()];

        let errors = validate_pipeline(&spec, &create_test_schema());
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("overwrite"));
        assert_eq!(errors[1].location, Location::Drop);
    }

    #[test]
    fn test_dropped_column_cannot_be_encoded() {
        let mut spec = PipelineSpec::new("test", "schema.json");
        spec.drop_columns = vec!["hotel".to_owned()];
        spec.encode.categorical = vec!["hotel".to_owned()];

        let errors = validate_pipeline(&spec, &create_test_schema());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].location, Location::Encode);
    }

    #[test]
    fn test_duplicate_encode_entries() {
        let mut spec = PipelineSpec::new("test", "schema.json");
        spec.encode.categorical = vec!["hotel".to_owned(), "hotel".to_owned()];
        spec.encode.numeric = vec!["adr".to_owned(), "lead_time".to_owned(), "adr".to_owned()];

        let errors = validate_pipeline(&spec, &create_test_schema());
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            vec![
                "Encode: Column 'hotel' is listed twice as categorical",
                "Encode: Column 'adr' is listed twice as numeric",
            ]
        );
    }

    #[test]
    fn test_invalid_parameters() {
        let mut spec = PipelineSpec::new("test", "schema.json");
        spec.version = "9.9".to_owned();
        spec.schema.required_columns = vec!["country".to_owned()];
        spec.features.push(FeatureStep::MonthIn {
            output: "high".into(),
            month: "lead_time".into(),
            months: vec![0, 7],
        });

        let errors = validate_pipeline(&spec, &create_test_schema());
        let locations: Vec<Location> = errors.iter().map(|e| e.location).collect();
        assert_eq!(
            locations,
            vec![Location::Spec, Location::Schema, Location::Step(0)]
        );
    }

    #[test]
    fn test_hotel_pipeline_validates_against_bundled_schema() {
        let schema = Schema::load(std::path::Path::new(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/schemas/hotel_bookings_v1.json"
        )))
        .expect("bundled schema loads");

        let errors = validate_pipeline(&PipelineSpec::hotel_bookings_v1(), &schema);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }
}
