//! Declarative feature-engineering pipeline for booking records.
//!
//! A pipeline variant is a versioned JSON [`PipelineSpec`]. The executor runs
//! its stages strictly in order; no stage calls back into an earlier one:
//!
//! ```text
//! raw text table
//!   └─> normalize        schema types per column
//!   └─> impute           zero / mode fill, required-column contract
//!   └─> derive_features  ordered FeatureStep list
//!   └─> drop_columns
//!   └─> fit_transform    one-hot (k-1) + standardization
//! model-ready table + FittedTransform
//! ```
//!
//! # Example
//!
//! ```no_run
//! use hotelprep::pipeline::{PipelineSpec, load_raw, run_pipeline};
//! use hotelprep::schema::Schema;
//! use std::path::Path;
//!
//! let spec = PipelineSpec::hotel_bookings_v1();
//! let schema = Schema::load(&spec.schema.path)?;
//! let raw = load_raw(Path::new("data/raw/hotel_bookings.csv"), &spec.input)?;
//!
//! let output = run_pipeline(&spec, &schema, raw)?;
//! println!("{}", output.report.summary());
//! # Ok::<(), hotelprep::error::PipelineError>(())
//! ```

pub mod column;
pub mod encode;
pub mod executor;
pub mod features;
pub mod impute;
pub mod normalize;
pub mod spec;
pub mod validation;

pub use encode::{CategoricalLevels, FittedTransform, ScalerParams, fit_transform};
pub use executor::{
    PipelineOutput, RunReport, expand_path_template, load_raw, load_table, run_pipeline,
};
pub use features::{FeatureStep, derive_features};
pub use impute::{ensure_required, impute};
pub use normalize::normalize;
pub use spec::{EncodeConfig, ImputeStrategy, InputConfig, PipelineSpec, SPEC_VERSION, SchemaConfig};
pub use validation::{Location, ValidationError, validate_pipeline};
