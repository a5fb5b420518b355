//! # hotelprep - hotel booking feature pipeline
//!
//! Turns raw hotel-booking records into a model-ready table and trains a
//! cancellation classifier on it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hotelprep::pipeline::{PipelineSpec, load_raw, run_pipeline};
//! use hotelprep::schema::Schema;
//! use hotelprep::sink::write_csv_once;
//! use std::path::Path;
//!
//! let spec = PipelineSpec::hotel_bookings_v1();
//! let schema = Schema::load(&spec.schema.path)?;
//! let raw = load_raw(Path::new("data/raw/hotel_bookings.csv"), &spec.input)?;
//!
//! let mut output = run_pipeline(&spec, &schema, raw)?;
//! write_csv_once(&mut output.table, Path::new("data/processed/clean_hotel_bookings_v1.csv"))?;
//! # Ok::<(), hotelprep::error::PipelineError>(())
//! ```
//!
//! ## Core Modules
//!
//! - [`schema`]: column-name → type contract loaded from JSON
//! - [`pipeline`]: normalize, impute, derive features, encode and scale
//! - [`sink`]: write-once CSV and Postgres table outputs
//! - [`download`]: dataset registry and HTTP download
//! - [`train`]: decision-tree cancellation classifier
//! - [`artifacts`]: versioned model store and model sources
//! - [`config`], [`logging`], [`error`]: ambient plumbing

#![warn(clippy::all, rust_2018_idioms)]

pub mod artifacts;
pub mod config;
pub mod download;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod schema;
pub mod sink;
pub mod train;
