//! Application configuration.
//!
//! Resolution order: an explicit `--config` path, then `hotelprep.json` in
//! the working directory, then built-in defaults. Every field is optional in
//! the file.

use crate::download::DatasetRegistry;
use crate::error::{PipelineError, Result};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "hotelprep.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Raw bookings file read by `process`
    pub raw_path: PathBuf,

    /// Output CSV path; `{version}` and `{date}` are expanded
    pub output_template: String,

    /// Pipeline spec file; the built-in hotel-bookings spec when unset
    pub pipeline_path: Option<PathBuf>,

    /// Overrides the schema path named in the pipeline spec
    pub schema_path: Option<PathBuf>,

    /// Dataset version, used in output and table names
    pub data_version: u32,

    /// Table sink settings; file-only output when unset
    pub database: Option<DbSettings>,

    pub datasets: DatasetRegistry,

    /// Root directory of the model artifact store
    pub model_root: PathBuf,

    /// Log directory; the platform data directory when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from("data/raw/hotel_bookings.csv"),
            output_template: "data/processed/clean_hotel_bookings_v{version}.csv".to_owned(),
            pipeline_path: None,
            schema_path: None,
            data_version: 1,
            database: None,
            datasets: DatasetRegistry::with_defaults(),
            model_root: PathBuf::from("model_output"),
            log_dir: None,
        }
    }
}

/// Postgres connection and table naming
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Never written back in clear; saved configs hold an empty string
    #[serde(serialize_with = "serialize_password")]
    pub password: SecretString,
    pub database: String,
    pub schema: String,
    /// Table base name; the table is `<table_base>_v<version>`
    pub table_base: String,
}

fn serialize_password<S>(_password: &SecretString, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str("")
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 5432,
            user: "postgres".to_owned(),
            password: SecretString::new(String::new().into()),
            database: "postgres".to_owned(),
            schema: "public".to_owned(),
            table_base: "hotel_bookings".to_owned(),
        }
    }
}

impl DbSettings {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(self.password.expose_secret())
            .database(&self.database)
    }
}

/// Load the app config.
///
/// # Errors
///
/// - [`PipelineError::Config`] if an explicit path does not exist
/// - [`PipelineError::Json`] if the file is not valid config JSON
pub fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = match path {
        Some(p) if !p.is_file() => {
            return Err(PipelineError::config(format!(
                "config file not found: {}",
                p.display()
            )));
        }
        Some(p) => p.to_path_buf(),
        None => {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if !local.is_file() {
                return Ok(AppConfig::default());
            }
            local
        }
    };

    let content = std::fs::read_to_string(&path)?;
    let config = serde_json::from_str(&content)?;
    tracing::debug!(path = %path.display(), "Loaded config");
    Ok(config)
}

pub fn save_app_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(config)?)?;
    Ok(())
}
