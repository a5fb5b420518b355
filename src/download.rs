//! Raw dataset download.
//!
//! Datasets are looked up by key in an explicit [`DatasetRegistry`] value,
//! normally the `datasets` table of the app config.

use crate::error::{PipelineError, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Remote location and local destination of one dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSource {
    pub url: String,
    pub destination: PathBuf,
}

/// Dataset key → source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetRegistry {
    datasets: BTreeMap<String, DatasetSource>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the public hotel-bookings dataset under `hotel_bookings`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert(
            "hotel_bookings",
            DatasetSource {
                url: "https://raw.githubusercontent.com/rfordatascience/tidytuesday/master/data/2020/2020-02-11/hotels.csv".to_owned(),
                destination: PathBuf::from("data/raw/hotel_bookings.csv"),
            },
        );
        registry
    }

    pub fn insert(&mut self, key: impl Into<String>, source: DatasetSource) {
        self.datasets.insert(key.into(), source);
    }

    /// # Errors
    ///
    /// [`PipelineError::UnknownDataset`] if `key` is not registered
    pub fn resolve(&self, key: &str) -> Result<&DatasetSource> {
        self.datasets
            .get(key)
            .ok_or_else(|| PipelineError::UnknownDataset(key.to_owned()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }
}

/// Fetch the dataset registered under `key` and save it to its destination.
///
/// Parent directories are created as needed. Returns the written path.
///
/// # Errors
///
/// - [`PipelineError::UnknownDataset`] before any request is made
/// - [`PipelineError::DownloadFailed`] if the server answers with anything but 200
/// - [`PipelineError::Http`] / [`PipelineError::Io`] for transport and disk failures
pub async fn download_dataset(
    client: &reqwest::Client,
    registry: &DatasetRegistry,
    key: &str,
) -> Result<PathBuf> {
    let source = registry.resolve(key)?;
    tracing::info!(dataset = key, url = %source.url, "Downloading dataset");

    let response = client.get(&source.url).send().await?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(PipelineError::DownloadFailed {
            url: source.url.clone(),
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().await?;
    write_with_parents(&source.destination, &bytes).await?;

    tracing::info!(
        dataset = key,
        path = %source.destination.display(),
        bytes = bytes.len(),
        "Dataset saved"
    );
    Ok(source.destination.clone())
}

pub(crate) async fn write_with_parents(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
