//! Model artifact storage.
//!
//! Artifacts live at `<root>/<name>/<name>_<version>.json`. Fetching an
//! artifact from somewhere else goes through the [`ModelSource`] capability,
//! with a local-directory and an HTTP backend.

use crate::download::write_with_parents;
use crate::error::{PipelineError, Result};
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Versioned on-disk model store
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(name).join(format!("{name}_{version}.json"))
    }

    /// Serialize `model` under `{name, version}`, replacing any previous artifact.
    pub fn save<T: Serialize>(&self, name: &str, version: &str, model: &T) -> Result<PathBuf> {
        let path = self.artifact_path(name, version);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_vec(model)?)?;
        tracing::info!(path = %path.display(), "Model saved");
        Ok(path)
    }

    /// # Errors
    ///
    /// [`PipelineError::ModelNotFound`] if no artifact exists for `{name, version}`
    pub fn load<T: DeserializeOwned>(&self, name: &str, version: &str) -> Result<T> {
        let path = self.artifact_path(name, version);
        if !path.is_file() {
            return Err(PipelineError::ModelNotFound { path });
        }
        let bytes = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Something that can place a model artifact at a local path
#[expect(async_fn_in_trait)]
pub trait ModelSource {
    /// Fetch the artifact identified by `key` to `local_path`.
    async fn download_model(&self, key: &str, local_path: &Path) -> Result<PathBuf>;
}

/// Artifacts in a directory tree, e.g. a mounted share
#[derive(Debug, Clone)]
pub struct LocalModelSource {
    root: PathBuf,
}

impl LocalModelSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ModelSource for LocalModelSource {
    async fn download_model(&self, key: &str, local_path: &Path) -> Result<PathBuf> {
        let source = self.root.join(key);
        if !tokio::fs::try_exists(&source).await? {
            return Err(PipelineError::ModelNotFound { path: source });
        }

        let bytes = tokio::fs::read(&source).await?;
        write_with_parents(local_path, &bytes).await?;
        tracing::info!(from = %source.display(), to = %local_path.display(), "Model copied");
        Ok(local_path.to_path_buf())
    }
}

/// Artifacts served over HTTP under a base URL
#[derive(Debug, Clone)]
pub struct HttpModelSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpModelSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }
}

impl ModelSource for HttpModelSource {
    async fn download_model(&self, key: &str, local_path: &Path) -> Result<PathBuf> {
        let url = self.url_for(key);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                return Err(PipelineError::ModelNotFound {
                    path: PathBuf::from(key),
                });
            }
            status => {
                return Err(PipelineError::DownloadFailed {
                    url,
                    status: status.as_u16(),
                });
            }
        }

        let bytes = response.bytes().await?;
        write_with_parents(local_path, &bytes).await?;
        tracing::info!(%url, to = %local_path.display(), "Model downloaded");
        Ok(local_path.to_path_buf())
    }
}
