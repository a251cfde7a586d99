//! On-disk cache of raw archive responses.
//!
//! Entries never expire; the directory has to be cleared explicitly.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;

use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File an entry for `url` lives in. `url` must include the query string.
    pub fn entry_path(&self, url: &str) -> PathBuf {
        let key = hex::encode(Sha256::digest(url.as_bytes()));
        self.dir.join(format!("{key}.json"))
    }

    pub async fn get(&self, url: &str) -> Result<Option<String>, FetchError> {
        let path = self.entry_path(url);
        match fs::read_to_string(&path).await {
            Ok(body) => {
                tracing::debug!("Cache hit for {} at {:?}", url, path);
                Ok(Some(body))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Cache miss for {}", url);
                Ok(None)
            }
            Err(e) => Err(FetchError::Cache(path, e)),
        }
    }

    /// Store `body` for `url`. Readers see either the old entry or the whole new one.
    pub async fn put(&self, url: &str, body: &str) -> Result<(), FetchError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| FetchError::Cache(self.dir.clone(), e))?;

        let path = self.entry_path(url);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).await.map_err(|e| FetchError::Cache(tmp.clone(), e))?;
        fs::rename(&tmp, &path).await.map_err(|e| FetchError::Cache(path, e))
    }

    /// Remove every cached response. A missing directory is not an error.
    pub async fn clear(&self) -> Result<(), FetchError> {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                tracing::info!("Cleared response cache at {:?}", self.dir);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FetchError::Cache(self.dir.clone(), e)),
        }
    }
}
