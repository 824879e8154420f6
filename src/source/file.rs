use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use super::{DocumentSource, decode_document};

/// Reads `<base_dir>/<stem>.json` from the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    base_dir: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, stem: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", stem))
    }
}

#[async_trait]
impl DocumentSource for FileSource {
    async fn fetch_rows(&self, stem: &str) -> Result<Vec<Value>> {
        let path = self.path_for(stem);
        debug!("Reading {}", path.display());
        let body = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        decode_document(&body, &path.display().to_string())
    }

    fn describe(&self) -> String {
        self.base_dir.display().to_string()
    }
}
