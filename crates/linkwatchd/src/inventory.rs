//! File-backed endpoint registry for standalone use.
//!
//! The inventory file is re-read on every listing, so edits are picked up
//! by the next monitoring start or dashboard refresh. Format follows the
//! extension: `.toml` holds `[[endpoints]]` tables, anything else is JSON
//! (a bare array or `{"endpoints": [...]}`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use linkwatch_state::{EndpointFilter, EndpointRegistry, NetworkEndpoint, RegistryError};

#[derive(Deserialize)]
struct InventoryFile {
    #[serde(default)]
    endpoints: Vec<NetworkEndpoint>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonInventory {
    List(Vec<NetworkEndpoint>),
    Table(InventoryFile),
}

pub struct FileInventory {
    path: PathBuf,
}

impl FileInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, content: &str) -> Result<Vec<NetworkEndpoint>, RegistryError> {
        let is_toml = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            let file: InventoryFile =
                toml::from_str(content).map_err(|e| RegistryError::Malformed(e.to_string()))?;
            return Ok(file.endpoints);
        }
        match serde_json::from_str(content).map_err(|e| RegistryError::Malformed(e.to_string()))? {
            JsonInventory::List(endpoints) => Ok(endpoints),
            JsonInventory::Table(file) => Ok(file.endpoints),
        }
    }
}

#[async_trait]
impl EndpointRegistry for FileInventory {
    async fn list_endpoints(
        &self,
        filter: &EndpointFilter,
    ) -> Result<Vec<NetworkEndpoint>, RegistryError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let endpoints = self.parse(&content)?;
        debug!(path = ?self.path, endpoints = endpoints.len(), "inventory loaded");
        Ok(endpoints.into_iter().filter(|e| filter.matches(e)).collect())
    }
}
