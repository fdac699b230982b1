//! Endpoint registry contract.
//!
//! The inventory of branches and ATMs lives outside linkwatch. Components
//! only see it through `EndpointRegistry`; the daemon supplies an HTTP and
//! a file-backed implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::types::{EndpointType, NetworkEndpoint};

/// Upstream selection applied when listing endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointFilter {
    #[serde(default)]
    pub endpoint_type: Option<EndpointType>,
    /// Case-insensitive substring over code, name and location.
    #[serde(default)]
    pub search: Option<String>,
}

impl EndpointFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of_type(endpoint_type: EndpointType) -> Self {
        Self {
            endpoint_type: Some(endpoint_type),
            search: None,
        }
    }

    pub fn matches(&self, endpoint: &NetworkEndpoint) -> bool {
        if self
            .endpoint_type
            .is_some_and(|kind| endpoint.endpoint_type != kind)
        {
            return false;
        }

        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                let hit = |field: &str| field.to_lowercase().contains(&needle);
                hit(&endpoint.code)
                    || hit(&endpoint.name)
                    || endpoint.location.as_deref().is_some_and(hit)
            }
        }
    }
}

/// Source of the endpoint list for a monitoring session.
#[async_trait]
pub trait EndpointRegistry: Send + Sync {
    async fn list_endpoints(
        &self,
        filter: &EndpointFilter,
    ) -> Result<Vec<NetworkEndpoint>, RegistryError>;
}

/// Registry over a fixed list, used by tests and the file inventory.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    endpoints: RwLock<Vec<NetworkEndpoint>>,
}

impl InMemoryRegistry {
    pub fn new(endpoints: Vec<NetworkEndpoint>) -> Self {
        Self {
            endpoints: RwLock::new(endpoints),
        }
    }

    /// Swap the whole inventory.
    pub fn replace(&self, endpoints: Vec<NetworkEndpoint>) {
        *self.endpoints.write() = endpoints;
    }

    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }
}

#[async_trait]
impl EndpointRegistry for InMemoryRegistry {
    async fn list_endpoints(
        &self,
        filter: &EndpointFilter,
    ) -> Result<Vec<NetworkEndpoint>, RegistryError> {
        Ok(self
            .endpoints
            .read()
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> Vec<NetworkEndpoint> {
        let mut branch = NetworkEndpoint::branch("br-1", "001", "10.0.0.1");
        branch.name = "Jakarta Sudirman".to_string();
        branch.location = Some("Jl. Sudirman 12".to_string());
        let mut atm = NetworkEndpoint::atm("atm-1", "0126", "10.0.1.1");
        atm.name = "ATM Plaza Senayan".to_string();
        vec![branch, atm]
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = EndpointFilter::all();
        assert!(inventory().iter().all(|e| filter.matches(e)));
    }

    #[test]
    fn type_filter() {
        let filter = EndpointFilter::of_type(EndpointType::Atm);
        let hits: Vec<_> = inventory().into_iter().filter(|e| filter.matches(e)).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "atm-1");
    }

    #[test]
    fn search_is_case_insensitive_over_code_name_and_location() {
        let endpoints = inventory();
        let search = |needle: &str| EndpointFilter {
            endpoint_type: None,
            search: Some(needle.to_string()),
        };

        assert!(search("SUDIRMAN").matches(&endpoints[0]));
        assert!(search("jl.").matches(&endpoints[0]));
        assert!(search("0126").matches(&endpoints[1]));
        assert!(!search("0126").matches(&endpoints[0]));
        assert!(search("   ").matches(&endpoints[1]));
    }

    #[tokio::test]
    async fn in_memory_registry_applies_filter() {
        let registry = InMemoryRegistry::new(inventory());
        let atms = registry
            .list_endpoints(&EndpointFilter::of_type(EndpointType::Atm))
            .await
            .unwrap();
        assert_eq!(atms.len(), 1);

        registry.replace(Vec::new());
        assert!(registry.is_empty());
        let all = registry.list_endpoints(&EndpointFilter::all()).await.unwrap();
        assert!(all.is_empty());
    }
}
