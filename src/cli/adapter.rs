//! Adapter catalog from the NoneBot registry.

use crate::error::{NbrError, Result};
use crate::pyproject::Adapter;
use crate::utils::terminal_utils;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

// {
// "module_name": "nonebot.adapters.onebot.v11",
// "project_link": "nonebot-adapter-onebot",
// "name": "OneBot V11",
// "desc": "OneBot V11 协议",
// "author": "yanyongyu",
// "homepage": "https://onebot.adapters.nonebot.dev/",
// "tags": [],
// "is_official": true,
// "time": "2024-10-24T07:34:56.115315Z",
// "version": "2.4.6"
// },
/// Adapter registry information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryAdapter {
    pub module_name: String,
    pub project_link: String,
    pub name: String,
    pub desc: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub is_official: bool,
    #[serde(default)]
    pub version: Option<String>,
}

impl RegistryAdapter {
    /// Label shown in the adapter multi-select
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.desc)
    }

    /// Whether `query` names this adapter by display name or module
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        self.name.eq_ignore_ascii_case(query)
            || self.module_name == query
            || self.project_link.eq_ignore_ascii_case(query)
    }

    pub fn to_config(&self) -> Adapter {
        Adapter {
            name: self.name.clone(),
            module_name: self.module_name.clone(),
        }
    }
}

/// Keep the first adapter per module name
pub fn dedup_by_module(adapters: Vec<RegistryAdapter>) -> Vec<RegistryAdapter> {
    let mut seen = HashSet::new();
    adapters
        .into_iter()
        .filter(|a| seen.insert(a.module_name.clone()))
        .collect()
}

/// Lazily fetched registry catalog, cached for the rest of the run
pub struct AdapterCatalog {
    client: Client,
    registry_url: String,
    adapters: OnceLock<Vec<RegistryAdapter>>,
}

impl AdapterCatalog {
    pub fn new(registry_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("nb-bootstrap")
            .build()?;

        Ok(Self {
            client,
            registry_url: registry_url.into(),
            adapters: OnceLock::new(),
        })
    }

    /// A catalog that never touches the network
    pub fn with_adapters(adapters: Vec<RegistryAdapter>) -> Self {
        let catalog = Self {
            client: Client::new(),
            registry_url: String::new(),
            adapters: OnceLock::new(),
        };
        let _ = catalog.adapters.set(dedup_by_module(adapters));
        catalog
    }

    pub async fn fetch(&self) -> Result<&[RegistryAdapter]> {
        if let Some(adapters) = self.adapters.get() {
            return Ok(adapters.as_slice());
        }

        let spinner = terminal_utils::create_spinner("加载适配器列表中……");
        let fetched = self.fetch_remote().await;
        spinner.finish_and_clear();
        let adapters = dedup_by_module(fetched?);
        debug!("Fetched {} adapters from registry", adapters.len());

        Ok(self.adapters.get_or_init(|| adapters).as_slice())
    }

    async fn fetch_remote(&self) -> Result<Vec<RegistryAdapter>> {
        let response = self.client.get(&self.registry_url).send().await?;

        if !response.status().is_success() {
            return Err(NbrError::not_found(format!(
                "Adapter registry returned HTTP {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// Resolve adapter names given on the command line; unknown names fail
    pub async fn resolve(&self, queries: &[String]) -> Result<Vec<RegistryAdapter>> {
        let adapters = self.fetch().await?;
        let resolved = queries
            .iter()
            .map(|q| {
                adapters
                    .iter()
                    .find(|a| a.matches(q))
                    .cloned()
                    .ok_or_else(|| NbrError::not_found(format!("Adapter '{}' not found", q)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(dedup_by_module(resolved))
    }
}
