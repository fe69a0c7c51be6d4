use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::{parse_abi, InterfaceEntry};
use crate::config::Config;
use crate::error::ExplorerError;

/// Outcome of a lookup the explorer actually answered.
#[derive(Debug, Clone, PartialEq)]
pub enum ExplorerAbi {
    Verified(Vec<InterfaceEntry>),
    NotVerified,
}

/// The external verification service.
#[async_trait]
pub trait ExplorerClient: Send + Sync + std::fmt::Debug {
    fn has_endpoint(&self, network: &str) -> bool;

    async fn fetch_abi(&self, network: &str, address: &str) -> Result<ExplorerAbi, ExplorerError>;
}

#[derive(Debug, Clone)]
pub struct ExplorerEndpoint {
    pub api_url: String,
    pub api_key: Option<String>,
}

/// `{"status": "1", "message": "OK", "result": "<abi json>"}`
#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Value,
}

/// Client for Etherscan-family `module=contract&action=getabi` endpoints.
/// One GET per lookup, never retried.
#[derive(Debug)]
pub struct EtherscanClient {
    client: Client,
    endpoints: HashMap<String, ExplorerEndpoint>,
}

impl EtherscanClient {
    pub fn new(endpoints: HashMap<String, ExplorerEndpoint>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self { client, endpoints })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let endpoints = config
            .networks
            .iter()
            .filter_map(|(name, network)| {
                let api_url = network.explorer_api_url.clone()?;
                Some((
                    name.clone(),
                    ExplorerEndpoint {
                        api_url,
                        api_key: network.api_key.clone().filter(|k| !k.is_empty()),
                    },
                ))
            })
            .collect();

        Self::new(
            endpoints,
            Duration::from_secs(config.collector.request_timeout_secs),
        )
    }
}

#[async_trait]
impl ExplorerClient for EtherscanClient {
    fn has_endpoint(&self, network: &str) -> bool {
        self.endpoints.contains_key(network)
    }

    async fn fetch_abi(&self, network: &str, address: &str) -> Result<ExplorerAbi, ExplorerError> {
        let endpoint = self
            .endpoints
            .get(network)
            .ok_or_else(|| ExplorerError::NoEndpoint(network.to_string()))?;

        let mut query = vec![
            ("module", "contract"),
            ("action", "getabi"),
            ("address", address),
        ];
        if let Some(api_key) = &endpoint.api_key {
            query.push(("apikey", api_key.as_str()));
        }

        debug!(network, address, "Fetching ABI from {}", endpoint.api_url);

        let response: ExplorerResponse = self
            .client
            .get(&endpoint.api_url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        interpret_response(response)
    }
}

fn interpret_response(response: ExplorerResponse) -> Result<ExplorerAbi, ExplorerError> {
    let result = response.result.as_str().unwrap_or_default();

    if response.status == "1" && !result.is_empty() {
        return Ok(ExplorerAbi::Verified(parse_abi(result)?));
    }

    if result.to_lowercase().contains("not verified") {
        return Ok(ExplorerAbi::NotVerified);
    }

    let message = if result.is_empty() {
        response.message.unwrap_or_else(|| "Unknown error".to_string())
    } else {
        result.to_string()
    };
    Err(ExplorerError::Api(message))
}
