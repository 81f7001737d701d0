use alloy::{
    providers::{ProviderBuilder, RootProvider},
    transports::http::reqwest::Url,
};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Endpoints of the ledger the worker talks to.
///
/// Writes go to a dedicated transaction endpoint, reads to one of several
/// load-balanced read endpoints.
pub trait Chain: Send + Sync {
    fn chain_id(&self) -> Option<u64>;
    fn read_url(&self) -> Url;
    fn write_url(&self) -> Url;

    fn read_provider(&self) -> &RootProvider;
    fn write_provider(&self) -> &RootProvider;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChainConfig {
    /// Chain id used for EIP-155 replay protection. Unset signs pre-EIP-155 transactions.
    #[serde(default)]
    pub chain_id: Option<u64>,
    pub write_rpc_url: String,
    pub read_rpc_urls: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct SpotterChain {
    chain_id: Option<u64>,
    read_url: Url,
    write_url: Url,

    pub read_provider: RootProvider,
    pub write_provider: RootProvider,
}

impl Chain for SpotterChain {
    fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    fn read_url(&self) -> Url {
        self.read_url.clone()
    }

    fn write_url(&self) -> Url {
        self.write_url.clone()
    }

    fn read_provider(&self) -> &RootProvider {
        &self.read_provider
    }

    fn write_provider(&self) -> &RootProvider {
        &self.write_provider
    }
}

impl ChainConfig {
    /// Connects to the write endpoint and to one read endpoint picked at random
    pub fn to_chain(&self) -> Result<SpotterChain, ProtocolError> {
        let write_url = Url::parse(&self.write_rpc_url).map_err(|e| ProtocolError::Config {
            message: format!("Failed to parse write RPC URL: {e}"),
        })?;

        let read_rpc_url = self
            .read_rpc_urls
            .choose(&mut rand::rng())
            .ok_or_else(|| ProtocolError::Config {
                message: "At least one read RPC URL is required".to_string(),
            })?;

        let read_url = Url::parse(read_rpc_url).map_err(|e| ProtocolError::Config {
            message: format!("Failed to parse read RPC URL: {e}"),
        })?;

        tracing::debug!(
            chain_id = ?self.chain_id,
            read_url = %read_url,
            write_url = %write_url,
            "Selected ledger endpoints"
        );

        Ok(SpotterChain {
            chain_id: self.chain_id,
            read_provider: ProviderBuilder::new()
                .disable_recommended_fillers()
                .connect_http(read_url.clone()),
            write_provider: ProviderBuilder::new()
                .disable_recommended_fillers()
                .connect_http(write_url.clone()),
            read_url,
            write_url,
        })
    }
}
