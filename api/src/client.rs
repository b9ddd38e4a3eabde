//! Client mirror of the read-only HTTP surface.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use thiserror::Error;

use explorer::ChainFacts;
use lib_custody::{CoinOutputInfo, CoinOutputInfoPreComputation};
use lib_types::{BlockHeight, CoinOutputId, Currency, Timestamp};

use crate::handlers::CoinOutputInfoGet;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("daemon rejected the request ({status}): {message}")]
    Api { status: StatusCode, message: String },
}

/// Fetches custody-fee information from a daemon, rooted either at the
/// consensus or the explorer endpoints.
pub struct PluginClient {
    client: Client,
    base_url: String,
    root_endpoint: &'static str,
}

impl PluginClient {
    /// A client against the consensus endpoints of `base_url`.
    pub fn new_consensus_client(base_url: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into(), root_endpoint: "/consensus" }
    }

    /// A client against the explorer endpoints of `base_url`.
    pub fn new_explorer_client(base_url: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into(), root_endpoint: "/explorer" }
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.client.get(format!("{}{}", self.base_url, path)).send()?;
        let status = response.status();
        if !status.is_success() {
            #[derive(serde::Deserialize)]
            struct ApiMessage {
                message: String,
            }
            let message = response
                .json::<ApiMessage>()
                .map(|m| m.message)
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ClientError::Api { status, message });
        }
        Ok(response.json()?)
    }

    fn coin_output_path(&self, id: &CoinOutputId, query: &str) -> String {
        format!("{}/custodyfees/coinoutput/{id}?{query}", self.root_endpoint)
    }

    fn into_info(result: CoinOutputInfoGet) -> CoinOutputInfo {
        CoinOutputInfo {
            creation_time: result.creation_time,
            creation_value: result.creation_value,
            is_custody_fee: result.is_custody_fee,
            spent: result.spent,
            fee_computation_time: result.fee_computation_time,
            custody_fee: result.custody_fee.unwrap_or_else(Currency::zero),
            spendable_value: result.spendable_value.unwrap_or_else(Currency::zero),
        }
    }

    /// Coin-output info computed at the daemon's tip.
    pub fn coin_output_info(&self, id: &CoinOutputId) -> Result<CoinOutputInfo, ClientError> {
        self.get_json(&self.coin_output_path(id, "compute=true"))
            .map(Self::into_info)
    }

    /// Coin-output info computed at an explicit chain time.
    pub fn coin_output_info_on(
        &self,
        id: &CoinOutputId,
        chain_time: Timestamp,
    ) -> Result<CoinOutputInfo, ClientError> {
        self.get_json(&self.coin_output_path(id, &format!("compute=true&time={chain_time}")))
            .map(Self::into_info)
    }

    /// Coin-output info computed at the timestamp of the block at `height`.
    pub fn coin_output_info_at(
        &self,
        id: &CoinOutputId,
        height: BlockHeight,
    ) -> Result<CoinOutputInfo, ClientError> {
        self.get_json(&self.coin_output_path(id, &format!("compute=true&height={height}")))
            .map(Self::into_info)
    }

    /// The stored record only, no fee computed.
    pub fn coin_output_info_pre_computation(
        &self,
        id: &CoinOutputId,
    ) -> Result<CoinOutputInfoPreComputation, ClientError> {
        let result: CoinOutputInfoGet =
            self.get_json(&self.coin_output_path(id, "compute=false"))?;
        Ok(CoinOutputInfoPreComputation {
            creation_time: result.creation_time,
            creation_value: result.creation_value,
            is_custody_fee: result.is_custody_fee,
            spent: result.spent,
            fee_computation_time: result.fee_computation_time,
        })
    }

    /// The latest chain-wide custody-fee facts. Served by explorer nodes
    /// only.
    pub fn chain_facts(&self) -> Result<ChainFacts, ClientError> {
        self.get_json("/explorer/custodyfees/metrics/chain")
    }
}
