//! Handler bodies shared by the consensus- and explorer-rooted routes.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use lib_types::{CoinOutputId, Currency, Timestamp};

use crate::error::ApiError;
use crate::routes::{ApiState, ExplorerApiState};

/// Everything the custody-fees API reports about a known coin output. The
/// fee fields are present only when the caller asked for a computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinOutputInfoGet {
    #[serde(rename = "creationtime")]
    pub creation_time: Timestamp,
    #[serde(rename = "creationvalue")]
    pub creation_value: Currency,
    #[serde(rename = "iscustodyfee")]
    pub is_custody_fee: bool,
    pub spent: bool,
    #[serde(rename = "feecomputationtime")]
    pub fee_computation_time: Timestamp,
    #[serde(rename = "custodyfee", default, skip_serializing_if = "Option::is_none")]
    pub custody_fee: Option<Currency>,
    #[serde(rename = "spendablevalue", default, skip_serializing_if = "Option::is_none")]
    pub spendable_value: Option<Currency>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CoinOutputQuery {
    compute: Option<String>,
    time: Option<Timestamp>,
    height: Option<u64>,
}

impl CoinOutputQuery {
    fn compute(&self) -> bool {
        match self.compute.as_deref() {
            Some("0") => false,
            Some(flag) => !flag.eq_ignore_ascii_case("false"),
            None => true,
        }
    }
}

fn parse_id(raw: &str) -> Result<CoinOutputId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("failed to parse id param: {e}")))
}

pub(crate) fn coin_output_info_response(
    state: &ApiState,
    raw_id: &str,
    query: &CoinOutputQuery,
) -> Result<CoinOutputInfoGet, ApiError> {
    let id = parse_id(raw_id)?;

    if !query.compute() {
        let info = state.plugin.get_coin_output_info_pre_computation(&id)?;
        return Ok(CoinOutputInfoGet {
            creation_time: info.creation_time,
            creation_value: info.creation_value,
            is_custody_fee: info.is_custody_fee,
            spent: info.spent,
            fee_computation_time: info.fee_computation_time,
            custody_fee: None,
            spendable_value: None,
        });
    }

    // pick a chain time: explicit time wins, then a block height, then the
    // tip
    let chain_time = match (query.time, query.height) {
        (Some(time), _) => time,
        (None, Some(height)) => state.chain.block_time_at(height).ok_or_else(|| {
            ApiError::Internal(format!("failed to find block at height {height}"))
        })?,
        (None, None) => state
            .chain
            .tip_time()
            .ok_or_else(|| ApiError::Internal("failed to find the chain tip".into()))?,
    };

    let info = state.plugin.get_coin_output_info(&id, chain_time)?;
    Ok(CoinOutputInfoGet {
        creation_time: info.creation_time,
        creation_value: info.creation_value,
        is_custody_fee: info.is_custody_fee,
        spent: info.spent,
        fee_computation_time: info.fee_computation_time,
        custody_fee: Some(info.custody_fee),
        spendable_value: Some(info.spendable_value),
    })
}

/// `GET /consensus/custodyfees/coinoutput/:id`
pub(crate) async fn consensus_coin_output_info(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<CoinOutputQuery>,
) -> Result<Json<CoinOutputInfoGet>, ApiError> {
    coin_output_info_response(&state, &id, &query).map(Json)
}

/// `GET /explorer/custodyfees/coinoutput/:id`
pub(crate) async fn explorer_coin_output_info(
    State(state): State<ExplorerApiState>,
    Path(id): Path<String>,
    Query(query): Query<CoinOutputQuery>,
) -> Result<Json<CoinOutputInfoGet>, ApiError> {
    coin_output_info_response(&state.api, &id, &query).map(Json)
}

/// `GET /explorer/custodyfees/metrics/chain`
pub(crate) async fn explorer_chain_facts(
    State(state): State<ExplorerApiState>,
) -> Result<Json<explorer::ChainFacts>, ApiError> {
    state
        .explorer
        .latest_chain_facts()
        .map(Json)
        .map_err(|e| ApiError::Internal(e.to_string()))
}
