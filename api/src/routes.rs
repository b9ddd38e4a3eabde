//! Route registration, split the way daemons compose their API: consensus
//! nodes mount the consensus routes, explorer nodes both.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use explorer::Explorer;
use lib_consensus::ChainView;
use lib_custody::CustodyFeesPlugin;

use crate::handlers;

#[derive(Clone)]
pub struct ApiState {
    pub chain: Arc<dyn ChainView>,
    pub plugin: Arc<CustodyFeesPlugin>,
}

#[derive(Clone)]
pub struct ExplorerApiState {
    pub api: ApiState,
    pub explorer: Arc<Explorer>,
}

/// The custody-fees routes exposed by every consensus node.
pub fn consensus_custodyfees_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/consensus/custodyfees/coinoutput/:id",
            get(handlers::consensus_coin_output_info),
        )
        .with_state(state)
}

/// The custody-fees routes exposed by explorer nodes.
pub fn explorer_custodyfees_router(state: ExplorerApiState) -> Router {
    Router::new()
        .route(
            "/explorer/custodyfees/coinoutput/:id",
            get(handlers::explorer_coin_output_info),
        )
        .route(
            "/explorer/custodyfees/metrics/chain",
            get(handlers::explorer_chain_facts),
        )
        .with_state(state)
}
