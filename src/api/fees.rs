use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::{
    api::ApiError,
    blockchain::{
        models::{CostEstimate, GasEstimate},
        services::{cost::calculate_transaction_cost, fees::estimate_gas_fee},
    },
    AppState,
};

/// Handler for the GET /gas endpoint.
pub async fn gas_fee_handler(State(state): State<AppState>) -> Result<Json<GasEstimate>, ApiError> {
    info!("Received request to estimate gas fees");
    Ok(Json(estimate_gas_fee(&state.rpc_client).await?))
}

/// Handler for the GET /cost/{transaction_type} endpoint.
/// Unknown transaction types are rejected with 400 before any RPC call.
pub async fn transaction_cost_handler(
    Path(transaction_type): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CostEstimate>, ApiError> {
    info!("Received request to estimate cost of '{}'", transaction_type);
    let estimate = calculate_transaction_cost(&state.rpc_client, &transaction_type).await?;
    Ok(Json(estimate))
}
