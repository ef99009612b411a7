use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::{
    api::ApiError,
    blockchain::{models::BalanceResponse, services::balance::get_balance},
    AppState,
};

// The handler function for the GET /balance/{address} endpoint.
pub async fn get_balance_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<BalanceResponse>, ApiError> {
    info!("Received balance request for {}", address);
    let balance = get_balance(&state.rpc_client, &address).await?;
    Ok(Json(balance))
}
