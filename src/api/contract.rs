use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::{
    api::ApiError,
    blockchain::{models::OwnershipInfo, services::contract::check_contract_owner},
    AppState,
};

// The handler function for the GET /owner/{address} endpoint.
pub async fn contract_owner_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<OwnershipInfo>, ApiError> {
    info!("Received owner request for contract {}", address);
    Ok(Json(check_contract_owner(&state.rpc_client, &address).await?))
}
