use axum::{extract::Path, Json};
use tracing::info;

use crate::blockchain::{models::AddressValidation, services::address::validate_address};

// The handler function for the GET /address/{address} endpoint.
// Always 200: an invalid address is a valid answer here.
pub async fn validate_address_handler(Path(address): Path<String>) -> Json<AddressValidation> {
    info!("Validating address {}", address);
    Json(validate_address(&address))
}
