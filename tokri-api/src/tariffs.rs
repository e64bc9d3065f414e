use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::AppError;
use crate::state::AppState;
use tokri_courier::gateway::{Balance, Destination};
use tokri_courier::tariff::CourierTariff;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub origin: String,
    pub destination: String,
    pub cart_total: i64,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub charge: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpsertTariffRequest {
    pub id: Option<Uuid>,
    pub partner: String,
    pub origin_district: String,
    pub destination_district: String,
    pub service_type: String,
    pub category: String,
    pub price: i64,
    pub active: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/shipping/quote
/// Delivery charge for a destination, with the free-shipping override.
pub async fn quote(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<QuoteResponse>, AppError> {
    let charge = state
        .tariffs
        .resolve_charge(&query.origin, &query.destination, query.cart_total)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
    Ok(Json(QuoteResponse { charge }))
}

/// GET /v1/tariffs
pub async fn list_tariffs(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<CourierTariff>>, AppError> {
    caller.require_admin()?;
    let tariffs = state
        .tariff_repo
        .list()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
    Ok(Json(tariffs))
}

/// PUT /v1/tariffs
pub async fn upsert_tariff(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<UpsertTariffRequest>,
) -> Result<Json<CourierTariff>, AppError> {
    caller.require_admin()?;
    let tariff = CourierTariff {
        id: req.id.unwrap_or_else(Uuid::new_v4),
        partner: req.partner,
        origin_district: req.origin_district,
        destination_district: req.destination_district,
        service_type: req.service_type,
        category: req.category,
        price: req.price,
        active: req.active,
        created_at: Utc::now(),
    };
    state
        .tariff_repo
        .upsert(&tariff)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
    Ok(Json(tariff))
}

/// POST /v1/tariffs/{id}/deactivate
pub async fn deactivate_tariff(
    State(state): State<AppState>,
    caller: Caller,
    Path(tariff_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    caller.require_admin()?;
    let deactivated = state
        .tariff_repo
        .deactivate(tariff_id)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
    Ok(Json(serde_json::json!({ "deactivated": deactivated })))
}

/// GET /v1/courier/balance
pub async fn courier_balance(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Balance>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.courier.get_balance().await?))
}

/// GET /v1/courier/destinations
/// Serves the partner's list, or the cached copy when the partner is
/// unreachable.
pub async fn courier_destinations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Destination>>, AppError> {
    Ok(Json(state.courier.list_destinations().await?))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/shipping/quote", get(quote))
        .route("/v1/tariffs", get(list_tariffs).put(upsert_tariff))
        .route("/v1/tariffs/{id}/deactivate", post(deactivate_tariff))
        .route("/v1/courier/balance", get(courier_balance))
        .route("/v1/courier/destinations", get(courier_destinations))
}
