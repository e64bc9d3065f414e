use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{Caller, Role};
use crate::error::AppError;
use crate::state::AppState;
use tokri_order::models::{NewOrder, Order};
use tokri_order::reconcile::SweepReport;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    /// Charge the client last showed the customer; must match the
    /// order's stored shipping charge.
    pub expected_charge: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SweepQuery {
    pub batch: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub removed: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/orders
pub async fn create_order(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<NewOrder>,
) -> Result<Json<Order>, AppError> {
    let order = state.orders.create(req, &caller.actor).await?;
    Ok(Json(order))
}

/// GET /v1/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.get(order_id).await?))
}

/// GET /v1/orders
/// Customers see their own orders; admins may pass any customer_id.
pub async fn list_orders(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let customer_id = match caller.role {
        Role::Admin => query.customer_id.unwrap_or_default(),
        Role::Customer => caller.actor.clone(),
    };
    Ok(Json(
        state
            .orders
            .list_for_customer(&customer_id, caller.party())
            .await?,
    ))
}

/// POST /v1/orders/{id}/confirm
pub async fn confirm_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.orders.confirm(order_id, &caller.actor).await?))
}

/// POST /v1/orders/{id}/dispatch
/// Hand the parcel to the courier partner.
pub async fn dispatch_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(order_id): Path<Uuid>,
    Json(req): Json<DispatchRequest>,
) -> Result<Json<Order>, AppError> {
    caller.require_admin()?;
    let order = state
        .orders
        .dispatch(order_id, req.expected_charge, &caller.actor)
        .await?;
    Ok(Json(order))
}

/// POST /v1/orders/{id}/reconcile
/// Manual re-sync of one order against the courier.
pub async fn reconcile_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    caller.require_admin()?;
    state.orders.reconcile(order_id).await?;
    Ok(Json(state.orders.get(order_id).await?))
}

/// POST /v1/orders/sweep
/// Manual trigger of the cron sweep.
pub async fn sweep_orders(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<SweepQuery>,
) -> Result<Json<SweepReport>, AppError> {
    caller.require_admin()?;
    let batch = query.batch.unwrap_or(state.reconcile_batch);
    Ok(Json(state.orders.sweep(batch).await?))
}

/// POST /v1/orders/{id}/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(order_id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<CancelResponse>, AppError> {
    let reason = req.reason.as_deref().unwrap_or("cancelled by caller");
    let cancelled = state.orders.cancel(order_id, reason, &caller.actor).await?;
    Ok(Json(CancelResponse { cancelled }))
}

/// POST /v1/orders/{id}/ship
pub async fn ship_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.orders.mark_shipped(order_id, &caller.actor).await?))
}

/// POST /v1/orders/{id}/deliver
pub async fn deliver_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.orders.mark_delivered(order_id, &caller.actor).await?))
}

/// DELETE /v1/orders/{id}
/// Soft delete: hides the order from the calling party only.
pub async fn soft_delete_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .soft_delete(order_id, caller.party(), &caller.actor)
        .await?;
    Ok(Json(order))
}

/// DELETE /v1/orders/{id}/purge
/// Permanent removal; requires both parties to have deleted first.
pub async fn purge_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(order_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    caller.require_admin()?;
    state.orders.purge(order_id, &caller.actor).await?;
    Ok(Json(serde_json::json!({ "purged": true })))
}

/// POST /v1/orders/purge-hidden
pub async fn purge_hidden_orders(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<PurgeResponse>, AppError> {
    caller.require_admin()?;
    let removed = state.orders.purge_hidden(&caller.actor).await?;
    Ok(Json(PurgeResponse { removed }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_order).get(list_orders))
        .route("/v1/orders/sweep", post(sweep_orders))
        .route("/v1/orders/purge-hidden", post(purge_hidden_orders))
        .route(
            "/v1/orders/{id}",
            get(get_order).delete(soft_delete_order),
        )
        .route("/v1/orders/{id}/confirm", post(confirm_order))
        .route("/v1/orders/{id}/dispatch", post(dispatch_order))
        .route("/v1/orders/{id}/reconcile", post(reconcile_order))
        .route("/v1/orders/{id}/cancel", post(cancel_order))
        .route("/v1/orders/{id}/ship", post(ship_order))
        .route("/v1/orders/{id}/deliver", post(deliver_order))
        .route("/v1/orders/{id}/purge", delete(purge_order))
}
