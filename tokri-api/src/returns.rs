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
use tokri_return::models::{NewReturn, RefundType, ReturnItemDraft, ReturnRequest};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FileReturnRequest {
    pub order_id: Uuid,
    pub items: Vec<ReturnItemDraft>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub refund_type: RefundType,
}

#[derive(Debug, Deserialize)]
pub struct ListReturnsQuery {
    pub order_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub removed: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/returns
/// File a return against a delivered order, within the return window.
pub async fn file_return(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<FileReturnRequest>,
) -> Result<Json<ReturnRequest>, AppError> {
    let request = state
        .returns
        .file(NewReturn {
            order_id: req.order_id,
            customer_id: caller.actor.clone(),
            items: req.items,
        })
        .await?;
    Ok(Json(request))
}

/// GET /v1/returns/{id}
pub async fn get_return(
    State(state): State<AppState>,
    Path(return_id): Path<Uuid>,
) -> Result<Json<ReturnRequest>, AppError> {
    Ok(Json(state.returns.get(return_id).await?))
}

/// GET /v1/returns
/// Customers see their own requests; admins may filter by order.
pub async fn list_returns(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListReturnsQuery>,
) -> Result<Json<Vec<ReturnRequest>>, AppError> {
    match (caller.role, query.order_id) {
        (Role::Admin, Some(order_id)) => Ok(Json(state.returns.list_for_order(order_id).await?)),
        (Role::Customer, Some(_)) => {
            Err(AppError::Forbidden("order_id filter requires admin role"))
        }
        (_, None) => Ok(Json(
            state
                .returns
                .list_for_customer(&caller.actor, caller.party())
                .await?,
        )),
    }
}

/// POST /v1/returns/{id}/approve
pub async fn approve_return(
    State(state): State<AppState>,
    caller: Caller,
    Path(return_id): Path<Uuid>,
) -> Result<Json<ReturnRequest>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.returns.approve(return_id, &caller.actor).await?))
}

/// POST /v1/returns/{id}/reject
pub async fn reject_return(
    State(state): State<AppState>,
    caller: Caller,
    Path(return_id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<ReturnRequest>, AppError> {
    caller.require_admin()?;
    Ok(Json(
        state
            .returns
            .reject(return_id, &req.reason, &caller.actor)
            .await?,
    ))
}

/// POST /v1/returns/{id}/pickup
/// Retry a failed courier pickup booking.
pub async fn schedule_pickup(
    State(state): State<AppState>,
    caller: Caller,
    Path(return_id): Path<Uuid>,
) -> Result<Json<ReturnRequest>, AppError> {
    caller.require_admin()?;
    Ok(Json(
        state.returns.schedule_pickup(return_id, &caller.actor).await?,
    ))
}

/// POST /v1/returns/{id}/in-transit
pub async fn mark_in_transit(
    State(state): State<AppState>,
    caller: Caller,
    Path(return_id): Path<Uuid>,
) -> Result<Json<ReturnRequest>, AppError> {
    caller.require_admin()?;
    Ok(Json(
        state.returns.mark_in_transit(return_id, &caller.actor).await?,
    ))
}

/// POST /v1/returns/{id}/receive
/// Goods are back; restores stock for the returned lines.
pub async fn receive_return(
    State(state): State<AppState>,
    caller: Caller,
    Path(return_id): Path<Uuid>,
) -> Result<Json<ReturnRequest>, AppError> {
    caller.require_admin()?;
    Ok(Json(
        state.returns.mark_received(return_id, &caller.actor).await?,
    ))
}

/// POST /v1/returns/{id}/complete
/// Close the return with a refund or a freshly minted coupon.
pub async fn complete_return(
    State(state): State<AppState>,
    caller: Caller,
    Path(return_id): Path<Uuid>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<ReturnRequest>, AppError> {
    caller.require_admin()?;
    Ok(Json(
        state
            .returns
            .complete(return_id, req.refund_type, &caller.actor)
            .await?,
    ))
}

/// DELETE /v1/returns/{id}
pub async fn soft_delete_return(
    State(state): State<AppState>,
    caller: Caller,
    Path(return_id): Path<Uuid>,
) -> Result<Json<ReturnRequest>, AppError> {
    let request = state
        .returns
        .soft_delete(return_id, caller.party(), &caller.actor)
        .await?;
    Ok(Json(request))
}

/// DELETE /v1/returns/{id}/purge
pub async fn purge_return(
    State(state): State<AppState>,
    caller: Caller,
    Path(return_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    caller.require_admin()?;
    state.returns.purge(return_id, &caller.actor).await?;
    Ok(Json(serde_json::json!({ "purged": true })))
}

/// POST /v1/returns/purge-hidden
pub async fn purge_hidden_returns(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<PurgeResponse>, AppError> {
    caller.require_admin()?;
    let removed = state.returns.purge_hidden(&caller.actor).await?;
    Ok(Json(PurgeResponse { removed }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/returns", post(file_return).get(list_returns))
        .route("/v1/returns/purge-hidden", post(purge_hidden_returns))
        .route(
            "/v1/returns/{id}",
            get(get_return).delete(soft_delete_return),
        )
        .route("/v1/returns/{id}/approve", post(approve_return))
        .route("/v1/returns/{id}/reject", post(reject_return))
        .route("/v1/returns/{id}/pickup", post(schedule_pickup))
        .route("/v1/returns/{id}/in-transit", post(mark_in_transit))
        .route("/v1/returns/{id}/receive", post(receive_return))
        .route("/v1/returns/{id}/complete", post(complete_return))
        .route("/v1/returns/{id}/purge", delete(purge_return))
}
