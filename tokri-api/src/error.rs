use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use tokri_courier::gateway::CourierError;
use tokri_order::manager::OrderError;
use tokri_return::manager::ReturnError;

#[derive(Debug)]
pub enum AppError {
    Order(OrderError),
    Return(ReturnError),
    Courier(CourierError),
    Forbidden(&'static str),
    Internal(anyhow::Error),
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        AppError::Order(e)
    }
}

impl From<ReturnError> for AppError {
    fn from(e: ReturnError) -> Self {
        AppError::Return(e)
    }
}

impl From<CourierError> for AppError {
    fn from(e: CourierError) -> Self {
        AppError::Courier(e)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(e)
    }
}

fn courier_status(e: &CourierError) -> StatusCode {
    match e {
        CourierError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        CourierError::NoResponse => StatusCode::BAD_GATEWAY,
        CourierError::PartnerRejected { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Order(e) => {
                let status = match &e {
                    OrderError::NotFound(_) => StatusCode::NOT_FOUND,
                    OrderError::AlreadyDispatched(_) => StatusCode::CONFLICT,
                    OrderError::InvalidTransition { .. } => StatusCode::CONFLICT,
                    OrderError::PriceMismatch { .. } => StatusCode::CONFLICT,
                    OrderError::NotCashOnDelivery => StatusCode::BAD_REQUEST,
                    OrderError::NotDispatched(_) => StatusCode::BAD_REQUEST,
                    OrderError::NotEligibleForDeletion(_) => StatusCode::CONFLICT,
                    OrderError::Courier(ce) => courier_status(ce),
                    OrderError::Store(msg) => {
                        tracing::error!("order store error: {}", msg);
                        return internal();
                    }
                };
                (status, e.to_string())
            }
            AppError::Return(e) => {
                let status = match &e {
                    ReturnError::NotFound(_) | ReturnError::OrderNotFound(_) => {
                        StatusCode::NOT_FOUND
                    }
                    ReturnError::InvalidTransition { .. } => StatusCode::CONFLICT,
                    ReturnError::OutOfWindow => StatusCode::UNPROCESSABLE_ENTITY,
                    ReturnError::ItemNotInOrder(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    ReturnError::ReasonRequired => StatusCode::BAD_REQUEST,
                    ReturnError::InvalidRefundChoice => StatusCode::BAD_REQUEST,
                    ReturnError::NotEligibleForDeletion(_) => StatusCode::CONFLICT,
                    ReturnError::Courier(ce) => courier_status(ce),
                    ReturnError::Coupon(e) => {
                        tracing::error!("coupon error: {}", e);
                        return internal();
                    }
                    ReturnError::Store(msg) => {
                        tracing::error!("return store error: {}", msg);
                        return internal();
                    }
                };
                (status, e.to_string())
            }
            AppError::Courier(e) => (courier_status(&e), e.to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.to_string()),
            AppError::Internal(e) => {
                tracing::error!("Internal Server Error: {}", e);
                return internal();
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn internal() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal Server Error" })),
    )
        .into_response()
}
