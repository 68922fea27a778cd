use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::order::OrderStatus;

pub const ORDER_ALREADY_TAKEN: &str = "ORDER_ALREADY_BEEN_TAKEN";
pub const ORDER_ALREADY_UNASSIGNED: &str = "ORDER_ALREADY_UNASSIGNED";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Failures reported by an [`OrderStore`](crate::store::OrderStore).
///
/// `NotFound`, `AlreadyTaken` and `AlreadyUnassigned` are outcomes of the
/// transition protocol; everything else is a storage fault.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order {0} not found")]
    NotFound(i64),

    #[error("order {0} is already taken")]
    AlreadyTaken(i64),

    #[error("order {0} is already unassigned")]
    AlreadyUnassigned(i64),

    #[error("order {0} changed status during transition")]
    Conflict(i64),

    #[error("transition deadline of {0}ms elapsed")]
    Timeout(u64),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// The conflict reported when `target` is already the current status.
    pub fn already(id: i64, target: OrderStatus) -> Self {
        match target {
            OrderStatus::Taken => StoreError::AlreadyTaken(id),
            OrderStatus::Unassigned => StoreError::AlreadyUnassigned(id),
        }
    }

    pub fn is_persistence_fault(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict(_)
                | StoreError::Timeout(_)
                | StoreError::Corrupt(_)
                | StoreError::Database(_)
        )
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppError::NotFound(format!("No order present with id {id}")),
            StoreError::AlreadyTaken(_) => AppError::Conflict(ORDER_ALREADY_TAKEN.to_string()),
            StoreError::AlreadyUnassigned(_) => {
                AppError::Conflict(ORDER_ALREADY_UNASSIGNED.to_string())
            }
            StoreError::Timeout(_) | StoreError::Conflict(_) => {
                AppError::Unavailable(format!("{err}, retry the request"))
            }
            StoreError::Corrupt(_) | StoreError::Database(_) => AppError::Internal(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum DistanceError {
    #[error("distance request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("distance provider returned {0}")]
    Status(String),

    #[error("no route found between {origin} and {destination}")]
    NoRoute { origin: String, destination: String },

    #[error("distance of {0}m does not fit in storage")]
    Overflow(u64),
}

impl From<DistanceError> for AppError {
    fn from(err: DistanceError) -> Self {
        AppError::Upstream(err.to_string())
    }
}
