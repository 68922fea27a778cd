use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::engine::placement::place_order;
use crate::engine::transition::transition_order;
use crate::error::AppError;
use crate::models::order::{Order, OrderStatus, OrderSummary};
use crate::store::Pagination;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/order", post(create_order))
        .route("/order/:id", get(get_order).put(update_order))
        .route("/orders", get(list_orders))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub origin: Vec<String>,
    pub destination: Vec<String>,
}

#[derive(Deserialize)]
pub struct UpdateOrderRequest {
    pub status: String,
}

#[derive(Serialize)]
pub struct UpdateOrderResponse {
    pub status: &'static str,
}

#[derive(Deserialize)]
pub struct ListOrdersQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn order_id(path: Result<Path<String>, PathRejection>) -> Result<i64, AppError> {
    let Path(raw) = path.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    raw.parse::<i64>()
        .map_err(|_| AppError::BadRequest("order ID must be a valid integer".to_string()))
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<OrderSummary>, AppError> {
    let payload = json_body(payload)?;
    let order = place_order(&state, &payload.origin, &payload.destination).await?;

    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Order>, AppError> {
    let id = order_id(path)?;
    let order = state.store.get_order(id).await?;

    Ok(Json(order))
}

async fn update_order(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpdateOrderRequest>, JsonRejection>,
) -> Result<Json<UpdateOrderResponse>, AppError> {
    let id = order_id(path)?;
    let payload = json_body(payload)?;
    let target: OrderStatus = payload.status.parse().map_err(AppError::BadRequest)?;

    transition_order(&state, id, target).await?;

    Ok(Json(UpdateOrderResponse { status: "SUCCESS" }))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<Json<Vec<OrderSummary>>, AppError> {
    let query = query_params(query)?;
    let page = Pagination::from_params(query.limit.as_deref(), query.page.as_deref())?;

    let orders = state.store.list_orders(page).await.map_err(|err| {
        error!(error = %err, limit = page.limit, page = page.page, "failed to list orders");
        AppError::from(err)
    })?;

    Ok(Json(orders))
}
