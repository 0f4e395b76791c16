use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{CreateOrderRequest, RecordPaymentRequest, UpdateStatusRequest};
use super::repo_types::{Order, Payment};
use super::services;
use crate::{
    auth::extractors::{AuthUser, BuyerUser},
    error::ApiResult,
    state::AppState,
};

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/mine", get(my_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_status))
        .route("/orders/:id/payments", get(list_payments).post(record_payment))
}

#[instrument(skip(state, payload))]
pub async fn create_order(
    State(state): State<AppState>,
    BuyerUser(user): BuyerUser,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let Json(payload) = payload?;
    let order = services::create_order(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[instrument(skip(state))]
pub async fn my_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(services::list_my_orders(&state, &user).await?))
}

#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Order>> {
    let Path(id) = id?;
    let (order, _) = services::visible_order(&state, id, &user).await?;
    Ok(Json(order))
}

#[instrument(skip(state, payload))]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> ApiResult<Json<Order>> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    Ok(Json(
        services::change_status(&state, &user, id, payload.status).await?,
    ))
}

#[instrument(skip(state, payload))]
pub async fn record_payment(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<RecordPaymentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let payment = services::record_payment(&state, &user, id, payload).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

#[instrument(skip(state))]
pub async fn list_payments(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Vec<Payment>>> {
    let Path(id) = id?;
    services::visible_order(&state, id, &user).await?;
    Ok(Json(state.orders.list_payments(id).await?))
}
