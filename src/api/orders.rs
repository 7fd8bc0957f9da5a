use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{auth::CurrentAccount, ApiJson, AppState};
use crate::domain::aggregates::Order;
use crate::error::ApiResult;
use crate::services::orders::{PlaceOrder, ReviseOrder};

pub async fn create(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    ApiJson(input): ApiJson<PlaceOrder>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let order = state.services.orders.place(&account, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_mine(State(state): State<AppState>, CurrentAccount(account): CurrentAccount) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.services.orders.list_mine(&account).await?))
}

pub async fn get_mine(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.services.orders.get_mine(&account, &id).await?))
}

pub async fn update_mine(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<ReviseOrder>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.services.orders.revise(&account, &id, input).await?))
}
