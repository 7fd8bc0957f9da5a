use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::{auth::AdminAccount, ApiJson, AppState};
use crate::domain::aggregates::Product;
use crate::error::ApiResult;
use crate::services::catalog::ProductInput;

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.services.catalog.list(false).await?))
}

pub async fn specials(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.services.catalog.list(true).await?))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Product>> {
    Ok(Json(state.services.catalog.get(&id).await?))
}

pub async fn manufacturers(State(state): State<AppState>, _admin: AdminAccount) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.services.catalog.manufacturers().await?))
}

pub async fn create(
    State(state): State<AppState>,
    _admin: AdminAccount,
    ApiJson(input): ApiJson<ProductInput>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    Ok((StatusCode::CREATED, Json(state.services.catalog.create(input).await?)))
}

pub async fn update(
    State(state): State<AppState>,
    _admin: AdminAccount,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<ProductInput>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.services.catalog.update(&id, input).await?))
}

pub async fn delete(State(state): State<AppState>, _admin: AdminAccount, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    state.services.catalog.delete(&id).await?;
    Ok(Json(json!({ "message": "product deleted" })))
}
