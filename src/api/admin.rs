use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use super::{auth::AdminAccount, ApiJson, ApiQuery, AppState};
use crate::domain::aggregates::Order;
use crate::error::ApiResult;
use crate::services::export;
use crate::services::reporting::{OrderFilterParams, OrderPage, ProductSummary};

pub async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminAccount,
    ApiQuery(params): ApiQuery<OrderFilterParams>,
) -> ApiResult<Json<OrderPage>> {
    Ok(Json(state.services.reporting.list(&params).await?))
}

pub async fn summary_by_product(
    State(state): State<AppState>,
    _admin: AdminAccount,
    ApiQuery(params): ApiQuery<OrderFilterParams>,
) -> ApiResult<Json<Vec<ProductSummary>>> {
    Ok(Json(state.services.reporting.summary_by_product(&params).await?))
}

pub async fn export_orders(
    State(state): State<AppState>,
    _admin: AdminAccount,
    ApiQuery(params): ApiQuery<OrderFilterParams>,
) -> ApiResult<Response> {
    let orders = state.services.reporting.export_rows(&params).await?;
    tracing::info!(rows = orders.len(), "orders exported");
    let disposition = format!("attachment; filename=\"{}\"", export::file_name(Utc::now().date_naive()));
    Ok((
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()), (header::CONTENT_DISPOSITION, disposition)],
        export::render_csv(&orders),
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub status: String,
}

pub async fn update_status(
    State(state): State<AppState>,
    _admin: AdminAccount,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusUpdate>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.services.orders.set_status(&id, &body.status).await?))
}
