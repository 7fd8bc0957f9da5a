use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    auth::{AdminAccount, CurrentAccount},
    ApiJson, AppState,
};
use crate::error::ApiResult;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionDateView {
    pub default_completion_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionDateUpdated {
    pub message: &'static str,
    pub default_completion_date: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionDateUpdate {
    #[serde(default)]
    pub default_completion_date: String,
}

pub async fn completion_date(State(state): State<AppState>, _account: CurrentAccount) -> ApiResult<Json<CompletionDateView>> {
    let date = state.services.settings.default_completion_date().await?;
    Ok(Json(CompletionDateView { default_completion_date: date }))
}

pub async fn admin_completion_date(State(state): State<AppState>, _admin: AdminAccount) -> ApiResult<Json<CompletionDateView>> {
    let date = state.services.settings.default_completion_date().await?;
    Ok(Json(CompletionDateView { default_completion_date: date }))
}

pub async fn set_completion_date(
    State(state): State<AppState>,
    _admin: AdminAccount,
    ApiJson(body): ApiJson<CompletionDateUpdate>,
) -> ApiResult<Json<CompletionDateUpdated>> {
    let saved = state.services.settings.set_default_completion_date(&body.default_completion_date).await?;
    Ok(Json(CompletionDateUpdated {
        message: "default completion date updated",
        default_completion_date: saved.default_completion_date,
    }))
}
