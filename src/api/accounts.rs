use axum::{extract::State, http::StatusCode, Json};

use super::{auth::CurrentAccount, ApiJson, AppState};
use crate::domain::aggregates::AccountView;
use crate::error::ApiResult;
use crate::services::accounts::RegisterRequest;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AccountView>)> {
    Ok((StatusCode::CREATED, Json(state.services.accounts.register(request).await?)))
}

pub async fn me(CurrentAccount(account): CurrentAccount) -> Json<AccountView> {
    Json(account.view())
}
