//! HTTP surface.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, FromRequestParts},
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::AppError;
use crate::services::Services;
use crate::store::CredentialVerifier;

pub mod accounts;
pub mod admin;
pub mod auth;
pub mod orders;
pub mod products;
pub mod settings;

pub const SERVICE_NAME: &str = "grocery-orders";

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub verifier: Arc<dyn CredentialVerifier>,
}

/// JSON body whose rejections use the API error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejections use the API error shape.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(accounts::register))
        .route("/auth/me", get(accounts::me))
        .route("/products", get(products::list).post(products::create))
        .route("/products/specials", get(products::specials))
        .route("/products/manufacturers", get(products::manufacturers))
        .route("/products/:id", get(products::get).put(products::update).delete(products::delete))
        .route("/orders", post(orders::create))
        .route("/orders/my", get(orders::list_mine))
        .route("/orders/my/:id", get(orders::get_mine).put(orders::update_mine))
        .route("/admin/orders", get(admin::list_orders))
        .route("/admin/orders/summary-by-product", get(admin::summary_by_product))
        .route("/admin/orders/export", get(admin::export_orders))
        .route("/admin/orders/:id/status", put(admin::update_status))
        .route("/admin/settings/completion-date", get(settings::admin_completion_date).put(settings::set_completion_date))
        .route("/settings/completion-date", get(settings::completion_date));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": SERVICE_NAME}))
}
