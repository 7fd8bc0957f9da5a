use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::domain::aggregates::{AccountError, InvalidStatus, OrderError, ProductError, SettingsError};
use crate::domain::pricing::PricingError;
use crate::domain::value_objects::CredentialError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::Internal(detail) => {
                tracing::error!(%detail, "request failed");
                "internal server error".to_string()
            }
            AppError::BadRequest(m) | AppError::Unauthorized(m) | AppError::Forbidden(m) | AppError::NotFound(m) => m,
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Joins every validation message, nested structs and list entries included,
/// into one `", "`-separated string. Field order is stable.
pub fn flatten_validation(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();
    collect_messages(errors, &mut messages);
    messages.join(", ")
}

fn collect_messages(errors: &ValidationErrors, out: &mut Vec<String>) {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by_key(|(name, _)| **name);
    for (field, kind) in fields {
        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    let message = err.message.as_ref().map_or_else(|| format!("{field} is invalid ({})", err.code), |m| m.to_string());
                    if !out.contains(&message) { out.push(message); }
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_messages(inner, out),
            ValidationErrorsKind::List(items) => {
                for inner in items.values() { collect_messages(inner, out); }
            }
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(e: ValidationErrors) -> Self { AppError::BadRequest(flatten_validation(&e)) }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(what) => AppError::BadRequest(format!("{what} already exists")),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Invalid(errors) => errors.into(),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<ProductError> for AppError {
    fn from(e: ProductError) -> Self {
        match e {
            ProductError::Invalid(errors) => errors.into(),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::Invalid(errors) => errors.into(),
            AccountError::Credential(e @ CredentialError::Hashing(_)) => AppError::Internal(e.to_string()),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<PricingError> for AppError {
    fn from(e: PricingError) -> Self { AppError::BadRequest(e.to_string()) }
}

impl From<SettingsError> for AppError {
    fn from(e: SettingsError) -> Self { AppError::BadRequest(e.to_string()) }
}

impl From<InvalidStatus> for AppError {
    fn from(e: InvalidStatus) -> Self { AppError::BadRequest(e.to_string()) }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self { AppError::BadRequest(e.body_text()) }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self { AppError::BadRequest(e.body_text()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Inner {
        #[validate(range(min = 1, message = "quantity must be at least 1"))]
        quantity: u32,
    }

    #[derive(Validate)]
    struct Outer {
        #[validate(length(min = 1, message = "delivery address is required"))]
        address: String,
        #[validate]
        lines: Vec<Inner>,
    }

    #[test]
    fn test_flatten_reaches_list_entries_and_dedupes() {
        let outer = Outer { address: String::new(), lines: vec![Inner { quantity: 0 }, Inner { quantity: 0 }, Inner { quantity: 2 }] };
        let errors = outer.validate().unwrap_err();
        assert_eq!(flatten_validation(&errors), "delivery address is required, quantity must be at least 1");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::from(StoreError::Conflict("account".into())).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::from(StoreError::Corrupt("x".into())).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(AppError::from(OrderError::EmptyAfterRevision).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("order not found".into()).into_response().status(), StatusCode::NOT_FOUND);
    }
}
