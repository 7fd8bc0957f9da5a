//! Bearer-token authentication. Tokens are issued by an external service;
//! requests only get an account resolved from them.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use uuid::Uuid;

use super::AppState;
use crate::domain::aggregates::Account;
use crate::error::AppError;
use crate::store::{CredentialVerifier, StoreResult};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("not authorized, no token")]
    MissingToken,
    #[error("not authorized, token failed")]
    InvalidToken,
    #[error("not authorized as an admin")]
    NotAdmin,
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::NotAdmin => AppError::Forbidden(e.to_string()),
            _ => AppError::Unauthorized(e.to_string()),
        }
    }
}

/// Fixed token table, for local runs and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Uuid>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, Uuid>) -> Self { Self { tokens } }
}

#[async_trait]
impl CredentialVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> StoreResult<Option<Uuid>> {
        Ok(self.tokens.get(token).copied())
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The authenticated caller.
pub struct CurrentAccount(pub Account);

#[async_trait]
impl FromRequestParts<AppState> for CurrentAccount {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::MissingToken)?;
        let id = state.verifier.verify(token).await?.ok_or(AuthError::InvalidToken)?;
        // a token for a deleted account is as good as no token
        let account = state.services.accounts.find(id).await?.ok_or(AuthError::InvalidToken)?;
        Ok(Self(account))
    }
}

/// The authenticated caller, required to be an administrator.
pub struct AdminAccount(pub Account);

#[async_trait]
impl FromRequestParts<AppState> for AdminAccount {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentAccount(account) = CurrentAccount::from_request_parts(parts, state).await?;
        match account {
            Account::Admin { .. } => Ok(Self(account)),
            Account::Customer(profile) => {
                tracing::warn!(account_id = %profile.id, "admin route refused");
                Err(AuthError::NotAdmin.into())
            }
        }
    }
}
