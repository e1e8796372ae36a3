use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use ledger::types::current_timestamp;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    models::AuthenticatedWallet,
};

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

// Axum extractor for wallets holding a bearer session
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthenticatedWallet);

impl AuthUser {
    // Reject requests that act on a wallet other than the session's own
    pub fn authorize(&self, wallet_address: &str) -> ApiResult<()> {
        if self.0.wallet_address != wallet_address {
            tracing::warn!(
                "session for {} tried to act on {}",
                self.0.wallet_address,
                wallet_address
            );
            return Err(ApiError::Forbidden("Wallet address mismatch".to_string()));
        }
        Ok(())
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Extract the Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            ApiError::Unauthorized("Invalid Authorization header format".to_string())
        })?;

        match state.sessions.get(token, current_timestamp()) {
            Some(wallet) => Ok(AuthUser(wallet)),
            None => Err(ApiError::Unauthorized("Invalid or expired token".to_string())),
        }
    }
}

// Operator access through the X-Admin-Token header
#[derive(Debug, Clone, Copy)]
pub struct AdminUser;

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin_token.as_deref() else {
            return Err(ApiError::Forbidden("Admin API is disabled".to_string()));
        };

        let provided = parts
            .headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing X-Admin-Token header".to_string()))?;

        if provided != expected {
            tracing::warn!("rejected admin request with a wrong token");
            return Err(ApiError::Unauthorized("Invalid admin token".to_string()));
        }
        Ok(AdminUser)
    }
}
