use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use ledger::account::BalanceMap;
use ledger::casino::PoolView;
use ledger::pool::PoolSnapshot;
use serde::Serialize;

use crate::{
    AppState,
    error::ApiResult,
    middleware::AuthUser,
    routes::{WalletRequest, games::close_sessions},
};

#[derive(Serialize)]
pub struct PoolResponse {
    pub success: bool,
    #[serde(flatten)]
    pub view: PoolView,
}

pub async fn get_pool(
    State(state): State<AppState>,
    user: AuthUser,
    Path(address): Path<String>,
) -> ApiResult<(StatusCode, Json<PoolResponse>)> {
    user.authorize(&address)?;
    let view = state.casino.pool_view(&address)?;
    Ok((StatusCode::OK, Json(PoolResponse { success: true, view })))
}

#[derive(Serialize)]
pub struct ContributeResponse {
    pub success: bool,
    pub message: String,
    /// Amounts added to the pool by this call
    pub contributions: BalanceMap,
    pub pool: PoolSnapshot,
}

// Contributions only come from settled losses, so this ends the session
pub async fn contribute(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<WalletRequest>,
) -> ApiResult<(StatusCode, Json<ContributeResponse>)> {
    user.authorize(&payload.wallet_address)?;
    let report = close_sessions(&state, &payload.wallet_address)?;
    let message = if report.contributions.values().any(|v| !v.is_zero()) {
        "Session losses contributed to the liquidity pool".to_string()
    } else {
        "Nothing to contribute".to_string()
    };
    Ok((
        StatusCode::OK,
        Json(ContributeResponse {
            success: true,
            message,
            contributions: report.contributions,
            pool: state.casino.pool(),
        }),
    ))
}
