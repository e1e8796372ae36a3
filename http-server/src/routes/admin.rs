use axum::{Json, extract::State, http::StatusCode};
use ledger::pool::PoolSnapshot;
use ledger::settlement::{SettingsUpdate, SettlementConfig};
use ledger::types::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiResult, middleware::AdminUser};

#[derive(Serialize)]
pub struct SettingsResponse {
    pub success: bool,
    pub message: String,
    pub settings: SettlementConfig,
}

pub async fn get_settings(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> (StatusCode, Json<SettingsResponse>) {
    (
        StatusCode::OK,
        Json(SettingsResponse {
            success: true,
            message: "Current settlement settings".to_string(),
            settings: state.casino.settings(),
        }),
    )
}

// Partial update; fields left out keep their value
pub async fn update_settings(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<(StatusCode, Json<SettingsResponse>)> {
    let settings = state.casino.update_settings(update)?;
    Ok((
        StatusCode::OK,
        Json(SettingsResponse {
            success: true,
            message: "Settings updated".to_string(),
            settings,
        }),
    ))
}

#[derive(Deserialize)]
pub struct DrawRequest {
    pub currency: String,
    pub amount: Decimal,
}

#[derive(Serialize)]
pub struct DrawResponse {
    pub success: bool,
    pub message: String,
    pub currency: Currency,
    pub remaining: Decimal,
    pub pool: PoolSnapshot,
}

// Operator withdrawal from the shared pool
pub async fn draw_pool(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<DrawRequest>,
) -> ApiResult<(StatusCode, Json<DrawResponse>)> {
    let currency: Currency = payload.currency.parse()?;
    let remaining = state.casino.draw_pool(currency, payload.amount)?;
    Ok((
        StatusCode::OK,
        Json(DrawResponse {
            success: true,
            message: format!("Drew {} {} from the liquidity pool", payload.amount, currency),
            currency,
            remaining,
            pool: state.casino.pool(),
        }),
    ))
}
