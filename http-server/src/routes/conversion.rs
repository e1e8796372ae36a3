use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct RatesResponse {
    pub success: bool,
    /// Keyed `FROM_TO`, e.g. `CRT_DOGE`
    pub rates: BTreeMap<String, Decimal>,
    /// Zero while the static fallback table is in use
    pub last_updated: u64,
}

pub async fn get_rates(State(state): State<AppState>) -> Json<RatesResponse> {
    let table = state.casino.rates();
    Json(RatesResponse {
        success: true,
        rates: table.quotes(),
        last_updated: table.updated_at(),
    })
}
