use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use ledger::casino::SavingsSummary;
use serde::Serialize;

use crate::{AppState, error::ApiResult, middleware::AuthUser, routes::HistoryQuery};

#[derive(Serialize)]
pub struct SavingsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub summary: SavingsSummary,
}

// Vault totals, their USD value, recent diversions and win/loss stats
pub async fn get_savings(
    State(state): State<AppState>,
    user: AuthUser,
    Path(address): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<(StatusCode, Json<SavingsResponse>)> {
    user.authorize(&address)?;
    let summary = state.casino.savings_summary(&address, query.limit())?;
    Ok((
        StatusCode::OK,
        Json(SavingsResponse {
            success: true,
            summary,
        }),
    ))
}
