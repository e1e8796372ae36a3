use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use ledger::casino::{SessionReport, WalletView};
use ledger::fairness::SeedCommitment;
use ledger::settlement::{Bet, BetResult, GameRecord};
use ledger::types::{Currency, GameType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::ApiResult,
    middleware::AuthUser,
    routes::{HistoryQuery, WalletRequest},
    websocket::{NotificationType, notify_balance, send_notification},
};

// Place bet request
#[derive(Deserialize)]
pub struct BetRequest {
    pub wallet_address: String,
    pub game_type: String, // e.g. "Slot Machine", "Dice"
    pub bet_amount: Decimal,
    pub currency: String,
    pub client_seed: Option<String>,
}

// Place bet response; the game record fields sit at the top level
#[derive(Serialize)]
pub struct BetResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub game: GameRecord,
    pub next_commitment: SeedCommitment,
    pub wallet: WalletView,
}

// Place bet endpoint
pub async fn place_bet(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BetRequest>,
) -> ApiResult<(StatusCode, Json<BetResponse>)> {
    user.authorize(&payload.wallet_address)?;
    let bet = Bet {
        game: payload.game_type.parse::<GameType>()?,
        currency: payload.currency.parse::<Currency>()?,
        amount: payload.bet_amount,
        client_seed: payload.client_seed,
    };

    let receipt = state.casino.place_bet(&payload.wallet_address, &bet)?;
    let game = receipt.record;
    tracing::debug!(
        "{} {} {} {} on {}: {:?} x{}",
        payload.wallet_address,
        game.game_id,
        game.bet_amount,
        game.currency,
        game.game_type,
        game.result,
        game.multiplier
    );

    send_notification(
        &state.notification_manager,
        &payload.wallet_address,
        NotificationType::BetSettled { game: game.clone() },
    );
    notify_balance(&state.notification_manager, &receipt.wallet, "bet");

    let message = match game.result {
        BetResult::Win => format!("Won {} {}", game.payout, game.currency),
        BetResult::Loss => format!("Lost {} {}", game.bet_amount, game.currency),
    };
    let response = BetResponse {
        success: true,
        message,
        game,
        next_commitment: receipt.next_commitment,
        wallet: receipt.wallet,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(Serialize)]
pub struct GameHistoryResponse {
    pub success: bool,
    pub wallet_address: String,
    pub games: Vec<GameRecord>,
}

// Most recent games first
pub async fn game_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(address): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<(StatusCode, Json<GameHistoryResponse>)> {
    user.authorize(&address)?;
    let games = state.casino.game_history(&address, query.limit())?;
    Ok((
        StatusCode::OK,
        Json(GameHistoryResponse {
            success: true,
            wallet_address: address,
            games,
        }),
    ))
}

#[derive(Serialize)]
pub struct FairnessResponse {
    pub success: bool,
    pub wallet_address: String,
    /// Hash of the seed that will settle the next bet
    pub commitment: SeedCommitment,
}

pub async fn fairness_commitment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(address): Path<String>,
) -> ApiResult<(StatusCode, Json<FairnessResponse>)> {
    user.authorize(&address)?;
    let commitment = state.casino.fairness_commitment(&address)?;
    Ok((
        StatusCode::OK,
        Json(FairnessResponse {
            success: true,
            wallet_address: address,
            commitment,
        }),
    ))
}

#[derive(Serialize)]
pub struct SessionEndResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub report: SessionReport,
}

// Cash out: closes every open session and diverts losses
pub async fn end_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<WalletRequest>,
) -> ApiResult<(StatusCode, Json<SessionEndResponse>)> {
    user.authorize(&payload.wallet_address)?;
    let report = close_sessions(&state, &payload.wallet_address)?;
    let message = if report.sessions.is_empty() {
        "No open sessions".to_string()
    } else {
        format!("Closed {} session(s)", report.sessions.len())
    };
    Ok((
        StatusCode::OK,
        Json(SessionEndResponse {
            success: true,
            message,
            report,
        }),
    ))
}

pub(crate) fn close_sessions(state: &AppState, wallet_address: &str) -> ApiResult<SessionReport> {
    let report = state.casino.end_session(wallet_address)?;
    for session in &report.sessions {
        tracing::info!(
            "{} cashed out {}: net {}, savings +{}, pool +{}",
            wallet_address,
            session.currency,
            session.net,
            session.savings_contribution,
            session.liquidity_added
        );
        send_notification(
            &state.notification_manager,
            wallet_address,
            NotificationType::SessionEnded {
                session: session.clone(),
            },
        );
    }
    if !report.sessions.is_empty() {
        notify_balance(&state.notification_manager, &report.wallet, "session_end");
    }
    Ok(report)
}
