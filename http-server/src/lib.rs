use axum::{
    Router,
    routing::{any, get, post},
};
use ledger::casino::Casino;
use ledger::rates::ConversionTable;
use ledger::repository::InMemoryAccounts;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod tasks;
pub mod websocket;

use config::AppConfig;
use models::{ChallengeStore, SessionStore};
use payments::PaymentRail;
use routes::admin::{draw_pool, get_settings, update_settings};
use routes::auth::{challenge, logout, verify};
use routes::conversion::get_rates;
use routes::games::{end_session, fairness_commitment, game_history, place_bet};
use routes::liquidity::{contribute, get_pool};
use routes::savings::get_savings;
use routes::wallet::{
    convert, deposit, get_transactions, get_wallet, on_chain_balance, transfer_to_gaming, withdraw,
};
use websocket::{NotificationManager, create_notification_manager, websocket_handler};

// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub casino: Arc<Casino>,
    pub sessions: SessionStore,
    pub challenges: ChallengeStore,
    pub notification_manager: NotificationManager,
    pub payments: Arc<dyn PaymentRail>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig, payments: Arc<dyn PaymentRail>) -> ledger::Result<Self> {
        let casino = Casino::new(
            Arc::new(InMemoryAccounts::new()),
            config.settlement.clone(),
            ConversionTable::default(),
        )?;
        Ok(AppState {
            casino: Arc::new(casino),
            sessions: SessionStore::new(config.token_ttl),
            challenges: ChallengeStore::new(config.challenge_ttl),
            notification_manager: create_notification_manager(),
            payments,
            config: Arc::new(config),
        })
    }
}

pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/auth/challenge", post(challenge))
        .route("/auth/verify", post(verify))
        .route("/auth/logout", post(logout))
        .route("/wallet/deposit", post(deposit))
        .route("/wallet/withdraw", post(withdraw))
        .route("/wallet/convert", post(convert))
        .route("/wallet/transfer-to-gaming", post(transfer_to_gaming))
        .route("/wallet/{address}", get(get_wallet))
        .route("/wallet/{address}/transactions", get(get_transactions))
        .route("/wallet/{address}/on-chain/{currency}", get(on_chain_balance))
        .route("/games/bet", post(place_bet))
        .route("/games/history/{address}", get(game_history))
        .route("/fairness/{address}", get(fairness_commitment))
        .route("/session/end", post(end_session))
        .route("/savings/{address}", get(get_savings))
        .route("/conversion/rates", get(get_rates))
        .route("/liquidity-pool/contribute", post(contribute))
        .route("/liquidity-pool/{address}", get(get_pool))
        .route("/admin/settings", get(get_settings).put(update_settings))
        .route("/admin/liquidity-pool/draw", post(draw_pool))
        .route("/ws/balance/{address}", any(websocket_handler));

    Router::new()
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

// Root endpoint
async fn root() -> &'static str {
    "Casino Savings API - POST /api/auth/challenge then /api/auth/verify to get a session, POST /api/games/bet to play, GET /api/savings/{address} for the vault, WebSocket /api/ws/balance/{address} for live balances"
}
