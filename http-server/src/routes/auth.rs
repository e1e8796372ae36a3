use axum::{Json, extract::State, http::StatusCode};
use ledger::casino::WalletView;
use ledger::fairness::SeedCommitment;
use ledger::types::current_timestamp;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiResult, middleware::AuthUser};

#[derive(Deserialize)]
pub struct ChallengeRequest {
    pub wallet_address: String,
}

#[derive(Serialize)]
pub struct ChallengeResponse {
    pub success: bool,
    /// Message to sign with the wallet key
    pub challenge: String,
    pub challenge_hash: String,
    pub expires_at: u64,
}

// Step one of sign-in: hand out a one-time message to sign
pub async fn challenge(
    State(state): State<AppState>,
    Json(payload): Json<ChallengeRequest>,
) -> ApiResult<(StatusCode, Json<ChallengeResponse>)> {
    let wallet_address = payload.wallet_address.trim();
    let challenge = state.challenges.issue(wallet_address, current_timestamp())?;
    tracing::debug!("issued sign-in challenge for {}", wallet_address);

    Ok((
        StatusCode::OK,
        Json(ChallengeResponse {
            success: true,
            challenge: challenge.message,
            challenge_hash: challenge.challenge_hash,
            expires_at: challenge.expires_at,
        }),
    ))
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub wallet_address: String,
    pub challenge_hash: String,
    /// ed25519 signature over the challenge, base58 or base64
    pub signature: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub session_id: String,
    pub expires_at: u64,
    pub wallet: WalletView,
    pub fairness: SeedCommitment,
}

// Step two: a valid signature opens the account on first use and starts a session
pub async fn verify(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> ApiResult<(StatusCode, Json<LoginResponse>)> {
    let wallet_address = payload.wallet_address.trim();
    let now = current_timestamp();
    state
        .challenges
        .redeem(&payload.challenge_hash, wallet_address, &payload.signature, now)?;

    let wallet = state.casino.open_account(wallet_address);
    let fairness = state.casino.fairness_commitment(wallet_address)?;
    let session = state.sessions.create(wallet_address, now);
    tracing::info!("wallet {} logged in", wallet_address);

    let response = LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        session_id: session.session_id,
        expires_at: session.expires_at,
        wallet,
        fairness,
    };
    Ok((StatusCode::OK, Json(response)))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

// Logout endpoint (protected route)
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
) -> (StatusCode, Json<LogoutResponse>) {
    state.sessions.revoke(&session.session_id);
    let response = LogoutResponse {
        success: true,
        message: "Logged out".to_string(),
    };
    (StatusCode::OK, Json(response))
}
