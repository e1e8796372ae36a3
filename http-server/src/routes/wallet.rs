use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use ledger::account::LedgerEntry;
use ledger::casino::{ConversionReceipt, WalletView, WithdrawalTicket};
use ledger::types::{BalanceKind, Currency};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    payments::PaymentRequest,
    routes::HistoryQuery,
    websocket::notify_balance,
};

#[derive(Serialize)]
pub struct WalletResponse {
    pub success: bool,
    pub message: String,
    pub wallet: WalletView,
}

impl WalletResponse {
    fn ok(message: &str, wallet: WalletView) -> Json<Self> {
        Json(WalletResponse {
            success: true,
            message: message.to_string(),
            wallet,
        })
    }
}

pub async fn get_wallet(
    State(state): State<AppState>,
    user: AuthUser,
    Path(address): Path<String>,
) -> ApiResult<(StatusCode, Json<WalletResponse>)> {
    user.authorize(&address)?;
    let wallet = state.casino.wallet(&address)?;
    Ok((StatusCode::OK, WalletResponse::ok("Wallet retrieved", wallet)))
}

#[derive(Deserialize)]
pub struct DepositRequest {
    pub wallet_address: String,
    pub currency: String,
    pub amount: Decimal,
}

// Credits the deposit book with the amount the caller reports; no chain
// transfer is checked here
pub async fn deposit(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<DepositRequest>,
) -> ApiResult<(StatusCode, Json<WalletResponse>)> {
    user.authorize(&payload.wallet_address)?;
    let currency: Currency = payload.currency.parse()?;

    let wallet = state
        .casino
        .deposit(&payload.wallet_address, currency, payload.amount)?;
    tracing::info!(
        "deposited {} {} for {}",
        payload.amount,
        currency,
        payload.wallet_address
    );
    notify_balance(&state.notification_manager, &wallet, "deposit");

    let message = format!("Deposited {} {}", payload.amount, currency);
    Ok((StatusCode::OK, WalletResponse::ok(&message, wallet)))
}

#[derive(Deserialize)]
pub struct WithdrawRequest {
    pub wallet_address: String,
    pub wallet_type: String,
    pub currency: String,
    pub amount: Decimal,
    pub destination_address: String,
}

#[derive(Serialize)]
pub struct WithdrawResponse {
    pub success: bool,
    pub message: String,
    pub transaction_signature: String,
    pub wallet: WalletView,
}

// Debits first, then pays out; a rail failure puts the funds back
pub async fn withdraw(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<WithdrawRequest>,
) -> ApiResult<(StatusCode, Json<WithdrawResponse>)> {
    user.authorize(&payload.wallet_address)?;
    let kind: BalanceKind = payload.wallet_type.parse()?;
    let currency: Currency = payload.currency.parse()?;
    let destination = payload.destination_address.trim();
    if destination.is_empty() {
        return Err(ApiError::BadRequest(
            "Destination address is required".to_string(),
        ));
    }

    let ticket = state.casino.begin_withdrawal(
        &payload.wallet_address,
        kind,
        currency,
        payload.amount,
        destination,
    )?;

    let request = PaymentRequest {
        to_address: ticket.destination_address.clone(),
        currency,
        amount: ticket.amount,
        memo: kind.to_string(),
    };

    // The payment and any reversal finish even if the client goes away
    let task_state = state.clone();
    let settled = tokio::spawn(async move { pay_out(&task_state, ticket, request).await });
    let response = settled
        .await
        .map_err(|e| ApiError::Internal(format!("withdrawal task failed: {e}")))??;
    Ok((StatusCode::OK, Json(response)))
}

async fn pay_out(
    state: &AppState,
    ticket: WithdrawalTicket,
    request: PaymentRequest,
) -> ApiResult<WithdrawResponse> {
    match state.payments.send_payment(&request).await {
        Ok(receipt) => {
            let wallet = state.casino.wallet(&ticket.wallet_address)?;
            notify_balance(&state.notification_manager, &wallet, "withdrawal");
            Ok(WithdrawResponse {
                success: true,
                message: format!(
                    "Withdrew {} {} from {} to {}",
                    ticket.amount, ticket.currency, ticket.wallet_type, ticket.destination_address
                ),
                transaction_signature: receipt.signature,
                wallet,
            })
        }
        Err(err) => {
            tracing::error!(
                "withdrawal #{} for {} failed: {}",
                ticket.entry_id,
                ticket.wallet_address,
                err
            );
            let wallet = state.casino.reverse_withdrawal(&ticket)?;
            notify_balance(&state.notification_manager, &wallet, "withdrawal_reversed");
            Err(err.into())
        }
    }
}

#[derive(Deserialize)]
pub struct ConvertRequest {
    pub wallet_address: String,
    pub from_currency: String,
    pub to_currency: String,
    pub amount: Decimal,
}

#[derive(Serialize)]
pub struct ConvertResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub conversion: ConversionReceipt,
}

pub async fn convert(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ConvertRequest>,
) -> ApiResult<(StatusCode, Json<ConvertResponse>)> {
    user.authorize(&payload.wallet_address)?;
    // Unsupported symbols are reported as an unknown pair
    state
        .casino
        .rates()
        .rate_for_symbols(&payload.from_currency, &payload.to_currency)?;
    let from: Currency = payload.from_currency.parse()?;
    let to: Currency = payload.to_currency.parse()?;

    let conversion = state
        .casino
        .convert(&payload.wallet_address, from, to, payload.amount)?;
    notify_balance(&state.notification_manager, &conversion.wallet, "conversion");

    let response = ConvertResponse {
        success: true,
        message: format!(
            "Converted {} {} to {} {}",
            conversion.amount, from, conversion.converted_amount, to
        ),
        conversion,
    };
    Ok((StatusCode::OK, Json(response)))
}

#[derive(Deserialize)]
pub struct TransferRequest {
    pub wallet_address: String,
    pub currency: String,
    pub amount: Decimal,
    /// `winnings` when omitted
    pub from_wallet: Option<String>,
}

// Moves winnings or savings back into the deposit book for play
pub async fn transfer_to_gaming(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<TransferRequest>,
) -> ApiResult<(StatusCode, Json<WalletResponse>)> {
    user.authorize(&payload.wallet_address)?;
    let currency: Currency = payload.currency.parse()?;
    let from = match payload.from_wallet.as_deref() {
        Some(name) => name.parse::<BalanceKind>()?,
        None => BalanceKind::Winnings,
    };

    let wallet = state.casino.transfer(
        &payload.wallet_address,
        from,
        BalanceKind::Deposit,
        currency,
        payload.amount,
    )?;
    notify_balance(&state.notification_manager, &wallet, "transfer");

    let message = format!("Moved {} {} from {} to deposit", payload.amount, currency, from);
    Ok((StatusCode::OK, WalletResponse::ok(&message, wallet)))
}

#[derive(Serialize)]
pub struct TransactionsResponse {
    pub success: bool,
    pub wallet_address: String,
    pub transactions: Vec<LedgerEntry>,
}

pub async fn get_transactions(
    State(state): State<AppState>,
    user: AuthUser,
    Path(address): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<(StatusCode, Json<TransactionsResponse>)> {
    user.authorize(&address)?;
    let transactions = state.casino.transactions(&address, query.limit())?;
    Ok((
        StatusCode::OK,
        Json(TransactionsResponse {
            success: true,
            wallet_address: address,
            transactions,
        }),
    ))
}

#[derive(Serialize)]
pub struct OnChainBalanceResponse {
    pub success: bool,
    pub wallet_address: String,
    pub currency: Currency,
    pub balance: Decimal,
}

pub async fn on_chain_balance(
    State(state): State<AppState>,
    user: AuthUser,
    Path((address, currency)): Path<(String, String)>,
) -> ApiResult<(StatusCode, Json<OnChainBalanceResponse>)> {
    user.authorize(&address)?;
    let currency: Currency = currency.parse()?;
    let balance = state.payments.get_on_chain_balance(&address, currency).await?;
    Ok((
        StatusCode::OK,
        Json(OnChainBalanceResponse {
            success: true,
            wallet_address: address,
            currency,
            balance,
        }),
    ))
}
