//! Outbound payment rail for withdrawals.
//!
//! The ledger never talks to a chain directly. Withdrawals are handed to a
//! [`PaymentRail`], normally a signing gateway reached over HTTP, and the
//! raw failure text is passed back to the caller untouched.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use ledger::{LedgerError, types::Currency};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequest {
    pub to_address: String,
    pub currency: Currency,
    pub amount: Decimal,
    /// Source book, for the gateway's own bookkeeping
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub signature: String,
}

pub trait PaymentRail: Send + Sync {
    fn send_payment<'a>(
        &'a self,
        request: &'a PaymentRequest,
    ) -> BoxFuture<'a, Result<PaymentReceipt, LedgerError>>;

    fn get_on_chain_balance<'a>(
        &'a self,
        address: &'a str,
        currency: Currency,
    ) -> BoxFuture<'a, Result<Decimal, LedgerError>>;
}

/// Used when no gateway is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRail;

impl PaymentRail for DisabledRail {
    fn send_payment<'a>(
        &'a self,
        _request: &'a PaymentRequest,
    ) -> BoxFuture<'a, Result<PaymentReceipt, LedgerError>> {
        async { Err(not_configured()) }.boxed()
    }

    fn get_on_chain_balance<'a>(
        &'a self,
        _address: &'a str,
        _currency: Currency,
    ) -> BoxFuture<'a, Result<Decimal, LedgerError>> {
        async { Err(not_configured()) }.boxed()
    }
}

fn not_configured() -> LedgerError {
    LedgerError::ExternalTransferFailed("payment rail not configured".to_string())
}

#[derive(Serialize)]
struct GatewayPayment<'a> {
    to_address: &'a str,
    currency: Currency,
    amount: Decimal,
    memo: &'a str,
    commitment: &'static str,
}

#[derive(Deserialize)]
struct GatewayPaymentResponse {
    success: bool,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct GatewayBalanceResponse {
    balance: Decimal,
}

/// Signing gateway reached over HTTP.
///
/// `POST {base}/payments` sends a transfer and `GET {base}/balances/{address}/{currency}`
/// reads a token balance, both at `confirmed` commitment.
#[derive(Debug, Clone)]
pub struct GatewayRail {
    client: reqwest::Client,
    base_url: String,
}

impl GatewayRail {
    pub fn new(base_url: &str) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::InvalidConfig(format!("payment gateway client: {e}")))?;
        Ok(GatewayRail {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_payment(&self, request: &PaymentRequest) -> Result<PaymentReceipt, LedgerError> {
        let body = GatewayPayment {
            to_address: &request.to_address,
            currency: request.currency,
            amount: request.amount,
            memo: &request.memo,
            commitment: "confirmed",
        };
        let response: GatewayPaymentResponse = self
            .client
            .post(format!("{}/payments", self.base_url))
            .json(&body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(transfer_failed)?
            .json()
            .await
            .map_err(transfer_failed)?;

        match (response.success, response.signature) {
            (true, Some(signature)) => {
                tracing::info!(
                    "sent {} {} to {}: {}",
                    request.amount,
                    request.currency,
                    request.to_address,
                    signature
                );
                Ok(PaymentReceipt { signature })
            }
            (_, _) => Err(LedgerError::ExternalTransferFailed(
                response
                    .error
                    .unwrap_or_else(|| "gateway returned no signature".to_string()),
            )),
        }
    }

    async fn fetch_balance(&self, address: &str, currency: Currency) -> Result<Decimal, LedgerError> {
        let response: GatewayBalanceResponse = self
            .client
            .get(format!("{}/balances/{}/{}", self.base_url, address, currency))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(transfer_failed)?
            .json()
            .await
            .map_err(transfer_failed)?;
        Ok(response.balance)
    }
}

fn transfer_failed(err: reqwest::Error) -> LedgerError {
    LedgerError::ExternalTransferFailed(err.to_string())
}

impl PaymentRail for GatewayRail {
    fn send_payment<'a>(
        &'a self,
        request: &'a PaymentRequest,
    ) -> BoxFuture<'a, Result<PaymentReceipt, LedgerError>> {
        self.post_payment(request).boxed()
    }

    fn get_on_chain_balance<'a>(
        &'a self,
        address: &'a str,
        currency: Currency,
    ) -> BoxFuture<'a, Result<Decimal, LedgerError>> {
        self.fetch_balance(address, currency).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_disabled_rail_fails_every_call() {
        let rail = DisabledRail;
        let request = PaymentRequest {
            to_address: "dest".to_string(),
            currency: Currency::USDC,
            amount: dec!(5),
            memo: "winnings".to_string(),
        };
        let err = rail.send_payment(&request).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::ExternalTransferFailed("payment rail not configured".to_string())
        );
        assert!(rail.get_on_chain_balance("dest", Currency::CRT).await.is_err());
    }

    #[test]
    fn test_gateway_url_normalised() {
        let rail = GatewayRail::new("http://localhost:3001/").unwrap();
        assert_eq!(rail.base_url, "http://localhost:3001");
    }

    #[test]
    fn test_gateway_payload_shape() {
        let body = GatewayPayment {
            to_address: "dest",
            currency: Currency::CRT,
            amount: dec!(1.5),
            memo: "savings",
            commitment: "confirmed",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["currency"], "CRT");
        assert_eq!(json["amount"], "1.5");
        assert_eq!(json["commitment"], "confirmed");
    }
}
