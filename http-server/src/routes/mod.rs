pub mod admin;
pub mod auth;
pub mod conversion;
pub mod games;
pub mod liquidity;
pub mod savings;
pub mod wallet;

use serde::Deserialize;

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 500;

// Paging for history style endpoints
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

impl HistoryQuery {
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT)
    }
}

// Request body naming only the wallet
#[derive(Debug, Deserialize)]
pub struct WalletRequest {
    pub wallet_address: String,
}
