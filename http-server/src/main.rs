use http_server::payments::{DisabledRail, GatewayRail, PaymentRail};
use http_server::{AppState, app, config, tasks};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::fetch_config()?;

    let payments: Arc<dyn PaymentRail> = match config.payment_gateway_url.as_deref() {
        Some(url) => {
            tracing::info!("Payment gateway at {}", url);
            Arc::new(GatewayRail::new(url)?)
        }
        None => {
            tracing::warn!("CASINO_PAYMENT_GATEWAY_URL not set, withdrawals are disabled");
            Arc::new(DisabledRail)
        }
    };

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, payments)?;
    tracing::info!(
        "Ledger initialized: savings {} / liquidity {}, basis {}",
        state.config.settlement.savings_fraction,
        state.config.settlement.liquidity_fraction,
        state.config.settlement.savings_basis
    );

    tokio::spawn(tasks::run_session_sweeper(state.clone()));
    if let Some(url) = state.config.rates.url.clone() {
        tokio::spawn(tasks::run_rate_refresher(state.clone(), url));
    } else {
        tracing::info!("CASINO_RATES_URL not set, using static conversion rates");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server running on http://{}", bind_addr);
    axum::serve(listener, app(state)).await?;

    Ok(())
}
