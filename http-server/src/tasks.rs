//! Background jobs: the idle-session sweeper, which also drops expired
//! sign-in state, and the live rate refresher.

use ledger::types::current_timestamp;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

use crate::AppState;
use crate::websocket::{NotificationType, notify_balance, send_notification};

/// Round trips drifting further than this from 1 are logged as suspicious quotes
const MAX_ROUND_TRIP_DEVIATION: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Closes every session idle for the configured timeout. Returns how many were closed.
pub fn sweep_idle_sessions(state: &AppState, now: u64) -> usize {
    let timeout_ms = state.config.session_timeout.as_millis() as u64;
    let closed = state.casino.end_idle_sessions(now, timeout_ms);

    for (address, session) in &closed {
        tracing::info!(
            "closed idle {} session for {}: net {}, savings +{}, pool +{}",
            session.currency,
            address,
            session.net,
            session.savings_contribution,
            session.liquidity_added
        );
        send_notification(
            &state.notification_manager,
            address,
            NotificationType::SessionEnded {
                session: session.clone(),
            },
        );
        if let Ok(wallet) = state.casino.wallet(address) {
            notify_balance(&state.notification_manager, &wallet, "session_timeout");
        }
    }
    closed.len()
}

/// Drops lapsed session tokens and sign-in challenges. Returns how many went.
pub fn purge_expired_credentials(state: &AppState, now: u64) -> usize {
    state.sessions.purge_expired(now) + state.challenges.purge_expired(now)
}

pub async fn run_session_sweeper(state: AppState) {
    let mut ticker = interval(state.config.sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(
        "session sweeper running every {:?}, timeout {:?}",
        state.config.sweep_interval,
        state.config.session_timeout
    );

    loop {
        ticker.tick().await;
        let now = current_timestamp();
        let closed = sweep_idle_sessions(&state, now);
        if closed > 0 {
            tracing::debug!("sweeper closed {} sessions", closed);
        }
        let purged = purge_expired_credentials(&state, now);
        if purged > 0 {
            tracing::debug!("sweeper purged {} expired tokens and challenges", purged);
        }
    }
}

/// Applies a fetched quote map and reports suspicious tables.
pub fn apply_quotes(state: &AppState, quotes: &BTreeMap<String, Decimal>, now: u64) -> ledger::Result<usize> {
    let applied = state.casino.apply_quotes(quotes, now)?;
    let deviation = state.casino.rates().max_round_trip_deviation();
    if deviation > MAX_ROUND_TRIP_DEVIATION {
        tracing::warn!(
            "conversion table round trips deviate by up to {}, check the rate source",
            deviation
        );
    }
    Ok(applied)
}

async fn fetch_quotes(
    client: &reqwest::Client,
    url: &str,
) -> Result<BTreeMap<String, Decimal>, reqwest::Error> {
    client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<BTreeMap<String, Decimal>>()
        .await
}

pub async fn run_rate_refresher(state: AppState, url: String) {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("cannot build rate client, keeping static rates: {}", e);
            return;
        }
    };

    let mut ticker = interval(state.config.rates.refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match fetch_quotes(&client, &url).await {
            Ok(quotes) => match apply_quotes(&state, &quotes, current_timestamp()) {
                Ok(applied) => tracing::debug!("refreshed {} conversion rates", applied),
                Err(e) => tracing::warn!("rejected rate update from {}: {}", url, e),
            },
            // Keep serving the last good table
            Err(e) => tracing::warn!("rate refresh from {} failed: {}", url, e),
        }
    }
}
