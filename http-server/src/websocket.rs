use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use ledger::casino::WalletView;
use ledger::types::current_timestamp;
use ledger::settlement::{GameRecord, SessionClose};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};

use crate::AppState;

const CHANNEL_CAPACITY: usize = 100;

// Notification types pushed to a wallet's balance monitor
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum NotificationType {
    #[serde(rename = "connection_established")]
    ConnectionEstablished {
        wallet_address: String,
        message: String,
    },
    #[serde(rename = "balance_update")]
    BalanceUpdated { reason: String, wallet: WalletView },
    #[serde(rename = "bet_settled")]
    BetSettled { game: GameRecord },
    #[serde(rename = "session_ended")]
    SessionEnded { session: SessionClose },
}

// One broadcast channel per wallet, shared by all of its open sockets
pub type NotificationManager = Arc<Mutex<HashMap<String, broadcast::Sender<NotificationType>>>>;

pub fn create_notification_manager() -> NotificationManager {
    Arc::new(Mutex::new(HashMap::new()))
}

fn subscribe(
    notification_manager: &NotificationManager,
    wallet_address: &str,
) -> broadcast::Receiver<NotificationType> {
    let mut manager = notification_manager
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    manager
        .entry(wallet_address.to_string())
        .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
        .subscribe()
}

// Drop the wallet's channel once its last socket is gone
fn release(notification_manager: &NotificationManager, wallet_address: &str) {
    let mut manager = notification_manager
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if manager
        .get(wallet_address)
        .is_some_and(|tx| tx.receiver_count() == 0)
    {
        manager.remove(wallet_address);
    }
}

// WebSocket handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(wallet_address): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket_with_auth(socket, wallet_address, state))
}

// Authentication message structure
#[derive(Debug, Deserialize)]
struct AuthMessage {
    #[serde(rename = "sessionId")]
    session_id: String,
}

async fn reject(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    wallet_address: &str,
    reason: &str,
) {
    let msg = NotificationType::ConnectionEstablished {
        wallet_address: wallet_address.to_string(),
        message: format!("Authentication failed: {reason}"),
    };
    if let Ok(text) = serde_json::to_string(&msg) {
        let _ = sender.send(Message::Text(text.into())).await;
    }
    let _ = sender.send(Message::Close(None)).await;
}

// Handle socket with authentication via first message
async fn handle_socket_with_auth(socket: WebSocket, wallet_address: String, state: AppState) {
    tracing::info!(
        "balance socket opened for {}, awaiting authentication",
        wallet_address
    );

    let (mut sender, mut receiver) = socket.split();

    match receiver.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<AuthMessage>(&text) {
            Ok(auth_msg) => match state.sessions.get(&auth_msg.session_id, current_timestamp()) {
                Some(session) if session.wallet_address == wallet_address => {
                    tracing::info!("{} authenticated via WebSocket", wallet_address);
                }
                Some(_) => {
                    tracing::warn!("WebSocket session does not own {}", wallet_address);
                    reject(&mut sender, &wallet_address, "wallet address mismatch").await;
                    return;
                }
                None => {
                    tracing::warn!("Invalid session ID in WebSocket auth for {}", wallet_address);
                    reject(&mut sender, &wallet_address, "invalid session ID").await;
                    return;
                }
            },
            Err(e) => {
                tracing::warn!("Failed to parse WebSocket auth message: {}", e);
                reject(&mut sender, &wallet_address, "invalid message format").await;
                return;
            }
        },
        Some(Ok(Message::Close(_))) | None => {
            tracing::info!("WebSocket connection closed before authentication");
            return;
        }
        Some(Err(e)) => {
            tracing::error!("WebSocket error during authentication: {}", e);
            return;
        }
        Some(Ok(_)) => {
            tracing::warn!("Unexpected message type during WebSocket authentication");
            return;
        }
    }

    handle_authenticated_socket(sender, receiver, wallet_address, state).await;
}

async fn handle_authenticated_socket(
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut receiver: futures_util::stream::SplitStream<WebSocket>,
    wallet_address: String,
    state: AppState,
) {
    let rx = subscribe(&state.notification_manager, &wallet_address);

    // Greet with the current balances so the client does not need a separate fetch
    let greeting = NotificationType::ConnectionEstablished {
        wallet_address: wallet_address.clone(),
        message: "Successfully connected to balance updates".to_string(),
    };
    let mut opening = vec![greeting];
    if let Ok(wallet) = state.casino.wallet(&wallet_address) {
        opening.push(NotificationType::BalanceUpdated {
            reason: "snapshot".to_string(),
            wallet,
        });
    }
    for msg in opening {
        if let Ok(text) = serde_json::to_string(&msg) {
            if sender.send(Message::Text(text.into())).await.is_err() {
                tracing::warn!("Failed to send greeting to {}", wallet_address);
            }
        }
    }

    let incoming_wallet = wallet_address.clone();
    let mut incoming_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    tracing::debug!("Received message from {}: {}", incoming_wallet, text);
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("WebSocket connection closed by {}", incoming_wallet);
                    break;
                }
                Err(e) => {
                    tracing::error!("WebSocket error for {}: {}", incoming_wallet, e);
                    break;
                }
                _ => {}
            }
        }
    });

    let outgoing_wallet = wallet_address.clone();
    let mut outgoing_task = tokio::spawn(async move {
        let mut notifications = BroadcastStream::new(rx);
        while let Some(item) = notifications.next().await {
            let notification = match item {
                Ok(notification) => notification,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!("{} missed {} notifications", outgoing_wallet, skipped);
                    continue;
                }
            };
            match serde_json::to_string(&notification) {
                Ok(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        tracing::warn!("Failed to send notification to {}", outgoing_wallet);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to serialize notification for {}: {}",
                        outgoing_wallet,
                        e
                    );
                }
            }
        }
    });

    // Wait for either task to complete (socket closed/errored, or a send failed)
    let outgoing_done = tokio::select! {
        _ = &mut incoming_task => {
            tracing::debug!("Incoming task completed for {}", wallet_address);
            false
        }
        _ = &mut outgoing_task => {
            tracing::debug!("Outgoing task completed for {}", wallet_address);
            true
        }
    };
    incoming_task.abort();
    if !outgoing_done {
        // The receiver must be dropped before the channel can be released
        outgoing_task.abort();
        let _ = outgoing_task.await;
    }

    release(&state.notification_manager, &wallet_address);
    tracing::info!("WebSocket connection closed for {}", wallet_address);
}

pub fn send_notification(
    notification_manager: &NotificationManager,
    wallet_address: &str,
    notification: NotificationType,
) {
    let manager = notification_manager
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(tx) = manager.get(wallet_address) {
        if let Err(e) = tx.send(notification) {
            tracing::debug!("No live balance socket for {}: {}", wallet_address, e);
        }
    }
}

pub fn notify_balance(notification_manager: &NotificationManager, wallet: &WalletView, reason: &str) {
    send_notification(
        notification_manager,
        &wallet.wallet_address,
        NotificationType::BalanceUpdated {
            reason: reason.to_string(),
            wallet: wallet.clone(),
        },
    );
}
