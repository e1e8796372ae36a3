use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

// Wallet bound to a bearer session
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedWallet {
    pub wallet_address: String,
    pub session_id: String,
    pub created_at: u64,
    pub expires_at: u64,
}

impl AuthenticatedWallet {
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

// In-memory session token store; tokens lapse after `ttl`
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, AuthenticatedWallet>>>,
    ttl_ms: u64,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: Arc::default(),
            ttl_ms: ttl.as_millis() as u64,
        }
    }

    // Hash the wallet address with a random nonce so tokens are not guessable
    fn session_token(wallet_address: &str) -> String {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut hasher = Sha256::new();
        hasher.update(wallet_address.as_bytes());
        hasher.update(nonce);
        hex::encode(hasher.finalize())
    }

    // Issue a fresh session for a wallet; earlier sessions stay valid
    pub fn create(&self, wallet_address: &str, now: u64) -> AuthenticatedWallet {
        let session = AuthenticatedWallet {
            wallet_address: wallet_address.to_string(),
            session_id: Self::session_token(wallet_address),
            created_at: now,
            expires_at: now.saturating_add(self.ttl_ms),
        };

        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(session.session_id.clone(), session.clone());
        session
    }

    // Expired tokens are dropped on lookup
    pub fn get(&self, session_id: &str, now: u64) -> Option<AuthenticatedWallet> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        match sessions.get(session_id) {
            Some(session) if session.is_expired(now) => {
                sessions.remove(session_id);
                None
            }
            Some(session) => Some(session.clone()),
            None => None,
        }
    }

    pub fn revoke(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(session_id).is_some()
    }

    /// Drops every token past its expiry. Returns how many were removed.
    pub fn purge_expired(&self, now: u64) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);
    const DAY_MS: u64 = 24 * 60 * 60 * 1000;

    #[test]
    fn test_create_and_lookup() {
        let store = SessionStore::new(DAY);
        let session = store.create("wallet-1", 1_000);
        assert_eq!(session.session_id.len(), 64);
        assert_eq!(session.expires_at, 1_000 + DAY_MS);

        let found = store.get(&session.session_id, 2_000).unwrap();
        assert_eq!(found.wallet_address, "wallet-1");
        assert!(store.get("not-a-token", 2_000).is_none());
    }

    #[test]
    fn test_tokens_are_unique_per_login() {
        let store = SessionStore::new(DAY);
        let first = store.create("wallet-1", 0);
        let second = store.create("wallet-1", 0);
        assert_ne!(first.session_id, second.session_id);
        assert!(store.get(&first.session_id, 0).is_some());
    }

    #[test]
    fn test_revoke() {
        let store = SessionStore::new(DAY);
        let session = store.create("wallet-1", 0);
        assert!(store.revoke(&session.session_id));
        assert!(store.get(&session.session_id, 0).is_none());
        assert!(!store.revoke(&session.session_id));
    }

    #[test]
    fn test_token_expires_after_ttl() {
        let store = SessionStore::new(DAY);
        let session = store.create("wallet-1", 0);
        assert!(store.get(&session.session_id, DAY_MS - 1).is_some());
        assert!(store.get(&session.session_id, DAY_MS).is_none());
        // Removed on the failed lookup
        assert!(!store.revoke(&session.session_id));
    }

    #[test]
    fn test_purge_expired_keeps_live_tokens() {
        let store = SessionStore::new(DAY);
        let old = store.create("wallet-1", 0);
        let fresh = store.create("wallet-2", DAY_MS / 2);

        assert_eq!(store.purge_expired(DAY_MS), 1);
        assert!(store.get(&old.session_id, 0).is_none());
        assert!(store.get(&fresh.session_id, DAY_MS).is_some());
        assert_eq!(store.purge_expired(DAY_MS), 0);
    }
}
