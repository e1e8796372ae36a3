//! Sign-in challenges.
//!
//! A wallet proves ownership by signing a one-time message with the ed25519
//! key its base58 address encodes. Challenges are consumed by the first
//! verification attempt, successful or not, and lapse after `ttl`.

use base64::{Engine as _, engine::general_purpose};
use ed25519_dalek::{Signature, VerifyingKey};
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Serialize)]
pub struct Challenge {
    pub wallet_address: String,
    /// Exact text the wallet has to sign
    pub message: String,
    pub challenge_hash: String,
    pub created_at: u64,
    pub expires_at: u64,
}

#[derive(Clone)]
pub struct ChallengeStore {
    challenges: Arc<Mutex<HashMap<String, Challenge>>>,
    ttl_ms: u64,
}

/// Decodes a base58 wallet address into its ed25519 public key.
pub fn wallet_key(wallet_address: &str) -> ApiResult<VerifyingKey> {
    let invalid = || ApiError::BadRequest(format!("Invalid wallet address '{wallet_address}'"));
    let bytes: [u8; 32] = bs58::decode(wallet_address)
        .into_vec()
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(invalid)?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| invalid())
}

// Wallets hand signatures back as base58 or base64
fn decode_signature(signature: &str) -> Option<Signature> {
    let signature = signature.trim();
    let bytes = bs58::decode(signature)
        .into_vec()
        .ok()
        .filter(|b| b.len() == Signature::BYTE_SIZE)
        .or_else(|| general_purpose::STANDARD.decode(signature).ok())?;
    Signature::from_slice(&bytes).ok()
}

impl ChallengeStore {
    pub fn new(ttl: Duration) -> Self {
        ChallengeStore {
            challenges: Arc::default(),
            ttl_ms: ttl.as_millis() as u64,
        }
    }

    /// Issues a challenge for a well-formed wallet address.
    pub fn issue(&self, wallet_address: &str, now: u64) -> ApiResult<Challenge> {
        wallet_key(wallet_address)?;

        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);
        let message = format!(
            "Sign in to Casino Savings\n\nAddress: {wallet_address}\nIssued: {now}\nNonce: {}",
            hex::encode(nonce)
        );
        let challenge = Challenge {
            wallet_address: wallet_address.to_string(),
            challenge_hash: hex::encode(Sha256::digest(message.as_bytes())),
            message,
            created_at: now,
            expires_at: now.saturating_add(self.ttl_ms),
        };

        let mut challenges = self.challenges.lock().unwrap_or_else(PoisonError::into_inner);
        challenges.insert(challenge.challenge_hash.clone(), challenge.clone());
        Ok(challenge)
    }

    /// Consumes `challenge_hash` and checks `signature` over its message.
    ///
    /// # Errors
    ///
    /// [`ApiError::Unauthorized`] when the challenge is unknown, already
    /// used, expired, issued to another wallet or the signature does not
    /// verify against the wallet's key.
    pub fn redeem(
        &self,
        challenge_hash: &str,
        wallet_address: &str,
        signature: &str,
        now: u64,
    ) -> ApiResult<()> {
        let challenge = self
            .challenges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(challenge_hash)
            .ok_or_else(|| ApiError::Unauthorized("Unknown or already used challenge".to_string()))?;

        if now >= challenge.expires_at {
            return Err(ApiError::Unauthorized("Challenge expired".to_string()));
        }
        if challenge.wallet_address != wallet_address {
            tracing::warn!(
                "challenge for {} redeemed by {}",
                challenge.wallet_address,
                wallet_address
            );
            return Err(ApiError::Unauthorized("Challenge was issued to another wallet".to_string()));
        }

        let key = wallet_key(wallet_address)?;
        let signature = decode_signature(signature)
            .ok_or_else(|| ApiError::Unauthorized("Malformed signature".to_string()))?;
        key.verify_strict(challenge.message.as_bytes(), &signature)
            .map_err(|_| ApiError::Unauthorized("Invalid signature".to_string()))
    }

    /// Drops every challenge past its expiry. Returns how many were removed.
    pub fn purge_expired(&self, now: u64) -> usize {
        let mut challenges = self.challenges.lock().unwrap_or_else(PoisonError::into_inner);
        let before = challenges.len();
        challenges.retain(|_, challenge| now < challenge.expires_at);
        before - challenges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    const TTL: Duration = Duration::from_secs(5 * 60);
    const TTL_MS: u64 = 5 * 60 * 1000;

    fn keypair(seed: u8) -> (SigningKey, String) {
        let key = SigningKey::from_bytes(&[seed; 32]);
        let address = bs58::encode(key.verifying_key().as_bytes()).into_string();
        (key, address)
    }

    fn sign(key: &SigningKey, message: &str) -> String {
        bs58::encode(key.sign(message.as_bytes()).to_bytes()).into_string()
    }

    #[test]
    fn test_signed_challenge_is_accepted_once() {
        let store = ChallengeStore::new(TTL);
        let (key, address) = keypair(1);
        let challenge = store.issue(&address, 0).unwrap();
        assert!(challenge.message.contains(&address));
        assert_eq!(challenge.expires_at, TTL_MS);

        let signature = sign(&key, &challenge.message);
        store.redeem(&challenge.challenge_hash, &address, &signature, 1_000).unwrap();

        let err = store
            .redeem(&challenge.challenge_hash, &address, &signature, 1_000)
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_base64_signature_is_accepted() {
        let store = ChallengeStore::new(TTL);
        let (key, address) = keypair(2);
        let challenge = store.issue(&address, 0).unwrap();
        let signature = general_purpose::STANDARD.encode(key.sign(challenge.message.as_bytes()).to_bytes());
        store.redeem(&challenge.challenge_hash, &address, &signature, 0).unwrap();
    }

    #[test]
    fn test_wrong_signature_is_rejected() {
        let store = ChallengeStore::new(TTL);
        let (_, address) = keypair(1);
        let (other_key, _) = keypair(2);
        let challenge = store.issue(&address, 0).unwrap();

        let forged = sign(&other_key, &challenge.message);
        let err = store
            .redeem(&challenge.challenge_hash, &address, &forged, 0)
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid signature");

        let err = store.issue(&address, 0).and_then(|c| {
            store.redeem(&c.challenge_hash, &address, "not-a-signature", 0)
        });
        assert!(matches!(err, Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_expired_challenge_is_rejected() {
        let store = ChallengeStore::new(TTL);
        let (key, address) = keypair(3);
        let challenge = store.issue(&address, 0).unwrap();
        let signature = sign(&key, &challenge.message);

        let err = store
            .redeem(&challenge.challenge_hash, &address, &signature, TTL_MS)
            .unwrap_err();
        assert_eq!(err.to_string(), "Challenge expired");
    }

    #[test]
    fn test_challenge_is_bound_to_its_wallet() {
        let store = ChallengeStore::new(TTL);
        let (_, address) = keypair(4);
        let (other_key, other_address) = keypair(5);
        let challenge = store.issue(&address, 0).unwrap();

        let signature = sign(&other_key, &challenge.message);
        let err = store
            .redeem(&challenge.challenge_hash, &other_address, &signature, 0)
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_malformed_address_gets_no_challenge() {
        let store = ChallengeStore::new(TTL);
        assert!(matches!(store.issue("wallet-a", 0), Err(ApiError::BadRequest(_))));
        assert!(matches!(store.issue("abc", 0), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_purge_expired() {
        let store = ChallengeStore::new(TTL);
        let (_, address) = keypair(6);
        store.issue(&address, 0).unwrap();
        store.issue(&address, TTL_MS).unwrap();

        assert_eq!(store.purge_expired(TTL_MS), 1);
        assert_eq!(store.purge_expired(TTL_MS), 0);
    }
}
