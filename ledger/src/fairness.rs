//! Per-bet commit-reveal seeds.
//!
//! Before a bet the account publishes `sha256(server_seed)`. The bet's RNG
//! is seeded from `sha256(server_seed ":" client_seed ":" nonce)`, and the
//! server seed is revealed in the bet receipt, so anyone can recompute the
//! outcome with [`replay`] and check it against the earlier commitment
//! with [`verify`]. A fresh seed is committed right after every reveal.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::games::{self, GameModel, Outcome};

/// What the player sees before betting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedCommitment {
    pub server_seed_hash: String,
    pub nonce: u64,
}

/// Everything needed to replay one bet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedReveal {
    pub server_seed: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
}

#[derive(Debug, Clone)]
pub struct SeedChain {
    server_seed: String,
    nonce: u64,
}

impl Default for SeedChain {
    fn default() -> Self {
        Self::new()
    }
}

impl SeedChain {
    pub fn new() -> Self {
        SeedChain {
            server_seed: generate_server_seed(),
            nonce: 0,
        }
    }

    pub fn commitment(&self) -> SeedCommitment {
        SeedCommitment {
            server_seed_hash: hash_seed(&self.server_seed),
            nonce: self.nonce,
        }
    }

    /// Reveals the pending seed, returns the bet RNG and commits a new seed.
    pub fn draw(&mut self, client_seed: &str) -> (SeedReveal, StdRng) {
        let reveal = SeedReveal {
            server_seed_hash: hash_seed(&self.server_seed),
            server_seed: std::mem::replace(&mut self.server_seed, generate_server_seed()),
            client_seed: client_seed.to_string(),
            nonce: self.nonce,
        };
        self.nonce += 1;

        let rng = rng_for(&reveal.server_seed, &reveal.client_seed, reveal.nonce);
        (reveal, rng)
    }
}

fn generate_server_seed() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    hex::encode(bytes)
}

pub fn hash_seed(server_seed: &str) -> String {
    hex::encode(Sha256::digest(server_seed.as_bytes()))
}

/// Returns true when `server_seed` matches a previously published hash
pub fn verify(server_seed: &str, server_seed_hash: &str) -> bool {
    hash_seed(server_seed).eq_ignore_ascii_case(server_seed_hash)
}

pub fn rng_for(server_seed: &str, client_seed: &str, nonce: u64) -> StdRng {
    let mut hasher = Sha256::new();
    hasher.update(server_seed.as_bytes());
    hasher.update(b":");
    hasher.update(client_seed.as_bytes());
    hasher.update(b":");
    hasher.update(nonce.to_string().as_bytes());
    StdRng::from_seed(hasher.finalize().into())
}

/// Recomputes the outcome a revealed seed produced under `model`.
pub fn replay(model: &GameModel, reveal: &SeedReveal) -> Outcome {
    let mut rng = rng_for(&reveal.server_seed, &reveal.client_seed, reveal.nonce);
    games::outcome(model, &mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_matches_reveal() {
        let mut chain = SeedChain::new();
        let commitment = chain.commitment();
        let (reveal, _) = chain.draw("player");

        assert_eq!(reveal.server_seed_hash, commitment.server_seed_hash);
        assert_eq!(reveal.nonce, commitment.nonce);
        assert!(verify(&reveal.server_seed, &commitment.server_seed_hash));
    }

    #[test]
    fn test_draw_rotates_seed_and_nonce() {
        let mut chain = SeedChain::new();
        let before = chain.commitment();
        chain.draw("a");
        let after = chain.commitment();

        assert_ne!(before.server_seed_hash, after.server_seed_hash);
        assert_eq!(after.nonce, before.nonce + 1);
    }

    #[test]
    fn test_rng_is_reproducible() {
        let mut chain = SeedChain::new();
        let (reveal, mut rng) = chain.draw("lucky");
        let mut replay = rng_for(&reveal.server_seed, "lucky", reveal.nonce);

        let a: u64 = rng.r#gen();
        let b: u64 = replay.r#gen();
        assert_eq!(a, b);
    }

    #[test]
    fn test_replay_matches_drawn_outcome() {
        let model = GameModel::default_for(crate::types::GameType::SlotMachine);
        let mut chain = SeedChain::new();
        for _ in 0..10 {
            let (reveal, mut rng) = chain.draw("lucky");
            let drawn = games::outcome(&model, &mut rng);
            assert_eq!(replay(&model, &reveal), drawn);
        }
    }

    #[test]
    fn test_verify_rejects_other_seed() {
        let hash = hash_seed("seed-one");
        assert!(!verify("seed-two", &hash));
        assert!(verify("seed-one", &hash.to_uppercase()));
    }
}
