mod challenges;
mod sessions;

pub use challenges::{Challenge, ChallengeStore, wallet_key};
pub use sessions::{AuthenticatedWallet, SessionStore};
