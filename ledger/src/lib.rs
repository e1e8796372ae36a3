pub mod account;
pub mod casino;
pub mod error;
pub mod fairness;
pub mod games;
pub mod pool;
pub mod rates;
pub mod repository;
pub mod settlement;
pub mod types;

pub use error::{LedgerError, Result};
