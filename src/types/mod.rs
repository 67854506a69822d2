//! Type definitions for the fraud classification service

pub mod prediction;
pub mod transaction;

pub use prediction::{Label, PredictionResponse};
pub use transaction::{TransactionRecord, TransactionType};
