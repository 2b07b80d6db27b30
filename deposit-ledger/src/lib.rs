//! StampPay Deposit Ledger
//!
//! Per-user prepaid deposit accounts with an append-only transaction
//! log and immutable order snapshots.
//!
//! # Architecture
//!
//! - **Single Writer**: every balance mutation flows through one actor
//!   task, so the debit check-then-mutate is serialized
//! - **Atomic Commits**: account row and ledger row land in one
//!   RocksDB WriteBatch
//! - **Append-only**: transactions and orders are never modified or
//!   deleted; corrections are new transactions
//!
//! # Invariants
//!
//! - `balance == total_deposits - total_spent` in every committed state
//! - Balance never goes negative: an over-debit mutates nothing
//! - Exactly one transaction row per successful credit or settled
//!   checkout

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use storage::Storage;
pub use types::{
    AccountSnapshot, AccountSummary, DepositAccount, LedgerTransaction, LineItem, Order,
    OrderStatus, TransactionKind, TransactionStatus, TransactionView, UserId,
};
