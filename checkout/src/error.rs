//! Error types for checkout settlement

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for checkout operations
pub type Result<T> = std::result::Result<T, Error>;

/// Checkout errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error (includes InsufficientFunds from the debit step)
    #[error("Ledger error: {0}")]
    Ledger(#[from] deposit_ledger::Error),

    /// Rejected before any store access
    #[error("Validation error: {0}")]
    Validation(String),

    /// Submitted cart total disagrees with the server-side computation
    #[error("Amount mismatch: submitted {submitted}, computed {computed}")]
    AmountMismatch {
        /// Total the client sent
        submitted: Decimal,
        /// Total recomputed from item prices
        computed: Decimal,
    },

    /// Debit committed but a later order/transaction write did not
    ///
    /// Carries enough context for reconciliation; the debit is not
    /// reversible by this subsystem.
    #[error("Partial commit for user {user_id}, order {order_number}, amount {amount}: {reason}")]
    PartialCommit {
        /// Debited user
        user_id: String,
        /// Debited amount
        amount: Decimal,
        /// Attempted order reference
        order_number: String,
        /// What failed after the debit
        reason: String,
    },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Expected, user-facing rejections that require no operator action
    pub fn is_user_error(&self) -> bool {
        match self {
            Error::Validation(_) | Error::AmountMismatch { .. } => true,
            Error::Ledger(inner) => inner.is_user_error(),
            _ => false,
        }
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
