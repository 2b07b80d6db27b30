//! Configuration for checkout settlement

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Checkout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Flat surcharge added once per item flagged for express delivery
    pub speed_post_surcharge: Decimal,

    /// Reject carts whose submitted total disagrees with the
    /// server-side computation. Off restores the legacy
    /// trust-the-client behavior for internal cart deployments.
    pub enforce_cart_total: bool,

    /// How many times the order/transaction writes are retried after a
    /// committed debit before giving up with a partial-commit error
    pub settlement_write_retries: u32,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            speed_post_surcharge: Decimal::new(10, 0),
            enforce_cart_total: true,
            settlement_write_retries: 2,
        }
    }
}
