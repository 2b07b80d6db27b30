//! Core types for checkout settlement

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Purchased item snapshot
pub type LineItem = deposit_ledger::types::LineItem;

/// Account snapshot returned with a receipt
pub type AccountSnapshot = deposit_ledger::types::AccountSnapshot;

/// Order snapshot
pub type Order = deposit_ledger::types::Order;

/// A cart submitted for settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Total the client computed; must match the server-side total
    pub amount: Decimal,

    /// Client-supplied idempotency key; generated when absent
    #[serde(default)]
    pub order_number: Option<String>,

    /// Cart contents
    pub items: Vec<LineItem>,
}

/// The committed outcome of a checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    /// The recorded order
    pub order: Order,

    /// Account figures after settlement
    pub account: AccountSnapshot,

    /// True when an identical order number was already settled and the
    /// whole checkout was short-circuited without a second debit
    pub duplicate: bool,
}
