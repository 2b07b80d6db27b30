//! Core types for the deposit ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for money)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User identifier (the authenticated principal's opaque identity)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create new user ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identity is empty (never valid for ledger rows)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Prepaid deposit account, one per user
///
/// Invariant: `balance == total_deposits - total_spent` in every
/// committed state, and balance never goes negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositAccount {
    /// Owning user (unique)
    pub user_id: UserId,

    /// Current spendable balance
    pub balance: Decimal,

    /// Cumulative deposits (monotonic)
    pub total_deposits: Decimal,

    /// Cumulative spend (monotonic)
    pub total_spent: Decimal,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutated timestamp
    pub updated_at: DateTime<Utc>,
}

impl DepositAccount {
    /// Fresh zero-balance account
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            balance: Decimal::ZERO,
            total_deposits: Decimal::ZERO,
            total_spent: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the balance invariant
    pub fn is_consistent(&self) -> bool {
        self.balance == self.total_deposits - self.total_spent && self.balance >= Decimal::ZERO
    }

    /// Snapshot of the three balance figures
    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            balance: self.balance,
            total_deposits: self.total_deposits,
            total_spent: self.total_spent,
        }
    }
}

/// Point-in-time view of an account's balance figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Current spendable balance
    pub balance: Decimal,
    /// Cumulative deposits
    pub total_deposits: Decimal,
    /// Cumulative spend
    pub total_spent: Decimal,
}

/// Ledger transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionKind {
    /// Funds added to the account
    Deposit = 1,
    /// Funds taken out of the account
    Withdrawal = 2,
    /// Funds spent on a checkout
    Purchase = 3,
}

impl TransactionKind {
    /// Stable wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Purchase => "purchase",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ledger transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionStatus {
    /// Awaiting settlement
    Pending = 1,
    /// Settled
    Completed = 2,
    /// Settlement failed
    Failed = 3,
}

/// One purchased item as snapshotted on orders and purchase transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Catalog item id
    pub id: String,

    /// Display name
    pub name: String,

    /// Unit price at purchase time
    pub unit_price: Decimal,

    /// Units purchased
    pub quantity: u32,

    /// Express-delivery flag (flat surcharge per flagged item)
    #[serde(default)]
    pub speed_post: bool,

    /// Optional image reference
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Immutable ledger entry recording a balance-affecting event
///
/// Corrections happen via new transactions, never edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Unique transaction ID (UUIDv7 for time-ordering)
    pub transaction_id: Uuid,

    /// Owning user
    pub user_id: UserId,

    /// Kind of balance movement
    pub kind: TransactionKind,

    /// Positive magnitude
    pub amount: Decimal,

    /// Free-text description
    pub description: String,

    /// Order settled by this transaction, if any
    pub order_id: Option<Uuid>,

    /// Settlement status
    pub status: TransactionStatus,

    /// Item snapshot for purchase transactions
    #[serde(default)]
    pub items: Vec<LineItem>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    /// Build a completed deposit entry
    pub fn deposit(user_id: UserId, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            transaction_id: Uuid::now_v7(),
            user_id,
            kind: TransactionKind::Deposit,
            amount,
            description: description.into(),
            order_id: None,
            status: TransactionStatus::Completed,
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Build a completed purchase entry referencing an order
    pub fn purchase(
        user_id: UserId,
        amount: Decimal,
        description: impl Into<String>,
        order_id: Uuid,
        items: Vec<LineItem>,
    ) -> Self {
        Self {
            transaction_id: Uuid::now_v7(),
            user_id,
            kind: TransactionKind::Purchase,
            amount,
            description: description.into(),
            order_id: Some(order_id),
            status: TransactionStatus::Completed,
            items,
            created_at: Utc::now(),
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum OrderStatus {
    /// Awaiting processing
    Pending = 1,
    /// Being fulfilled
    Processing = 2,
    /// Fulfilled (terminal)
    Completed = 3,
    /// Cancelled (terminal)
    Cancelled = 4,
}

impl OrderStatus {
    /// Stable wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Valid transitions: pending → processing → completed, or
    /// pending → cancelled. Checkout jumps straight to completed on
    /// synchronous settlement.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Processing)
                | (OrderStatus::Pending, OrderStatus::Completed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Processing, OrderStatus::Completed)
        )
    }

    /// Check if status is terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

/// Immutable snapshot of a purchase, distinct from the ledger
/// transaction that paid for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Internal id
    pub order_id: Uuid,

    /// Externally visible order number (idempotency key)
    pub order_number: String,

    /// Owning user
    pub user_id: UserId,

    /// Total settled amount
    pub total_amount: Decimal,

    /// Fulfillment status
    pub status: OrderStatus,

    /// Item snapshot (immutable once written)
    pub items: Vec<LineItem>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Build an order settled synchronously at checkout
    pub fn settled(
        user_id: UserId,
        order_number: impl Into<String>,
        total_amount: Decimal,
        items: Vec<LineItem>,
    ) -> Self {
        Self {
            order_id: Uuid::now_v7(),
            order_number: order_number.into(),
            user_id,
            total_amount,
            status: OrderStatus::Completed,
            items,
            created_at: Utc::now(),
        }
    }
}

/// Stable minimal transaction shape served by the account dashboard
///
/// Fields are defaulted defensively when a stored row is malformed so a
/// single bad record never fails the whole read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionView {
    /// Transaction id
    pub id: String,

    /// Kind as a stable string, "unknown" when undecodable
    pub kind: String,

    /// Amount, zero when undecodable
    pub amount: Decimal,

    /// Description, empty when undecodable
    pub description: String,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl TransactionView {
    /// View over a decoded row
    pub fn from_stored(tx: &LedgerTransaction) -> Self {
        Self {
            id: tx.transaction_id.to_string(),
            kind: tx.kind.as_str().to_string(),
            amount: tx.amount,
            description: tx.description.clone(),
            created_at: tx.created_at,
        }
    }

    /// Safe placeholder for a row that failed to decode
    pub fn placeholder(transaction_id: Uuid) -> Self {
        Self {
            id: transaction_id.to_string(),
            kind: "unknown".to_string(),
            amount: Decimal::ZERO,
            description: String::new(),
            created_at: Utc::now(),
        }
    }
}

/// Account dashboard payload: balances plus recent activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    /// Owning user
    pub user_id: UserId,

    /// Current spendable balance
    pub balance: Decimal,

    /// Cumulative deposits
    pub total_deposits: Decimal,

    /// Cumulative spend
    pub total_spent: Decimal,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutated timestamp
    pub updated_at: DateTime<Utc>,

    /// Most recent transactions, newest first
    pub transactions: Vec<TransactionView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_is_consistent() {
        let account = DepositAccount::new(UserId::new("collector@example.com"));
        assert!(account.is_consistent());
        assert_eq!(account.balance, Decimal::ZERO);
    }

    #[test]
    fn test_consistency_detects_drift() {
        let mut account = DepositAccount::new(UserId::new("collector@example.com"));
        account.balance = Decimal::new(100, 0);
        assert!(!account.is_consistent());

        account.total_deposits = Decimal::new(100, 0);
        assert!(account.is_consistent());
    }

    #[test]
    fn test_order_status_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Completed));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Completed));

        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Completed.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
    }

    #[test]
    fn test_transaction_kind_wire_names() {
        assert_eq!(TransactionKind::Deposit.as_str(), "deposit");
        assert_eq!(TransactionKind::Withdrawal.as_str(), "withdrawal");
        assert_eq!(TransactionKind::Purchase.as_str(), "purchase");
    }

    #[test]
    fn test_placeholder_view_defaults() {
        let id = Uuid::now_v7();
        let view = TransactionView::placeholder(id);
        assert_eq!(view.id, id.to_string());
        assert_eq!(view.kind, "unknown");
        assert_eq!(view.amount, Decimal::ZERO);
        assert!(view.description.is_empty());
    }

    #[test]
    fn test_view_from_stored() {
        let tx = LedgerTransaction::deposit(
            UserId::new("collector@example.com"),
            Decimal::new(50000, 2), // 500.00
            "Added funds to account",
        );
        let view = TransactionView::from_stored(&tx);
        assert_eq!(view.kind, "deposit");
        assert_eq!(view.amount, tx.amount);
        assert_eq!(view.description, "Added funds to account");
    }
}
