//! Main ledger orchestration layer
//!
//! This module ties together storage, the single-writer actor, and
//! metrics into a high-level API for deposit-account operations.
//!
//! # Example
//!
//! ```no_run
//! use deposit_ledger::{Config, Ledger, UserId};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> deposit_ledger::Result<()> {
//!     let config = Config::default();
//!     let ledger = Ledger::open(config).await?;
//!
//!     let user = UserId::new("collector@example.com");
//!     let account = ledger.credit(&user, Decimal::new(100000, 2), "Added funds to account").await?;
//!     assert_eq!(account.balance, Decimal::new(100000, 2));
//!
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    metrics::Metrics,
    storage::StorageStats,
    types::{
        AccountSummary, DepositAccount, LedgerTransaction, Order, TransactionView, UserId,
    },
    Config, Error, Result, Storage,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Main ledger interface
///
/// Explicitly constructed and dependency-injected; owns the storage
/// lifecycle from `open` to `shutdown`.
pub struct Ledger {
    /// Actor handle for mutations
    handle: LedgerHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Prometheus metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        // Open storage
        let storage = Arc::new(Storage::open(&config)?);

        // Spawn the single-writer actor
        let handle = spawn_ledger_actor(storage.clone());

        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to register metrics: {}", e)))?;

        Ok(Self {
            handle,
            storage,
            metrics,
            config,
        })
    }

    /// Credit the account: balance += amount, total_deposits += amount
    ///
    /// The updated account and its deposit transaction commit atomically.
    pub async fn credit(
        &self,
        user_id: &UserId,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Result<DepositAccount> {
        Self::validate_user(user_id)?;
        Self::validate_amount(amount)?;

        let start = Instant::now();
        let account = self
            .handle
            .credit(user_id.clone(), amount, description.into())
            .await?;
        self.metrics.record_mutation_duration(start.elapsed().as_secs_f64());
        self.metrics.record_credit();

        tracing::info!(user_id = %user_id, amount = %amount, "Account credited");

        Ok(account)
    }

    /// Debit the account if the balance covers the amount
    ///
    /// The check-then-mutate is serialized through the writer actor, so
    /// two concurrent debits cannot both pass the check on a stale read.
    /// The settlement layer appends the matching purchase transaction
    /// once the order it pays for is recorded.
    pub async fn debit(&self, user_id: &UserId, amount: Decimal) -> Result<DepositAccount> {
        Self::validate_user(user_id)?;
        Self::validate_amount(amount)?;

        let start = Instant::now();
        let result = self.handle.debit(user_id.clone(), amount).await;
        self.metrics.record_mutation_duration(start.elapsed().as_secs_f64());

        match &result {
            Ok(account) => {
                self.metrics.record_debit();
                tracing::info!(user_id = %user_id, amount = %amount, balance = %account.balance, "Account debited");
            }
            Err(Error::InsufficientFunds {
                current_balance,
                required_amount,
            }) => {
                self.metrics.record_insufficient_funds();
                tracing::debug!(
                    user_id = %user_id,
                    current_balance = %current_balance,
                    required_amount = %required_amount,
                    "Debit rejected: insufficient funds"
                );
            }
            Err(_) => {}
        }

        result
    }

    /// Record an order snapshot
    ///
    /// Pure create: validation is required-field presence only;
    /// price/quantity correctness is the orchestrator's responsibility.
    pub async fn record_order(&self, order: Order) -> Result<()> {
        Self::validate_user(&order.user_id)?;
        if order.order_number.is_empty() {
            return Err(Error::Validation("Order number must not be empty".to_string()));
        }

        self.handle.record_order(order).await
    }

    /// Append a ledger transaction
    pub async fn record_transaction(&self, transaction: LedgerTransaction) -> Result<()> {
        Self::validate_user(&transaction.user_id)?;
        Self::validate_amount(transaction.amount)?;

        self.handle.record_transaction(transaction).await
    }

    /// Fetch the account alone, creating a zero-balance row if absent
    pub async fn account(&self, user_id: &UserId) -> Result<DepositAccount> {
        Self::validate_user(user_id)?;
        self.handle.get_or_create_account(user_id.clone()).await
    }

    /// Look up an order by its externally visible number (idempotency key)
    pub fn find_order_by_number(
        &self,
        user_id: &UserId,
        order_number: &str,
    ) -> Result<Option<Order>> {
        self.storage.find_order_by_number(user_id, order_number)
    }

    /// Get order by internal ID
    pub fn get_order(&self, order_id: Uuid) -> Result<Order> {
        self.storage.get_order(order_id)
    }

    /// Most recent orders for a user, newest first
    pub fn recent_orders(&self, user_id: &UserId, limit: usize) -> Result<Vec<Order>> {
        self.storage.recent_orders(user_id, limit)
    }

    /// Account dashboard read path: balances plus the most recent
    /// transactions, newest first
    ///
    /// Creates (and persists) a zero-balance account when absent. A
    /// malformed stored transaction is served with safe defaults so one
    /// bad record never fails the whole read. Never mutates totals.
    pub async fn account_summary(&self, user_id: &UserId) -> Result<AccountSummary> {
        Self::validate_user(user_id)?;

        let account = self.handle.get_or_create_account(user_id.clone()).await?;

        let transactions = self
            .storage
            .recent_transactions(user_id, self.config.query.recent_transactions)?
            .into_iter()
            .map(|(id, decoded)| match decoded {
                Some(tx) => TransactionView::from_stored(&tx),
                None => TransactionView::placeholder(id),
            })
            .collect();

        Ok(AccountSummary {
            user_id: account.user_id,
            balance: account.balance,
            total_deposits: account.total_deposits,
            total_spent: account.total_spent,
            created_at: account.created_at,
            updated_at: account.updated_at,
            transactions,
        })
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    /// Ledger metrics (for scraping alongside service metrics)
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }

    fn validate_amount(amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(Error::Validation("Amount must be positive".to_string()));
        }
        Ok(())
    }

    fn validate_user(user_id: &UserId) -> Result<()> {
        if user_id.is_empty() {
            return Err(Error::Validation("User id must not be empty".to_string()));
        }
        Ok(())
    }
}
