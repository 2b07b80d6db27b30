//! Checkout settlement engine
//!
//! Converts a cart plus an order reference into one committed
//! (Order, Transaction, updated DepositAccount) triple, or none of them.
//!
//! Step order matters: the atomic debit goes first, and only a
//! successful debit is followed by the order and transaction writes.
//! A failure after the debit is a partial commit, surfaced loudly
//! with full reconciliation context, never swallowed.

use crate::{
    config::CheckoutConfig,
    error::{Error, Result},
    pricing::PricingPolicy,
    types::{CheckoutReceipt, CheckoutRequest, LineItem},
};
use deposit_ledger::{Ledger, LedgerTransaction, Order, UserId};
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Checkout settlement engine
pub struct CheckoutEngine {
    /// Deposit ledger
    ledger: Arc<Ledger>,

    /// Pricing policy
    pricing: PricingPolicy,

    /// Configuration
    config: CheckoutConfig,
}

impl CheckoutEngine {
    /// Create new checkout engine
    pub fn new(ledger: Arc<Ledger>, config: CheckoutConfig) -> Self {
        let pricing = PricingPolicy::new(config.speed_post_surcharge);

        Self {
            ledger,
            pricing,
            config,
        }
    }

    /// Settle a cart against the user's deposit account
    ///
    /// On `InsufficientFunds` nothing is written and the caller gets
    /// the current balance and required amount for the top-up flow.
    /// A repeated order number short-circuits without a second debit.
    pub async fn checkout(
        &self,
        user_id: &UserId,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt> {
        // Upfront validation, before any store access
        if request.items.is_empty() {
            return Err(Error::Validation("Cart must not be empty".to_string()));
        }
        if request.amount <= Decimal::ZERO {
            return Err(Error::Validation("Amount must be positive".to_string()));
        }
        self.pricing.validate_items(&request.items)?;

        // Server-side price verification
        let computed = self.pricing.cart_total(&request.items);
        if self.config.enforce_cart_total && computed != request.amount {
            return Err(Error::AmountMismatch {
                submitted: request.amount,
                computed,
            });
        }

        let order_number = match request.order_number.as_deref() {
            Some(number) if !number.is_empty() => number.to_string(),
            _ => Self::generate_order_number(),
        };

        // Idempotency: a retried checkout with the same order number
        // must not debit twice
        if let Some(existing) = self.ledger.find_order_by_number(user_id, &order_number)? {
            tracing::info!(
                user_id = %user_id,
                order_number = %order_number,
                "Duplicate order number, returning existing order"
            );

            let account = self.ledger.account(user_id).await?;
            return Ok(CheckoutReceipt {
                order: existing,
                account: account.snapshot(),
                duplicate: true,
            });
        }

        tracing::info!(
            user_id = %user_id,
            order_number = %order_number,
            amount = %request.amount,
            items = request.items.len(),
            "Starting checkout settlement"
        );

        // Step 1: atomic debit; InsufficientFunds aborts the whole
        // operation with nothing written
        let account = self.ledger.debit(user_id, request.amount).await?;

        // Step 2: record the order snapshot
        let order = Order::settled(
            user_id.clone(),
            order_number.clone(),
            request.amount,
            request.items.clone(),
        );

        if let Err(e) = self.record_order_with_retry(&order).await {
            tracing::error!(
                user_id = %user_id,
                amount = %request.amount,
                order_number = %order_number,
                error = %e,
                "Partial commit: debit committed but order write failed"
            );
            return Err(Error::PartialCommit {
                user_id: user_id.to_string(),
                amount: request.amount,
                order_number,
                reason: format!("order write failed: {}", e),
            });
        }

        // Step 3: append the purchase transaction referencing the order
        let transaction = LedgerTransaction::purchase(
            user_id.clone(),
            request.amount,
            Self::purchase_description(&order_number, &request.items),
            order.order_id,
            request.items.clone(),
        );

        if let Err(e) = self.record_transaction_with_retry(&transaction).await {
            tracing::error!(
                user_id = %user_id,
                amount = %request.amount,
                order_number = %order_number,
                order_id = %order.order_id,
                error = %e,
                "Partial commit: debit and order committed but transaction write failed"
            );
            return Err(Error::PartialCommit {
                user_id: user_id.to_string(),
                amount: request.amount,
                order_number,
                reason: format!("transaction write failed: {}", e),
            });
        }

        tracing::info!(
            user_id = %user_id,
            order_number = %order.order_number,
            order_id = %order.order_id,
            balance = %account.balance,
            "Checkout settled"
        );

        Ok(CheckoutReceipt {
            order,
            account: account.snapshot(),
            duplicate: false,
        })
    }

    async fn record_order_with_retry(&self, order: &Order) -> deposit_ledger::Result<()> {
        let mut attempt = 0;
        loop {
            match self.ledger.record_order(order.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.config.settlement_write_retries => {
                    attempt += 1;
                    tracing::warn!(
                        order_number = %order.order_number,
                        attempt,
                        error = %e,
                        "Retrying order write after committed debit"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn record_transaction_with_retry(
        &self,
        transaction: &LedgerTransaction,
    ) -> deposit_ledger::Result<()> {
        let mut attempt = 0;
        loop {
            match self.ledger.record_transaction(transaction.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.config.settlement_write_retries => {
                    attempt += 1;
                    tracing::warn!(
                        transaction_id = %transaction.transaction_id,
                        attempt,
                        error = %e,
                        "Retrying transaction write after committed debit"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Externally visible order reference for carts that did not bring
    /// their own idempotency key
    fn generate_order_number() -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix = rand::thread_rng().gen_range(0..1000);
        format!("ORD-{}-{}", millis, suffix)
    }

    /// Transaction description summarizing the purchased item names
    fn purchase_description(order_number: &str, items: &[LineItem]) -> String {
        let names: Vec<&str> = items.iter().map(|item| item.name.as_str()).collect();
        if names.is_empty() {
            format!("Purchase - Order #{}", order_number)
        } else {
            format!("Purchase - Order #{} ({})", order_number, names.join(", "))
        }
    }
}
