//! Actor-based concurrency for the deposit ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One logical writer task owns every balance mutation, so the debit
//!   check-then-mutate is a single serialized step (no stale-read
//!   double spend between concurrent checkouts)
//! - Async message passing with backpressure (bounded mailbox)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 Gateway (axum)                        │
//! │            Concurrent request handlers                │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ credit / debit / record
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │   load account → check balance → commit WriteBatch   │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::types::{DepositAccount, LedgerTransaction, Order, UserId};
use crate::{Error, Result, Storage};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Credit an account and append its deposit transaction atomically
    Credit {
        /// Account owner
        user_id: UserId,
        /// Positive amount to add
        amount: Decimal,
        /// Transaction description
        description: String,
        /// Reply channel
        response: oneshot::Sender<Result<DepositAccount>>,
    },

    /// Debit an account if and only if the balance covers the amount
    Debit {
        /// Account owner
        user_id: UserId,
        /// Positive amount to take
        amount: Decimal,
        /// Reply channel
        response: oneshot::Sender<Result<DepositAccount>>,
    },

    /// Persist an order snapshot
    RecordOrder {
        /// The order to write
        order: Order,
        /// Reply channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Append a ledger transaction
    RecordTransaction {
        /// The transaction to append
        transaction: LedgerTransaction,
        /// Reply channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Fetch the account, creating a zero-balance row if absent
    GetOrCreateAccount {
        /// Account owner
        user_id: UserId,
        /// Reply channel
        response: oneshot::Sender<Result<DepositAccount>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger messages
pub struct LedgerActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(storage: Arc<Storage>, mailbox: mpsc::Receiver<LedgerMessage>) -> Self {
        Self { storage, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown => break,
                _ => self.handle_message(msg),
            }
        }
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::Credit {
                user_id,
                amount,
                description,
                response,
            } => {
                let _ = response.send(self.credit(user_id, amount, description));
            }

            LedgerMessage::Debit {
                user_id,
                amount,
                response,
            } => {
                let _ = response.send(self.debit(user_id, amount));
            }

            LedgerMessage::RecordOrder { order, response } => {
                let _ = response.send(self.storage.put_order(&order));
            }

            LedgerMessage::RecordTransaction {
                transaction,
                response,
            } => {
                let _ = response.send(self.storage.append_transaction(&transaction));
            }

            LedgerMessage::GetOrCreateAccount { user_id, response } => {
                let _ = response.send(self.get_or_create(user_id));
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    fn get_or_create(&self, user_id: UserId) -> Result<DepositAccount> {
        if let Some(account) = self.storage.get_account(&user_id)? {
            return Ok(account);
        }

        let account = DepositAccount::new(user_id);
        self.storage.put_account(&account)?;

        tracing::info!(user_id = %account.user_id, "Created deposit account");

        Ok(account)
    }

    fn credit(&self, user_id: UserId, amount: Decimal, description: String) -> Result<DepositAccount> {
        let mut account = self.get_or_create(user_id.clone())?;

        account.balance += amount;
        account.total_deposits += amount;
        account.updated_at = chrono::Utc::now();

        let transaction = LedgerTransaction::deposit(user_id, amount, description);

        // Account and deposit row land in one WriteBatch
        self.storage.commit_credit(&account, &transaction)?;

        Ok(account)
    }

    fn debit(&self, user_id: UserId, amount: Decimal) -> Result<DepositAccount> {
        let mut account = self.get_or_create(user_id)?;

        if account.balance < amount {
            return Err(Error::InsufficientFunds {
                current_balance: account.balance,
                required_amount: amount,
            });
        }

        account.balance -= amount;
        account.total_spent += amount;
        account.updated_at = chrono::Utc::now();

        self.storage.commit_debit(&account)?;

        Ok(account)
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn send<T>(
        &self,
        msg: LedgerMessage,
        rx: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Credit an account
    pub async fn credit(
        &self,
        user_id: UserId,
        amount: Decimal,
        description: String,
    ) -> Result<DepositAccount> {
        let (tx, rx) = oneshot::channel();
        self.send(
            LedgerMessage::Credit {
                user_id,
                amount,
                description,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Debit an account (atomic balance check)
    pub async fn debit(&self, user_id: UserId, amount: Decimal) -> Result<DepositAccount> {
        let (tx, rx) = oneshot::channel();
        self.send(
            LedgerMessage::Debit {
                user_id,
                amount,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Persist an order
    pub async fn record_order(&self, order: Order) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerMessage::RecordOrder { order, response: tx }, rx)
            .await
    }

    /// Append a transaction
    pub async fn record_transaction(&self, transaction: LedgerTransaction) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(
            LedgerMessage::RecordTransaction {
                transaction,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Fetch or lazily create the account
    pub async fn get_or_create_account(&self, user_id: UserId) -> Result<DepositAccount> {
        let (tx, rx) = oneshot::channel();
        self.send(
            LedgerMessage::GetOrCreateAccount {
                user_id,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(storage: Arc<Storage>) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(1000); // Bounded channel for backpressure
    let actor = LedgerActor::new(storage, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
