//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - One deposit account per user (key: user_id)
//! - `transactions` - Append-only ledger entries (key: transaction_id, UUIDv7 so keys sort by time)
//! - `orders` - Immutable order snapshots (key: order_id)
//! - `indices` - Secondary indices for per-user scans and order-number lookup

use crate::{
    error::{Error, Result},
    types::{DepositAccount, LedgerTransaction, Order, UserId},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_TRANSACTIONS: &str = "transactions";
const CF_ORDERS: &str = "orders";
const CF_INDICES: &str = "indices";

/// Index key tags (first byte of every index key)
const IDX_USER_TX: u8 = b't';
const IDX_ORDER_NUMBER: u8 = b'n';
const IDX_USER_ORDER: u8 = b'o';

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
    // Column family handles are stored in DB, accessed by name
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for the append-heavy transaction log
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        // Column family descriptors
        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_transactions()),
            ColumnFamilyDescriptor::new(CF_ORDERS, Self::cf_options_orders()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        // Open database
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_accounts() -> Options {
        let mut opts = Options::default();
        // Accounts are read on every request, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_transactions() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_orders() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Indices benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Account operations

    /// Get account by user, None if never created
    pub fn get_account(&self, user_id: &UserId) -> Result<Option<DepositAccount>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;

        let value = self.db.get_cf(cf, user_id.as_str().as_bytes())?;
        match value {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Put account (create or overwrite)
    pub fn put_account(&self, account: &DepositAccount) -> Result<()> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let value = bincode::serialize(account)?;

        self.db.put_cf(cf, account.user_id.as_str().as_bytes(), &value)?;

        Ok(())
    }

    /// Commit a credit: updated account plus its deposit transaction,
    /// atomically (one WriteBatch)
    pub fn commit_credit(
        &self,
        account: &DepositAccount,
        transaction: &LedgerTransaction,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        // 1. Account
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let account_value = bincode::serialize(account)?;
        batch.put_cf(cf_accounts, account.user_id.as_str().as_bytes(), &account_value);

        // 2. Transaction
        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        let tx_value = bincode::serialize(transaction)?;
        batch.put_cf(
            cf_transactions,
            transaction.transaction_id.as_bytes(),
            &tx_value,
        );

        // 3. Index: user -> transaction
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx = Self::index_key_user_transaction(&transaction.user_id, transaction.transaction_id);
        batch.put_cf(cf_indices, &idx, []);

        // Atomic commit
        self.db.write(batch)?;

        tracing::debug!(
            user_id = %account.user_id,
            transaction_id = %transaction.transaction_id,
            "Credit committed"
        );

        Ok(())
    }

    /// Commit a debit: the updated account row alone
    ///
    /// The balance check happens in the single-writer actor; the order
    /// and transaction rows follow as separate appends.
    pub fn commit_debit(&self, account: &DepositAccount) -> Result<()> {
        self.put_account(account)?;

        tracing::debug!(user_id = %account.user_id, balance = %account.balance, "Debit committed");

        Ok(())
    }

    // Transaction operations

    /// Append transaction with its user index (atomic)
    pub fn append_transaction(&self, transaction: &LedgerTransaction) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        let value = bincode::serialize(transaction)?;
        batch.put_cf(
            cf_transactions,
            transaction.transaction_id.as_bytes(),
            &value,
        );

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx = Self::index_key_user_transaction(&transaction.user_id, transaction.transaction_id);
        batch.put_cf(cf_indices, &idx, []);

        self.db.write(batch)?;

        tracing::debug!(
            transaction_id = %transaction.transaction_id,
            kind = %transaction.kind,
            "Transaction appended"
        );

        Ok(())
    }

    /// Get transaction by ID
    pub fn get_transaction(&self, transaction_id: Uuid) -> Result<LedgerTransaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;

        let value = self
            .db
            .get_cf(cf, transaction_id.as_bytes())?
            .ok_or_else(|| Error::TransactionNotFound(transaction_id.to_string()))?;

        let transaction: LedgerTransaction = bincode::deserialize(&value)?;
        Ok(transaction)
    }

    /// Most recent transactions for a user, newest first
    ///
    /// Decode failures are tolerated per row: a corrupt record comes
    /// back as `(id, None)` so the read path can substitute defaults.
    pub fn recent_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<(Uuid, Option<LedgerTransaction>)>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;

        // Scan index tag|user|tx_id in reverse; UUIDv7 keys sort by time
        let prefix = Self::index_prefix_user_transaction(user_id);
        let mut upper = prefix.clone();
        upper.extend_from_slice(&[0xff; 16]);

        let iter = self
            .db
            .iterator_cf(cf_indices, IteratorMode::From(&upper, Direction::Reverse));

        let mut results = Vec::with_capacity(limit);
        for item in iter {
            let (key, _) = item?;

            if !key.starts_with(&prefix) {
                break;
            }
            if results.len() >= limit {
                break;
            }

            // Extract transaction id (last 16 bytes of the index key)
            if key.len() < prefix.len() + 16 {
                continue;
            }
            let id_bytes: [u8; 16] = key[key.len() - 16..].try_into().unwrap();
            let transaction_id = Uuid::from_bytes(id_bytes);

            let decoded = match self.db.get_cf(cf_transactions, transaction_id.as_bytes())? {
                Some(bytes) => match bincode::deserialize::<LedgerTransaction>(&bytes) {
                    Ok(tx) => Some(tx),
                    Err(e) => {
                        tracing::warn!(
                            transaction_id = %transaction_id,
                            error = %e,
                            "Skipping undecodable transaction row"
                        );
                        None
                    }
                },
                None => None,
            };

            results.push((transaction_id, decoded));
        }

        Ok(results)
    }

    // Order operations

    /// Put order with its number and user indices (atomic)
    pub fn put_order(&self, order: &Order) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_orders = self.cf_handle(CF_ORDERS)?;
        let value = bincode::serialize(order)?;
        batch.put_cf(cf_orders, order.order_id.as_bytes(), &value);

        let cf_indices = self.cf_handle(CF_INDICES)?;

        // Index: (user, order_number) -> order_id, for idempotent retries
        let idx_number = Self::index_key_order_number(&order.user_id, &order.order_number);
        batch.put_cf(cf_indices, &idx_number, order.order_id.as_bytes());

        // Index: user -> order, for the order history page
        let idx_user = Self::index_key_user_order(&order.user_id, order.order_id);
        batch.put_cf(cf_indices, &idx_user, []);

        self.db.write(batch)?;

        tracing::debug!(
            order_id = %order.order_id,
            order_number = %order.order_number,
            "Order recorded"
        );

        Ok(())
    }

    /// Get order by internal ID
    pub fn get_order(&self, order_id: Uuid) -> Result<Order> {
        let cf = self.cf_handle(CF_ORDERS)?;

        let value = self
            .db
            .get_cf(cf, order_id.as_bytes())?
            .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;

        let order: Order = bincode::deserialize(&value)?;
        Ok(order)
    }

    /// Look up an order by its externally visible number
    pub fn find_order_by_number(
        &self,
        user_id: &UserId,
        order_number: &str,
    ) -> Result<Option<Order>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let key = Self::index_key_order_number(user_id, order_number);
        let value = self.db.get_cf(cf_indices, &key)?;

        match value {
            Some(bytes) if bytes.len() == 16 => {
                let id_bytes: [u8; 16] = bytes[..16].try_into().unwrap();
                Ok(Some(self.get_order(Uuid::from_bytes(id_bytes))?))
            }
            Some(_) => Err(Error::Storage("Malformed order-number index entry".to_string())),
            None => Ok(None),
        }
    }

    /// Most recent orders for a user, newest first
    pub fn recent_orders(&self, user_id: &UserId, limit: usize) -> Result<Vec<Order>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let prefix = Self::index_prefix_user_order(user_id);
        let mut upper = prefix.clone();
        upper.extend_from_slice(&[0xff; 16]);

        let iter = self
            .db
            .iterator_cf(cf_indices, IteratorMode::From(&upper, Direction::Reverse));

        let mut orders = Vec::with_capacity(limit);
        for item in iter {
            let (key, _) = item?;

            if !key.starts_with(&prefix) {
                break;
            }
            if orders.len() >= limit {
                break;
            }
            if key.len() < prefix.len() + 16 {
                continue;
            }

            let id_bytes: [u8; 16] = key[key.len() - 16..].try_into().unwrap();
            orders.push(self.get_order(Uuid::from_bytes(id_bytes))?);
        }

        Ok(orders)
    }

    // Index key helpers

    fn index_prefix_user_transaction(user_id: &UserId) -> Vec<u8> {
        let mut key = vec![IDX_USER_TX];
        key.extend_from_slice(user_id.as_str().as_bytes());
        key.push(b'|'); // Separator
        key
    }

    fn index_key_user_transaction(user_id: &UserId, transaction_id: Uuid) -> Vec<u8> {
        let mut key = Self::index_prefix_user_transaction(user_id);
        key.extend_from_slice(transaction_id.as_bytes());
        key
    }

    fn index_key_order_number(user_id: &UserId, order_number: &str) -> Vec<u8> {
        let mut key = vec![IDX_ORDER_NUMBER];
        key.extend_from_slice(user_id.as_str().as_bytes());
        key.push(b'|');
        key.extend_from_slice(order_number.as_bytes());
        key
    }

    fn index_prefix_user_order(user_id: &UserId) -> Vec<u8> {
        let mut key = vec![IDX_USER_ORDER];
        key.extend_from_slice(user_id.as_str().as_bytes());
        key.push(b'|');
        key
    }

    fn index_key_user_order(user_id: &UserId, order_id: Uuid) -> Vec<u8> {
        let mut key = Self::index_prefix_user_order(user_id);
        key.extend_from_slice(order_id.as_bytes());
        key
    }

    /// Overwrite a transaction row with raw bytes, keeping its index.
    /// Test hook for exercising the corrupt-row read path.
    #[doc(hidden)]
    pub fn put_raw_transaction_record(
        &self,
        user_id: &UserId,
        transaction_id: Uuid,
        bytes: &[u8],
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        batch.put_cf(cf_transactions, transaction_id.as_bytes(), bytes);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx = Self::index_key_user_transaction(user_id, transaction_id);
        batch.put_cf(cf_indices, &idx, []);

        self.db.write(batch)?;
        Ok(())
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        let cf_orders = self.cf_handle(CF_ORDERS)?;

        Ok(StorageStats {
            total_accounts: self.approximate_count(cf_accounts)?,
            total_transactions: self.approximate_count(cf_transactions)?,
            total_orders: self.approximate_count(cf_orders)?,
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        // RocksDB property for approximate count
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Approximate account count
    pub total_accounts: u64,
    /// Approximate transaction count
    pub total_transactions: u64,
    /// Approximate order count
    pub total_orders: u64,
}
