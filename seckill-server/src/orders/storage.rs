//! redb-based storage layer for finalized orders
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `VoucherOrder` | Durable order records |
//! | `user_voucher_index` | `(user_id, voucher_id)` | `order_id` | Uniqueness index |
//! | `vouchers` | `voucher_id` | `SeckillVoucher` | Published voucher definitions |
//! | `dead_letter` | `order_id` | `DeadLetterDraft` | Unfinalizable admitted drafts |
//!
//! # Unit of work
//!
//! [`OrderStorage::insert_order_unique`] performs the per-user existence
//! check and the record insert inside one write transaction, so the
//! "at most one order per (user, voucher)" invariant holds even if two
//! drafts for the same pair reach finalization. redb commits are
//! copy-on-write with an atomic pointer swap, leaving the file
//! consistent across power loss.

use std::path::Path;
use std::sync::Arc;

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
};
use shared::{OrderId, SeckillVoucher, UserId, VoucherId, VoucherOrder};
use thiserror::Error;

/// Durable order records: key = order id, value = JSON-serialized VoucherOrder
const ORDERS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("orders");

/// Uniqueness index: key = (user_id, voucher_id), value = order id
const USER_VOUCHER_TABLE: TableDefinition<(i64, i64), i64> =
    TableDefinition::new("user_voucher_index");

/// Published vouchers: key = voucher id, value = JSON-serialized SeckillVoucher
const VOUCHERS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("vouchers");

/// Dead letter queue: key = order id, value = JSON-serialized DeadLetterDraft
const DEAD_LETTER_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("dead_letter");

/// An admitted draft that could not be finalized
///
/// Stock was already decremented and the membership marker set when the
/// draft was admitted, so these entries are the reconciliation surface:
/// an operator (or a compensation job) decides whether to restock or to
/// replay the order.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DeadLetterDraft {
    pub draft: VoucherOrder,
    /// Unix millis of the final failed attempt
    pub failed_at: i64,
    pub attempts: u32,
    pub reason: String,
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Order storage backed by redb
#[derive(Clone)]
pub struct OrderStorage {
    db: Arc<Database>,
}

impl OrderStorage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::with_database(db)
    }

    /// In-memory database for tests and single-process experiments
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::with_database(db)
    }

    fn with_database(db: Database) -> StorageResult<Self> {
        // Create all tables up front so read transactions never race
        // table creation.
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(USER_VOUCHER_TABLE)?;
            let _ = write_txn.open_table(VOUCHERS_TABLE)?;
            let _ = write_txn.open_table(DEAD_LETTER_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Insert the order record unless one already exists for its
    /// `(user, voucher)` pair. Check and insert share one write
    /// transaction. Returns whether the record was inserted.
    pub fn insert_order_unique(&self, order: &VoucherOrder) -> StorageResult<bool> {
        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut index = write_txn.open_table(USER_VOUCHER_TABLE)?;
            if index.get((order.user_id, order.voucher_id))?.is_some() {
                false
            } else {
                index.insert((order.user_id, order.voucher_id), order.id)?;
                let mut orders = write_txn.open_table(ORDERS_TABLE)?;
                let bytes = serde_json::to_vec(order)?;
                orders.insert(order.id, bytes.as_slice())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    /// Whether a durable record exists for `(user, voucher)`
    pub fn order_exists(&self, user_id: UserId, voucher_id: VoucherId) -> StorageResult<bool> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(USER_VOUCHER_TABLE)?;
        Ok(index.get((user_id, voucher_id))?.is_some())
    }

    /// Fetch an order record by id
    pub fn get_order(&self, order_id: OrderId) -> StorageResult<Option<VoucherOrder>> {
        let read_txn = self.db.begin_read()?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;
        match orders.get(order_id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Fetch the order record for `(user, voucher)` via the index
    pub fn find_order(
        &self,
        user_id: UserId,
        voucher_id: VoucherId,
    ) -> StorageResult<Option<VoucherOrder>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(USER_VOUCHER_TABLE)?;
        let Some(guard) = index.get((user_id, voucher_id))? else {
            return Ok(None);
        };
        let order_id = guard.value();
        drop(guard);
        let orders = read_txn.open_table(ORDERS_TABLE)?;
        match orders.get(order_id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Total number of durable order records
    pub fn order_count(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;
        Ok(orders.len()?)
    }

    /// Persist a voucher definition (overwrites any previous version)
    pub fn put_voucher(&self, voucher: &SeckillVoucher) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut vouchers = write_txn.open_table(VOUCHERS_TABLE)?;
            let bytes = serde_json::to_vec(voucher)?;
            vouchers.insert(voucher.id, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Fetch a voucher definition
    pub fn get_voucher(&self, voucher_id: VoucherId) -> StorageResult<Option<SeckillVoucher>> {
        let read_txn = self.db.begin_read()?;
        let vouchers = read_txn.open_table(VOUCHERS_TABLE)?;
        match vouchers.get(voucher_id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Record an unfinalizable draft for later reconciliation
    pub fn push_dead_letter(&self, entry: &DeadLetterDraft) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut dead = write_txn.open_table(DEAD_LETTER_TABLE)?;
            let bytes = serde_json::to_vec(entry)?;
            dead.insert(entry.draft.id, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// All dead-lettered drafts, in order id order
    pub fn dead_letters(&self) -> StorageResult<Vec<DeadLetterDraft>> {
        let read_txn = self.db.begin_read()?;
        let dead = read_txn.open_table(DEAD_LETTER_TABLE)?;
        let mut entries = Vec::new();
        for item in dead.iter()? {
            let (_, value) = item?;
            entries.push(serde_json::from_slice(value.value())?);
        }
        Ok(entries)
    }
}
