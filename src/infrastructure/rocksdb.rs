use crate::domain::ports::{StageStore, TransactionStore};
use crate::domain::stage::{Stage, TokenAmount};
use crate::domain::transaction::{NewTransaction, Transaction, TransactionStatus};
use crate::error::{PresaleError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing stage definitions and counters.
pub const CF_STAGES: &str = "stages";
/// Column Family for storing purchase transactions.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for bookkeeping such as the transaction id sequence.
pub const CF_META: &str = "meta";

const NEXT_TRANSACTION_ID: &[u8] = b"next_transaction_id";

/// A persistent ledger store implementation using RocksDB.
///
/// Stages and transactions live in separate Column Families. Every
/// read-modify-write runs under `write_lock`, so conditional updates and the
/// sold-token increment are atomic with respect to each other; RocksDB's own
/// directory lock keeps a second process out.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_STAGES, CF_TRANSACTIONS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PresaleError::InternalError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: u64) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, cf_name: &str, key: u64, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db
            .put_cf(cf, key.to_be_bytes(), serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    /// Applies `change` to one stored stage under the write lock.
    async fn modify_stage<F, R>(&self, stage_id: u64, change: F) -> Result<Option<R>>
    where
        F: FnOnce(&mut Stage) -> Result<R> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let Some(mut stage) = self.read::<Stage>(CF_STAGES, stage_id)? else {
            return Ok(None);
        };
        let outcome = change(&mut stage)?;
        self.write(CF_STAGES, stage_id, &stage)?;
        Ok(Some(outcome))
    }

    /// Persists the transaction only if `apply` reports a change.
    async fn modify_transaction<F>(&self, tx_id: u64, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut Transaction) -> bool + Send,
    {
        let _guard = self.write_lock.lock().await;
        let Some(mut tx) = self.read::<Transaction>(CF_TRANSACTIONS, tx_id)? else {
            return Ok(false);
        };
        if !apply(&mut tx) {
            return Ok(false);
        }
        self.write(CF_TRANSACTIONS, tx_id, &tx)?;
        Ok(true)
    }
}

#[async_trait]
impl StageStore for RocksDBStore {
    async fn all_ordered(&self) -> Result<Vec<Stage>> {
        let mut stages: Vec<Stage> = self.scan(CF_STAGES)?;
        stages.sort_by_key(|s| s.stage_number);
        Ok(stages)
    }

    async fn get(&self, stage_id: u64) -> Result<Option<Stage>> {
        self.read(CF_STAGES, stage_id)
    }

    async fn seed(&self, stage: Stage) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf(CF_STAGES)?;
        // Just check if the key exists without retrieving the value
        if self.db.get_pinned_cf(cf, stage.id.to_be_bytes())?.is_some() {
            return Ok(false);
        }
        self.write(CF_STAGES, stage.id, &stage)?;
        Ok(true)
    }

    async fn reserve(&self, stage_id: u64, amount: TokenAmount) -> Result<bool> {
        let reserved = self
            .modify_stage(stage_id, |stage| Ok(stage.reserve(amount)))
            .await?;
        Ok(reserved.unwrap_or(false))
    }

    async fn release(&self, stage_id: u64, amount: TokenAmount) -> Result<()> {
        self.modify_stage(stage_id, |stage| {
            stage.release(amount);
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn increment_sold(&self, stage_id: u64, amount: TokenAmount) -> Result<()> {
        self.modify_stage(stage_id, |stage| stage.record_sale(amount))
            .await?
            .ok_or(PresaleError::UnknownStage(stage_id))
    }
}

#[async_trait]
impl TransactionStore for RocksDBStore {
    async fn insert(&self, tx: NewTransaction) -> Result<Transaction> {
        let _guard = self.write_lock.lock().await;
        let meta = self.cf(CF_META)?;
        let transactions = self.cf(CF_TRANSACTIONS)?;

        let last_id = match self.db.get_cf(meta, NEXT_TRANSACTION_ID)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    PresaleError::InternalError(Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "Corrupt transaction id sequence",
                    )))
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let id = last_id + 1;
        let stored = Transaction::from_new(id, tx, Utc::now());

        // Sequence and row land together or not at all
        let mut batch = WriteBatch::default();
        batch.put_cf(meta, NEXT_TRANSACTION_ID, id.to_be_bytes());
        batch.put_cf(transactions, id.to_be_bytes(), serde_json::to_vec(&stored)?);
        self.db.write(batch)?;

        Ok(stored)
    }

    async fn get(&self, tx_id: u64) -> Result<Option<Transaction>> {
        self.read(CF_TRANSACTIONS, tx_id)
    }

    async fn attach_payment_id(&self, tx_id: u64, payment_id: &str) -> Result<bool> {
        self.modify_transaction(tx_id, |tx| tx.attach_payment_id(payment_id))
            .await
    }

    async fn complete(&self, tx_id: u64, payment_id: &str) -> Result<bool> {
        self.modify_transaction(tx_id, |tx| tx.complete(payment_id))
            .await
    }

    async fn transition(
        &self,
        tx_id: u64,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<bool> {
        self.modify_transaction(tx_id, |tx| tx.transition(from, to))
            .await
    }

    async fn orphans_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>> {
        let transactions: Vec<Transaction> = self.scan(CF_TRANSACTIONS)?;
        Ok(transactions
            .into_iter()
            .filter(|tx| tx.is_orphan() && tx.created_at < cutoff)
            .collect())
    }
}
