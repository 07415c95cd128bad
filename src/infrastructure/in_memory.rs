use crate::domain::ports::{StageStore, TransactionStore};
use crate::domain::stage::{Stage, TokenAmount};
use crate::domain::transaction::{NewTransaction, Transaction, TransactionStatus};
use crate::error::{PresaleError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for presale stages.
///
/// Every mutation runs under a single write guard, which is what makes
/// `reserve` and `increment_sold` atomic for concurrent callers.
#[derive(Default, Clone)]
pub struct InMemoryStageStore {
    stages: Arc<RwLock<HashMap<u64, Stage>>>,
}

impl InMemoryStageStore {
    /// Creates a new, empty in-memory stage store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StageStore for InMemoryStageStore {
    async fn all_ordered(&self) -> Result<Vec<Stage>> {
        let stages = self.stages.read().await;
        let mut ordered: Vec<Stage> = stages.values().cloned().collect();
        ordered.sort_by_key(|s| s.stage_number);
        Ok(ordered)
    }

    async fn get(&self, stage_id: u64) -> Result<Option<Stage>> {
        let stages = self.stages.read().await;
        Ok(stages.get(&stage_id).cloned())
    }

    async fn seed(&self, stage: Stage) -> Result<bool> {
        let mut stages = self.stages.write().await;
        if stages.contains_key(&stage.id) {
            return Ok(false);
        }
        stages.insert(stage.id, stage);
        Ok(true)
    }

    async fn reserve(&self, stage_id: u64, amount: TokenAmount) -> Result<bool> {
        let mut stages = self.stages.write().await;
        Ok(stages
            .get_mut(&stage_id)
            .is_some_and(|stage| stage.reserve(amount)))
    }

    async fn release(&self, stage_id: u64, amount: TokenAmount) -> Result<()> {
        let mut stages = self.stages.write().await;
        if let Some(stage) = stages.get_mut(&stage_id) {
            stage.release(amount);
        }
        Ok(())
    }

    async fn increment_sold(&self, stage_id: u64, amount: TokenAmount) -> Result<()> {
        let mut stages = self.stages.write().await;
        let stage = stages
            .get_mut(&stage_id)
            .ok_or(PresaleError::UnknownStage(stage_id))?;
        stage.record_sale(amount)
    }
}

#[derive(Default)]
struct TransactionTable {
    next_id: u64,
    rows: BTreeMap<u64, Transaction>,
}

/// A thread-safe in-memory store for purchase transactions.
///
/// Ids are generated sequentially starting at 1.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    table: Arc<RwLock<TransactionTable>>,
}

impl InMemoryTransactionStore {
    /// Creates a new, empty in-memory transaction store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored transaction, in id order.
    pub async fn all(&self) -> Vec<Transaction> {
        let table = self.table.read().await;
        table.rows.values().cloned().collect()
    }

    async fn update<F>(&self, tx_id: u64, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut Transaction) -> bool + Send,
    {
        let mut table = self.table.write().await;
        Ok(table.rows.get_mut(&tx_id).is_some_and(apply))
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, tx: NewTransaction) -> Result<Transaction> {
        let mut table = self.table.write().await;
        table.next_id += 1;
        let stored = Transaction::from_new(table.next_id, tx, Utc::now());
        table.rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, tx_id: u64) -> Result<Option<Transaction>> {
        let table = self.table.read().await;
        Ok(table.rows.get(&tx_id).cloned())
    }

    async fn attach_payment_id(&self, tx_id: u64, payment_id: &str) -> Result<bool> {
        self.update(tx_id, |tx| tx.attach_payment_id(payment_id))
            .await
    }

    async fn complete(&self, tx_id: u64, payment_id: &str) -> Result<bool> {
        self.update(tx_id, |tx| tx.complete(payment_id)).await
    }

    async fn transition(
        &self,
        tx_id: u64,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<bool> {
        self.update(tx_id, |tx| tx.transition(from, to)).await
    }

    async fn orphans_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|tx| tx.is_orphan() && tx.created_at < cutoff)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stage::TokenPrice;
    use rust_decimal_macros::dec;

    fn stage(id: u64, stage_number: u32, total: u64) -> Stage {
        Stage {
            id,
            stage_number,
            price_per_token: TokenPrice::new(dec!(0.05)).unwrap(),
            total_tokens: total,
            sold_tokens: 0,
            reserved_tokens: 0,
            start_date: DateTime::<Utc>::UNIX_EPOCH,
            end_date: DateTime::<Utc>::UNIX_EPOCH,
            is_active: true,
        }
    }

    fn new_tx(amount: u64) -> NewTransaction {
        NewTransaction {
            user_wallet: "0xabc".to_string(),
            stage_id: 1,
            token_amount: TokenAmount::new(amount).unwrap(),
            payment_amount: dec!(5.00),
            payment_currency: "USD".to_string(),
        }
    }

    #[tokio::test]
    async fn test_stages_are_ordered_by_stage_number() {
        let store = InMemoryStageStore::new();
        store.seed(stage(10, 3, 100)).await.unwrap();
        store.seed(stage(11, 1, 100)).await.unwrap();
        store.seed(stage(12, 2, 100)).await.unwrap();

        let numbers: Vec<u32> = store
            .all_ordered()
            .await
            .unwrap()
            .iter()
            .map(|s| s.stage_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_seed_keeps_existing_counters() {
        let store = InMemoryStageStore::new();
        assert!(store.seed(stage(1, 1, 100)).await.unwrap());
        store
            .increment_sold(1, TokenAmount::new(10).unwrap())
            .await
            .unwrap();

        assert!(!store.seed(stage(1, 1, 100)).await.unwrap());
        assert_eq!(store.get(1).await.unwrap().unwrap().sold_tokens, 10);
    }

    #[tokio::test]
    async fn test_reserve_release_increment() {
        let store = InMemoryStageStore::new();
        store.seed(stage(1, 1, 100)).await.unwrap();
        let seventy = TokenAmount::new(70).unwrap();

        assert!(store.reserve(1, seventy).await.unwrap());
        assert!(!store.reserve(1, seventy).await.unwrap());
        assert!(!store.reserve(2, seventy).await.unwrap());

        store.release(1, seventy).await.unwrap();
        assert!(store.reserve(1, seventy).await.unwrap());
        store.increment_sold(1, seventy).await.unwrap();

        let stored = store.get(1).await.unwrap().unwrap();
        assert_eq!(stored.sold_tokens, 70);
        assert_eq!(stored.reserved_tokens, 0);
    }

    #[tokio::test]
    async fn test_increment_unknown_stage() {
        let store = InMemoryStageStore::new();
        let result = store.increment_sold(9, TokenAmount::new(1).unwrap()).await;
        assert!(matches!(result, Err(PresaleError::UnknownStage(9))));
    }

    #[tokio::test]
    async fn test_concurrent_reservations_never_oversell() {
        let store = InMemoryStageStore::new();
        store.seed(stage(1, 1, 100)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.reserve(1, TokenAmount::new(3).unwrap()).await.unwrap()
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 33);
        assert_eq!(store.get(1).await.unwrap().unwrap().reserved_tokens, 99);
    }

    #[tokio::test]
    async fn test_insert_generates_sequential_ids() {
        let store = InMemoryTransactionStore::new();
        let first = store.insert(new_tx(1)).await.unwrap();
        let second = store.insert(new_tx(2)).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.status, TransactionStatus::Pending);
        assert_eq!(store.get(2).await.unwrap().unwrap(), second);
        assert!(store.get(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_complete_is_guarded() {
        let store = InMemoryTransactionStore::new();
        let tx = store.insert(new_tx(100)).await.unwrap();

        assert!(!store.complete(tx.id, "p1").await.unwrap());
        assert!(store.attach_payment_id(tx.id, "p1").await.unwrap());
        assert!(!store.complete(tx.id, "forged").await.unwrap());
        assert!(store.complete(tx.id, "p1").await.unwrap());
        assert!(!store.complete(tx.id, "p1").await.unwrap());
        assert!(!store.complete(999, "p1").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_completions_change_one_row() {
        let store = InMemoryTransactionStore::new();
        let tx = store.insert(new_tx(100)).await.unwrap();
        store.attach_payment_id(tx.id, "p1").await.unwrap();
        let tx_id = tx.id;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.complete(tx_id, "p1").await.unwrap() },
            ));
        }

        let mut changed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                changed += 1;
            }
        }
        assert_eq!(changed, 1);
    }

    #[tokio::test]
    async fn test_orphans_created_before() {
        let store = InMemoryTransactionStore::new();
        let orphan = store.insert(new_tx(1)).await.unwrap();
        let done = store.insert(new_tx(2)).await.unwrap();
        store.attach_payment_id(done.id, "p2").await.unwrap();
        store.complete(done.id, "p2").await.unwrap();
        let awaiting_payment = store.insert(new_tx(3)).await.unwrap();
        store
            .attach_payment_id(awaiting_payment.id, "p3")
            .await
            .unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        let orphans = store.orphans_created_before(cutoff).await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, orphan.id);

        let none = store
            .orphans_created_before(DateTime::<Utc>::UNIX_EPOCH)
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
