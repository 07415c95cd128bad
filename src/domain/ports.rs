use super::payment::{CreatedPayment, PaymentRequest};
use super::stage::{Stage, TokenAmount};
use super::transaction::{NewTransaction, Transaction, TransactionStatus};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Stage half of the ledger store.
///
/// Every mutating operation is atomic at the store level: implementations never
/// expose an intermediate state to a concurrent caller.
#[async_trait]
pub trait StageStore: Send + Sync {
    /// All stages ordered by `stage_number`.
    async fn all_ordered(&self) -> Result<Vec<Stage>>;
    async fn get(&self, stage_id: u64) -> Result<Option<Stage>>;
    /// Inserts a stage definition unless one with the same id exists.
    async fn seed(&self, stage: Stage) -> Result<bool>;
    /// Holds capacity for a purchase if the stage is active and has room.
    async fn reserve(&self, stage_id: u64, amount: TokenAmount) -> Result<bool>;
    async fn release(&self, stage_id: u64, amount: TokenAmount) -> Result<()>;
    /// `sold_tokens += amount` in one step, settling the matching reservation.
    async fn increment_sold(&self, stage_id: u64, amount: TokenAmount) -> Result<()>;
}

/// Transaction half of the ledger store.
///
/// The conditional updates return whether a row changed.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, tx: NewTransaction) -> Result<Transaction>;
    async fn get(&self, tx_id: u64) -> Result<Option<Transaction>>;
    /// Sets `payment_id` where the transaction is pending and has none yet.
    async fn attach_payment_id(&self, tx_id: u64, payment_id: &str) -> Result<bool>;
    /// Sets `status = completed` where `id`, `payment_id` match and the status is pending.
    async fn complete(&self, tx_id: u64, payment_id: &str) -> Result<bool>;
    async fn transition(
        &self,
        tx_id: u64,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<bool>;
    /// Orphans (pending, no payment id) created strictly before `cutoff`.
    async fn orphans_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>>;
}

/// Creates payments with the external processor.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment>;
}

/// Authenticates an inbound processor notification before it is parsed.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<()>;
}

pub type StageStoreRef = Arc<dyn StageStore>;
pub type TransactionStoreRef = Arc<dyn TransactionStore>;
pub type PaymentProcessorRef = Arc<dyn PaymentProcessor>;
pub type SignatureVerifierRef = Arc<dyn SignatureVerifier>;
