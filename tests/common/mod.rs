#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use presale_ledger::application::purchase::{PurchaseOrchestrator, PurchaseSettings};
use presale_ledger::application::reconciliation::ReconciliationHandler;
use presale_ledger::domain::payment::{CallbackUrls, CreatedPayment, PaymentRequest};
use presale_ledger::domain::ports::{
    PaymentProcessor, StageStore, TransactionStore, TransactionStoreRef,
};
use presale_ledger::domain::stage::{Stage, TokenAmount, TokenPrice};
use presale_ledger::domain::transaction::{NewTransaction, Transaction, TransactionStatus};
use presale_ledger::error::{PresaleError, Result};
use presale_ledger::infrastructure::in_memory::{InMemoryStageStore, InMemoryTransactionStore};
use presale_ledger::infrastructure::nowpayments::IpnSignatureVerifier;
use rust_decimal::Decimal;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const IPN_SECRET: &str = "test-ipn-secret";
pub const BASE_URL: &str = "https://presale.test";

pub fn stage(id: u64, price: Decimal, total: u64, sold: u64, active: bool) -> Stage {
    Stage {
        id,
        stage_number: id as u32,
        price_per_token: TokenPrice::new(price).unwrap(),
        total_tokens: total,
        sold_tokens: sold,
        reserved_tokens: 0,
        start_date: DateTime::<Utc>::UNIX_EPOCH,
        end_date: DateTime::<Utc>::UNIX_EPOCH,
        is_active: active,
    }
}

pub fn settings() -> PurchaseSettings {
    PurchaseSettings {
        price_currency: "USD".to_string(),
        pay_currency: "btc".to_string(),
        token_name: "OCID".to_string(),
        token_symbol: "OCD".to_string(),
        callbacks: CallbackUrls::from_base(BASE_URL),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ProcessorMode {
    Succeed,
    Fail,
}

/// Processor double: answers `p<order_id>` / `https://pay/p<order_id>` and
/// records every request it receives.
pub struct FakeProcessor {
    mode: ProcessorMode,
    requests: Mutex<Vec<PaymentRequest>>,
}

impl FakeProcessor {
    pub fn new(mode: ProcessorMode) -> Self {
        Self {
            mode,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment> {
        self.requests.lock().unwrap().push(request.clone());
        match self.mode {
            ProcessorMode::Succeed => Ok(CreatedPayment {
                payment_id: format!("p{}", request.order_id),
                invoice_url: format!("https://pay/p{}", request.order_id),
            }),
            ProcessorMode::Fail => Err(PresaleError::ProcessorError(
                "status 400 Bad Request".to_string(),
            )),
        }
    }
}

/// Transaction store that can be told to fail individual operations.
#[derive(Clone, Default)]
pub struct FlakyTransactionStore {
    pub inner: InMemoryTransactionStore,
    pub fail_insert: bool,
    pub fail_attach: bool,
}

fn store_down() -> PresaleError {
    PresaleError::IoError(std::io::Error::other("store unavailable"))
}

#[async_trait]
impl TransactionStore for FlakyTransactionStore {
    async fn insert(&self, tx: NewTransaction) -> Result<Transaction> {
        if self.fail_insert {
            return Err(store_down());
        }
        self.inner.insert(tx).await
    }

    async fn get(&self, tx_id: u64) -> Result<Option<Transaction>> {
        self.inner.get(tx_id).await
    }

    async fn attach_payment_id(&self, tx_id: u64, payment_id: &str) -> Result<bool> {
        if self.fail_attach {
            return Err(store_down());
        }
        self.inner.attach_payment_id(tx_id, payment_id).await
    }

    async fn complete(&self, tx_id: u64, payment_id: &str) -> Result<bool> {
        self.inner.complete(tx_id, payment_id).await
    }

    async fn transition(
        &self,
        tx_id: u64,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<bool> {
        self.inner.transition(tx_id, from, to).await
    }

    async fn orphans_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>> {
        self.inner.orphans_created_before(cutoff).await
    }
}

/// Stage store whose increments and releases fail a set number of times
/// before reaching the inner store.
#[derive(Clone, Default)]
pub struct FlakyStageStore {
    pub inner: InMemoryStageStore,
    pub failing_increments: Arc<AtomicUsize>,
    pub failing_releases: Arc<AtomicUsize>,
}

impl FlakyStageStore {
    pub fn failing(increments: usize, releases: usize) -> Self {
        Self {
            inner: InMemoryStageStore::new(),
            failing_increments: Arc::new(AtomicUsize::new(increments)),
            failing_releases: Arc::new(AtomicUsize::new(releases)),
        }
    }
}

fn take_failure(remaining: &AtomicUsize) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl StageStore for FlakyStageStore {
    async fn all_ordered(&self) -> Result<Vec<Stage>> {
        self.inner.all_ordered().await
    }

    async fn get(&self, stage_id: u64) -> Result<Option<Stage>> {
        self.inner.get(stage_id).await
    }

    async fn seed(&self, stage: Stage) -> Result<bool> {
        self.inner.seed(stage).await
    }

    async fn reserve(&self, stage_id: u64, amount: TokenAmount) -> Result<bool> {
        self.inner.reserve(stage_id, amount).await
    }

    async fn release(&self, stage_id: u64, amount: TokenAmount) -> Result<()> {
        if take_failure(&self.failing_releases) {
            return Err(store_down());
        }
        self.inner.release(stage_id, amount).await
    }

    async fn increment_sold(&self, stage_id: u64, amount: TokenAmount) -> Result<()> {
        if take_failure(&self.failing_increments) {
            return Err(store_down());
        }
        self.inner.increment_sold(stage_id, amount).await
    }
}

/// Stage store whose every operation fails.
pub struct UnavailableStageStore;

#[async_trait]
impl StageStore for UnavailableStageStore {
    async fn all_ordered(&self) -> Result<Vec<Stage>> {
        Err(store_down())
    }

    async fn get(&self, _stage_id: u64) -> Result<Option<Stage>> {
        Err(store_down())
    }

    async fn seed(&self, _stage: Stage) -> Result<bool> {
        Err(store_down())
    }

    async fn reserve(&self, _stage_id: u64, _amount: TokenAmount) -> Result<bool> {
        Err(store_down())
    }

    async fn release(&self, _stage_id: u64, _amount: TokenAmount) -> Result<()> {
        Err(store_down())
    }

    async fn increment_sold(&self, _stage_id: u64, _amount: TokenAmount) -> Result<()> {
        Err(store_down())
    }
}

/// In-memory ledger wired to the purchase and reconciliation services.
pub struct Harness {
    pub stages: InMemoryStageStore,
    pub transactions: InMemoryTransactionStore,
    pub processor: Arc<FakeProcessor>,
    pub purchases: PurchaseOrchestrator,
    pub reconciliation: ReconciliationHandler,
}

impl Harness {
    pub async fn new(stages: Vec<Stage>, mode: ProcessorMode) -> Self {
        Self::with_transactions(stages, mode, FlakyTransactionStore::default()).await
    }

    pub async fn with_transactions(
        stages: Vec<Stage>,
        mode: ProcessorMode,
        transactions: FlakyTransactionStore,
    ) -> Self {
        Self::with_stores(stages, mode, FlakyStageStore::default(), transactions).await
    }

    pub async fn with_stores(
        stages: Vec<Stage>,
        mode: ProcessorMode,
        stage_store: FlakyStageStore,
        transactions: FlakyTransactionStore,
    ) -> Self {
        for s in stages {
            stage_store.seed(s).await.unwrap();
        }
        let processor = Arc::new(FakeProcessor::new(mode));
        let inner = transactions.inner.clone();
        let transactions: TransactionStoreRef = Arc::new(transactions);

        let purchases = PurchaseOrchestrator::new(
            Arc::new(stage_store.clone()),
            transactions.clone(),
            processor.clone(),
            settings(),
        );
        let reconciliation = ReconciliationHandler::new(
            Arc::new(stage_store.clone()),
            transactions,
            Arc::new(IpnSignatureVerifier::new(IPN_SECRET)),
        );

        Self {
            stages: stage_store.inner,
            transactions: inner,
            processor,
            purchases,
            reconciliation,
        }
    }

    pub async fn stage(&self, id: u64) -> Stage {
        self.stages.get(id).await.unwrap().unwrap()
    }

    pub async fn transaction(&self, id: u64) -> Transaction {
        self.transactions.get(id).await.unwrap().unwrap()
    }
}

/// A notification body and the signature the processor would attach to it.
pub fn signed_notification(payment_id: &str, status: &str, order_id: &str) -> (Vec<u8>, String) {
    let body = serde_json::to_vec(&serde_json::json!({
        "payment_id": payment_id,
        "payment_status": status,
        "order_id": order_id,
        "pay_currency": "btc",
    }))
    .unwrap();
    let signature = IpnSignatureVerifier::new(IPN_SECRET).sign(&body).unwrap();
    (body, signature)
}

pub fn write_stages_csv(path: &Path, stages: &[(u64, &str, u64, u64, bool)]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record([
        "id",
        "stage_number",
        "price_per_token",
        "total_tokens",
        "sold_tokens",
        "start_date",
        "end_date",
        "is_active",
    ])?;

    for (id, price, total, sold, active) in stages {
        wtr.write_record([
            id.to_string().as_str(),
            id.to_string().as_str(),
            price,
            total.to_string().as_str(),
            sold.to_string().as_str(),
            "2026-01-01T00:00:00Z",
            "2026-12-31T00:00:00Z",
            if *active { "true" } else { "false" },
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes `count` random stages; stage 1 is the only active one.
pub fn generate_stages_csv(path: &Path, count: u64) -> std::io::Result<()> {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let mut rows = Vec::new();
    let mut prices = Vec::new();
    for id in 1..=count {
        let cents: u32 = rng.gen_range(1..=100);
        prices.push(format!("0.{:02}", cents % 100).replace("0.00", "1.00"));
        let total: u64 = rng.gen_range(1_000..=1_000_000);
        let sold: u64 = rng.gen_range(0..=total);
        rows.push((id, total, sold, id == 1));
    }
    let stages: Vec<(u64, &str, u64, u64, bool)> = rows
        .iter()
        .zip(prices.iter())
        .map(|((id, total, sold, active), price)| (*id, price.as_str(), *total, *sold, *active))
        .collect();
    write_stages_csv(path, &stages)
}
