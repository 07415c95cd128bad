use crate::domain::payment::{CallbackUrls, PaymentRequest};
use crate::domain::ports::{PaymentProcessorRef, StageStoreRef, TransactionStoreRef};
use crate::domain::stage::TokenAmount;
use crate::domain::transaction::{NewTransaction, Transaction, TransactionStatus};
use crate::error::PurchaseError;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Fixed parameters of every payment this presale creates.
#[derive(Debug, Clone)]
pub struct PurchaseSettings {
    pub price_currency: String,
    pub pay_currency: String,
    pub token_name: String,
    pub token_symbol: String,
    pub callbacks: CallbackUrls,
}

impl PurchaseSettings {
    fn description(&self, amount: TokenAmount) -> String {
        format!(
            "{} Token Purchase - {} {} tokens",
            self.token_name,
            amount.value(),
            self.token_symbol
        )
    }
}

/// Purchase-initiation input as the UI submits it.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub wallet_address: String,
    pub token_amount: i64,
    pub stage_id: u64,
}

/// `{ success, paymentUrl?, error? }` as returned to the UI.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PurchaseOutcome {
    pub fn paid(payment_url: String) -> Self {
        Self {
            success: true,
            payment_url: Some(payment_url),
            error: None,
        }
    }

    pub fn failed(reason: PurchaseError) -> Self {
        Self {
            success: false,
            payment_url: None,
            error: Some(reason.to_string()),
        }
    }
}

impl From<Result<String, PurchaseError>> for PurchaseOutcome {
    fn from(result: Result<String, PurchaseError>) -> Self {
        match result {
            Ok(url) => Self::paid(url),
            Err(reason) => Self::failed(reason),
        }
    }
}

/// Opens purchases: reserve capacity, record a pending transaction, create the
/// external payment, remember its id.
///
/// The steps are not one store transaction, so each failure after the
/// reservation runs a compensating action: the transaction is moved out of
/// `pending` and the reserved capacity is returned.
pub struct PurchaseOrchestrator {
    stages: StageStoreRef,
    transactions: TransactionStoreRef,
    processor: PaymentProcessorRef,
    settings: PurchaseSettings,
}

impl PurchaseOrchestrator {
    pub fn new(
        stages: StageStoreRef,
        transactions: TransactionStoreRef,
        processor: PaymentProcessorRef,
        settings: PurchaseSettings,
    ) -> Self {
        Self {
            stages,
            transactions,
            processor,
            settings,
        }
    }

    pub async fn create_payment(
        &self,
        wallet_address: &str,
        token_amount: i64,
        stage_id: u64,
    ) -> PurchaseOutcome {
        self.try_create_payment(wallet_address, token_amount, stage_id)
            .await
            .into()
    }

    /// Same as [`create_payment`](Self::create_payment) but keeps the failure
    /// kind, which the HTTP layer maps to a status code.
    pub async fn try_create_payment(
        &self,
        wallet_address: &str,
        token_amount: i64,
        stage_id: u64,
    ) -> Result<String, PurchaseError> {
        let wallet = wallet_address.trim();
        if wallet.is_empty() {
            return Err(PurchaseError::MissingWallet);
        }
        let amount = TokenAmount::try_from(token_amount).map_err(|_| PurchaseError::InvalidAmount)?;

        let stage = match self.stages.get(stage_id).await {
            Ok(Some(stage)) => stage,
            Ok(None) => return Err(PurchaseError::InvalidStage),
            Err(e) => {
                error!(stage_id, error = %e, "failed to read stage");
                return Err(PurchaseError::Internal);
            }
        };
        let Some(payment_amount) = stage.price_per_token.cost_of(amount) else {
            info!(stage_id, tokens = amount.value(), "purchase amount overflows");
            return Err(PurchaseError::InvalidAmount);
        };

        match self.stages.reserve(stage.id, amount).await {
            Ok(true) => {}
            Ok(false) => {
                info!(stage_id, tokens = amount.value(), "stage cannot take purchase");
                return Err(PurchaseError::StageUnavailable);
            }
            Err(e) => {
                error!(stage_id, error = %e, "failed to reserve tokens");
                return Err(PurchaseError::Internal);
            }
        }

        let new_tx = NewTransaction {
            user_wallet: wallet.to_string(),
            stage_id: stage.id,
            token_amount: amount,
            payment_amount,
            payment_currency: self.settings.price_currency.clone(),
        };
        let tx = match self.transactions.insert(new_tx).await {
            Ok(tx) => tx,
            Err(e) => {
                error!(stage_id, error = %e, "failed to create transaction");
                if !self.release(stage.id, amount).await {
                    error!(
                        stage_id,
                        tokens = amount.value(),
                        "reservation leaked, needs manual release"
                    );
                }
                return Err(PurchaseError::TransactionNotCreated);
            }
        };

        let request = self.payment_request(&tx);
        let created = match self.processor.create_payment(&request).await {
            Ok(created) if !created.payment_id.is_empty() && !created.invoice_url.is_empty() => {
                created
            }
            Ok(_) => {
                warn!(transaction_id = tx.id, "processor returned an incomplete payment");
                self.compensate(&tx, TransactionStatus::Failed).await;
                return Err(PurchaseError::PaymentNotCreated);
            }
            Err(e) => {
                warn!(transaction_id = tx.id, error = %e, "payment creation failed");
                self.compensate(&tx, TransactionStatus::Failed).await;
                return Err(PurchaseError::PaymentNotCreated);
            }
        };

        match self
            .transactions
            .attach_payment_id(tx.id, &created.payment_id)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                error!(
                    transaction_id = tx.id,
                    payment_id = %created.payment_id,
                    "transaction left pending before its payment id was recorded"
                );
                self.compensate(&tx, TransactionStatus::Abandoned).await;
                return Err(PurchaseError::PaymentNotRecorded);
            }
            Err(e) => {
                error!(
                    transaction_id = tx.id,
                    payment_id = %created.payment_id,
                    error = %e,
                    "failed to record payment id"
                );
                self.compensate(&tx, TransactionStatus::Abandoned).await;
                return Err(PurchaseError::PaymentNotRecorded);
            }
        }

        info!(
            transaction_id = tx.id,
            payment_id = %created.payment_id,
            stage_id,
            tokens = amount.value(),
            amount = %payment_amount,
            "payment created"
        );
        Ok(created.invoice_url)
    }

    fn payment_request(&self, tx: &Transaction) -> PaymentRequest {
        let callbacks = &self.settings.callbacks;
        PaymentRequest {
            price_amount: tx.payment_amount,
            price_currency: self.settings.price_currency.clone(),
            pay_currency: self.settings.pay_currency.clone(),
            order_id: tx.id.to_string(),
            order_description: self.settings.description(tx.token_amount),
            ipn_callback_url: callbacks.ipn_callback_url.clone(),
            success_url: callbacks.success_url.clone(),
            cancel_url: callbacks.cancel_url.clone(),
        }
    }

    /// Moves `tx` from pending to `to` and frees its reservation.
    ///
    /// A transaction left pending here has no payment id, so the sweeper
    /// expires it and frees the tokens later.
    async fn compensate(&self, tx: &Transaction, to: TransactionStatus) {
        match self
            .transactions
            .transition(tx.id, TransactionStatus::Pending, to)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(transaction_id = tx.id, "transaction no longer pending");
                return;
            }
            Err(e) => {
                error!(transaction_id = tx.id, error = %e, "compensation failed");
                return;
            }
        }

        if self.release(tx.stage_id, tx.token_amount).await {
            return;
        }
        // Hand the reservation back to the sweeper
        match self
            .transactions
            .transition(tx.id, to, TransactionStatus::Pending)
            .await
        {
            Ok(true) => {}
            Ok(false) | Err(_) => error!(
                transaction_id = tx.id,
                stage_id = tx.stage_id,
                tokens = tx.token_amount.value(),
                "reservation leaked, needs manual release"
            ),
        }
    }

    async fn release(&self, stage_id: u64, amount: TokenAmount) -> bool {
        match self.stages.release(stage_id, amount).await {
            Ok(()) => true,
            Err(e) => {
                error!(stage_id, tokens = amount.value(), error = %e, "failed to release reservation");
                false
            }
        }
    }
}
