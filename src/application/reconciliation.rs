use crate::domain::payment::{PaymentNotification, PaymentStatus};
use crate::domain::ports::{SignatureVerifierRef, StageStoreRef, TransactionStoreRef};
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::error::{PresaleError, Result};
use tracing::{debug, error, info, warn};

/// What a notification did to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// Status other than `finished`; nothing to do.
    Ignored,
    /// No pending transaction with that id and payment id. Duplicates and
    /// replays end up here.
    Unmatched,
    Credited {
        transaction_id: u64,
        stage_id: u64,
        tokens: u64,
    },
}

/// Applies processor completion notifications to the ledger, at most once per
/// transaction.
pub struct ReconciliationHandler {
    stages: StageStoreRef,
    transactions: TransactionStoreRef,
    verifier: SignatureVerifierRef,
}

impl ReconciliationHandler {
    pub fn new(
        stages: StageStoreRef,
        transactions: TransactionStoreRef,
        verifier: SignatureVerifierRef,
    ) -> Self {
        Self {
            stages,
            transactions,
            verifier,
        }
    }

    /// Authenticates the raw webhook body, then reconciles it.
    ///
    /// Nothing is read from or written to the store unless the signature holds.
    pub async fn handle_signed(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<ReconciliationOutcome> {
        if let Err(e) = self.verifier.verify(body, signature) {
            warn!(error = %e, "rejected unauthenticated payment notification");
            return Err(e);
        }
        let notification: PaymentNotification = serde_json::from_slice(body)
            .map_err(|e| PresaleError::MalformedNotification(e.to_string()))?;
        self.handle(notification).await
    }

    /// Reconciles an already authenticated notification.
    pub async fn handle(&self, notification: PaymentNotification) -> Result<ReconciliationOutcome> {
        if notification.payment_status != PaymentStatus::Finished {
            debug!(
                payment_id = %notification.payment_id,
                status = ?notification.payment_status,
                "ignoring non-final payment status"
            );
            return Ok(ReconciliationOutcome::Ignored);
        }

        let Some(tx_id) = notification.transaction_id() else {
            warn!(order_id = %notification.order_id, "notification order id is not a transaction id");
            return Ok(ReconciliationOutcome::Unmatched);
        };

        // stage and amount never change after insert, so they can be read first
        let Some(tx) = self.transactions.get(tx_id).await? else {
            info!(transaction_id = tx_id, "notification names an unknown transaction");
            return Ok(ReconciliationOutcome::Unmatched);
        };

        // id, payment id and pending status are checked in one store operation
        if !self
            .transactions
            .complete(tx_id, &notification.payment_id)
            .await?
        {
            info!(
                transaction_id = tx_id,
                payment_id = %notification.payment_id,
                "no pending transaction matches notification"
            );
            return Ok(ReconciliationOutcome::Unmatched);
        }

        if let Err(e) = self
            .stages
            .increment_sold(tx.stage_id, tx.token_amount)
            .await
        {
            error!(
                transaction_id = tx.id,
                stage_id = tx.stage_id,
                tokens = tx.token_amount.value(),
                error = %e,
                "failed to credit sold tokens"
            );
            self.reopen(&tx, &notification.payment_id).await;
            return Err(e);
        }

        info!(
            transaction_id = tx.id,
            stage_id = tx.stage_id,
            tokens = tx.token_amount.value(),
            "payment reconciled"
        );
        Ok(ReconciliationOutcome::Credited {
            transaction_id: tx.id,
            stage_id: tx.stage_id,
            tokens: tx.token_amount.value(),
        })
    }

    /// Puts a completed-but-uncredited transaction back to pending so the
    /// processor's retry of the same notification can credit it.
    async fn reopen(&self, tx: &Transaction, payment_id: &str) {
        match self
            .transactions
            .transition(tx.id, TransactionStatus::Completed, TransactionStatus::Pending)
            .await
        {
            Ok(true) => {}
            Ok(false) | Err(_) => error!(
                transaction_id = tx.id,
                stage_id = tx.stage_id,
                tokens = tx.token_amount.value(),
                payment_id,
                "transaction completed without credit, needs manual repair"
            ),
        }
    }
}
