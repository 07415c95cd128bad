use crate::domain::ports::{StageStoreRef, TransactionStoreRef};
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Expires orphaned purchases (pending, never given a processor payment)
/// that outlived the TTL and returns their reserved tokens to the stage.
pub struct PendingSweeper {
    stages: StageStoreRef,
    transactions: TransactionStoreRef,
    ttl: chrono::Duration,
}

impl PendingSweeper {
    pub fn new(stages: StageStoreRef, transactions: TransactionStoreRef, ttl: Duration) -> Self {
        Self {
            stages,
            transactions,
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// One pass as of `now`. Returns how many transactions were expired.
    ///
    /// Only orphans are swept: a transaction that already has a processor
    /// payment id may still be paid and is settled by its notification.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now
            .checked_sub_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let stale = self.transactions.orphans_created_before(cutoff).await?;

        let mut expired = 0;
        for tx in stale {
            if !self
                .transactions
                .transition(tx.id, TransactionStatus::Pending, TransactionStatus::Expired)
                .await?
            {
                continue;
            }
            if let Err(e) = self.stages.release(tx.stage_id, tx.token_amount).await {
                warn!(transaction_id = tx.id, stage_id = tx.stage_id, error = %e, "failed to release expired reservation, retrying next sweep");
                self.reopen(&tx).await;
                continue;
            }
            expired += 1;
        }

        if expired > 0 {
            info!(expired, "expired orphaned pending transactions");
        }
        Ok(expired)
    }

    async fn reopen(&self, tx: &Transaction) {
        match self
            .transactions
            .transition(tx.id, TransactionStatus::Expired, TransactionStatus::Pending)
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

    /// Sweeps every `interval` until `shutdown` flips to true.
    pub async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once(Utc::now()).await {
                        error!(error = %e, "pending transaction sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
