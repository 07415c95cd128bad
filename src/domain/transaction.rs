use super::stage::TokenAmount;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    /// The processor refused to create a payment.
    Failed,
    /// A payment was created but its id could not be recorded.
    Abandoned,
    /// Swept after staying pending past the configured TTL.
    Expired,
}

/// A purchase attempt as it is about to be inserted.
///
/// The store assigns the id and creation time; the payment id is always unset
/// at this point.
#[derive(Debug, PartialEq, Clone)]
pub struct NewTransaction {
    pub user_wallet: String,
    pub stage_id: u64,
    pub token_amount: TokenAmount,
    pub payment_amount: Decimal,
    pub payment_currency: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: u64,
    pub user_wallet: String,
    pub stage_id: u64,
    pub token_amount: TokenAmount,
    /// Frozen at creation: `token_amount * price_per_token`.
    pub payment_amount: Decimal,
    pub payment_currency: String,
    pub payment_id: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn from_new(id: u64, new: NewTransaction, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_wallet: new.user_wallet,
            stage_id: new.stage_id,
            token_amount: new.token_amount,
            payment_amount: new.payment_amount,
            payment_currency: new.payment_currency,
            payment_id: None,
            status: TransactionStatus::Pending,
            created_at,
        }
    }

    /// Pending with no processor payment behind it.
    pub fn is_orphan(&self) -> bool {
        self.status == TransactionStatus::Pending && self.payment_id.is_none()
    }

    /// Records the processor's payment id, once, while still pending.
    pub fn attach_payment_id(&mut self, payment_id: &str) -> bool {
        if self.status != TransactionStatus::Pending || self.payment_id.is_some() {
            return false;
        }
        self.payment_id = Some(payment_id.to_string());
        true
    }

    /// Flips `pending -> completed` when the claimed payment id matches.
    pub fn complete(&mut self, payment_id: &str) -> bool {
        if self.status == TransactionStatus::Pending
            && self.payment_id.as_deref() == Some(payment_id)
        {
            self.status = TransactionStatus::Completed;
            true
        } else {
            false
        }
    }

    /// Moves to `to` only if the current status is `from`.
    pub fn transition(&mut self, from: TransactionStatus, to: TransactionStatus) -> bool {
        if self.status == from {
            self.status = to;
            true
        } else {
            false
        }
    }
}
