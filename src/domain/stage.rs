use crate::error::PresaleError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Price of a single token, in the sale's price currency.
///
/// Wraps `rust_decimal::Decimal` and enforces that a stage is never priced at
/// zero or below.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct TokenPrice(Decimal);

impl TokenPrice {
    pub fn new(value: Decimal) -> Result<Self, PresaleError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PresaleError::ValidationError(
                "Token price must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Cost of `amount` tokens at this price, or `None` if it does not fit
    /// in a `Decimal`.
    pub fn cost_of(&self, amount: TokenAmount) -> Option<Decimal> {
        Decimal::from(amount.value()).checked_mul(self.0)
    }
}

impl TryFrom<Decimal> for TokenPrice {
    type Error = PresaleError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TokenPrice> for Decimal {
    fn from(price: TokenPrice) -> Self {
        price.0
    }
}

/// A strictly positive whole number of tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct TokenAmount(u64);

impl TokenAmount {
    pub fn new(value: u64) -> Result<Self, PresaleError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(PresaleError::ValidationError(
                "Token amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for TokenAmount {
    type Error = PresaleError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i64> for TokenAmount {
    type Error = PresaleError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        let value = u64::try_from(value).map_err(|_| {
            PresaleError::ValidationError("Token amount must be positive".to_string())
        })?;
        Self::new(value)
    }
}

impl From<TokenAmount> for u64 {
    fn from(amount: TokenAmount) -> Self {
        amount.0
    }
}

/// A priced tranche of the sale with fixed capacity.
///
/// `sold_tokens` only grows, and only through the reconciliation increment.
/// `reserved_tokens` counts capacity held by purchases that are still open.
/// Together they never exceed `total_tokens`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Stage {
    pub id: u64,
    pub stage_number: u32,
    pub price_per_token: TokenPrice,
    pub total_tokens: u64,
    #[serde(default)]
    pub sold_tokens: u64,
    #[serde(default)]
    pub reserved_tokens: u64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
}

impl Stage {
    /// Tokens neither sold nor held by an open purchase.
    pub fn remaining_tokens(&self) -> u64 {
        self.total_tokens
            .saturating_sub(self.sold_tokens)
            .saturating_sub(self.reserved_tokens)
    }

    /// Value of the tokens sold so far.
    pub fn raised(&self) -> Decimal {
        Decimal::from(self.sold_tokens).saturating_mul(self.price_per_token.value())
    }

    /// Checks `sold_tokens + reserved_tokens <= total_tokens`.
    pub fn check_capacity(&self) -> Result<(), PresaleError> {
        match self.sold_tokens.checked_add(self.reserved_tokens) {
            Some(committed) if committed <= self.total_tokens => Ok(()),
            _ => Err(PresaleError::ValidationError(format!(
                "Stage {} commits more than its {} tokens",
                self.id, self.total_tokens
            ))),
        }
    }

    /// Holds `amount` tokens for an open purchase.
    ///
    /// Only an active stage with enough remaining capacity accepts a reservation.
    pub fn reserve(&mut self, amount: TokenAmount) -> bool {
        if !self.is_active || self.remaining_tokens() < amount.value() {
            return false;
        }
        self.reserved_tokens += amount.value();
        true
    }

    /// Returns previously reserved capacity to the pool.
    pub fn release(&mut self, amount: TokenAmount) {
        self.reserved_tokens = self.reserved_tokens.saturating_sub(amount.value());
    }

    /// Credits `amount` as sold, settling the matching reservation.
    pub fn record_sale(&mut self, amount: TokenAmount) -> Result<(), PresaleError> {
        let settled = self.reserved_tokens.min(amount.value());
        let reserved = self.reserved_tokens - settled;
        let exceeded = PresaleError::CapacityExceeded {
            stage_id: self.id,
            requested: amount.value(),
        };
        let Some(sold) = self.sold_tokens.checked_add(amount.value()) else {
            return Err(exceeded);
        };
        match sold.checked_add(reserved) {
            Some(committed) if committed <= self.total_tokens => {}
            _ => return Err(exceeded),
        }
        self.sold_tokens = sold;
        self.reserved_tokens = reserved;
        Ok(())
    }
}
