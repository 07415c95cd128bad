use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Path the processor posts payment notifications to.
pub const IPN_CALLBACK_PATH: &str = "/api/payment-callback";
/// Where the buyer lands after paying.
pub const SUCCESS_PATH: &str = "/success";
/// Where the buyer lands after cancelling.
pub const CANCEL_PATH: &str = "/presale";

/// The three URLs handed to the processor for a payment.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackUrls {
    pub ipn_callback_url: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl CallbackUrls {
    pub fn from_base(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            ipn_callback_url: format!("{base}{IPN_CALLBACK_PATH}"),
            success_url: format!("{base}{SUCCESS_PATH}"),
            cancel_url: format!("{base}{CANCEL_PATH}"),
        }
    }
}

/// Body of a payment creation request.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct PaymentRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub price_amount: Decimal,
    pub price_currency: String,
    pub pay_currency: String,
    /// The transaction id; echoed back in notifications.
    pub order_id: String,
    pub order_description: String,
    pub ipn_callback_url: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// What the processor hands back for a created payment.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CreatedPayment {
    #[serde(alias = "id", deserialize_with = "string_or_number")]
    pub payment_id: String,
    pub invoice_url: String,
}

#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Waiting,
    Confirming,
    Confirmed,
    Sending,
    PartiallyPaid,
    Finished,
    Failed,
    Refunded,
    Expired,
    #[serde(other)]
    Unknown,
}

/// Fields of a processor notification this service acts on. Everything else
/// in the payload is ignored.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct PaymentNotification {
    #[serde(deserialize_with = "string_or_number")]
    pub payment_id: String,
    pub payment_status: PaymentStatus,
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
}

impl PaymentNotification {
    /// The transaction id this notification claims to settle.
    pub fn transaction_id(&self) -> Option<u64> {
        self.order_id.trim().parse().ok()
    }
}

// The processor sends ids as JSON numbers in some payloads and strings in others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    match Id::deserialize(deserializer)? {
        Id::Text(text) => Ok(text),
        Id::Number(number) => Ok(number.to_string()),
    }
}
