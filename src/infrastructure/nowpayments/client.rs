//! NOWPayments REST client.

use crate::domain::payment::{CreatedPayment, PaymentRequest};
use crate::domain::ports::PaymentProcessor;
use crate::error::{PresaleError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Connection settings for the processor API.
#[derive(Clone, Debug)]
pub struct NowPaymentsConfig {
    /// API root, e.g. `https://api.nowpayments.io`.
    pub api_url: String,
    /// Sent as the `x-api-key` header.
    pub api_key: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl NowPaymentsConfig {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            timeout_secs: 30,
        }
    }
}

/// Payment Processor Client backed by the NOWPayments HTTP API.
pub struct NowPaymentsClient {
    config: NowPaymentsConfig,
    http: reqwest::Client,
}

impl NowPaymentsClient {
    pub fn new(config: NowPaymentsConfig) -> Result<Self> {
        if config.api_url.is_empty() {
            return Err(PresaleError::ValidationError(
                "Processor API URL cannot be empty".to_string(),
            ));
        }
        if config.api_key.is_empty() {
            return Err(PresaleError::ValidationError(
                "Processor API key cannot be empty".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PaymentProcessor for NowPaymentsClient {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment> {
        debug!(order_id = %request.order_id, amount = %request.price_amount, "creating payment");

        let response = self
            .http
            .post(self.url("payment"))
            .header("x-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, order_id = %request.order_id, "processor rejected payment");
            return Err(PresaleError::ProcessorError(format!(
                "status {}: {}",
                status, body
            )));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            PresaleError::ProcessorError(format!("unexpected payment response: {}", e))
        })
    }
}
