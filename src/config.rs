use crate::application::purchase::PurchaseSettings;
use crate::domain::payment::CallbackUrls;
use crate::infrastructure::nowpayments::NowPaymentsConfig;
use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration. Every option can also come from the environment.
#[derive(Args, Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP API binds to
    #[arg(long, env = "PRESALE_LISTEN", default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,

    /// Public base URL used to build the processor callback URLs
    #[arg(long, env = "PRESALE_BASE_URL", default_value = "http://localhost:3000")]
    pub base_url: String,

    /// Payment processor API root
    #[arg(long, env = "NOWPAYMENTS_API_URL", default_value = "https://api.nowpayments.io")]
    pub nowpayments_api_url: String,

    /// Payment processor API key
    #[arg(long, env = "NOWPAYMENTS_API_KEY", hide_env_values = true)]
    pub nowpayments_api_key: Option<String>,

    /// Shared secret the processor signs notifications with
    #[arg(long, env = "NOWPAYMENTS_IPN_SECRET", hide_env_values = true)]
    pub nowpayments_ipn_secret: Option<String>,

    /// Currency purchases are priced in
    #[arg(long, env = "PRESALE_PRICE_CURRENCY", default_value = "USD")]
    pub price_currency: String,

    /// Currency the buyer pays with
    #[arg(long, env = "PRESALE_PAY_CURRENCY", default_value = "btc")]
    pub pay_currency: String,

    /// Token name used in payment descriptions
    #[arg(long, env = "PRESALE_TOKEN_NAME", default_value = "OCID")]
    pub token_name: String,

    /// Token symbol used in payment descriptions
    #[arg(long, env = "PRESALE_TOKEN_SYMBOL", default_value = "OCD")]
    pub token_symbol: String,

    /// Seconds a purchase may stay pending before it is expired
    #[arg(long, env = "PRESALE_PENDING_TTL_SECS", default_value_t = 86_400)]
    pub pending_ttl_secs: u64,

    /// Seconds between expiry sweeps
    #[arg(long, env = "PRESALE_SWEEP_INTERVAL_SECS", default_value_t = 300)]
    pub sweep_interval_secs: u64,

    /// Timeout for calls to the payment processor
    #[arg(long, env = "PRESALE_PROCESSOR_TIMEOUT_SECS", default_value_t = 30)]
    pub processor_timeout_secs: u64,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "PRESALE_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// CSV file of stage definitions to seed at startup
    #[arg(long, env = "PRESALE_STAGES_CSV")]
    pub stages: Option<PathBuf>,
}

impl AppConfig {
    pub fn purchase_settings(&self) -> PurchaseSettings {
        PurchaseSettings {
            price_currency: self.price_currency.clone(),
            pay_currency: self.pay_currency.clone(),
            token_name: self.token_name.clone(),
            token_symbol: self.token_symbol.clone(),
            callbacks: CallbackUrls::from_base(&self.base_url),
        }
    }

    /// Processor settings, if an API key is configured.
    pub fn nowpayments(&self) -> Option<NowPaymentsConfig> {
        let api_key = self.nowpayments_api_key.as_deref().filter(|k| !k.is_empty())?;
        let mut config = NowPaymentsConfig::new(&self.nowpayments_api_url, api_key);
        config.timeout_secs = self.processor_timeout_secs;
        Some(config)
    }

    pub fn ipn_secret(&self) -> Option<&str> {
        self.nowpayments_ipn_secret
            .as_deref()
            .filter(|s| !s.is_empty())
    }

    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
