use thiserror::Error;

pub type Result<T> = std::result::Result<T, PresaleError>;

#[derive(Error, Debug)]
pub enum PresaleError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Stage {0} does not exist")]
    UnknownStage(u64),
    #[error("Stage {stage_id} cannot absorb {requested} more tokens")]
    CapacityExceeded { stage_id: u64, requested: u64 },
    #[error("Payment processor error: {0}")]
    ProcessorError(String),
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
    #[error("Malformed notification: {0}")]
    MalformedNotification(String),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDBError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

/// User-facing purchase failures.
///
/// The `Display` text is exactly what the caller receives; details of the
/// underlying cause are logged and never returned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseError {
    #[error("Wallet address is required")]
    MissingWallet,
    #[error("Token amount must be a positive integer")]
    InvalidAmount,
    #[error("Invalid stage")]
    InvalidStage,
    #[error("Stage is not active or has insufficient tokens")]
    StageUnavailable,
    #[error("Failed to create transaction")]
    TransactionNotCreated,
    #[error("Payment creation failed")]
    PaymentNotCreated,
    #[error("Failed to record payment")]
    PaymentNotRecorded,
    #[error("Internal server error")]
    Internal,
}
