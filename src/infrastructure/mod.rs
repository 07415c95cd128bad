pub mod in_memory;
pub mod nowpayments;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
