//! Adapters for the NOWPayments processor: payment creation and IPN
//! signature verification.

pub mod client;
pub mod signature;

pub use client::{NowPaymentsClient, NowPaymentsConfig};
pub use signature::{IpnSignatureVerifier, SIGNATURE_HEADER};
