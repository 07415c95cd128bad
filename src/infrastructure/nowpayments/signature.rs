//! IPN signature verification.
//!
//! The processor signs each notification with HMAC-SHA512 over the JSON body
//! re-serialized with object keys sorted, keyed by the account's IPN secret,
//! and sends the lowercase hex digest in `x-nowpayments-sig`.

use crate::domain::ports::SignatureVerifier;
use crate::error::{PresaleError, Result};
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha512;

/// Header carrying the notification signature.
pub const SIGNATURE_HEADER: &str = "x-nowpayments-sig";

type HmacSha512 = Hmac<Sha512>;

/// Verifies notification signatures against a shared IPN secret.
pub struct IpnSignatureVerifier {
    secret: Vec<u8>,
}

impl IpnSignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac_for(&self, canonical: &[u8]) -> HmacSha512 {
        let mut mac =
            HmacSha512::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(canonical);
        mac
    }

    /// Hex signature for a payload; what the processor would send.
    pub fn sign(&self, body: &[u8]) -> Result<String> {
        let canonical = canonical_json(body)?;
        Ok(hex::encode(self.mac_for(&canonical).finalize().into_bytes()))
    }
}

impl SignatureVerifier for IpnSignatureVerifier {
    fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<()> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PresaleError::AuthenticationError("missing signature".to_string()))?;
        let expected = hex::decode(signature).map_err(|_| {
            PresaleError::AuthenticationError("signature is not hex".to_string())
        })?;
        let canonical = canonical_json(body)
            .map_err(|_| PresaleError::AuthenticationError("body is not JSON".to_string()))?;

        // Constant-time comparison
        self.mac_for(&canonical)
            .verify_slice(&expected)
            .map_err(|_| PresaleError::AuthenticationError("signature mismatch".to_string()))
    }
}

/// Compact JSON with every object's keys in sorted order.
fn canonical_json(body: &[u8]) -> Result<Vec<u8>> {
    let value: Value = serde_json::from_slice(body)?;
    Ok(serde_json::to_vec(&sorted(value))?)
}

fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut ordered = Map::new();
            for (key, inner) in entries {
                ordered.insert(key, sorted(inner));
            }
            Value::Object(ordered)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}
