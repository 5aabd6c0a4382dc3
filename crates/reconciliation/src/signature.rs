//! HMAC-SHA256 signatures over gateway notification fields.
//!
//! The signed message is the canonical field string: every top-level field
//! except `sign` whose value is neither null nor empty, sorted by key and
//! joined as `key=value` pairs separated by `&`. The signature is the
//! hex-encoded HMAC-SHA256 of that string under the shared secret.

use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::error::{ReconcileError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Name of the field carrying the signature.
pub const SIGN_FIELD: &str = "sign";

/// Builds the canonical string that is signed for a set of fields.
pub fn canonical_string(fields: &Map<String, Value>) -> String {
    let mut pairs: Vec<(&str, String)> = fields
        .iter()
        .filter(|(key, _)| key.as_str() != SIGN_FIELD)
        .filter_map(|(key, value)| field_text(value).map(|text| (key.as_str(), text)))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    pairs
        .iter()
        .map(|(key, text)| format!("{key}={text}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Signs and verifies notifications with a shared secret.
#[derive(Clone)]
pub struct NotificationSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for NotificationSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSigner").finish_non_exhaustive()
    }
}

impl NotificationSigner {
    /// Creates a signer for the shared secret.
    pub fn new(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(ReconcileError::InvalidSecret);
        }
        let mac =
            HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| ReconcileError::InvalidSecret)?;
        Ok(Self { mac })
    }

    /// Returns the hex-encoded signature of the fields.
    pub fn sign(&self, fields: &Map<String, Value>) -> String {
        let mut mac = self.mac.clone();
        mac.update(canonical_string(fields).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Checks a hex-encoded signature in constant time.
    pub fn verify(&self, fields: &Map<String, Value>, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(canonical_string(fields).as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}
