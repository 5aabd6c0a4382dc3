//! Parsing and building gateway payment notifications.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{ReconcileError, Result};
use crate::signature::{NotificationSigner, SIGN_FIELD};

/// Result code the gateway sends for a completed charge.
pub const RESULT_SUCCESS: &str = "SUCCESS";

/// Result code used for a declined or failed charge.
pub const RESULT_FAIL: &str = "FAIL";

const TIME_END_FORMAT: &str = "%Y%m%d%H%M%S";

/// An authenticated payment notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Our payment number (`out_trade_no`).
    pub payment_no: String,
    /// Gateway transaction ID, absent on some failures.
    pub transaction_id: Option<String>,
    /// Amount charged, in minor units (`total_fee`).
    pub total_fee: i64,
    pub result_code: String,
    /// Completion time reported by the gateway (`time_end`).
    pub paid_at: Option<DateTime<Utc>>,
    /// The full body as received, stored with the payment.
    pub raw: Value,
}

impl Notification {
    /// Parses a raw body, verifying its signature before reading any field.
    pub fn parse(body: &[u8], signer: &NotificationSigner) -> Result<Self> {
        let raw: Value = serde_json::from_slice(body)
            .map_err(|e| ReconcileError::MalformedPayload(e.to_string()))?;
        let fields = raw
            .as_object()
            .ok_or_else(|| ReconcileError::MalformedPayload("expected a JSON object".into()))?;

        let signature = fields
            .get(SIGN_FIELD)
            .and_then(Value::as_str)
            .ok_or(ReconcileError::SignatureInvalid)?;
        if !signer.verify(fields, signature) {
            return Err(ReconcileError::SignatureInvalid);
        }

        let payment_no = required_str(fields, "out_trade_no")?;
        let result_code = required_str(fields, "result_code")?;
        let total_fee = amount(fields)?;
        let transaction_id = fields
            .get("transaction_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let paid_at = fields
            .get("time_end")
            .and_then(Value::as_str)
            .and_then(parse_time_end);

        Ok(Self {
            payment_no,
            transaction_id,
            total_fee,
            result_code,
            paid_at,
            raw,
        })
    }

    /// Returns true if the gateway reports the charge as paid.
    pub fn is_success(&self) -> bool {
        self.result_code.eq_ignore_ascii_case(RESULT_SUCCESS)
    }
}

fn required_str(fields: &Map<String, Value>, key: &str) -> Result<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ReconcileError::MalformedPayload(format!("missing field {key}")))
}

fn amount(fields: &Map<String, Value>) -> Result<i64> {
    let fee = match fields.get("total_fee") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    };
    fee.ok_or_else(|| ReconcileError::MalformedPayload("missing or invalid total_fee".into()))
}

/// Parses a gateway `YYYYMMDDhhmmss` timestamp, read as UTC.
pub fn parse_time_end(value: &str) -> Option<DateTime<Utc>> {
    match NaiveDateTime::parse_from_str(value, TIME_END_FORMAT) {
        Ok(t) => Some(t.and_utc()),
        Err(_) => {
            tracing::debug!(time_end = value, "Ignoring unparseable time_end");
            None
        }
    }
}

/// Builds signed notification bodies, as the gateway would send them.
///
/// Used by the sandbox flow and by tests.
#[derive(Debug, Clone)]
pub struct NotificationBuilder {
    fields: Map<String, Value>,
}

impl NotificationBuilder {
    /// A notification reporting a completed charge.
    pub fn success(payment_no: &str, transaction_id: &str, total_fee: i64) -> Self {
        Self::new(payment_no, total_fee, RESULT_SUCCESS).field("transaction_id", transaction_id)
    }

    /// A notification reporting a failed charge.
    pub fn failure(payment_no: &str, total_fee: i64) -> Self {
        Self::new(payment_no, total_fee, RESULT_FAIL)
    }

    fn new(payment_no: &str, total_fee: i64, result_code: &str) -> Self {
        Self { fields: Map::new() }
            .field("out_trade_no", payment_no)
            .field("total_fee", total_fee)
            .field("result_code", result_code)
            .field("return_code", RESULT_SUCCESS)
    }

    /// Sets the completion time from a timestamp.
    pub fn time_end(self, at: DateTime<Utc>) -> Self {
        let text = at.format(TIME_END_FORMAT).to_string();
        self.field("time_end", text)
    }

    /// Sets an arbitrary field.
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Signs the fields and returns the body.
    pub fn sign(mut self, signer: &NotificationSigner) -> Value {
        let signature = signer.sign(&self.fields);
        self.fields.insert(SIGN_FIELD.to_string(), Value::String(signature));
        Value::Object(self.fields)
    }

    /// Signs the fields and returns the serialized body.
    pub fn to_body(self, signer: &NotificationSigner) -> Vec<u8> {
        self.sign(signer).to_string().into_bytes()
    }
}
