//! Payment gateway port and a sandbox implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::Money;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rental_store::PaymentMethod;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

/// What the gateway needs to open a charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeRequest {
    pub payment_no: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub description: String,
}

/// Parameters the client hands to the gateway SDK to complete payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayParams {
    pub app_id: String,
    pub payment_no: String,
    /// Amount in minor units.
    pub amount: i64,
    pub method: PaymentMethod,
    pub prepay_id: String,
    pub nonce_str: String,
}

/// Gateway-side state of a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeStatus {
    /// The payer has not completed the charge yet.
    NotPaid,
    Paid {
        transaction_id: String,
        amount: Money,
        paid_at: Option<DateTime<Utc>>,
    },
    Failed {
        reason: String,
    },
}

/// Errors reported by a gateway adapter.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gateway answered and refused the request.
    #[error("Gateway rejected the request: {0}")]
    Rejected(String),

    /// The gateway could not be reached.
    #[error("Gateway unreachable: {0}")]
    Unreachable(String),
}

/// Port to an external payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a charge and returns the client-side payment parameters.
    async fn create_charge(&self, request: &ChargeRequest) -> Result<GatewayParams, GatewayError>;

    /// Queries the state of a previously opened charge.
    async fn query_charge(&self, payment_no: &str) -> Result<ChargeStatus, GatewayError>;
}

#[derive(Debug, Default)]
struct SandboxState {
    charges: HashMap<String, (Money, ChargeStatus)>,
    next_id: u64,
    fail_on_charge: bool,
    fail_on_query: bool,
    delay: Option<Duration>,
}

/// In-process gateway for local runs and tests.
///
/// Charges always open successfully unless configured to fail; tests drive
/// their outcome with [`settle`](Self::settle) and [`decline`](Self::decline).
#[derive(Debug, Clone)]
pub struct SandboxGateway {
    app_id: String,
    state: Arc<RwLock<SandboxState>>,
}

impl Default for SandboxGateway {
    fn default() -> Self {
        Self::new("sandbox")
    }
}

impl SandboxGateway {
    /// Creates a sandbox gateway reporting the given application ID.
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            state: Arc::new(RwLock::new(SandboxState::default())),
        }
    }

    /// Configures charge creation to fail.
    pub async fn set_fail_on_charge(&self, fail: bool) {
        self.state.write().await.fail_on_charge = fail;
    }

    /// Configures charge queries to fail.
    pub async fn set_fail_on_query(&self, fail: bool) {
        self.state.write().await.fail_on_query = fail;
    }

    /// Delays every call, to exercise caller timeouts.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().await.delay = delay;
    }

    /// Returns the number of charges opened.
    pub async fn charge_count(&self) -> usize {
        self.state.read().await.charges.len()
    }

    /// Marks a charge as paid in full. Returns false for unknown charges.
    pub async fn settle(&self, payment_no: &str, transaction_id: impl Into<String>) -> bool {
        let mut state = self.state.write().await;
        let Some((amount, status)) = state.charges.get_mut(payment_no) else {
            return false;
        };
        *status = ChargeStatus::Paid {
            transaction_id: transaction_id.into(),
            amount: *amount,
            paid_at: Some(Utc::now()),
        };
        true
    }

    /// Marks a charge as failed. Returns false for unknown charges.
    pub async fn decline(&self, payment_no: &str, reason: impl Into<String>) -> bool {
        let mut state = self.state.write().await;
        let Some((_, status)) = state.charges.get_mut(payment_no) else {
            return false;
        };
        *status = ChargeStatus::Failed {
            reason: reason.into(),
        };
        true
    }

    async fn simulate_latency(&self) {
        let delay = self.state.read().await.delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<GatewayParams, GatewayError> {
        self.simulate_latency().await;

        let mut state = self.state.write().await;
        if state.fail_on_charge {
            return Err(GatewayError::Unreachable("sandbox gateway offline".to_string()));
        }

        state.next_id += 1;
        let prepay_id = format!("sandbox_prepay_{:08}", state.next_id);
        state.charges.insert(
            request.payment_no.clone(),
            (request.amount, ChargeStatus::NotPaid),
        );

        let nonce_str: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();

        Ok(GatewayParams {
            app_id: self.app_id.clone(),
            payment_no: request.payment_no.clone(),
            amount: request.amount.minor_units(),
            method: request.method,
            prepay_id,
            nonce_str,
        })
    }

    async fn query_charge(&self, payment_no: &str) -> Result<ChargeStatus, GatewayError> {
        self.simulate_latency().await;

        let state = self.state.read().await;
        if state.fail_on_query {
            return Err(GatewayError::Unreachable("sandbox gateway offline".to_string()));
        }

        state
            .charges
            .get(payment_no)
            .map(|(_, status)| status.clone())
            .ok_or_else(|| GatewayError::Rejected(format!("unknown payment {payment_no}")))
    }
}
