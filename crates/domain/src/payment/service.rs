//! Payment service: creating, cancelling and listing payments.

use std::time::{Duration, Instant};

use chrono::Utc;
use common::{Money, OrderId, PaymentId, UserId};
use rental_store::{
    Order, OrderStatus, Page, Payment, PaymentMethod, PaymentPurpose, PaymentQuery,
    PaymentStatus, RentalStore, RentalStoreExt,
};
use serde::Serialize;

use crate::error::DomainError;
use crate::numbering;

use super::{ChargeRequest, ChargeStatus, GatewayParams, PaymentError, PaymentGateway};

/// Default bound on a single gateway call.
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(5);

/// Command to pay for an order.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub order_id: OrderId,
    pub actor_id: UserId,
    pub purpose: PaymentPurpose,
    pub method: PaymentMethod,
}

impl CreatePayment {
    pub fn new(order_id: OrderId, actor_id: UserId, purpose: PaymentPurpose) -> Self {
        Self {
            order_id,
            actor_id,
            purpose,
            method: PaymentMethod::default(),
        }
    }

    pub fn method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }
}

/// A freshly created payment plus what the client needs to complete it.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub payment: Payment,
    pub gateway_params: GatewayParams,
}

/// Amount owed on an order for a purpose, from the order's price snapshot.
pub fn amount_for(order: &Order, purpose: PaymentPurpose) -> Option<Money> {
    match purpose {
        PaymentPurpose::Rent => Some(order.total_price),
        PaymentPurpose::Deposit => Some(order.deposit),
        PaymentPurpose::Refund => None,
    }
}

/// Purposes that must all be paid before the order is confirmed.
pub fn required_purposes(order: &Order) -> Vec<PaymentPurpose> {
    let mut purposes = vec![PaymentPurpose::Rent];
    if order.deposit.is_positive() {
        purposes.push(PaymentPurpose::Deposit);
    }
    purposes
}

/// Service for initiating and managing payments against orders.
pub struct PaymentService<S, G> {
    store: S,
    gateway: G,
    timeout: Duration,
}

impl<S: RentalStore, G: PaymentGateway> PaymentService<S, G> {
    /// Creates a new payment service with the default gateway timeout.
    pub fn new(store: S, gateway: G) -> Self {
        Self {
            store,
            gateway,
            timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    /// Sets the bound on each gateway call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Creates a pending payment and opens the matching gateway charge.
    ///
    /// If the gateway fails or times out the payment stays pending and the
    /// error carries its payment number.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, purpose = %cmd.purpose))]
    pub async fn create_payment(&self, cmd: CreatePayment) -> Result<PaymentIntent, DomainError> {
        if cmd.purpose == PaymentPurpose::Refund {
            return Err(
                PaymentError::Validation("refunds cannot be initiated by the payer".to_string())
                    .into(),
            );
        }

        let order = self
            .store
            .get_order(cmd.order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(cmd.order_id))?;

        if order.renter_id != cmd.actor_id {
            return Err(PaymentError::Forbidden.into());
        }
        if order.status != OrderStatus::Pending {
            return Err(PaymentError::OrderNotPayable {
                status: order.status,
            }
            .into());
        }

        let amount = amount_for(&order, cmd.purpose).unwrap_or_default();
        if !amount.is_positive() {
            return Err(PaymentError::InvalidAmount(amount.minor_units()).into());
        }

        if self
            .store
            .pending_payment(order.id, cmd.purpose)
            .await?
            .is_some()
        {
            return Err(PaymentError::DuplicatePendingPayment {
                order_id: order.id,
                purpose: cmd.purpose,
            }
            .into());
        }

        let now = Utc::now();
        let payment = Payment {
            id: PaymentId::new(),
            payment_no: numbering::payment_no(),
            order_id: order.id,
            payer_id: cmd.actor_id,
            purpose: cmd.purpose,
            method: cmd.method,
            amount,
            status: PaymentStatus::Pending,
            external_transaction_id: None,
            raw_notify_payload: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        // The store enforces one pending payment per purpose atomically.
        let payment = self.store.insert_payment(payment).await?;

        metrics::counter!("payments_created_total", "purpose" => payment.purpose.as_str())
            .increment(1);
        tracing::info!(payment_no = %payment.payment_no, amount = %payment.amount, "Payment created");

        let request = ChargeRequest {
            payment_no: payment.payment_no.clone(),
            amount: payment.amount,
            method: payment.method,
            description: format!("{} for order {}", payment.purpose, order.order_no),
        };
        let gateway_params = self
            .bounded("create_charge", &payment.payment_no, self.gateway.create_charge(&request))
            .await?;

        Ok(PaymentIntent {
            payment,
            gateway_params,
        })
    }

    /// Asks the gateway for the current state of a charge, bounded by the timeout.
    #[tracing::instrument(skip(self))]
    pub async fn query_gateway(&self, payment_no: &str) -> Result<ChargeStatus, PaymentError> {
        self.bounded("query_charge", payment_no, self.gateway.query_charge(payment_no))
            .await
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        payment_no: &str,
        call: impl Future<Output = Result<T, super::GatewayError>>,
    ) -> Result<T, PaymentError> {
        let start = Instant::now();
        let result = tokio::time::timeout(self.timeout, call).await;
        metrics::histogram!("gateway_call_duration_seconds", "operation" => operation)
            .record(start.elapsed().as_secs_f64());

        let reason = match result {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}ms", self.timeout.as_millis()),
        };

        tracing::warn!(payment_no, operation, %reason, "Gateway call failed");
        Err(PaymentError::GatewayUnavailable {
            payment_no: payment_no.to_string(),
            reason,
        })
    }

    /// Cancels the actor's payment while it is still pending.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_payment(
        &self,
        payment_id: PaymentId,
        actor_id: UserId,
    ) -> Result<Payment, DomainError> {
        let payment = self.get_payment(payment_id, actor_id).await?;

        match self.store.cancel_payment(payment.id).await? {
            Some(cancelled) => {
                tracing::info!(payment_no = %cancelled.payment_no, "Payment cancelled");
                Ok(cancelled)
            }
            None => {
                let status = self
                    .store
                    .get_payment(payment_id)
                    .await?
                    .map_or(payment.status, |p| p.status);
                Err(PaymentError::NotPending { status }.into())
            }
        }
    }

    /// Loads a payment owned by the actor; other users' payments are reported as missing.
    #[tracing::instrument(skip(self))]
    pub async fn get_payment(
        &self,
        payment_id: PaymentId,
        actor_id: UserId,
    ) -> Result<Payment, DomainError> {
        self.store
            .get_payment(payment_id)
            .await?
            .filter(|p| p.payer_id == actor_id)
            .ok_or_else(|| PaymentError::NotFound(payment_id).into())
    }

    /// Lists the actor's payments, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_payments(&self, query: PaymentQuery) -> Result<Page<Payment>, DomainError> {
        Ok(self.store.query_payments(&query).await?)
    }
}
