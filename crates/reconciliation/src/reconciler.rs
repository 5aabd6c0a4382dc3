//! Exactly-once application of gateway results to payments and orders.

use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId, UserId};
use domain::{
    ChargeStatus, DomainError, OrderError, OrderService, PaymentGateway, PaymentService,
    required_purposes,
};
use rental_store::{
    Order, OrderStatus, Payment, PaymentStatus, RentalStore, RentalStoreExt, ResourceCatalog,
    Settlement,
};
use serde_json::{Value, json};

use crate::error::{ReconcileError, Result};
use crate::notification::Notification;
use crate::signature::NotificationSigner;

/// What handling a gateway result did.
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// The payment moved to success. `confirmed_order` is set when this
    /// payment completed the order's required set and confirmed it.
    Settled {
        payment: Payment,
        confirmed_order: Option<Order>,
    },
    /// The payment moved to failed; the order is untouched.
    Failed { payment: Payment },
    /// The payment already had a result. A successful one re-checks the
    /// order, so `confirmed_order` is set if an earlier delivery settled
    /// the payment but failed before confirming.
    Replayed {
        payment_no: String,
        status: PaymentStatus,
        confirmed_order: Option<Order>,
    },
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Settled { .. } => "settled",
            ReconcileOutcome::Failed { .. } => "failed",
            ReconcileOutcome::Replayed { .. } => "replayed",
        }
    }
}

/// A gateway result, from a notification or a status poll.
struct GatewayResult {
    payment_no: String,
    paid: bool,
    transaction_id: Option<String>,
    amount: i64,
    paid_at: Option<DateTime<Utc>>,
    raw: Value,
}

/// Applies gateway results to payments and confirms fully paid orders.
///
/// Only the writer that wins the payment's compare-and-set changes the
/// payment. Every delivery of a success re-evaluates the order, whose own
/// compare-and-set keeps confirmation to exactly once.
pub struct PaymentReconciler<S, C, G> {
    store: S,
    orders: OrderService<S, C>,
    payments: PaymentService<S, G>,
    signer: NotificationSigner,
}

impl<S, C, G> PaymentReconciler<S, C, G>
where
    S: RentalStore + Clone,
    C: ResourceCatalog,
    G: PaymentGateway,
{
    /// Creates a reconciler and the order and payment services it drives.
    pub fn new(store: S, catalog: C, gateway: G, signer: NotificationSigner) -> Self {
        Self {
            orders: OrderService::new(store.clone(), catalog),
            payments: PaymentService::new(store.clone(), gateway),
            store,
            signer,
        }
    }

    /// Sets the bound on each gateway call.
    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.payments = self.payments.with_timeout(timeout);
        self
    }

    pub fn orders(&self) -> &OrderService<S, C> {
        &self.orders
    }

    pub fn payments(&self) -> &PaymentService<S, G> {
        &self.payments
    }

    pub fn signer(&self) -> &NotificationSigner {
        &self.signer
    }

    /// Handles a raw gateway notification body.
    ///
    /// The signature is verified before anything else; an unauthenticated
    /// body never touches state.
    #[tracing::instrument(skip(self, body), fields(bytes = body.len()))]
    pub async fn handle_notification(&self, body: &[u8]) -> Result<ReconcileOutcome> {
        let result = self.process_notification(body).await;

        let outcome = match &result {
            Ok(outcome) => outcome.label(),
            Err(e) => e.code(),
        };
        metrics::counter!("payment_notifications_total", "outcome" => outcome).increment(1);

        match &result {
            Ok(_) => {}
            Err(e) if e.acknowledges() => {
                tracing::warn!(error = %e, "Notification rejected");
            }
            Err(e) => tracing::error!(error = %e, "Notification not processed"),
        }
        result
    }

    async fn process_notification(&self, body: &[u8]) -> Result<ReconcileOutcome> {
        let notification = Notification::parse(body, &self.signer)?;
        tracing::info!(
            payment_no = %notification.payment_no,
            result_code = %notification.result_code,
            "Notification received"
        );

        self.apply(GatewayResult {
            paid: notification.is_success(),
            payment_no: notification.payment_no,
            transaction_id: notification.transaction_id,
            amount: notification.total_fee,
            paid_at: notification.paid_at,
            raw: notification.raw,
        })
        .await
    }

    async fn apply(&self, result: GatewayResult) -> Result<ReconcileOutcome> {
        let payment = self
            .store
            .get_payment_by_no(&result.payment_no)
            .await?
            .ok_or_else(|| ReconcileError::PaymentNotFound(result.payment_no.clone()))?;

        if payment.status.is_terminal() {
            return self.replayed(payment).await;
        }

        if result.paid && result.amount != payment.amount.minor_units() {
            return Err(ReconcileError::AmountMismatch {
                payment_no: payment.payment_no,
                expected: payment.amount.minor_units(),
                actual: result.amount,
            });
        }

        let settlement = if result.paid {
            Settlement {
                status: PaymentStatus::Success,
                external_transaction_id: result.transaction_id,
                raw_payload: result.raw,
                paid_at: Some(result.paid_at.unwrap_or_else(Utc::now)),
            }
        } else {
            Settlement {
                status: PaymentStatus::Failed,
                external_transaction_id: result.transaction_id,
                raw_payload: result.raw,
                paid_at: None,
            }
        };

        let Some(settled) = self
            .store
            .settle_payment(&payment.payment_no, settlement)
            .await?
        else {
            // Another delivery won the compare-and-set.
            let current = self.store.get_payment(payment.id).await?.unwrap_or(payment);
            return self.replayed(current).await;
        };

        tracing::info!(
            payment_no = %settled.payment_no,
            status = %settled.status,
            "Payment settled"
        );

        if settled.status != PaymentStatus::Success {
            return Ok(ReconcileOutcome::Failed { payment: settled });
        }

        let confirmed_order = self.confirm_if_paid(settled.order_id).await?;
        Ok(ReconcileOutcome::Settled {
            payment: settled,
            confirmed_order,
        })
    }

    async fn replayed(&self, payment: Payment) -> Result<ReconcileOutcome> {
        tracing::debug!(payment_no = %payment.payment_no, status = %payment.status, "Result already applied");
        let confirmed_order = if payment.status == PaymentStatus::Success {
            self.confirm_if_paid(payment.order_id).await?
        } else {
            None
        };
        if confirmed_order.is_some() {
            tracing::info!(payment_no = %payment.payment_no, "Replay completed a pending confirmation");
        }
        Ok(ReconcileOutcome::Replayed {
            payment_no: payment.payment_no,
            status: payment.status,
            confirmed_order,
        })
    }

    /// Confirms the order if every required payment has succeeded.
    async fn confirm_if_paid(&self, order_id: OrderId) -> Result<Option<Order>> {
        let Some(order) = self.store.get_order(order_id).await? else {
            tracing::error!(%order_id, "Settled payment references a missing order");
            return Ok(None);
        };

        if order.status != OrderStatus::Pending {
            if order.status == OrderStatus::Cancelled {
                tracing::warn!(
                    order_no = %order.order_no,
                    "Payment settled for a cancelled order; refund required"
                );
            }
            return Ok(None);
        }

        for purpose in required_purposes(&order) {
            if !self.store.is_paid(order.id, purpose).await? {
                tracing::debug!(order_no = %order.order_no, %purpose, "Awaiting payment");
                return Ok(None);
            }
        }

        match self.orders.confirm_settled(order.id).await {
            Ok(confirmed) => Ok(confirmed),
            Err(DomainError::Order(OrderError::DateRangeConflict { period, .. })) => {
                tracing::warn!(
                    order_no = %order.order_no,
                    resource_id = %order.resource_id,
                    %period,
                    "Paid order lost its dates to another booking; refund required"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Re-evaluates confirmation for an order whose payments have settled.
    ///
    /// Recovers orders left pending when a failure struck between settling
    /// the last payment and confirming the order.
    #[tracing::instrument(skip(self))]
    pub async fn recheck_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        self.confirm_if_paid(order_id).await
    }

    /// Returns the actor's payment, polling the gateway while it is pending.
    ///
    /// A result reported by the gateway is applied exactly as a notification
    /// would be. Gateway failures leave the payment pending.
    #[tracing::instrument(skip(self))]
    pub async fn payment_status(&self, payment_id: PaymentId, actor_id: UserId) -> Result<Payment> {
        let payment = self.payments.get_payment(payment_id, actor_id).await?;
        if payment.status != PaymentStatus::Pending {
            return Ok(payment);
        }

        let result = match self.payments.query_gateway(&payment.payment_no).await {
            Ok(ChargeStatus::NotPaid) => return Ok(payment),
            Ok(ChargeStatus::Paid {
                transaction_id,
                amount,
                paid_at,
            }) => GatewayResult {
                payment_no: payment.payment_no.clone(),
                paid: true,
                raw: json!({
                    "source": "query",
                    "transaction_id": transaction_id,
                    "total_fee": amount.minor_units(),
                }),
                transaction_id: Some(transaction_id),
                amount: amount.minor_units(),
                paid_at,
            },
            Ok(ChargeStatus::Failed { reason }) => GatewayResult {
                payment_no: payment.payment_no.clone(),
                paid: false,
                raw: json!({ "source": "query", "reason": reason }),
                transaction_id: None,
                amount: payment.amount.minor_units(),
                paid_at: None,
            },
            // Already logged by the payment service.
            Err(_) => return Ok(payment),
        };

        match self.apply(result).await {
            Ok(outcome) => {
                metrics::counter!("payment_notifications_total", "outcome" => outcome.label())
                    .increment(1);
            }
            Err(e) if e.acknowledges() => {
                tracing::warn!(payment_no = %payment.payment_no, error = %e, "Polled result rejected");
            }
            Err(e) => return Err(e),
        }

        Ok(self
            .store
            .get_payment(payment.id)
            .await?
            .unwrap_or(payment))
    }
}
