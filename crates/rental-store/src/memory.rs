use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, PaymentId, RentalPeriod, ResourceId, UserId};
use tokio::sync::RwLock;

use crate::model::{Order, OrderStatus, Payment, PaymentStatus, Settlement};
use crate::query::{OrderQuery, OrderStats, Page, PaymentQuery};
use crate::store::RentalStore;
use crate::{Result, StoreError};

#[derive(Debug, Default)]
struct InMemoryState {
    orders: HashMap<OrderId, Order>,
    payments: HashMap<PaymentId, Payment>,
    fail_on_write: bool,
    failing_status_updates: usize,
}

impl InMemoryState {
    fn conflicts(&self, resource_id: ResourceId, period: &RentalPeriod, exclude: Option<OrderId>) -> bool {
        self.orders.values().any(|o| {
            o.resource_id == resource_id
                && Some(o.id) != exclude
                && o.status.holds_calendar()
                && o.period.overlaps(period)
        })
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_on_write {
            return Err(StoreError::Unavailable("write rejected".to_string()));
        }
        Ok(())
    }
}

/// In-memory rental store implementation for testing.
///
/// Every write runs under a single write lock, so conflict checks and
/// compare-and-set updates are trivially atomic. It provides the same
/// interface as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryRentalStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryRentalStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of payments stored.
    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }

    /// Configures every subsequent write to fail, simulating an outage.
    pub async fn set_fail_on_write(&self, fail: bool) {
        self.state.write().await.fail_on_write = fail;
    }

    /// Makes the next `count` order status updates fail, leaving payment
    /// writes untouched.
    pub async fn fail_next_status_updates(&self, count: usize) {
        self.state.write().await.failing_status_updates = count;
    }
}

fn paginate<T>(mut items: Vec<T>, page: crate::query::PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let items = if offset >= items.len() {
        Vec::new()
    } else {
        items.drain(offset..).take(page.limit() as usize).collect()
    };
    Page {
        items,
        total,
        request: page,
    }
}

#[async_trait]
impl RentalStore for InMemoryRentalStore {
    async fn insert_order(&self, order: Order) -> Result<Order> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        if state.orders.values().any(|o| o.order_no == order.order_no) {
            return Err(StoreError::DuplicateKey(order.order_no));
        }

        if state.conflicts(order.resource_id, &order.period, None) {
            return Err(StoreError::DateRangeConflict {
                resource_id: order.resource_id,
                period: order.period,
            });
        }

        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn get_order_by_no(&self, order_no: &str) -> Result<Option<Order>> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .values()
            .find(|o| o.order_no == order_no)
            .cloned())
    }

    async fn query_orders(&self, query: &OrderQuery) -> Result<Page<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| query.matches(o.renter_id, o.owner_id, o.status))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(orders, query.page))
    }

    async fn order_stats(&self, user_id: UserId) -> Result<OrderStats> {
        let state = self.state.read().await;
        let mut stats = OrderStats::default();

        for order in state.orders.values().filter(|o| o.involves(user_id)) {
            let rented = order.renter_id == user_id;
            let owned = order.owner_id == user_id;
            if rented {
                stats.rented_count += 1;
            }
            if owned {
                stats.owned_count += 1;
            }
            match order.status {
                OrderStatus::Pending => stats.pending_count += 1,
                OrderStatus::Ongoing => stats.ongoing_count += 1,
                OrderStatus::Completed => {
                    stats.completed_count += 1;
                    if rented {
                        stats.total_spent += order.total_price.minor_units();
                    }
                    if owned {
                        stats.total_earned += order.total_price.minor_units();
                    }
                }
                _ => {}
            }
        }

        Ok(stats)
    }

    async fn has_conflict(
        &self,
        resource_id: ResourceId,
        period: RentalPeriod,
        exclude: Option<OrderId>,
    ) -> Result<bool> {
        Ok(self
            .state
            .read()
            .await
            .conflicts(resource_id, &period, exclude))
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        remark: Option<String>,
    ) -> Result<Option<Order>> {
        let mut state = self.state.write().await;
        state.check_writable()?;
        if state.failing_status_updates > 0 {
            state.failing_status_updates -= 1;
            return Err(StoreError::Unavailable("status update rejected".to_string()));
        }

        let Some(current) = state.orders.get(&id) else {
            return Ok(None);
        };
        if current.status != expected {
            return Ok(None);
        }

        if next.holds_calendar() && !expected.holds_calendar() {
            let (resource_id, period) = (current.resource_id, current.period);
            if state.conflicts(resource_id, &period, Some(id)) {
                return Err(StoreError::DateRangeConflict {
                    resource_id,
                    period,
                });
            }
        }

        let Some(order) = state.orders.get_mut(&id) else {
            return Ok(None);
        };
        order.status = next;
        if remark.is_some() {
            order.remark = remark;
        }
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn insert_payment(&self, payment: Payment) -> Result<Payment> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        if state
            .payments
            .values()
            .any(|p| p.payment_no == payment.payment_no)
        {
            return Err(StoreError::DuplicateKey(payment.payment_no));
        }

        if payment.status == PaymentStatus::Pending
            && state.payments.values().any(|p| {
                p.order_id == payment.order_id
                    && p.purpose == payment.purpose
                    && p.status == PaymentStatus::Pending
            })
        {
            return Err(StoreError::DuplicatePendingPayment {
                order_id: payment.order_id,
                purpose: payment.purpose,
            });
        }

        state.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.state.read().await.payments.get(&id).cloned())
    }

    async fn get_payment_by_no(&self, payment_no: &str) -> Result<Option<Payment>> {
        Ok(self
            .state
            .read()
            .await
            .payments
            .values()
            .find(|p| p.payment_no == payment_no)
            .cloned())
    }

    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        let state = self.state.read().await;
        let mut payments: Vec<_> = state
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn query_payments(&self, query: &PaymentQuery) -> Result<Page<Payment>> {
        let state = self.state.read().await;
        let mut payments: Vec<_> = state
            .payments
            .values()
            .filter(|p| p.payer_id == query.payer_id)
            .filter(|p| query.order_id.is_none_or(|id| p.order_id == id))
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(payments, query.page))
    }

    async fn settle_payment(
        &self,
        payment_no: &str,
        settlement: Settlement,
    ) -> Result<Option<Payment>> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        let Some(payment) = state
            .payments
            .values_mut()
            .find(|p| p.payment_no == payment_no && p.status.is_open())
        else {
            return Ok(None);
        };

        payment.status = settlement.status;
        payment.external_transaction_id = settlement.external_transaction_id;
        payment.raw_notify_payload = Some(settlement.raw_payload);
        payment.paid_at = settlement.paid_at;
        payment.updated_at = Utc::now();
        Ok(Some(payment.clone()))
    }

    async fn cancel_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        let Some(payment) = state
            .payments
            .get_mut(&id)
            .filter(|p| p.status == PaymentStatus::Pending)
        else {
            return Ok(None);
        };

        payment.status = PaymentStatus::Cancelled;
        payment.updated_at = Utc::now();
        Ok(Some(payment.clone()))
    }
}
