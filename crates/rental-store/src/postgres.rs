use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use common::{Money, OrderId, PaymentId, RentalPeriod, ResourceId, UserId};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    catalog::ResourceCatalog,
    model::{Availability, Order, OrderStatus, Payment, PaymentStatus, Resource, Settlement},
    query::{OrderQuery, OrderScope, OrderStats, Page, PaymentQuery},
    store::RentalStore,
};

const ORDER_COLUMNS: &str = "id, order_no, resource_id, renter_id, owner_id, start_date, end_date, \
     days, daily_price, total_price, deposit, status, remark, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, payment_no, order_id, payer_id, purpose, method, amount, status, \
     external_transaction_id, raw_notify_payload, paid_at, created_at, updated_at";

const OVERLAP_CONSTRAINT: &str = "orders_no_overlapping_holds";
const PENDING_PAYMENT_INDEX: &str = "payments_one_pending_per_purpose";

/// PostgreSQL-backed rental store implementation.
///
/// Writes that touch a resource's calendar serialize on a transaction-scoped
/// advisory lock keyed by the resource ID. The `orders_no_overlapping_holds`
/// exclusion constraint backs the same invariant at the schema level.
#[derive(Clone)]
pub struct PostgresRentalStore {
    pool: PgPool,
}

impl PostgresRentalStore {
    /// Creates a new PostgreSQL rental store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let period = RentalPeriod::new(
            row.try_get::<NaiveDate, _>("start_date")?,
            row.try_get::<NaiveDate, _>("end_date")?,
        )?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_no: row.try_get("order_no")?,
            resource_id: ResourceId::from_uuid(row.try_get::<Uuid, _>("resource_id")?),
            renter_id: UserId::from_uuid(row.try_get::<Uuid, _>("renter_id")?),
            owner_id: UserId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
            period,
            days: row.try_get("days")?,
            daily_price: Money::from_minor(row.try_get("daily_price")?),
            total_price: Money::from_minor(row.try_get("total_price")?),
            deposit: Money::from_minor(row.try_get("deposit")?),
            status: row.try_get::<String, _>("status")?.parse()?,
            remark: row.try_get("remark")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_payment(row: PgRow) -> Result<Payment> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            payment_no: row.try_get("payment_no")?,
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            payer_id: UserId::from_uuid(row.try_get::<Uuid, _>("payer_id")?),
            purpose: row.try_get::<String, _>("purpose")?.parse()?,
            method: row.try_get::<String, _>("method")?.parse()?,
            amount: Money::from_minor(row.try_get("amount")?),
            status: row.try_get::<String, _>("status")?.parse()?,
            external_transaction_id: row.try_get("external_transaction_id")?,
            raw_notify_payload: row.try_get("raw_notify_payload")?,
            paid_at: row.try_get("paid_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Serializes calendar writes for one resource until the transaction ends.
    async fn lock_resource(tx: &mut Transaction<'_, Postgres>, resource_id: ResourceId) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(resource_id.as_uuid())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn conflict_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        resource_id: ResourceId,
        period: RentalPeriod,
        exclude: Option<OrderId>,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM orders
                WHERE resource_id = $1
                  AND status IN ('confirmed', 'ongoing')
                  AND start_date < $3
                  AND $2 < end_date
                  AND ($4::uuid IS NULL OR id <> $4)
            )
            "#,
        )
        .bind(resource_id.as_uuid())
        .bind(period.start())
        .bind(period.end())
        .bind(exclude.map(|id| id.as_uuid()))
        .fetch_one(&mut **tx)
        .await?;
        Ok(exists)
    }

    fn order_filter(query: &OrderQuery) -> String {
        let mut sql = match query.scope {
            OrderScope::All => " WHERE (renter_id = $1 OR owner_id = $1)",
            OrderScope::Rented => " WHERE renter_id = $1",
            OrderScope::Owned => " WHERE owner_id = $1",
        }
        .to_string();
        if query.status.is_some() {
            sql.push_str(" AND status = $2");
        }
        sql
    }

    fn payment_filter(query: &PaymentQuery) -> &'static str {
        if query.order_id.is_some() {
            " WHERE payer_id = $1 AND order_id = $2"
        } else {
            " WHERE payer_id = $1"
        }
    }
}

fn order_write_error(e: sqlx::Error, order: &Order) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        match db_err.constraint() {
            Some(OVERLAP_CONSTRAINT) => {
                return StoreError::DateRangeConflict {
                    resource_id: order.resource_id,
                    period: order.period,
                };
            }
            Some("orders_order_no_key") => return StoreError::DuplicateKey(order.order_no.clone()),
            _ => {}
        }
    }
    StoreError::Database(e)
}

fn payment_write_error(e: sqlx::Error, payment: &Payment) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        match db_err.constraint() {
            Some(PENDING_PAYMENT_INDEX) => {
                return StoreError::DuplicatePendingPayment {
                    order_id: payment.order_id,
                    purpose: payment.purpose,
                };
            }
            Some("payments_payment_no_key") => {
                return StoreError::DuplicateKey(payment.payment_no.clone());
            }
            _ => {}
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl RentalStore for PostgresRentalStore {
    async fn insert_order(&self, order: Order) -> Result<Order> {
        let mut tx = self.pool.begin().await?;
        Self::lock_resource(&mut tx, order.resource_id).await?;

        if Self::conflict_in_tx(&mut tx, order.resource_id, order.period, None).await? {
            tracing::debug!(order_no = %order.order_no, "Order overlaps a held booking");
            return Err(StoreError::DateRangeConflict {
                resource_id: order.resource_id,
                period: order.period,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_no, resource_id, renter_id, owner_id, start_date, end_date,
                                days, daily_price, total_price, deposit, status, remark, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.order_no)
        .bind(order.resource_id.as_uuid())
        .bind(order.renter_id.as_uuid())
        .bind(order.owner_id.as_uuid())
        .bind(order.period.start())
        .bind(order.period.end())
        .bind(order.days)
        .bind(order.daily_price.minor_units())
        .bind(order.total_price.minor_units())
        .bind(order.deposit.minor_units())
        .bind(order.status.as_str())
        .bind(&order.remark)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| order_write_error(e, &order))?;

        tx.commit().await?;
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_order).transpose()
    }

    async fn get_order_by_no(&self, order_no: &str) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_no = $1"
        ))
        .bind(order_no)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_order).transpose()
    }

    async fn query_orders(&self, query: &OrderQuery) -> Result<Page<Order>> {
        let filter = Self::order_filter(query);
        let status = query.status.map(|s| s.as_str());

        let count_sql = format!("SELECT COUNT(*) FROM orders{filter}");
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql).bind(query.user_id.as_uuid());
        if let Some(status) = status {
            count = count.bind(status);
        }
        let total = count.fetch_one(&self.pool).await?;

        let param = if status.is_some() { 3 } else { 2 };
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders{filter} ORDER BY created_at DESC, id \
             LIMIT ${} OFFSET ${}",
            param,
            param + 1
        );
        let mut rows = sqlx::query(&sql).bind(query.user_id.as_uuid());
        if let Some(status) = status {
            rows = rows.bind(status);
        }
        let rows = rows
            .bind(i64::from(query.page.limit()))
            .bind(query.page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(Self::row_to_order)
                .collect::<Result<_>>()?,
            total: total as u64,
            request: query.page,
        })
    }

    async fn order_stats(&self, user_id: UserId) -> Result<OrderStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE renter_id = $1) AS rented_count,
                COUNT(*) FILTER (WHERE owner_id = $1) AS owned_count,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending_count,
                COUNT(*) FILTER (WHERE status = 'ongoing') AS ongoing_count,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed_count,
                COALESCE(SUM(total_price) FILTER (WHERE status = 'completed' AND renter_id = $1), 0)::BIGINT AS total_spent,
                COALESCE(SUM(total_price) FILTER (WHERE status = 'completed' AND owner_id = $1), 0)::BIGINT AS total_earned
            FROM orders
            WHERE renter_id = $1 OR owner_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(OrderStats {
            rented_count: row.try_get::<i64, _>("rented_count")? as u64,
            owned_count: row.try_get::<i64, _>("owned_count")? as u64,
            pending_count: row.try_get::<i64, _>("pending_count")? as u64,
            ongoing_count: row.try_get::<i64, _>("ongoing_count")? as u64,
            completed_count: row.try_get::<i64, _>("completed_count")? as u64,
            total_spent: row.try_get("total_spent")?,
            total_earned: row.try_get("total_earned")?,
        })
    }

    async fn has_conflict(
        &self,
        resource_id: ResourceId,
        period: RentalPeriod,
        exclude: Option<OrderId>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let exists = Self::conflict_in_tx(&mut tx, resource_id, period, exclude).await?;
        tx.commit().await?;
        Ok(exists)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        remark: Option<String>,
    ) -> Result<Option<Order>> {
        let mut tx = self.pool.begin().await?;

        if next.holds_calendar() && !expected.holds_calendar() {
            let Some(row) = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?
            else {
                return Ok(None);
            };
            let current = Self::row_to_order(row)?;

            Self::lock_resource(&mut tx, current.resource_id).await?;
            if Self::conflict_in_tx(&mut tx, current.resource_id, current.period, Some(id)).await? {
                return Err(StoreError::DateRangeConflict {
                    resource_id: current.resource_id,
                    period: current.period,
                });
            }

            let row = sqlx::query(&format!(
                r#"
                UPDATE orders
                SET status = $3, remark = COALESCE($4, remark), updated_at = $5
                WHERE id = $1 AND status = $2
                RETURNING {ORDER_COLUMNS}
                "#
            ))
            .bind(id.as_uuid())
            .bind(expected.as_str())
            .bind(next.as_str())
            .bind(&remark)
            .bind(Utc::now())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| order_write_error(e, &current))?;

            tx.commit().await?;
            return row.map(Self::row_to_order).transpose();
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET status = $3, remark = COALESCE($4, remark), updated_at = $5
            WHERE id = $1 AND status = $2
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(&remark)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        row.map(Self::row_to_order).transpose()
    }

    async fn insert_payment(&self, payment: Payment) -> Result<Payment> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, payment_no, order_id, payer_id, purpose, method, amount, status,
                                  external_transaction_id, raw_notify_payload, paid_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(&payment.payment_no)
        .bind(payment.order_id.as_uuid())
        .bind(payment.payer_id.as_uuid())
        .bind(payment.purpose.as_str())
        .bind(payment.method.as_str())
        .bind(payment.amount.minor_units())
        .bind(payment.status.as_str())
        .bind(&payment.external_transaction_id)
        .bind(&payment.raw_notify_payload)
        .bind(payment.paid_at)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| payment_write_error(e, &payment))?;

        Ok(payment)
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_payment).transpose()
    }

    async fn get_payment_by_no(&self, payment_no: &str) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_no = $1"
        ))
        .bind(payment_no)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_payment).transpose()
    }

    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at ASC, id"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn query_payments(&self, query: &PaymentQuery) -> Result<Page<Payment>> {
        let filter = Self::payment_filter(query);

        let count_sql = format!("SELECT COUNT(*) FROM payments{filter}");
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql).bind(query.payer_id.as_uuid());
        if let Some(order_id) = query.order_id {
            count = count.bind(order_id.as_uuid());
        }
        let total = count.fetch_one(&self.pool).await?;

        let param = if query.order_id.is_some() { 3 } else { 2 };
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments{filter} ORDER BY created_at DESC, id \
             LIMIT ${} OFFSET ${}",
            param,
            param + 1
        );
        let mut rows = sqlx::query(&sql).bind(query.payer_id.as_uuid());
        if let Some(order_id) = query.order_id {
            rows = rows.bind(order_id.as_uuid());
        }
        let rows = rows
            .bind(i64::from(query.page.limit()))
            .bind(query.page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(Self::row_to_payment)
                .collect::<Result<_>>()?,
            total: total as u64,
            request: query.page,
        })
    }

    async fn settle_payment(
        &self,
        payment_no: &str,
        settlement: Settlement,
    ) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments
            SET status = $2, external_transaction_id = $3, raw_notify_payload = $4,
                paid_at = $5, updated_at = $6
            WHERE payment_no = $1 AND status IN ('pending', 'processing')
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_no)
        .bind(settlement.status.as_str())
        .bind(&settlement.external_transaction_id)
        .bind(&settlement.raw_payload)
        .bind(settlement.paid_at)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_payment).transpose()
    }

    async fn cancel_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments
            SET status = $2, updated_at = $3
            WHERE id = $1 AND status = 'pending'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(PaymentStatus::Cancelled.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_payment).transpose()
    }
}

/// PostgreSQL-backed resource catalog over the `resources` table.
#[derive(Clone)]
pub struct PostgresResourceCatalog {
    pool: PgPool,
}

impl PostgresResourceCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces a resource row.
    pub async fn upsert(&self, resource: &Resource) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO resources (id, owner_id, daily_rate, deposit, availability, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (id) DO UPDATE SET
                owner_id = EXCLUDED.owner_id,
                daily_rate = EXCLUDED.daily_rate,
                deposit = EXCLUDED.deposit,
                availability = EXCLUDED.availability,
                updated_at = NOW()
            "#,
        )
        .bind(resource.id.as_uuid())
        .bind(resource.owner_id.as_uuid())
        .bind(resource.daily_rate.minor_units())
        .bind(resource.deposit.minor_units())
        .bind(resource.availability.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceCatalog for PostgresResourceCatalog {
    async fn get_resource(&self, id: ResourceId) -> Result<Option<Resource>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT id, owner_id, daily_rate, deposit, availability FROM resources WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Resource {
                id: ResourceId::from_uuid(row.try_get::<Uuid, _>("id")?),
                owner_id: UserId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
                daily_rate: Money::from_minor(row.try_get("daily_rate")?),
                deposit: Money::from_minor(row.try_get("deposit")?),
                availability: row.try_get::<String, _>("availability")?.parse::<Availability>()?,
            })),
            None => Ok(None),
        }
    }

    async fn set_availability(&self, id: ResourceId, availability: Availability) -> Result<bool> {
        let result =
            sqlx::query("UPDATE resources SET availability = $2, updated_at = NOW() WHERE id = $1")
                .bind(id.as_uuid())
                .bind(availability.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
