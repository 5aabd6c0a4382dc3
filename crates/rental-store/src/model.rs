//! Persisted records for orders, payments and catalog resources.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId, RentalPeriod, ResourceId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a stored status string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Lifecycle status of a rental order.
///
/// ```text
/// pending ──► confirmed ──► ongoing ──► completed
///    │            │  │         │
///    └────────────┴──┼─► cancelled
///                    └─────────┴──► dispute
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, awaiting payment or owner confirmation.
    #[default]
    Pending,
    /// Booking accepted; the dates are held.
    Confirmed,
    /// The renter has the item.
    Ongoing,
    /// Rental finished (terminal).
    Completed,
    /// Booking withdrawn (terminal).
    Cancelled,
    /// Escalated; resolution happens outside this system (terminal).
    Dispute,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Ongoing,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Dispute,
    ];

    /// Returns true if an order in this status blocks its date range for other renters.
    pub fn holds_calendar(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Ongoing)
    }

    /// Returns true if no further transition is defined from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Dispute
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Ongoing => "ongoing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Dispute => "dispute",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("order status", s))
    }
}

/// Status of a single payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Success,
    Failed,
    Cancelled,
    Refunded,
    PartialRefunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 7] = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Success,
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
        PaymentStatus::Refunded,
        PaymentStatus::PartialRefunded,
    ];

    /// Returns true while a gateway result may still be applied to the payment.
    pub fn is_open(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }

    /// Returns true once a result has been recorded.
    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::PartialRefunded => "partial_refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("payment status", s))
    }
}

/// What a payment is for within its order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    Rent,
    Deposit,
    Refund,
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPurpose::Rent => "rent",
            PaymentPurpose::Deposit => "deposit",
            PaymentPurpose::Refund => "refund",
        }
    }
}

impl std::fmt::Display for PaymentPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentPurpose {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rent" => Ok(PaymentPurpose::Rent),
            "deposit" => Ok(PaymentPurpose::Deposit),
            "refund" => Ok(PaymentPurpose::Refund),
            other => Err(ParseEnumError::new("payment purpose", other)),
        }
    }
}

/// Payment channel used to settle a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Wechat,
    Alipay,
    Bank,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Wechat => "wechat",
            PaymentMethod::Alipay => "alipay",
            PaymentMethod::Bank => "bank",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wechat" => Ok(PaymentMethod::Wechat),
            "alipay" => Ok(PaymentMethod::Alipay),
            "bank" => Ok(PaymentMethod::Bank),
            other => Err(ParseEnumError::new("payment method", other)),
        }
    }
}

/// Availability flag of a catalog resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    #[default]
    Available,
    Rented,
    Maintenance,
    Offline,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Available => "available",
            Availability::Rented => "rented",
            Availability::Maintenance => "maintenance",
            Availability::Offline => "offline",
        }
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Availability {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Availability::Available),
            "rented" => Ok(Availability::Rented),
            "maintenance" => Ok(Availability::Maintenance),
            "offline" => Ok(Availability::Offline),
            other => Err(ParseEnumError::new("availability", other)),
        }
    }
}

/// A listed item as seen by the booking core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub owner_id: UserId,
    pub daily_rate: Money,
    pub deposit: Money,
    pub availability: Availability,
}

/// A renter-to-resource booking.
///
/// Prices are snapshotted at creation and never follow later catalog changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_no: String,
    pub resource_id: ResourceId,
    pub renter_id: UserId,
    pub owner_id: UserId,
    pub period: RentalPeriod,
    pub days: i64,
    pub daily_price: Money,
    pub total_price: Money,
    pub deposit: Money,
    pub status: OrderStatus,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns true if the user is the renter or the owner of this order.
    pub fn involves(&self, user: UserId) -> bool {
        self.renter_id == user || self.owner_id == user
    }
}

/// A payment created against an order for one purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub payment_no: String,
    pub order_id: OrderId,
    pub payer_id: UserId,
    pub purpose: PaymentPurpose,
    pub method: PaymentMethod,
    pub amount: Money,
    pub status: PaymentStatus,
    pub external_transaction_id: Option<String>,
    pub raw_notify_payload: Option<serde_json::Value>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A gateway result to apply to an open payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Either `Success` or `Failed`.
    pub status: PaymentStatus,
    pub external_transaction_id: Option<String>,
    pub raw_payload: serde_json::Value,
    pub paid_at: Option<DateTime<Utc>>,
}
