use common::{Money, RentalPeriod};
use serde::Serialize;

use super::OrderError;

/// Price snapshot taken when an order is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub days: i64,
    pub daily_price: Money,
    pub total_price: Money,
    pub deposit: Money,
}

impl Quote {
    /// Prices a period linearly: `days * daily_rate`.
    pub fn compute(
        period: RentalPeriod,
        daily_rate: Money,
        deposit: Money,
    ) -> Result<Self, OrderError> {
        let days = period.days();
        let invalid = || OrderError::InvalidPrice {
            days,
            daily_rate: daily_rate.minor_units(),
        };

        if !daily_rate.is_positive() || deposit.minor_units() < 0 {
            return Err(invalid());
        }
        let total_price = daily_rate.checked_multiply(days).ok_or_else(invalid)?;

        Ok(Self {
            days,
            daily_price: daily_rate,
            total_price,
            deposit,
        })
    }
}
