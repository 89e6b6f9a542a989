//! Price value object.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ValidationError;

/// A non-negative amount in minor currency units with its currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
    amount_cents: i64,
    currency: String,
}

impl Price {
    /// Creates a price, normalising the currency code to upper case.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the amount is negative or the currency is
    /// not a three-letter alphabetic code.
    pub fn new(amount_cents: i64, currency: impl AsRef<str>) -> Result<Self, ValidationError> {
        if amount_cents < 0 {
            return Err(ValidationError::out_of_range("price", 0, i64::MAX, amount_cents));
        }

        let currency = currency.as_ref().trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::invalid_format(
                "currency",
                format!("expected a three-letter code, got '{}'", currency),
            ));
        }

        Ok(Self {
            amount_cents,
            currency,
        })
    }

    pub fn amount_cents(&self) -> i64 {
        self.amount_cents
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02} {}",
            self.amount_cents / 100,
            self.amount_cents % 100,
            self.currency
        )
    }
}
