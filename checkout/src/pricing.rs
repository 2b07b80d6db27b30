//! Server-side cart pricing
//!
//! The orchestrator never trusts the client's computed total: the cart
//! is re-priced from item unit prices and quantities, plus a flat
//! express-delivery surcharge per flagged item.

use crate::{error::{Error, Result}, types::LineItem};
use rust_decimal::Decimal;

/// Pricing policy applied at checkout
#[derive(Debug, Clone)]
pub struct PricingPolicy {
    /// Flat surcharge per speed-post item
    speed_post_surcharge: Decimal,
}

impl PricingPolicy {
    /// Create policy with the given surcharge
    pub fn new(speed_post_surcharge: Decimal) -> Self {
        Self {
            speed_post_surcharge,
        }
    }

    /// Validate item fields before any pricing
    pub fn validate_items(&self, items: &[LineItem]) -> Result<()> {
        for item in items {
            if item.id.is_empty() {
                return Err(Error::Validation("Item id must not be empty".to_string()));
            }
            if item.unit_price < Decimal::ZERO {
                return Err(Error::Validation(format!(
                    "Item {} has a negative price",
                    item.id
                )));
            }
            if item.quantity == 0 {
                return Err(Error::Validation(format!(
                    "Item {} has zero quantity",
                    item.id
                )));
            }
        }
        Ok(())
    }

    /// Authoritative cart total: Σ(unit price × quantity) plus the
    /// surcharge once per speed-post item
    pub fn cart_total(&self, items: &[LineItem]) -> Decimal {
        items
            .iter()
            .map(|item| {
                let line = item.unit_price * Decimal::from(item.quantity);
                if item.speed_post {
                    line + self.speed_post_surcharge
                } else {
                    line
                }
            })
            .sum()
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self::new(Decimal::new(10, 0))
    }
}
