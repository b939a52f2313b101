//! Pricing collaborator
//!
//! The pipeline only sees [`PricingRule`]. [`MarkupPricing`] is the shipped
//! rule: retail = cost × markup, rounded to cents.

use crate::models::SourceRecord;
use cmt_common::config::PricingSection;
use thiserror::Error;

/// Cost/retail pair for one record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub cost: f64,
    pub retail: f64,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PricingError {
    #[error("record has no cost")]
    MissingCost,

    #[error("cost must be a positive number (got {0})")]
    InvalidCost(f64),
}

/// Computes the price a migrated record is listed at
pub trait PricingRule: Send + Sync {
    fn price(&self, record: &SourceRecord) -> Result<Pricing, PricingError>;
}

/// Fixed-multiplier markup over supplier cost
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupPricing {
    pub markup: f64,
    /// End retail prices in .99
    pub charm: bool,
}

impl Default for MarkupPricing {
    fn default() -> Self {
        Self {
            markup: 2.0,
            charm: false,
        }
    }
}

impl From<&PricingSection> for MarkupPricing {
    fn from(section: &PricingSection) -> Self {
        Self {
            markup: section.markup,
            charm: section.charm_pricing,
        }
    }
}

impl PricingRule for MarkupPricing {
    fn price(&self, record: &SourceRecord) -> Result<Pricing, PricingError> {
        let cost = record.cost.ok_or(PricingError::MissingCost)?;
        if !cost.is_finite() || cost <= 0.0 {
            return Err(PricingError::InvalidCost(cost));
        }

        let mut retail = round_cents(cost * self.markup);
        if self.charm {
            retail = charm_price(retail);
        }

        Ok(Pricing { cost, retail })
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round up to the next price ending in .99 (12.00 → 12.99, 12.99 stays)
fn charm_price(value: f64) -> f64 {
    let charmed = value.floor() + 0.99;
    if charmed + 1e-9 < value {
        round_cents(charmed + 1.0)
    } else {
        round_cents(charmed)
    }
}
