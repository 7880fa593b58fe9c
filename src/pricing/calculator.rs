//! Price calculator: area × unit price × quantity, formatted for the receipt.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalog::PricingTable;
use crate::error::PricingError;

/// A computed order total. Displays as `1 800,00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_price(self.0))
    }
}

/// Compute the total for an order.
///
/// `width` and `height` are meters; the unit price is per square meter.
pub fn compute(
    table: &PricingTable,
    material: &str,
    subtype: Option<&str>,
    width: Decimal,
    height: Decimal,
    quantity: u32,
) -> Result<Price, PricingError> {
    let unit_price = table.unit_price(material, subtype)?;

    let total = width
        .checked_mul(height)
        .and_then(|area| area.checked_mul(unit_price))
        .and_then(|per_item| per_item.checked_mul(Decimal::from(quantity)))
        .ok_or_else(|| PricingError::Overflow {
            material: material.to_string(),
        })?;

    Ok(Price(total))
}

/// Format an amount with space-separated thousands, a comma decimal
/// separator and exactly two fractional digits (banker's rounding).
pub fn format_price(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let digits = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped},{frac_part}")
}

/// Format a measurement without trailing zeros, with a comma separator.
pub fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string().replace('.', ",")
}
