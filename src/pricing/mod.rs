//! Pricing: the material table and the order price calculator.

pub mod calculator;
pub mod catalog;

pub use calculator::{Price, compute, format_decimal, format_price};
pub use catalog::{Material, MaterialPricing, PricingTable, Subtype};
