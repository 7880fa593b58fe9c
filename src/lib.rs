//! Print Quote: a Telegram bot that prices print orders by material, size
//! and quantity.

pub mod bot;
pub mod channels;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod guard;
pub mod logging;
pub mod pricing;
pub mod session;
