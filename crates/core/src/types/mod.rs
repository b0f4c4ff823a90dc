//! Core types for the trade bot.
//!
//! Monetary values use fixed-point arithmetic so that balance updates are
//! exact; feature values stay floating-point for inference.

pub mod action;
pub mod event;
pub mod price;

// Re-export primary types for convenient access via `tb_core::types::*`.
pub use action::Action;
pub use event::{fields, MarketTick, RawEvent};
pub use price::Price;
