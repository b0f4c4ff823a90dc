//! # tb-ledger
//!
//! The single-unit trading account and everything that mutates it. The
//! [`TradingAccount`] enforces the ledger invariants, [`execute`] applies
//! one oracle decision per tick according to the FLAT/LONG state machine,
//! and [`TradeLog`] persists one line per processed tick.

pub mod account;
pub mod policy;
pub mod trade_log;

pub use account::{AccountError, Position, TradingAccount};
pub use policy::{execute, LogEntry, Outcome};
pub use trade_log::TradeLog;
