//! # tb-core
//!
//! Shared types, traits, and utilities for the trade bot.
//!
//! This crate provides the building blocks used by every other crate in the
//! workspace: the fixed-point [`Price`](types::Price) used for all ledger
//! arithmetic, the oracle [`Action`](types::Action) codes, the flat
//! [`RawEvent`](types::RawEvent) record delivered by the stream, layered
//! configuration, and tracing initialization.

pub mod config;
pub mod logging;
pub mod types;
