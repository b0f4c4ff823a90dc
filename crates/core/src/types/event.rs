//! Raw trade records as delivered by the event stream.
//!
//! The upstream producer joins each trade with rolling-window aggregates and
//! publishes a flat JSON object per trade. [`RawEvent`] keeps that object
//! untouched; validation happens in the feature extractor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::price::Price;

/// Field names published by the upstream producer.
pub mod fields {
    pub const TIME: &str = "TIME";
    pub const PRICE: &str = "PRICE";
    pub const SIDE: &str = "SIDE";
    pub const VOLUME_100S: &str = "VOLUME_100S";
    pub const AVG_PRICE_100S: &str = "AVG_PRICE_100S";
    pub const PREV_VOLUME_100S: &str = "prev_VOLUME_100S";
}

/// Placeholder rendered for fields the event does not carry.
const MISSING: &str = "N/A";

/// A flat key/value trade record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEvent(Map<String, Value>);

impl RawEvent {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Decode one stream message. Anything but a JSON object is rejected.
    pub fn from_json(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }

    /// Look up a field. JSON `null` counts as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Builder-style insert, mostly for tests and synthetic feeds.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Render a field the way the trade log prints opaque values: strings
    /// verbatim, numbers in their JSON form, `N/A` when absent.
    pub fn label(&self, key: &str) -> String {
        match self.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => MISSING.to_string(),
        }
    }

    /// Event timestamp as printed in the trade log.
    pub fn time_label(&self) -> String {
        self.label(fields::TIME)
    }

    /// Rolling volume as printed in the trade log.
    pub fn volume_label(&self) -> String {
        self.label(fields::VOLUME_100S)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The validated slice of a [`RawEvent`] that the execution policy needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketTick {
    /// Opaque event timestamp, as printed in the trade log.
    pub time: String,
    /// Trade price; positive for every tick that reaches the policy.
    pub price: Price,
    /// Rolling volume, as printed in the trade log.
    pub volume: String,
}

impl MarketTick {
    /// Pair a validated price with the display fields of its source event.
    pub fn from_event(event: &RawEvent, price: Price) -> Self {
        Self {
            time: event.time_label(),
            price,
            volume: event.volume_label(),
        }
    }
}
