//! Feature extraction from raw trade records.
//!
//! The layout of [`FeatureVector`] is fixed by the trained oracle and must
//! not change: `[price, side_sign, rolling_volume, momentum, volume_delta]`.

use serde_json::Value;
use thiserror::Error;

use tb_core::types::{fields, MarketTick, Price, RawEvent};

/// Reasons a raw event cannot be turned into features.
///
/// Every variant is a per-event failure: the caller drops the event and
/// keeps consuming the stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` is not numeric")]
    NotNumeric(&'static str),
    #[error("field `{0}` is not a finite number")]
    NonFinite(&'static str),
    #[error("PRICE must be positive, got {0}")]
    NonPositivePrice(f64),
    #[error("PRICE {0} is outside the representable range")]
    PriceOutOfRange(f64),
}

/// Feature vector fed to the decision oracle.
///
/// All values are raw and finite; any normalization belongs to the oracle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    /// Trade price.
    pub price: f64,
    /// `+1` for `BUY`, `-1` for anything else.
    pub side_sign: f64,
    /// Volume over the trailing 100 s window.
    pub rolling_volume: f64,
    /// `price - AVG_PRICE_100S`.
    pub momentum: f64,
    /// `rolling_volume - prev_VOLUME_100S`, or 0 when the producer sent no history.
    pub volume_delta: f64,
}

impl FeatureVector {
    pub const NUM_FEATURES: usize = 5;

    /// Extract features from a raw event.
    ///
    /// `PRICE`, `SIDE`, `VOLUME_100S` and `AVG_PRICE_100S` are required and
    /// checked in that order, so a record missing several fields always
    /// reports the same one.
    pub fn extract(event: &RawEvent) -> Result<Self, ExtractionError> {
        for field in [
            fields::PRICE,
            fields::SIDE,
            fields::VOLUME_100S,
            fields::AVG_PRICE_100S,
        ] {
            if event.get(field).is_none() {
                return Err(ExtractionError::MissingField(field));
            }
        }

        let price = required_number(event, fields::PRICE)?;
        if price <= 0.0 {
            return Err(ExtractionError::NonPositivePrice(price));
        }
        let side_sign = match event.get(fields::SIDE) {
            Some(Value::String(side)) if side == "BUY" => 1.0,
            _ => -1.0,
        };
        let rolling_volume = required_number(event, fields::VOLUME_100S)?;
        let avg_price = required_number(event, fields::AVG_PRICE_100S)?;

        // Without history the delta collapses to 0; the oracle was trained
        // with the same fallback.
        let prev_volume = match event.get(fields::PREV_VOLUME_100S) {
            Some(value) => number(value, fields::PREV_VOLUME_100S)?,
            None => rolling_volume,
        };

        let momentum = finite(price - avg_price, "momentum")?;
        let volume_delta = finite(rolling_volume - prev_volume, "volume_delta")?;

        Ok(Self {
            price,
            side_sign,
            rolling_volume,
            momentum,
            volume_delta,
        })
    }

    /// Convert to a fixed-size array for normalization.
    pub fn to_array(&self) -> [f64; Self::NUM_FEATURES] {
        [
            self.price,
            self.side_sign,
            self.rolling_volume,
            self.momentum,
            self.volume_delta,
        ]
    }
}

/// A validated event: features for the oracle plus the tick the execution
/// policy trades on.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub features: FeatureVector,
    pub tick: MarketTick,
}

impl Observation {
    pub fn from_event(event: &RawEvent) -> Result<Self, ExtractionError> {
        let features = FeatureVector::extract(event)?;
        let price = Price::from_f64(features.price)
            .ok_or(ExtractionError::PriceOutOfRange(features.price))?;
        // Sub-resolution prices round to zero at ledger scale.
        if !price.is_positive() {
            return Err(ExtractionError::NonPositivePrice(features.price));
        }
        Ok(Self {
            features,
            tick: MarketTick::from_event(event, price),
        })
    }
}

fn required_number(event: &RawEvent, field: &'static str) -> Result<f64, ExtractionError> {
    let value = event
        .get(field)
        .ok_or(ExtractionError::MissingField(field))?;
    number(value, field)
}

/// Numbers may arrive as JSON numbers or as numeric strings.
fn number(value: &Value, field: &'static str) -> Result<f64, ExtractionError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64().ok_or(ExtractionError::NotNumeric(field))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ExtractionError::NotNumeric(field))?,
        _ => return Err(ExtractionError::NotNumeric(field)),
    };
    finite(parsed, field)
}

fn finite(value: f64, field: &'static str) -> Result<f64, ExtractionError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ExtractionError::NonFinite(field))
    }
}
