//! # tb-ml
//!
//! Turns raw trade records into the 5-value feature vector the decision
//! oracle was trained on, and wraps the oracle itself behind the
//! [`DecisionOracle`] trait. The production oracle is a small Q-network
//! evaluated with candle on the CPU.

pub mod features;
pub mod model;
pub mod normalize;
pub mod oracle;

pub use features::{ExtractionError, FeatureVector, Observation};
pub use oracle::{DecisionOracle, QNetworkOracle};
