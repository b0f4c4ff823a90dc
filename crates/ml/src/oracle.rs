//! Decision oracle seam.
//!
//! [`DecisionOracle`] is the only thing the pipeline knows about the model:
//! features in, integer action code out. Codes are normalized by the
//! execution policy, so an oracle may return anything.
//!
//! [`QNetworkOracle`] is the production implementation: it loads a trained
//! Q-network once at startup and acts greedily on its Q-values.

use std::path::Path;

use anyhow::{bail, Context, Result};
use candle_core::Device;

use crate::features::FeatureVector;
use crate::model::QNetwork;
use crate::normalize::NormStats;

/// Maps a feature vector to a raw action code.
///
/// Implementations must be deterministic per call from the caller's point
/// of view. Errors are per-event: the pipeline drops the event and carries on.
pub trait DecisionOracle: Send {
    fn decide(&mut self, features: &FeatureVector) -> Result<i64>;

    /// Oracle name for logging.
    fn name(&self) -> &str;
}

impl<O: DecisionOracle + ?Sized> DecisionOracle for Box<O> {
    fn decide(&mut self, features: &FeatureVector) -> Result<i64> {
        (**self).decide(features)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Greedy policy over a trained Q-network.
pub struct QNetworkOracle {
    model: QNetwork,
    device: Device,
    norm: Option<NormStats>,
}

impl QNetworkOracle {
    /// Load the Q-network weights at `path`.
    ///
    /// Also picks up normalization stats from the sidecar file
    /// (`<stem>.norm.json`) when one exists. A missing or malformed weights
    /// file is an error; callers treat it as fatal.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("decision oracle weights not found at {}", path.display());
        }

        let device = Device::Cpu;
        tracing::info!(?path, "loading Q-network");
        let model = QNetwork::load(path, &device)?;

        let norm_path = NormStats::sidecar_path(path);
        let norm = if norm_path.exists() {
            let stats = NormStats::load(&norm_path)
                .with_context(|| format!("invalid norm stats sidecar {}", norm_path.display()))?;
            tracing::info!(?norm_path, "loaded normalization stats from training");
            Some(stats)
        } else {
            tracing::info!("no norm stats sidecar, feeding raw features");
            None
        };

        Ok(Self {
            model,
            device,
            norm,
        })
    }

    /// Wrap an already-built network (for testing / explicit construction).
    pub fn from_model(model: QNetwork, device: Device) -> Self {
        Self {
            model,
            device,
            norm: None,
        }
    }

    /// Attach normalization stats.
    pub fn with_norm_stats(mut self, stats: NormStats) -> Self {
        self.norm = Some(stats);
        self
    }

    /// Q-values for the given features, after normalization.
    pub fn q_values(&self, features: &FeatureVector) -> Result<Vec<f32>> {
        let raw = features.to_array();
        let prepared = match &self.norm {
            Some(stats) => stats.normalize(&raw),
            None => raw,
        };

        let mut input = [0.0_f32; FeatureVector::NUM_FEATURES];
        for (dst, src) in input.iter_mut().zip(prepared) {
            *dst = src as f32;
        }

        self.model.q_values(&input, &self.device)
    }
}

impl DecisionOracle for QNetworkOracle {
    fn decide(&mut self, features: &FeatureVector) -> Result<i64> {
        let q = self.q_values(features)?;
        greedy_action(&q)
    }

    fn name(&self) -> &str {
        "q_network"
    }
}

/// Index of the highest Q-value; the lowest index wins ties.
fn greedy_action(q: &[f32]) -> Result<i64> {
    if q.iter().any(|v| !v.is_finite()) {
        bail!("Q-network produced non-finite values: {q:?}");
    }
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in q.iter().enumerate() {
        if best.map_or(true, |(_, b)| value > b) {
            best = Some((idx, value));
        }
    }
    match best {
        Some((idx, _)) => Ok(idx as i64),
        None => bail!("Q-network produced no outputs"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::{VarBuilder, VarMap};

    /// Values stay inside the [-5, 5] clamp so identity stats are lossless.
    fn features() -> FeatureVector {
        FeatureVector {
            price: 2.0,
            side_sign: 1.0,
            rolling_volume: 3.0,
            momentum: 0.5,
            volume_delta: 0.0,
        }
    }

    fn make_oracle() -> QNetworkOracle {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        QNetworkOracle::from_model(QNetwork::new(vb).unwrap(), device)
    }

    #[test]
    fn test_greedy_action() {
        assert_eq!(greedy_action(&[0.1, 0.9, 0.3]).unwrap(), 1);
        assert_eq!(greedy_action(&[0.1, 0.2, 0.3]).unwrap(), 2);
        assert_eq!(greedy_action(&[0.5, 0.5, 0.1]).unwrap(), 0);
    }

    #[test]
    fn test_greedy_action_rejects_nan_and_empty() {
        assert!(greedy_action(&[0.1, f32::NAN, 0.3]).is_err());
        assert!(greedy_action(&[]).is_err());
    }

    #[test]
    fn test_decide_returns_known_code() {
        let mut oracle = make_oracle();
        let code = oracle.decide(&features()).unwrap();
        assert!((0..QNetwork::NUM_ACTIONS as i64).contains(&code), "got {code}");
    }

    #[test]
    fn test_decide_is_deterministic() {
        let mut oracle = make_oracle();
        let first = oracle.decide(&features()).unwrap();
        for _ in 0..10 {
            assert_eq!(oracle.decide(&features()).unwrap(), first);
        }
    }

    /// Two oracles over the same weights: the second build reuses the
    /// variables already registered in the map.
    fn oracle_pair() -> (QNetworkOracle, QNetworkOracle) {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let a = QNetwork::new(VarBuilder::from_varmap(&varmap, DType::F32, &device)).unwrap();
        let b = QNetwork::new(VarBuilder::from_varmap(&varmap, DType::F32, &device)).unwrap();
        (
            QNetworkOracle::from_model(a, device.clone()),
            QNetworkOracle::from_model(b, device),
        )
    }

    #[test]
    fn test_identity_norm_stats_change_nothing() {
        let (raw, normalized) = oracle_pair();
        let normalized = normalized.with_norm_stats(NormStats {
            mean: vec![0.0; 5],
            std: vec![1.0; 5],
        });
        assert_eq!(
            normalized.q_values(&features()).unwrap(),
            raw.q_values(&features()).unwrap()
        );
    }

    #[test]
    fn test_norm_stats_are_applied() {
        let (raw, normalized) = oracle_pair();
        // Centering on the input itself turns every feature into 0.
        let normalized = normalized.with_norm_stats(NormStats {
            mean: features().to_array().to_vec(),
            std: vec![1.0; 5],
        });
        let zeros = FeatureVector {
            price: 0.0,
            side_sign: 0.0,
            rolling_volume: 0.0,
            momentum: 0.0,
            volume_delta: 0.0,
        };
        assert_eq!(
            normalized.q_values(&features()).unwrap(),
            raw.q_values(&zeros).unwrap()
        );
    }

    #[test]
    fn test_load_missing_weights_fails() {
        let result = QNetworkOracle::load(Path::new("/nonexistent/model.safetensors"));
        let err = result.err().expect("missing weights must fail");
        assert!(format!("{err}").contains("not found"));
    }

    #[test]
    fn test_boxed_oracle_delegates() {
        let mut boxed: Box<dyn DecisionOracle> = Box::new(make_oracle());
        assert_eq!(boxed.name(), "q_network");
        assert!(boxed.decide(&features()).is_ok());
    }
}
