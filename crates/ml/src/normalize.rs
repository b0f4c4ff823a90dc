use std::path::Path;

use anyhow::{Context, Result};

use crate::features::FeatureVector;

/// Per-feature normalization statistics captured at training time.
///
/// Stored as a JSON sidecar next to the model weights
/// (`model.safetensors` → `model.norm.json`). When present, inference feeds
/// the network the same z-scores it was trained on.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NormStats {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl NormStats {
    /// Sidecar location for a given weights file.
    pub fn sidecar_path(weights: &Path) -> std::path::PathBuf {
        weights.with_extension("norm.json")
    }

    /// Load normalization stats from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read norm stats at {}", path.display()))?;
        let stats: NormStats = serde_json::from_str(&data).context("malformed norm stats")?;
        anyhow::ensure!(
            stats.mean.len() == FeatureVector::NUM_FEATURES,
            "norm stats mean has {} elements, expected {}",
            stats.mean.len(),
            FeatureVector::NUM_FEATURES
        );
        anyhow::ensure!(
            stats.std.len() == FeatureVector::NUM_FEATURES,
            "norm stats std has {} elements, expected {}",
            stats.std.len(),
            FeatureVector::NUM_FEATURES
        );
        Ok(stats)
    }

    /// Save normalization stats to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Z-score each feature, clamped to [-5, 5]. Features with a degenerate
    /// standard deviation map to 0.
    pub fn normalize(
        &self,
        raw: &[f64; FeatureVector::NUM_FEATURES],
    ) -> [f64; FeatureVector::NUM_FEATURES] {
        let mut out = [0.0; FeatureVector::NUM_FEATURES];
        for i in 0..FeatureVector::NUM_FEATURES {
            if self.std[i] > 1e-12 {
                out[i] = ((raw[i] - self.mean[i]) / self.std[i]).clamp(-5.0, 5.0);
            }
        }
        out
    }
}
