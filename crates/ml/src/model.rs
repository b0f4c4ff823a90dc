//! Candle Q-network used by the decision oracle.
//!
//! Architecture: 5 → 64 → 64 → 3 feedforward with ReLU activations and a
//! linear head producing one Q-value per action (HOLD, BUY, SELL). This is
//! the default DQN policy shape; weights are exported to safetensors under
//! the `fc1`, `fc2` and `fc3` prefixes.

use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{linear, Linear, Module, VarBuilder};

use crate::features::FeatureVector;

/// Feedforward network mapping features to per-action Q-values.
pub struct QNetwork {
    fc1: Linear, // 5 → 64
    fc2: Linear, // 64 → 64
    fc3: Linear, // 64 → 3
}

impl QNetwork {
    const IN: usize = FeatureVector::NUM_FEATURES;
    const H1: usize = 64;
    const H2: usize = 64;
    /// One output per action code `0..NUM_ACTIONS`.
    pub const NUM_ACTIONS: usize = 3;

    /// Build the network from a variable builder.
    pub fn new(vb: VarBuilder<'_>) -> Result<Self> {
        let fc1 = linear(Self::IN, Self::H1, vb.pp("fc1"))?;
        let fc2 = linear(Self::H1, Self::H2, vb.pp("fc2"))?;
        let fc3 = linear(Self::H2, Self::NUM_ACTIONS, vb.pp("fc3"))?;
        Ok(Self { fc1, fc2, fc3 })
    }

    /// Load trained weights from a safetensors file.
    pub fn load(path: &Path, device: &Device) -> Result<Self> {
        // SAFETY: the weights file is memory-mapped read-only and is not
        // modified while the process runs.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device) }
            .with_context(|| format!("failed to map Q-network weights at {}", path.display()))?;
        Self::new(vb).with_context(|| format!("weights at {} do not match the Q-network", path.display()))
    }

    /// Forward pass: `(batch, 5)` features → `(batch, 3)` Q-values.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = self.fc1.forward(x)?.relu()?;
        let x = self.fc2.forward(&x)?.relu()?;
        let x = self.fc3.forward(&x)?;
        Ok(x)
    }

    /// Q-values for a single feature vector.
    pub fn q_values(&self, features: &[f32; FeatureVector::NUM_FEATURES], device: &Device) -> Result<Vec<f32>> {
        let input = Tensor::from_slice(features.as_slice(), (1, Self::IN), device)?;
        let output = self.forward(&input)?;
        Ok(output.flatten_all()?.to_vec1::<f32>()?)
    }
}
