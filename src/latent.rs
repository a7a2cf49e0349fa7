//! Latent shapes and latent code sampling

use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Shape of a single latent code, without the batch dimension.
///
/// Most generators take flat vectors (`[dim]`), the progressive family takes
/// spatial codes such as `[512, 1, 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LatentShape(Vec<usize>);

impl LatentShape {
    /// Create a shape from explicit dimensions
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }

    /// Create a flat vector shape
    pub fn vector(dim: usize) -> Self {
        Self(vec![dim])
    }

    /// Dimensions of one code
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of scalars in one code
    pub fn elem_count(&self) -> usize {
        self.0.iter().product()
    }

    /// Full tensor shape for a batch of codes
    pub fn with_batch(&self, batch_size: usize) -> Vec<usize> {
        let mut dims = Vec::with_capacity(self.0.len() + 1);
        dims.push(batch_size);
        dims.extend_from_slice(&self.0);
        dims
    }

    /// Check that `tensor` is a batch of codes of this shape.
    ///
    /// Never pads or truncates; any disagreement is a `ShapeMismatch`.
    pub fn check(&self, tensor: &Tensor) -> Result<()> {
        let dims = tensor.dims();
        if dims.len() != self.0.len() + 1 || dims[1..] != self.0[..] {
            return Err(Error::shape_mismatch(&self.0, dims));
        }
        Ok(())
    }

    /// Zero latent batch of this shape
    pub fn zeros(&self, batch_size: usize, device: &Device) -> Result<Tensor> {
        Ok(Tensor::zeros(
            self.with_batch(batch_size),
            candle_core::DType::F32,
            device,
        )?)
    }
}

impl From<usize> for LatentShape {
    fn from(dim: usize) -> Self {
        Self::vector(dim)
    }
}

impl fmt::Display for LatentShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Draws standard normal latent codes, optionally truncated.
///
/// With a truncation threshold every value outside `[-t, t]` is resampled,
/// which trades diversity for sample fidelity.
pub struct LatentSampler {
    truncation: Option<f32>,
    rng: StdRng,
}

impl LatentSampler {
    /// Sampler seeded from the operating system
    pub fn new() -> Self {
        Self {
            truncation: None,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible sampler
    pub fn seeded(seed: u64) -> Self {
        Self {
            truncation: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Set the truncation threshold
    pub fn with_truncation(mut self, threshold: f32) -> Result<Self> {
        if !(threshold > 0.0) {
            return Err(Error::invalid_input(format!(
                "truncation threshold must be positive, got {threshold}"
            )));
        }
        self.truncation = Some(threshold);
        Ok(self)
    }

    /// Current truncation threshold
    pub fn truncation(&self) -> Option<f32> {
        self.truncation
    }

    /// Sample a batch of latent codes of the given shape
    pub fn sample(
        &mut self,
        shape: &LatentShape,
        batch_size: usize,
        device: &Device,
    ) -> Result<Tensor> {
        let count = batch_size * shape.elem_count();
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.draw());
        }
        Ok(Tensor::from_vec(values, shape.with_batch(batch_size), device)?)
    }

    fn draw(&mut self) -> f32 {
        loop {
            let x: f32 = self.rng.sample(StandardNormal);
            match self.truncation {
                Some(t) if x.abs() > t => continue,
                _ => return x,
            }
        }
    }
}

impl Default for LatentSampler {
    fn default() -> Self {
        Self::new()
    }
}
