//! Adapter for generators driven by noise alone

use candle_core::Tensor;

use super::{no_intermediate_space, raw_only, GeneratorAdapter, ShiftPolicy};
use crate::config::GeneratorFamily;
use crate::error::Result;
use crate::generator::NoiseGenerator;
use crate::latent::LatentShape;

/// Thin wrapper over a noise-only generator; latents may be spatial.
pub struct DirectAdapter {
    generator: Box<dyn NoiseGenerator>,
    shift: ShiftPolicy,
    dim_z: LatentShape,
    family: GeneratorFamily,
}

impl DirectAdapter {
    /// Wrap `generator` reporting `family`
    pub fn new(generator: Box<dyn NoiseGenerator>, family: GeneratorFamily) -> Self {
        let dim_z = generator.dim_z();
        Self {
            generator,
            shift: ShiftPolicy::RawSpace,
            dim_z,
            family,
        }
    }
}

impl GeneratorAdapter for DirectAdapter {
    fn family(&self) -> GeneratorFamily {
        self.family
    }

    fn dim_z(&self) -> &LatentShape {
        &self.dim_z
    }

    fn resolution(&self) -> usize {
        self.generator.resolution()
    }

    fn synthesize(&self, latent: &Tensor, is_intermediate: bool) -> Result<Tensor> {
        if is_intermediate {
            return Err(no_intermediate_space(self.family));
        }
        self.dim_z.check(latent)?;
        self.generator.forward(latent)
    }

    fn shift_policy(&self) -> ShiftPolicy {
        self.shift
    }

    fn set_shift_policy(&mut self, policy: ShiftPolicy) -> Result<()> {
        self.shift = raw_only(self.family, policy)?;
        Ok(())
    }
}
