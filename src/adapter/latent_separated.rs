//! Adapter for generators with a separate intermediate (style) space

use candle_core::Tensor;

use super::{GeneratorAdapter, ShiftPolicy};
use crate::config::GeneratorFamily;
use crate::error::Result;
use crate::generator::StyleGenerator;
use crate::latent::LatentShape;

/// Routes intermediate codes through the generator's style entry point and
/// noise codes through its mapping network. Shifts default to the
/// intermediate space.
pub struct LatentSeparatedAdapter {
    generator: Box<dyn StyleGenerator>,
    shift: ShiftPolicy,
    dim_z: LatentShape,
    dim_w: LatentShape,
    family: GeneratorFamily,
}

impl LatentSeparatedAdapter {
    /// Wrap `generator` with intermediate-space shifting
    pub fn new(generator: Box<dyn StyleGenerator>) -> Self {
        let dim_z = LatentShape::vector(generator.dim_z());
        let dim_w = LatentShape::vector(generator.style_dim());
        Self {
            generator,
            shift: ShiftPolicy::IntermediateSpace,
            dim_z,
            dim_w,
            family: GeneratorFamily::StyleGan2,
        }
    }

    /// Override the reported family
    pub fn with_family(mut self, family: GeneratorFamily) -> Self {
        self.family = family;
        self
    }
}

impl GeneratorAdapter for LatentSeparatedAdapter {
    fn family(&self) -> GeneratorFamily {
        self.family
    }

    fn dim_z(&self) -> &LatentShape {
        &self.dim_z
    }

    fn intermediate_shape(&self) -> Option<&LatentShape> {
        Some(&self.dim_w)
    }

    fn resolution(&self) -> usize {
        self.generator.resolution()
    }

    fn synthesize(&self, latent: &Tensor, is_intermediate: bool) -> Result<Tensor> {
        if is_intermediate {
            self.dim_w.check(latent)?;
        } else {
            self.dim_z.check(latent)?;
        }
        self.generator.forward(latent, is_intermediate)
    }

    fn to_intermediate(&self, latent: &Tensor) -> Result<Tensor> {
        self.dim_z.check(latent)?;
        self.generator.to_intermediate(latent)
    }

    fn shift_policy(&self) -> ShiftPolicy {
        self.shift
    }

    fn set_shift_policy(&mut self, policy: ShiftPolicy) -> Result<()> {
        self.shift = policy;
        Ok(())
    }
}
