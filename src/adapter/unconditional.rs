//! Adapter driving a conditional architecture without conditioning

use candle_core::Tensor;

use super::{no_intermediate_space, raw_only, ConditioningPolicy, GeneratorAdapter, ShiftPolicy};
use crate::config::GeneratorFamily;
use crate::error::Result;
use crate::generator::ClassConditionalGenerator;
use crate::latent::LatentShape;

/// Feeds the reserved no-class label to every batch element, hiding
/// conditioning from callers entirely.
pub struct UnconditionalAdapter {
    generator: Box<dyn ClassConditionalGenerator>,
    conditioning: ConditioningPolicy,
    shift: ShiftPolicy,
    dim_z: LatentShape,
    family: GeneratorFamily,
}

impl UnconditionalAdapter {
    /// Wrap `generator`
    pub fn new(generator: Box<dyn ClassConditionalGenerator>) -> Self {
        let dim_z = LatentShape::vector(generator.dim_z());
        Self {
            generator,
            conditioning: ConditioningPolicy::no_class(),
            shift: ShiftPolicy::RawSpace,
            dim_z,
            family: GeneratorFamily::BigBiGan,
        }
    }

    /// Override the reported family
    pub fn with_family(mut self, family: GeneratorFamily) -> Self {
        self.family = family;
        self
    }
}

impl GeneratorAdapter for UnconditionalAdapter {
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
        let labels = self
            .conditioning
            .label_tensor(latent.dim(0)?, latent.device())?;
        let embedding = self.generator.embed_classes(&labels)?;
        self.generator.forward(latent, &embedding)
    }

    fn shift_policy(&self) -> ShiftPolicy {
        self.shift
    }

    fn set_shift_policy(&mut self, policy: ShiftPolicy) -> Result<()> {
        self.shift = raw_only(self.family, policy)?;
        Ok(())
    }
}
