//! Adapter for class-conditional generators

use candle_core::Tensor;
use tracing::debug;

use super::{
    no_intermediate_space, raw_only, ClassSelection, ConditioningPolicy, GeneratorAdapter,
    ShiftPolicy,
};
use crate::config::GeneratorFamily;
use crate::error::{Error, Result};
use crate::generator::ClassConditionalGenerator;
use crate::latent::LatentShape;

/// Wraps a class-conditional generator; labels come from a
/// [`ConditioningPolicy`] whenever the caller supplies none.
pub struct ConditionalAdapter {
    generator: Box<dyn ClassConditionalGenerator>,
    conditioning: ConditioningPolicy,
    shift: ShiftPolicy,
    dim_z: LatentShape,
    family: GeneratorFamily,
}

impl ConditionalAdapter {
    /// Wrap `generator`, conditioning on `classes`
    pub fn new(
        generator: Box<dyn ClassConditionalGenerator>,
        classes: impl Into<ClassSelection>,
    ) -> Result<Self> {
        let dim_z = LatentShape::vector(generator.dim_z());
        Ok(Self {
            generator,
            conditioning: ConditioningPolicy::new(classes)?,
            shift: ShiftPolicy::RawSpace,
            dim_z,
            family: GeneratorFamily::BigGan,
        })
    }

    /// Override the reported family
    pub fn with_family(mut self, family: GeneratorFamily) -> Self {
        self.family = family;
        self
    }

    /// Replace the class set used when no labels are supplied
    pub fn configure_classes(&mut self, classes: impl Into<ClassSelection>) -> Result<()> {
        self.conditioning.configure(classes)?;
        debug!(classes = ?self.conditioning.classes(), "Reconfigured target classes");
        Ok(())
    }

    /// Active class set
    pub fn classes(&self) -> &[u32] {
        self.conditioning.classes()
    }

    /// Conditioning policy
    pub fn conditioning(&self) -> &ConditioningPolicy {
        &self.conditioning
    }

    /// Size of the generator's class vocabulary
    pub fn num_classes(&self) -> usize {
        self.generator.num_classes()
    }

    /// Synthesize with explicit `[batch]` labels, or policy-drawn ones
    pub fn synthesize_with_labels(&self, z: &Tensor, labels: Option<&Tensor>) -> Result<Tensor> {
        self.dim_z.check(z)?;
        let embedding = match labels {
            Some(labels) => {
                let batch_size = z.dim(0)?;
                if labels.dims() != [batch_size] {
                    return Err(Error::shape_mismatch(&[batch_size], labels.dims()));
                }
                self.generator.embed_classes(labels)?
            }
            None => {
                let labels = self.conditioning.label_tensor(z.dim(0)?, z.device())?;
                self.generator.embed_classes(&labels)?
            }
        };
        self.generator.forward(z, &embedding)
    }
}

impl GeneratorAdapter for ConditionalAdapter {
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
        self.synthesize_with_labels(latent, None)
    }

    fn shift_policy(&self) -> ShiftPolicy {
        self.shift
    }

    fn set_shift_policy(&mut self, policy: ShiftPolicy) -> Result<()> {
        self.shift = raw_only(self.family, policy)?;
        Ok(())
    }

    fn as_conditional_mut(&mut self) -> Option<&mut ConditionalAdapter> {
        Some(self)
    }
}
