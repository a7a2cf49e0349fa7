//! The uniform generator-adapter contract and its implementations

use candle_core::Tensor;

mod conditional;
mod conditioning;
mod direct;
mod latent_separated;
mod shift;
mod unconditional;


pub use conditional::ConditionalAdapter;
pub use conditioning::{ClassSelection, ConditioningPolicy, NO_CLASS};
pub use direct::DirectAdapter;
pub use latent_separated::LatentSeparatedAdapter;
pub use shift::ShiftPolicy;
pub use unconditional::UnconditionalAdapter;

use crate::config::GeneratorFamily;
use crate::error::{Error, Result};
use crate::latent::LatentShape;

/// Uniform surface over every wrapped generator.
///
/// Callers sample, condition and perturb through this trait only. The
/// default `apply_shift` delegates to the adapter's [`ShiftPolicy`], so an
/// adapter gets shift application for free by reporting its policy.
pub trait GeneratorAdapter: Send + Sync {
    /// Family of the wrapped generator
    fn family(&self) -> GeneratorFamily;

    /// Shape of one noise code
    fn dim_z(&self) -> &LatentShape;

    /// Shape of one intermediate code, if the generator has that space
    fn intermediate_shape(&self) -> Option<&LatentShape> {
        None
    }

    /// Shape of one shift under the active policy
    fn dim_shift(&self) -> &LatentShape {
        match (self.shift_policy(), self.intermediate_shape()) {
            (ShiftPolicy::IntermediateSpace, Some(shape)) => shape,
            _ => self.dim_z(),
        }
    }

    /// Declared output resolution
    fn resolution(&self) -> usize;

    /// Synthesize a batch of images.
    ///
    /// `latent` is a batch of noise codes, or of intermediate codes when
    /// `is_intermediate` is true.
    fn synthesize(&self, latent: &Tensor, is_intermediate: bool) -> Result<Tensor>;

    /// Map noise codes into the intermediate space
    fn to_intermediate(&self, _latent: &Tensor) -> Result<Tensor> {
        Err(no_intermediate_space(self.family()))
    }

    /// Active shift policy
    fn shift_policy(&self) -> ShiftPolicy;

    /// Replace the shift policy; fails if the adapter cannot support it
    fn set_shift_policy(&mut self, policy: ShiftPolicy) -> Result<()>;

    /// Synthesize from `latent` perturbed by `shift`
    fn apply_shift(&self, latent: &Tensor, shift: &Tensor) -> Result<Tensor> {
        self.shift_policy().apply(self, latent, shift)
    }

    /// Class configuration access for conditional adapters
    fn as_conditional_mut(&mut self) -> Option<&mut ConditionalAdapter> {
        None
    }
}

pub(crate) fn no_intermediate_space(family: GeneratorFamily) -> Error {
    Error::unsupported(format!("{family} has no intermediate latent space"))
}

/// Accept only raw-space shifting, for adapters without an intermediate space
pub(crate) fn raw_only(family: GeneratorFamily, policy: ShiftPolicy) -> Result<ShiftPolicy> {
    match policy {
        ShiftPolicy::RawSpace => Ok(policy),
        ShiftPolicy::IntermediateSpace => Err(no_intermediate_space(family)),
    }
}
