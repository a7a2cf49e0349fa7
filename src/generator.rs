//! Capabilities the wrapped generator networks provide
//!
//! Adapters only talk to generators through these traits, so any network
//! (the bundled reference networks, a mock, or an external implementation)
//! can be wrapped.

use candle_core::Tensor;

use crate::error::Result;
use crate::latent::LatentShape;

/// A generator conditioned on a learned class embedding
#[cfg_attr(test, mockall::automock)]
pub trait ClassConditionalGenerator: Send + Sync {
    /// Latent dimensionality
    fn dim_z(&self) -> usize;

    /// Size of the trained class vocabulary
    fn num_classes(&self) -> usize;

    /// Output image resolution
    fn resolution(&self) -> usize;

    /// Look up the shared embedding for a `[batch]` tensor of `u32` labels.
    ///
    /// Fails with `InvalidClass` for labels outside the vocabulary.
    fn embed_classes(&self, classes: &Tensor) -> Result<Tensor>;

    /// Synthesize `[batch, 3, r, r]` images from latents and class embeddings
    fn forward(&self, z: &Tensor, class_embedding: &Tensor) -> Result<Tensor>;
}

/// A generator driven by noise alone
#[cfg_attr(test, mockall::automock)]
pub trait NoiseGenerator: Send + Sync {
    /// Shape of one latent code
    fn dim_z(&self) -> LatentShape;

    /// Output image resolution
    fn resolution(&self) -> usize;

    /// Synthesize images from a batch of codes
    fn forward(&self, z: &Tensor) -> Result<Tensor>;
}

/// A generator with a learned intermediate (style) space
#[cfg_attr(test, mockall::automock)]
pub trait StyleGenerator: Send + Sync {
    /// Width of the noise space
    fn dim_z(&self) -> usize;

    /// Width of the style space
    fn style_dim(&self) -> usize;

    /// Output image resolution
    fn resolution(&self) -> usize;

    /// Map noise codes into the style space
    fn to_intermediate(&self, z: &Tensor) -> Result<Tensor>;

    /// Synthesize from noise codes, or from style codes when `input_is_latent`
    fn forward(&self, input: &Tensor, input_is_latent: bool) -> Result<Tensor>;
}
