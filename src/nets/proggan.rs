//! Progressive GAN reference network

use candle_core::Tensor;
use candle_nn::VarBuilder;

use super::layers::{pixel_norm, SnLinear};
use super::trunk::{TrunkActivation, TrunkConfig, UpsampleTrunk};
use crate::config::{NormStyle, ProgGanArch};
use crate::error::Result;
use crate::generator::NoiseGenerator;
use crate::latent::LatentShape;

/// Takes spatial `[latent_size, 1, 1]` codes, pixel-normalizes them and grows
/// a 4x4 map up to the full resolution.
pub struct ProgGanNet {
    linear: SnLinear,
    trunk: UpsampleTrunk,
    arch: ProgGanArch,
    base_channels: usize,
}

impl ProgGanNet {
    /// Build the network
    pub fn new(arch: &ProgGanArch, vb: VarBuilder<'_>) -> Result<Self> {
        arch.validate()?;
        let channels = arch.channels()?;
        let base_channels = channels[0];
        let linear = SnLinear::new(arch.latent_size, base_channels * 16, false, 0.0, vb.pp("fc"))?;
        let trunk = UpsampleTrunk::new(
            &TrunkConfig {
                channels: &channels,
                norm: NormStyle::None,
                bn_eps: 0.0,
                spectral_norm: false,
                sn_eps: 0.0,
                attention: &[],
                activation: TrunkActivation::LeakyRelu,
            },
            vb,
        )?;
        Ok(Self {
            linear,
            trunk,
            arch: arch.clone(),
            base_channels,
        })
    }
}

impl NoiseGenerator for ProgGanNet {
    fn dim_z(&self) -> LatentShape {
        LatentShape::new([self.arch.latent_size, 1, 1])
    }

    fn resolution(&self) -> usize {
        self.arch.resolution
    }

    fn forward(&self, z: &Tensor) -> Result<Tensor> {
        let batch = z.dim(0)?;
        let z = pixel_norm(z)?.flatten_from(1)?;
        let h = self
            .linear
            .forward(&z)?
            .reshape((batch, self.base_channels, 4, 4))?;
        let h = pixel_norm(&h)?;
        self.trunk.forward(&h, None)
    }
}
