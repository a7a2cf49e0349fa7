//! SNGAN reference network

use candle_core::Tensor;
use candle_nn::VarBuilder;

use super::layers::SnLinear;
use super::trunk::{TrunkActivation, TrunkConfig, UpsampleTrunk};
use crate::config::{NormStyle, SnGanArch};
use crate::error::Result;
use crate::generator::NoiseGenerator;
use crate::latent::LatentShape;

const BN_EPS: f64 = 1e-5;

/// Generator half of an SNGAN, with batch-normalized upsampling blocks.
pub struct SnGanNet {
    linear: SnLinear,
    trunk: UpsampleTrunk,
    arch: SnGanArch,
    base_channels: usize,
}

impl SnGanNet {
    /// Build the network
    pub fn new(arch: &SnGanArch, vb: VarBuilder<'_>) -> Result<Self> {
        let channels = arch.channels()?;
        let base_channels = channels[0];
        let linear = SnLinear::new(arch.dim_z, base_channels * 16, false, 0.0, vb.pp("fc"))?;
        let trunk = UpsampleTrunk::new(
            &TrunkConfig {
                channels: &channels,
                norm: NormStyle::BatchNorm,
                bn_eps: BN_EPS,
                spectral_norm: false,
                sn_eps: 0.0,
                attention: &[],
                activation: TrunkActivation::Relu,
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

impl NoiseGenerator for SnGanNet {
    fn dim_z(&self) -> LatentShape {
        LatentShape::vector(self.arch.dim_z)
    }

    fn resolution(&self) -> usize {
        self.arch.resolution
    }

    fn forward(&self, z: &Tensor) -> Result<Tensor> {
        let batch = z.dim(0)?;
        let h = self
            .linear
            .forward(z)?
            .reshape((batch, self.base_channels, 4, 4))?;
        self.trunk.forward(&h, None)
    }
}
