//! BigGAN-style class-conditional reference network

use candle_core::{Module, Tensor};
use candle_nn::{embedding, Embedding, VarBuilder};

use super::layers::SnLinear;
use super::trunk::{TrunkActivation, TrunkConfig, UpsampleTrunk};
use crate::config::BigGanArch;
use crate::error::{Error, Result};
use crate::generator::ClassConditionalGenerator;

/// Latent and shared class embedding are concatenated, projected to a 4x4
/// feature map and upsampled to the output resolution.
pub struct BigGanNet {
    shared: Embedding,
    linear: SnLinear,
    trunk: UpsampleTrunk,
    arch: BigGanArch,
    base_channels: usize,
}

impl BigGanNet {
    /// Build the network for a resolved architecture
    pub fn new(arch: &BigGanArch, vb: VarBuilder<'_>) -> Result<Self> {
        arch.validate()?;
        let channels = arch.channels()?;
        let base_channels = channels[0];

        let shared = embedding(arch.n_classes, arch.shared_dim, vb.pp("shared"))?;
        let linear = SnLinear::new(
            arch.dim_z + arch.shared_dim,
            base_channels * 16,
            arch.spectral_norm,
            arch.sn_eps,
            vb.pp("linear"),
        )?;
        let trunk = UpsampleTrunk::new(
            &TrunkConfig {
                channels: &channels,
                norm: arch.norm,
                bn_eps: arch.bn_eps,
                spectral_norm: arch.spectral_norm,
                sn_eps: arch.sn_eps,
                attention: &arch.attention,
                activation: TrunkActivation::Relu,
            },
            vb,
        )?;

        Ok(Self {
            shared,
            linear,
            trunk,
            arch: arch.clone(),
            base_channels,
        })
    }

    /// Architecture this network was built for
    pub fn arch(&self) -> &BigGanArch {
        &self.arch
    }
}

impl ClassConditionalGenerator for BigGanNet {
    fn dim_z(&self) -> usize {
        self.arch.dim_z
    }

    fn num_classes(&self) -> usize {
        self.arch.n_classes
    }

    fn resolution(&self) -> usize {
        self.arch.resolution
    }

    fn embed_classes(&self, classes: &Tensor) -> Result<Tensor> {
        let labels = classes.to_dtype(candle_core::DType::U32)?;
        for class in labels.to_vec1::<u32>()? {
            if class as usize >= self.arch.n_classes {
                return Err(Error::InvalidClass {
                    class,
                    num_classes: self.arch.n_classes,
                });
            }
        }
        Ok(self.shared.forward(&labels)?)
    }

    fn forward(&self, z: &Tensor, class_embedding: &Tensor) -> Result<Tensor> {
        let batch = z.dim(0)?;
        let input = Tensor::cat(&[z, class_embedding], 1)?;
        let h = self
            .linear
            .forward(&input)?
            .reshape((batch, self.base_channels, 4, 4))?;
        self.trunk.forward(&h, None)
    }
}
