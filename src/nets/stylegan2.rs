//! StyleGAN2-style reference network with a mapping network

use candle_core::Tensor;
use candle_nn::{Init, VarBuilder};

use super::layers::{pixel_norm, SnLinear};
use super::trunk::{TrunkActivation, TrunkConfig, UpsampleTrunk};
use crate::config::{NormStyle, StyleGanArch};
use crate::error::Result;
use crate::generator::StyleGenerator;

/// Noise codes pass through an MLP into the style space; styles modulate
/// every synthesis block, which starts from a learned constant.
pub struct StyleGanNet {
    mapping: Vec<SnLinear>,
    constant: Tensor,
    modulations: Vec<SnLinear>,
    trunk: UpsampleTrunk,
    arch: StyleGanArch,
}

impl StyleGanNet {
    /// Build the network
    pub fn new(arch: &StyleGanArch, vb: VarBuilder<'_>) -> Result<Self> {
        arch.validate()?;
        let channels = arch.channels()?;

        let mapping = (0..arch.n_mlp)
            .map(|i| {
                SnLinear::new(
                    arch.style_dim,
                    arch.style_dim,
                    false,
                    0.0,
                    vb.pp(format!("style.{i}")),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let constant = vb.get_with_hints(
            (1, channels[0], 4, 4),
            "input",
            Init::Randn {
                mean: 0.0,
                stdev: 1.0,
            },
        )?;

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
            vb.pp("synthesis"),
        )?;

        let modulations = trunk
            .block_in_channels()
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                SnLinear::new(
                    arch.style_dim,
                    c,
                    false,
                    0.0,
                    vb.pp(format!("modulation.{i}")),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            mapping,
            constant,
            modulations,
            trunk,
            arch: arch.clone(),
        })
    }

    fn synthesize(&self, w: &Tensor) -> Result<Tensor> {
        let batch = w.dim(0)?;
        let styles = self
            .modulations
            .iter()
            .map(|m| -> Result<Tensor> { Ok(m.forward(w)?.affine(1.0, 1.0)?) })
            .collect::<Result<Vec<_>>>()?;
        let (_, c, h, wd) = self.constant.dims4()?;
        let x = self.constant.broadcast_as((batch, c, h, wd))?.contiguous()?;
        self.trunk.forward(&x, Some(&styles))
    }
}

impl StyleGenerator for StyleGanNet {
    fn dim_z(&self) -> usize {
        self.arch.style_dim
    }

    fn style_dim(&self) -> usize {
        self.arch.style_dim
    }

    fn resolution(&self) -> usize {
        self.arch.size
    }

    fn to_intermediate(&self, z: &Tensor) -> Result<Tensor> {
        let mut w = pixel_norm(z)?;
        for layer in &self.mapping {
            w = candle_nn::ops::leaky_relu(&layer.forward(&w)?, 0.2)?;
        }
        Ok(w)
    }

    fn forward(&self, input: &Tensor, input_is_latent: bool) -> Result<Tensor> {
        if input_is_latent {
            self.synthesize(input)
        } else {
            self.synthesize(&self.to_intermediate(input)?)
        }
    }
}
