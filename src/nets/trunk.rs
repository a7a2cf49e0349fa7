//! Upsampling convolutional trunk shared by every reference network

use candle_core::{ModuleT, Tensor};
use candle_nn::{batch_norm, BatchNorm, VarBuilder};

use super::layers::{SelfAttention, SnConv2d};
use crate::config::NormStyle;
use crate::error::{Error, Result};

/// Nonlinearity after each trunk convolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrunkActivation {
    /// ReLU, as in BigGAN and SNGAN
    Relu,
    /// Leaky ReLU with slope 0.2, as in ProgGAN and StyleGAN2
    LeakyRelu,
}

/// Trunk hyperparameters
#[derive(Debug, Clone)]
pub struct TrunkConfig<'a> {
    /// Channels per stage from the 4x4 base upward; one block per step
    pub channels: &'a [usize],
    /// Normalization after each convolution
    pub norm: NormStyle,
    /// Batch norm epsilon
    pub bn_eps: f64,
    /// Spectral normalization of convolution kernels
    pub spectral_norm: bool,
    /// Lower bound on stored singular values
    pub sn_eps: f64,
    /// Output resolutions followed by self-attention
    pub attention: &'a [usize],
    /// Nonlinearity
    pub activation: TrunkActivation,
}

struct UpBlock {
    conv: SnConv2d,
    norm: Option<BatchNorm>,
    attention: Option<SelfAttention>,
}

/// Stack of (2x nearest upsample, 3x3 conv, norm, activation) blocks
/// followed by an RGB projection squashed into `[-1, 1]`.
pub struct UpsampleTrunk {
    blocks: Vec<UpBlock>,
    to_rgb: SnConv2d,
    activation: TrunkActivation,
    in_channels: Vec<usize>,
}

impl UpsampleTrunk {
    /// Build the trunk
    pub fn new(config: &TrunkConfig<'_>, vb: VarBuilder<'_>) -> Result<Self> {
        if config.channels.len() < 2 {
            return Err(Error::config("trunk needs at least one upsampling stage"));
        }
        let mut blocks = Vec::with_capacity(config.channels.len() - 1);
        for (i, pair) in config.channels.windows(2).enumerate() {
            let (cin, cout) = (pair[0], pair[1]);
            let block_vb = vb.pp(format!("blocks.{i}"));
            let out_res = 4usize << (i + 1);

            let conv = SnConv2d::new(
                cin,
                cout,
                3,
                config.spectral_norm,
                config.sn_eps,
                block_vb.pp("conv"),
            )?;
            let norm = match config.norm {
                NormStyle::BatchNorm => Some(batch_norm(cout, config.bn_eps, block_vb.pp("bn"))?),
                NormStyle::None => None,
            };
            let attention = if config.attention.contains(&out_res) {
                Some(SelfAttention::new(
                    cout,
                    config.spectral_norm,
                    config.sn_eps,
                    block_vb.pp("attn"),
                )?)
            } else {
                None
            };
            blocks.push(UpBlock {
                conv,
                norm,
                attention,
            });
        }

        let last = config.channels[config.channels.len() - 1];
        let to_rgb = SnConv2d::new(
            last,
            3,
            3,
            config.spectral_norm,
            config.sn_eps,
            vb.pp("to_rgb"),
        )?;

        Ok(Self {
            blocks,
            to_rgb,
            activation: config.activation,
            in_channels: config.channels[..config.channels.len() - 1].to_vec(),
        })
    }

    /// Input channels of each block, in order
    pub fn block_in_channels(&self) -> &[usize] {
        &self.in_channels
    }

    /// Run the trunk on `[batch, channels[0], 4, 4]` features.
    ///
    /// `styles`, when given, holds one `[batch, in_channels]` scale per block
    /// applied to the block input.
    pub fn forward(&self, x: &Tensor, styles: Option<&[Tensor]>) -> Result<Tensor> {
        if let Some(styles) = styles {
            if styles.len() != self.blocks.len() {
                return Err(Error::invalid_input(format!(
                    "expected {} style vectors, got {}",
                    self.blocks.len(),
                    styles.len()
                )));
            }
        }

        let mut h = x.clone();
        for (i, block) in self.blocks.iter().enumerate() {
            let (_, _, height, width) = h.dims4()?;
            h = h.upsample_nearest2d(height * 2, width * 2)?;
            if let Some(styles) = styles {
                let (batch, channels) = styles[i].dims2()?;
                h = h.broadcast_mul(&styles[i].reshape((batch, channels, 1, 1))?)?;
            }
            h = block.conv.forward(&h)?;
            if let Some(norm) = &block.norm {
                h = norm.forward_t(&h, false)?;
            }
            h = match self.activation {
                TrunkActivation::Relu => h.relu()?,
                TrunkActivation::LeakyRelu => candle_nn::ops::leaky_relu(&h, 0.2)?,
            };
            if let Some(attention) = &block.attention {
                h = attention.forward(&h)?;
            }
        }
        Ok(self.to_rgb.forward(&h)?.tanh()?)
    }
}
