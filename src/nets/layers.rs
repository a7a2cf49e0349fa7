//! Building blocks shared by the reference networks

use candle_core::{Module, Tensor, D};
use candle_nn::{conv2d, linear, Conv2d, Conv2dConfig, Init, Linear, VarBuilder};

use crate::error::Result;

/// Stored singular value estimate, as kept by spectrally normalized layers
fn singular_value(vb: &VarBuilder<'_>, enabled: bool) -> Result<Option<Tensor>> {
    if !enabled {
        return Ok(None);
    }
    Ok(Some(vb.get_with_hints(1, "sv0", Init::Const(1.0))?))
}

/// Linear layer whose weight is divided by its stored singular value
pub struct SnLinear {
    weight: Tensor,
    bias: Option<Tensor>,
    sv: Option<Tensor>,
    eps: f64,
}

impl SnLinear {
    /// Create the layer, registering `sv0` when spectral norm is enabled
    pub fn new(
        in_dim: usize,
        out_dim: usize,
        spectral_norm: bool,
        eps: f64,
        vb: VarBuilder<'_>,
    ) -> Result<Self> {
        let plain = linear(in_dim, out_dim, vb.clone())?;
        Ok(Self {
            weight: plain.weight().clone(),
            bias: plain.bias().cloned(),
            sv: singular_value(&vb, spectral_norm)?,
            eps,
        })
    }

    /// Forward pass
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let weight = match &self.sv {
            Some(sv) => self.weight.broadcast_div(&sv.maximum(self.eps)?)?,
            None => self.weight.clone(),
        };
        Ok(Linear::new(weight, self.bias.clone()).forward(x)?)
    }
}

/// Convolution whose kernel is divided by its stored singular value
pub struct SnConv2d {
    weight: Tensor,
    bias: Option<Tensor>,
    sv: Option<Tensor>,
    eps: f64,
    config: Conv2dConfig,
}

impl SnConv2d {
    /// Create a `kernel x kernel` convolution with same padding
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        spectral_norm: bool,
        eps: f64,
        vb: VarBuilder<'_>,
    ) -> Result<Self> {
        let config = Conv2dConfig {
            padding: kernel / 2,
            ..Default::default()
        };
        let plain: Conv2d = conv2d(in_channels, out_channels, kernel, config, vb.clone())?;
        Ok(Self {
            weight: plain.weight().clone(),
            bias: plain.bias().cloned(),
            sv: singular_value(&vb, spectral_norm)?,
            eps,
            config,
        })
    }

    /// Forward pass
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let weight = match &self.sv {
            Some(sv) => self.weight.broadcast_div(&sv.maximum(self.eps)?)?,
            None => self.weight.clone(),
        };
        Ok(Conv2d::new(weight, self.bias.clone(), self.config).forward(x)?)
    }
}

/// Non-local self-attention block with a learned residual gain
pub struct SelfAttention {
    theta: SnConv2d,
    phi: SnConv2d,
    g: SnConv2d,
    o: SnConv2d,
    gamma: Tensor,
    channels: usize,
}

impl SelfAttention {
    /// Create an attention block over `channels` feature maps
    pub fn new(channels: usize, spectral_norm: bool, eps: f64, vb: VarBuilder<'_>) -> Result<Self> {
        let key = (channels / 8).max(1);
        let value = (channels / 2).max(1);
        Ok(Self {
            theta: SnConv2d::new(channels, key, 1, spectral_norm, eps, vb.pp("theta"))?,
            phi: SnConv2d::new(channels, key, 1, spectral_norm, eps, vb.pp("phi"))?,
            g: SnConv2d::new(channels, value, 1, spectral_norm, eps, vb.pp("g"))?,
            o: SnConv2d::new(value, channels, 1, spectral_norm, eps, vb.pp("o"))?,
            gamma: vb.get_with_hints(1, "gamma", Init::Const(0.0))?,
            channels,
        })
    }

    /// Forward pass over `[batch, channels, h, w]` maps (h and w even)
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (batch, _, h, w) = x.dims4()?;
        let key = (self.channels / 8).max(1);
        let value = (self.channels / 2).max(1);

        let theta = self.theta.forward(x)?.reshape((batch, key, h * w))?;
        let phi = self
            .phi
            .forward(x)?
            .max_pool2d(2)?
            .reshape((batch, key, h * w / 4))?;
        let g = self
            .g
            .forward(x)?
            .max_pool2d(2)?
            .reshape((batch, value, h * w / 4))?;

        let scores = theta.transpose(1, 2)?.contiguous()?.matmul(&phi)?;
        let beta = candle_nn::ops::softmax(&scores, D::Minus1)?;
        let attended = g
            .matmul(&beta.transpose(1, 2)?.contiguous()?)?
            .reshape((batch, value, h, w))?;
        let o = self.o.forward(&attended)?;
        Ok(x.broadcast_add(&o.broadcast_mul(&self.gamma)?)?)
    }
}

/// Normalize each position's feature vector to unit average magnitude
pub fn pixel_norm(x: &Tensor) -> Result<Tensor> {
    let norm = x.sqr()?.mean_keepdim(1)?.affine(1.0, 1e-8)?.sqrt()?;
    Ok(x.broadcast_div(&norm)?)
}
