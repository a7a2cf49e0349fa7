//! Configuration structures and per-family hyperparameter tables

use candle_core::Device;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::adapter::ClassSelection;
use crate::checkpoint::LoadPolicy;
use crate::error::{Error, Result};

/// Default ImageNet class (Bernese mountain dog)
pub const DEFAULT_TARGET_CLASS: u32 = 239;

/// Supported generator families
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorFamily {
    /// Class-conditional BigGAN
    BigGan,
    /// BigBiGAN generator driven as an unconditional BigGAN
    BigBiGan,
    /// Progressively grown GAN
    ProgGan,
    /// Spectrally normalized GAN
    SnGan,
    /// StyleGAN2 with a separate style space
    StyleGan2,
}

impl GeneratorFamily {
    /// Human-readable family name
    pub fn name(&self) -> &'static str {
        match self {
            GeneratorFamily::BigGan => "BigGAN",
            GeneratorFamily::BigBiGan => "BigBiGAN",
            GeneratorFamily::ProgGan => "ProgGAN",
            GeneratorFamily::SnGan => "SNGAN",
            GeneratorFamily::StyleGan2 => "StyleGAN2",
        }
    }

    /// How strictly checkpoints must match the constructed network.
    ///
    /// Public BigBiGAN checkpoints omit auxiliary parameters, so that family
    /// alone tolerates partial matches.
    pub fn load_policy(&self) -> LoadPolicy {
        match self {
            GeneratorFamily::BigBiGan => LoadPolicy::Lenient,
            _ => LoadPolicy::Strict,
        }
    }

    /// Whether the family exposes an intermediate (style) space
    pub fn has_intermediate_space(&self) -> bool {
        matches!(self, GeneratorFamily::StyleGan2)
    }
}

impl std::fmt::Display for GeneratorFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Device configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeviceConfig {
    /// Device type
    #[serde(default)]
    pub device_type: DeviceType,
    /// Device ID (for multi-GPU)
    #[serde(default)]
    pub device_id: usize,
}

impl DeviceConfig {
    /// Resolve the candle device this configuration names
    pub fn to_device(&self) -> Result<Device> {
        match self.device_type {
            DeviceType::Cpu => Ok(Device::Cpu),
            DeviceType::Cuda => Ok(Device::new_cuda(self.device_id)?),
            DeviceType::Metal => Ok(Device::new_metal(self.device_id)?),
        }
    }
}

/// Device types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// CPU device
    #[default]
    Cpu,
    /// CUDA GPU
    Cuda,
    /// Metal (Apple Silicon)
    Metal,
}

/// Normalization applied after each upsampling convolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormStyle {
    /// Batch normalization with frozen running statistics
    BatchNorm,
    /// No normalization
    None,
}

impl NormStyle {
    /// Parse the `norm_style` option used by BigGAN configs
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "bn" => Ok(NormStyle::BatchNorm),
            "nonorm" | "none" => Ok(NormStyle::None),
            other => Err(Error::unsupported(format!(
                "norm_style '{other}' is not supported (expected 'bn' or 'nonorm')"
            ))),
        }
    }
}

/// Number of 2x upsampling stages from the 4x4 base to `resolution`
pub fn stage_count(resolution: usize) -> Result<usize> {
    if resolution < 8 || !resolution.is_power_of_two() {
        return Err(Error::unsupported(format!(
            "resolution {resolution} is not a power of two >= 8"
        )));
    }
    Ok((resolution / 4).trailing_zeros() as usize)
}

/// Image size for a BigGAN dataset tag
pub fn dataset_resolution(dataset: &str) -> Result<usize> {
    let base = dataset.trim_end_matches("_hdf5");
    match base {
        "I32" | "C10" | "C100" => Ok(32),
        "I64" => Ok(64),
        "I128" => Ok(128),
        "I256" => Ok(256),
        other => Err(Error::unsupported(format!("unknown BigGAN dataset '{other}'"))),
    }
}

/// Class vocabulary size for a BigGAN dataset tag
pub fn dataset_classes(dataset: &str) -> Result<usize> {
    let base = dataset.trim_end_matches("_hdf5");
    match base {
        "I32" | "I64" | "I128" | "I256" => Ok(1000),
        "C10" => Ok(10),
        "C100" => Ok(100),
        other => Err(Error::unsupported(format!("unknown BigGAN dataset '{other}'"))),
    }
}

/// Resolved BigGAN-style architecture, shared by BigGAN and BigBiGAN
#[derive(Debug, Clone, PartialEq)]
pub struct BigGanArch {
    /// Channel width multiplier
    pub ch: usize,
    /// Latent dimensionality
    pub dim_z: usize,
    /// Class embedding width
    pub shared_dim: usize,
    /// Class vocabulary size
    pub n_classes: usize,
    /// Output resolution
    pub resolution: usize,
    /// Resolutions after which a self-attention block runs
    pub attention: Vec<usize>,
    /// Normalization style
    pub norm: NormStyle,
    /// Spectral normalization of linear and conv weights
    pub spectral_norm: bool,
    /// Batch norm epsilon
    pub bn_eps: f64,
    /// Lower bound on the stored singular value
    pub sn_eps: f64,
}

impl BigGanArch {
    /// Channels at each trunk stage, from the 4x4 base upward
    pub fn channels(&self) -> Result<Vec<usize>> {
        let stages = stage_count(self.resolution)?;
        Ok((0..=stages).map(|i| ((self.ch * 4) >> i).max(8)).collect())
    }

    /// Check the architecture is constructible
    pub fn validate(&self) -> Result<()> {
        if self.ch == 0 || self.dim_z == 0 || self.shared_dim == 0 || self.n_classes == 0 {
            return Err(Error::config(
                "BigGAN ch, dim_z, shared_dim and n_classes must be > 0",
            ));
        }
        let channels = self.channels()?;
        for &res in &self.attention {
            let stage = (res / 4).trailing_zeros() as usize;
            if res < 8 || !res.is_power_of_two() || stage >= channels.len() {
                return Err(Error::unsupported(format!(
                    "attention resolution {res} is not produced at output resolution {}",
                    self.resolution
                )));
            }
        }
        Ok(())
    }
}

/// Parse a BigGAN attention spec such as `"64"` or `"32_64"`; `"0"` disables it
pub fn parse_attention(spec: &str) -> Result<Vec<usize>> {
    spec.split('_')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| Error::config(format!("invalid attention resolution '{s}'")))
        })
        .filter(|r| !matches!(r, Ok(0)))
        .collect()
}

fn default_shared_dim() -> usize {
    128
}

fn default_attn() -> String {
    "64".to_string()
}

fn default_norm_style() -> String {
    "bn".to_string()
}

fn default_g_param() -> String {
    "SN".to_string()
}

fn default_eps() -> f64 {
    1e-4
}

/// BigGAN generator configuration file.
///
/// Accepts the upstream key names (`G_ch`, `G_attn`, ...). Resolution and
/// class count come from the dataset tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BigGanConfig {
    /// Dataset tag, e.g. `I128_hdf5`
    pub dataset: String,
    /// Channel width
    #[serde(alias = "G_ch")]
    pub g_ch: usize,
    /// Latent dimensionality
    pub dim_z: usize,
    /// Class embedding width
    #[serde(default = "default_shared_dim")]
    pub shared_dim: usize,
    /// Attention resolutions
    #[serde(alias = "G_attn", default = "default_attn")]
    pub g_attn: String,
    /// Normalization style
    #[serde(default = "default_norm_style")]
    pub norm_style: String,
    /// Parameterization (`SN` or `none`)
    #[serde(alias = "G_param", default = "default_g_param")]
    pub g_param: String,
    /// Batch norm epsilon
    #[serde(alias = "BN_eps", default = "default_eps")]
    pub bn_eps: f64,
    /// Spectral norm epsilon
    #[serde(alias = "SN_eps", default = "default_eps")]
    pub sn_eps: f64,
    /// Checkpoint location
    #[serde(default)]
    pub weights_root: Option<PathBuf>,
}

impl BigGanConfig {
    /// Load a generator config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read BigGAN config {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Resolve derived hyperparameters from the lookup tables
    pub fn resolve(&self) -> Result<BigGanArch> {
        let spectral_norm = match self.g_param.as_str() {
            "SN" => true,
            "none" | "" => false,
            other => {
                return Err(Error::unsupported(format!("G_param '{other}' is not supported")))
            }
        };
        let arch = BigGanArch {
            ch: self.g_ch,
            dim_z: self.dim_z,
            shared_dim: self.shared_dim,
            n_classes: dataset_classes(&self.dataset)?,
            resolution: dataset_resolution(&self.dataset)?,
            attention: parse_attention(&self.g_attn)?,
            norm: NormStyle::parse(&self.norm_style)?,
            spectral_norm,
            bn_eps: self.bn_eps,
            sn_eps: self.sn_eps,
        };
        arch.validate()?;
        Ok(arch)
    }
}

/// BigBiGAN hyperparameters for a registered resolution
pub fn big_bi_gan_arch(resolution: usize) -> Result<BigGanArch> {
    let (attn, dim_z) = match resolution {
        128 => (64, 120),
        256 => (128, 140),
        512 => (64, 128),
        other => {
            return Err(Error::unsupported(format!(
                "BigBiGAN has no defaults for resolution {other} (expected 128, 256 or 512)"
            )))
        }
    };
    let arch = BigGanArch {
        ch: 96,
        dim_z,
        shared_dim: 128,
        n_classes: 1000,
        resolution,
        attention: vec![attn],
        norm: NormStyle::BatchNorm,
        spectral_norm: true,
        bn_eps: 1e-4,
        sn_eps: 1e-4,
    };
    arch.validate()?;
    Ok(arch)
}

/// Progressive GAN architecture
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProgGanArch {
    /// Output resolution
    pub resolution: usize,
    /// Latent channels; codes are shaped `[latent_size, 1, 1]`
    pub latent_size: usize,
    /// Feature map budget
    pub fmap_base: usize,
    /// Feature map cap per stage
    pub fmap_max: usize,
}

impl Default for ProgGanArch {
    fn default() -> Self {
        Self {
            resolution: 1024,
            latent_size: 512,
            fmap_base: 8192,
            fmap_max: 512,
        }
    }
}

impl ProgGanArch {
    /// Channels at each trunk stage
    pub fn channels(&self) -> Result<Vec<usize>> {
        let stages = stage_count(self.resolution)?;
        Ok((0..=stages)
            .map(|i| (self.fmap_base >> (i + 1)).clamp(1, self.fmap_max))
            .collect())
    }

    /// Check the architecture is constructible
    pub fn validate(&self) -> Result<()> {
        if self.latent_size == 0 || self.fmap_base == 0 || self.fmap_max == 0 {
            return Err(Error::config("ProgGAN latent_size and fmap sizes must be > 0"));
        }
        self.channels().map(|_| ())
    }
}

/// Contents of the `args.json` stored next to SNGAN weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnGanArgs {
    /// Registered model name, e.g. `sn_resnet32`
    pub model: String,
    /// Latent dimensionality
    #[serde(alias = "latent_dim")]
    pub distribution_dim: usize,
}

/// Resolved SNGAN architecture
#[derive(Debug, Clone, PartialEq)]
pub struct SnGanArch {
    /// Latent dimensionality
    pub dim_z: usize,
    /// Output resolution
    pub resolution: usize,
    /// Base channel width
    pub ch: usize,
}

impl SnGanArgs {
    /// Load `args.json`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read SNGAN args {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Resolve the registered model name
    pub fn resolve(&self) -> Result<SnGanArch> {
        let (resolution, ch) = match self.model.as_str() {
            "sn_resnet32" => (32, 256),
            "sn_resnet64" => (64, 512),
            "sn_dcgan" => (32, 512),
            other => {
                return Err(Error::unsupported(format!("unknown SNGAN model '{other}'")))
            }
        };
        if self.distribution_dim == 0 {
            return Err(Error::config("SNGAN distribution_dim must be > 0"));
        }
        Ok(SnGanArch {
            dim_z: self.distribution_dim,
            resolution,
            ch,
        })
    }
}

impl SnGanArch {
    /// Channels at each trunk stage
    pub fn channels(&self) -> Result<Vec<usize>> {
        let stages = stage_count(self.resolution)?;
        Ok((0..=stages).map(|i| (self.ch >> i).max(8)).collect())
    }
}

fn default_style_dim() -> usize {
    512
}

fn default_n_mlp() -> usize {
    8
}

fn default_channel_multiplier() -> usize {
    2
}

fn default_max_channels() -> usize {
    512
}

/// StyleGAN2 architecture
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StyleGanArch {
    /// Output resolution
    pub size: usize,
    /// Width of the noise and style spaces
    #[serde(default = "default_style_dim")]
    pub style_dim: usize,
    /// Depth of the mapping network
    #[serde(default = "default_n_mlp")]
    pub n_mlp: usize,
    /// Channel multiplier for resolutions above 32
    #[serde(default = "default_channel_multiplier")]
    pub channel_multiplier: usize,
    /// Cap on channels per stage
    #[serde(default = "default_max_channels")]
    pub max_channels: usize,
}

impl StyleGanArch {
    /// Architecture of the public checkpoints at `size`
    pub fn new(size: usize) -> Self {
        Self {
            size,
            style_dim: default_style_dim(),
            n_mlp: default_n_mlp(),
            channel_multiplier: default_channel_multiplier(),
            max_channels: default_max_channels(),
        }
    }

    /// Channels at each trunk stage
    pub fn channels(&self) -> Result<Vec<usize>> {
        let stages = stage_count(self.size)?;
        Ok((0..=stages)
            .map(|i| {
                let res = 4usize << i;
                let width = if res <= 32 {
                    512
                } else {
                    16384 * self.channel_multiplier / res
                };
                width.clamp(1, self.max_channels)
            })
            .collect())
    }

    /// Check the architecture is constructible
    pub fn validate(&self) -> Result<()> {
        if self.style_dim == 0 || self.n_mlp == 0 || self.channel_multiplier == 0 {
            return Err(Error::config(
                "StyleGAN2 style_dim, n_mlp and channel_multiplier must be > 0",
            ));
        }
        self.channels().map(|_| ())
    }
}

fn default_target_classes() -> ClassSelection {
    ClassSelection::Single(DEFAULT_TARGET_CLASS)
}

fn default_big_bi_gan_resolution() -> usize {
    128
}

fn default_shift_in_intermediate_space() -> bool {
    true
}

/// Family-specific description of an adapter to build
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum AdapterSpec {
    /// Class-conditional BigGAN
    BigGan {
        /// Checkpoint location
        weights_root: PathBuf,
        /// Generator config file
        config: PathBuf,
        /// Classes to condition on
        #[serde(default = "default_target_classes")]
        target_classes: ClassSelection,
    },
    /// BigBiGAN as an unconditional BigGAN
    BigBiGan {
        /// Checkpoint location
        weights_root: PathBuf,
        /// One of the registered resolutions
        #[serde(default = "default_big_bi_gan_resolution")]
        resolution: usize,
    },
    /// Progressive GAN
    ProgGan {
        /// Checkpoint location
        weights_root: PathBuf,
        /// Architecture override
        #[serde(default)]
        arch: ProgGanArch,
    },
    /// SNGAN directory holding `args.json` and `generator.safetensors`
    SnGan {
        /// Model directory
        gan_dir: PathBuf,
    },
    /// StyleGAN2
    StyleGan2 {
        /// Checkpoint location
        weights: PathBuf,
        /// Architecture
        arch: StyleGanArch,
        /// Apply shifts in the style space
        #[serde(default = "default_shift_in_intermediate_space")]
        shift_in_intermediate_space: bool,
    },
}

impl AdapterSpec {
    /// Family this spec builds
    pub fn family(&self) -> GeneratorFamily {
        match self {
            AdapterSpec::BigGan { .. } => GeneratorFamily::BigGan,
            AdapterSpec::BigBiGan { .. } => GeneratorFamily::BigBiGan,
            AdapterSpec::ProgGan { .. } => GeneratorFamily::ProgGan,
            AdapterSpec::SnGan { .. } => GeneratorFamily::SnGan,
            AdapterSpec::StyleGan2 { .. } => GeneratorFamily::StyleGan2,
        }
    }

    /// Checks that need no file access
    pub fn validate(&self) -> Result<()> {
        match self {
            AdapterSpec::BigGan { target_classes, .. } => target_classes.validate(),
            AdapterSpec::BigBiGan { resolution, .. } => big_bi_gan_arch(*resolution).map(|_| ()),
            AdapterSpec::ProgGan { arch, .. } => arch.validate(),
            AdapterSpec::SnGan { .. } => Ok(()),
            AdapterSpec::StyleGan2 { arch, .. } => arch.validate(),
        }
    }
}

/// Adapter config file: what to build and where to place it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Adapter to build
    pub adapter: AdapterSpec,
    /// Compute device
    #[serde(default)]
    pub device: DeviceConfig,
}

impl AdapterConfig {
    /// Load from a JSON or YAML file, chosen by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.adapter.validate()
    }
}
