//! Family-aware construction of generator adapters
//!
//! Every family follows the same sequence: resolve and validate
//! hyperparameters, build the network against a fresh parameter map, fill it
//! from the checkpoint under the family's [`LoadPolicy`], wrap it in the
//! matching adapter and attach the shift policy.

use candle_core::Device;
use once_cell::sync::Lazy;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::adapter::{
    ClassSelection, ConditionalAdapter, DirectAdapter, GeneratorAdapter, ShiftPolicy,
    UnconditionalAdapter,
};
#[cfg(feature = "stylegan2")]
use crate::adapter::LatentSeparatedAdapter;
use crate::checkpoint::{load_network, Checkpoint, LoadPolicy, LoadReport};
use crate::config::{
    big_bi_gan_arch, AdapterSpec, BigGanConfig, DeviceConfig, GeneratorFamily, ProgGanArch,
    SnGanArgs, StyleGanArch,
};
use crate::error::{Error, Result};
use crate::nets::{BigGanNet, ProgGanNet, SnGanNet};

/// File holding SNGAN hyperparameters inside a model directory
pub const SNGAN_ARGS_FILE: &str = "args.json";
/// File holding SNGAN generator weights inside a model directory
pub const SNGAN_WEIGHTS_FILE: &str = "generator.safetensors";
/// Prefix of the averaged generator inside StyleGAN2 checkpoints
pub const STYLEGAN2_PREFIX: &str = "g_ema.";

static SUPPORTED_FAMILIES: Lazy<Vec<GeneratorFamily>> = Lazy::new(|| {
    let mut families = vec![
        GeneratorFamily::BigGan,
        GeneratorFamily::BigBiGan,
        GeneratorFamily::ProgGan,
        GeneratorFamily::SnGan,
    ];
    if cfg!(feature = "stylegan2") {
        families.push(GeneratorFamily::StyleGan2);
    } else {
        warn!("StyleGAN2 support is not compiled in; the stylegan2 family is unavailable");
    }
    families
});

/// Families this build can construct
pub fn supported_families() -> &'static [GeneratorFamily] {
    &SUPPORTED_FAMILIES
}

/// Whether `family` can be constructed by this build
pub fn is_supported(family: GeneratorFamily) -> bool {
    SUPPORTED_FAMILIES.contains(&family)
}

fn ensure_supported(family: GeneratorFamily) -> Result<()> {
    if is_supported(family) {
        Ok(())
    } else {
        Err(Error::unsupported(format!(
            "{family} is not available in this build"
        )))
    }
}

/// Builds adapters whose networks live on one device
#[derive(Debug, Clone)]
pub struct AdapterFactory {
    device: Device,
}

impl AdapterFactory {
    /// Factory placing networks on `device`
    pub fn new(device: Device) -> Self {
        Self { device }
    }

    /// Factory for a configured device
    pub fn from_config(config: &DeviceConfig) -> Result<Self> {
        Ok(Self::new(config.to_device()?))
    }

    /// Target device
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Build any family from a serializable spec
    #[instrument(skip(self, spec), fields(family = %spec.family()))]
    pub fn build(&self, spec: &AdapterSpec) -> Result<Box<dyn GeneratorAdapter>> {
        ensure_supported(spec.family())?;
        spec.validate()?;
        match spec {
            AdapterSpec::BigGan {
                weights_root,
                config,
                target_classes,
            } => Ok(Box::new(self.big_gan(
                weights_root,
                config,
                target_classes.clone(),
            )?)),
            AdapterSpec::BigBiGan {
                weights_root,
                resolution,
            } => Ok(Box::new(self.big_bi_gan(weights_root, *resolution)?)),
            AdapterSpec::ProgGan { weights_root, arch } => {
                Ok(Box::new(self.prog_gan(weights_root, arch)?))
            }
            AdapterSpec::SnGan { gan_dir } => Ok(Box::new(self.sn_gan(gan_dir)?)),
            AdapterSpec::StyleGan2 {
                weights,
                arch,
                shift_in_intermediate_space,
            } => self.style_gan2(weights, arch, *shift_in_intermediate_space),
        }
    }

    /// Class-conditional BigGAN from a generator config file
    pub fn big_gan(
        &self,
        weights_root: impl AsRef<Path>,
        config_path: impl AsRef<Path>,
        target_classes: impl Into<ClassSelection>,
    ) -> Result<ConditionalAdapter> {
        let config = BigGanConfig::from_file(config_path)?;
        self.big_gan_with_config(weights_root, &config, target_classes)
    }

    /// Class-conditional BigGAN from a config that names its own weights
    pub fn big_gan_from_config(
        &self,
        config: &BigGanConfig,
        target_classes: impl Into<ClassSelection>,
    ) -> Result<ConditionalAdapter> {
        let weights_root = config
            .weights_root
            .as_ref()
            .ok_or_else(|| Error::config("BigGAN config has no weights_root"))?;
        self.big_gan_with_config(weights_root, config, target_classes)
    }

    fn big_gan_with_config(
        &self,
        weights_root: impl AsRef<Path>,
        config: &BigGanConfig,
        target_classes: impl Into<ClassSelection>,
    ) -> Result<ConditionalAdapter> {
        let selection = target_classes.into();
        selection.validate()?;
        let arch = config.resolve()?;
        debug!(?arch, "Resolved BigGAN hyperparameters");

        let family = GeneratorFamily::BigGan;
        let (net, report) = self.load(family, weights_root.as_ref(), None, |vb| {
            BigGanNet::new(&arch, vb)
        })?;
        log_built(family, net.arch().resolution, &report);

        let mut adapter = ConditionalAdapter::new(Box::new(net), selection)?.with_family(family);
        adapter.set_shift_policy(ShiftPolicy::RawSpace)?;
        Ok(adapter)
    }

    /// BigBiGAN driven as an unconditional BigGAN
    pub fn big_bi_gan(
        &self,
        weights_root: impl AsRef<Path>,
        resolution: usize,
    ) -> Result<UnconditionalAdapter> {
        let arch = big_bi_gan_arch(resolution)?;
        let family = GeneratorFamily::BigBiGan;
        let (net, report) = self.load(family, weights_root.as_ref(), None, |vb| {
            BigGanNet::new(&arch, vb)
        })?;
        log_built(family, resolution, &report);

        let mut adapter = UnconditionalAdapter::new(Box::new(net)).with_family(family);
        adapter.set_shift_policy(ShiftPolicy::RawSpace)?;
        Ok(adapter)
    }

    /// Progressive GAN with spatial `[latent, 1, 1]` codes
    pub fn prog_gan(
        &self,
        weights_root: impl AsRef<Path>,
        arch: &ProgGanArch,
    ) -> Result<DirectAdapter> {
        arch.validate()?;
        let family = GeneratorFamily::ProgGan;
        let (net, report) = self.load(family, weights_root.as_ref(), None, |vb| {
            ProgGanNet::new(arch, vb)
        })?;
        log_built(family, arch.resolution, &report);

        let mut adapter = DirectAdapter::new(Box::new(net), family);
        adapter.set_shift_policy(ShiftPolicy::RawSpace)?;
        Ok(adapter)
    }

    /// SNGAN from a model directory
    pub fn sn_gan(&self, gan_dir: impl AsRef<Path>) -> Result<DirectAdapter> {
        let gan_dir = gan_dir.as_ref();
        let arch = SnGanArgs::from_file(gan_dir.join(SNGAN_ARGS_FILE))?.resolve()?;
        let family = GeneratorFamily::SnGan;
        let (net, report) = self.load(family, &gan_dir.join(SNGAN_WEIGHTS_FILE), None, |vb| {
            SnGanNet::new(&arch, vb)
        })?;
        log_built(family, arch.resolution, &report);

        let mut adapter = DirectAdapter::new(Box::new(net), family);
        adapter.set_shift_policy(ShiftPolicy::RawSpace)?;
        Ok(adapter)
    }

    /// StyleGAN2 from a checkpoint holding the averaged generator
    pub fn style_gan2(
        &self,
        weights: impl AsRef<Path>,
        arch: &StyleGanArch,
        shift_in_intermediate_space: bool,
    ) -> Result<Box<dyn GeneratorAdapter>> {
        let family = GeneratorFamily::StyleGan2;
        ensure_supported(family)?;
        arch.validate()?;
        let mut adapter = self.style_gan2_adapter(weights.as_ref(), arch)?;
        adapter.set_shift_policy(ShiftPolicy::from_flag(shift_in_intermediate_space))?;
        Ok(adapter)
    }

    #[cfg(feature = "stylegan2")]
    fn style_gan2_adapter(
        &self,
        weights: &Path,
        arch: &StyleGanArch,
    ) -> Result<Box<dyn GeneratorAdapter>> {
        use crate::nets::StyleGanNet;

        let family = GeneratorFamily::StyleGan2;
        let (net, report) = self.load(family, weights, Some(STYLEGAN2_PREFIX), |vb| {
            StyleGanNet::new(arch, vb)
        })?;
        log_built(family, arch.size, &report);
        Ok(Box::new(
            LatentSeparatedAdapter::new(Box::new(net)).with_family(family),
        ))
    }

    #[cfg(not(feature = "stylegan2"))]
    fn style_gan2_adapter(
        &self,
        _weights: &Path,
        _arch: &StyleGanArch,
    ) -> Result<Box<dyn GeneratorAdapter>> {
        Err(Error::unsupported("StyleGAN2 support is not compiled in"))
    }

    fn load<N>(
        &self,
        family: GeneratorFamily,
        weights: &Path,
        prefix: Option<&str>,
        build: impl FnOnce(candle_nn::VarBuilder<'_>) -> Result<N>,
    ) -> Result<(N, LoadReport)> {
        let checkpoint = Checkpoint::open(weights)?;
        let policy: LoadPolicy = family.load_policy();
        debug!(%family, ?policy, path = %weights.display(), "Loading checkpoint");
        load_network(&checkpoint, policy, prefix, &self.device, build)
    }
}

fn log_built(family: GeneratorFamily, resolution: usize, report: &LoadReport) {
    if !report.missing.is_empty() {
        warn!(
            "{} parameters of {} kept their initial values",
            report.missing.len(),
            family
        );
    }
    info!(
        "Built {} generator at {}x{} ({} parameters loaded)",
        family, resolution, resolution, report.loaded
    );
}
