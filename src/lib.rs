//! latent-shift - uniform adapters over pretrained GAN generators
//!
//! Heterogeneous generator families (class-conditional, unconditional,
//! style-based, plain noise-driven) are wrapped behind one
//! [`GeneratorAdapter`] contract so that latent-direction discovery code can
//! sample, condition and shift any of them the same way.
//!
//! ```no_run
//! use candle_core::Device;
//! use latent_shift::{AdapterFactory, GeneratorAdapter, LatentSampler};
//!
//! # fn main() -> latent_shift::Result<()> {
//! let factory = AdapterFactory::new(Device::Cpu);
//! let adapter = factory.big_bi_gan("bigbigan128.safetensors", 128)?;
//! let z = LatentSampler::seeded(0).sample(adapter.dim_z(), 4, &Device::Cpu)?;
//! let images = adapter.synthesize(&z, false)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod adapter;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod factory;
pub mod generator;
pub mod latent;
pub mod logging;
pub mod nets;

// Re-exports
pub use adapter::{
    ClassSelection, ConditionalAdapter, ConditioningPolicy, DirectAdapter, GeneratorAdapter,
    LatentSeparatedAdapter, ShiftPolicy, UnconditionalAdapter, NO_CLASS,
};
pub use checkpoint::{Checkpoint, LoadPolicy, LoadReport};
pub use config::{AdapterConfig, AdapterSpec, DeviceConfig, GeneratorFamily};
pub use error::{Error, Result};
pub use factory::AdapterFactory;
pub use latent::{LatentSampler, LatentShape};

use std::path::Path;
use tracing::{info, instrument};

/// Build the adapter described by a JSON or YAML config file
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_adapter(path: impl AsRef<Path>) -> Result<Box<dyn GeneratorAdapter>> {
    let config = AdapterConfig::from_file(path.as_ref())?;
    info!("Building {} adapter", config.adapter.family());
    AdapterFactory::from_config(&config.device)?.build(&config.adapter)
}
