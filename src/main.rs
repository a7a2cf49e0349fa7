use anyhow::{bail, Context, Result};
use candle_core::Tensor;
use clap::{Args, Parser, Subcommand};
use latent_shift::{
    factory, logging, AdapterConfig, AdapterFactory, GeneratorAdapter, LatentSampler,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "latent-shift")]
#[command(about = "Sample and shift pretrained GAN generators through one adapter interface", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "LATENT_SHIFT_JSON_LOGS")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show compiled families and backends
    Info,

    /// Parse and resolve an adapter config without loading weights
    Validate {
        /// Adapter config file (JSON or YAML)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Synthesize a batch of images
    Sample(SampleArgs),

    /// Synthesize a batch before and after a random latent shift
    Shift {
        #[command(flatten)]
        sample: SampleArgs,

        /// Norm of the random direction
        #[arg(short, long, default_value_t = 3.0)]
        magnitude: f64,
    },
}

#[derive(Args)]
struct SampleArgs {
    /// Adapter config file (JSON or YAML)
    #[arg(short, long)]
    config: PathBuf,

    /// Batch size
    #[arg(short = 'n', long, default_value_t = 4)]
    num: usize,

    /// Output safetensors file
    #[arg(short, long)]
    output: PathBuf,

    /// RNG seed for latents and directions
    #[arg(long)]
    seed: Option<u64>,

    /// Truncation threshold for latent sampling
    #[arg(long)]
    truncation: Option<f32>,

    /// Classes to condition on (conditional families only)
    #[arg(long, value_delimiter = ',')]
    classes: Vec<u32>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet, cli.json)?;
    let families = factory::supported_families();
    debug!(?families, "Registered generator families");

    match cli.command {
        Commands::Info => show_system_info(),
        Commands::Validate { file } => validate_config(&file)?,
        Commands::Sample(args) => sample(&args)?,
        Commands::Shift { sample, magnitude } => shift(&sample, magnitude)?,
    }

    Ok(())
}

fn validate_config(path: &Path) -> Result<()> {
    info!("Validating adapter config: {}", path.display());
    let config = AdapterConfig::from_file(path)
        .with_context(|| format!("Failed to load adapter config {}", path.display()))?;
    let family = config.adapter.family();
    if !factory::is_supported(family) {
        bail!("{family} is not available in this build");
    }
    config
        .device
        .to_device()
        .context("Configured device is unavailable")?;

    info!("Adapter config is valid");
    info!("  - Family: {}", family);
    info!("  - Checkpoint policy: {:?}", family.load_policy());
    info!("  - Device: {:?}", config.device.device_type);
    Ok(())
}

struct Prepared {
    adapter: Box<dyn GeneratorAdapter>,
    sampler: LatentSampler,
    latents: Tensor,
}

fn prepare(args: &SampleArgs) -> Result<Prepared> {
    if args.num == 0 {
        bail!("batch size must be at least 1");
    }
    let config = AdapterConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load adapter config {}", args.config.display()))?;
    let factory = AdapterFactory::from_config(&config.device)?;
    let mut adapter = factory
        .build(&config.adapter)
        .context("Failed to build generator adapter")?;

    if !args.classes.is_empty() {
        let family = adapter.family();
        match adapter.as_conditional_mut() {
            Some(conditional) => conditional.configure_classes(args.classes.clone())?,
            None => warn!("{} is unconditional; ignoring --classes", family),
        }
    }

    let mut sampler = match args.seed {
        Some(seed) => LatentSampler::seeded(seed),
        None => LatentSampler::new(),
    };
    if let Some(threshold) = args.truncation {
        sampler = sampler.with_truncation(threshold)?;
    }
    let latents = sampler.sample(adapter.dim_z(), args.num, factory.device())?;

    Ok(Prepared {
        adapter,
        sampler,
        latents,
    })
}

fn sample(args: &SampleArgs) -> Result<()> {
    let Prepared {
        adapter, latents, ..
    } = prepare(args)?;

    info!("Synthesizing {} images with {}", args.num, adapter.family());
    let images = adapter.synthesize(&latents, false)?;

    save(&args.output, [("latents", latents), ("images", images)])?;
    info!("Images saved to: {}", args.output.display());
    Ok(())
}

fn shift(args: &SampleArgs, magnitude: f64) -> Result<()> {
    let Prepared {
        adapter,
        mut sampler,
        latents,
    } = prepare(args)?;

    let direction = sampler.sample(adapter.dim_shift(), 1, latents.device())?;
    let norm = direction.sqr()?.sum_all()?.sqrt()?;
    let direction = direction.broadcast_div(&norm)?.affine(magnitude, 0.0)?;

    info!(
        "Shifting {} images in {:?} by a direction of norm {}",
        args.num,
        adapter.shift_policy(),
        magnitude
    );
    let base = adapter.apply_shift(&latents, &direction.zeros_like()?)?;
    let shifted = adapter.apply_shift(&latents, &direction)?;

    save(
        &args.output,
        [
            ("latents", latents),
            ("direction", direction),
            ("base", base),
            ("shifted", shifted),
        ],
    )?;
    info!("Images saved to: {}", args.output.display());
    Ok(())
}

fn save<const N: usize>(path: &Path, tensors: [(&str, Tensor); N]) -> Result<()> {
    let tensors: HashMap<String, Tensor> = tensors
        .into_iter()
        .map(|(name, tensor)| (name.to_string(), tensor))
        .collect();
    candle_core::safetensors::save(&tensors, path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn show_system_info() {
    println!("latent-shift {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Generator families:");
    for family in factory::supported_families() {
        println!("  {} ({:?} checkpoints)", family, family.load_policy());
    }
    if !cfg!(feature = "stylegan2") {
        println!("  stylegan2 (not compiled)");
    }
    println!();
    println!("Backends:");
    println!("  cpu");
    if cfg!(feature = "cuda") {
        println!("  cuda");
    }
    if cfg!(feature = "metal") {
        println!("  metal");
    }
    if cfg!(feature = "accelerate") {
        println!("  accelerate");
    }
}
