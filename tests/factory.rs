//! End-to-end adapter construction from checkpoints on disk

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use latent_shift::config::{big_bi_gan_arch, BigGanConfig, ProgGanArch, SnGanArgs, StyleGanArch};
use latent_shift::nets::{BigGanNet, ProgGanNet, SnGanNet};
use latent_shift::{
    AdapterFactory, AdapterSpec, ConditionalAdapter, DirectAdapter, Error, GeneratorAdapter,
    GeneratorFamily, ShiftPolicy, UnconditionalAdapter,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BIGGAN_CONFIG: &str = r#"{
    "dataset": "C10",
    "G_ch": 8,
    "dim_z": 16,
    "shared_dim": 8,
    "G_attn": "0",
    "norm_style": "bn",
    "G_param": "SN",
    "BN_eps": 1e-5,
    "SN_eps": 1e-8
}"#;

/// Build a network against a fresh parameter map
fn build<N>(
    build: impl FnOnce(VarBuilder<'_>) -> latent_shift::Result<N>,
) -> (N, VarMap) {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let net = build(vb).unwrap();
    (net, varmap)
}

/// Write the parameters of `varmap`, renamed with `prefix` and without the
/// names `skip` selects
fn save(varmap: &VarMap, path: &Path, prefix: &str, skip: impl Fn(&str) -> bool) {
    let tensors: HashMap<String, Tensor> = varmap
        .data()
        .lock()
        .unwrap()
        .iter()
        .filter(|(name, _)| !skip(name))
        .map(|(name, var)| (format!("{prefix}{name}"), var.as_tensor().clone()))
        .collect();
    candle_core::safetensors::save(&tensors, path).unwrap();
}

fn max_abs_diff(a: &Tensor, b: &Tensor) -> f32 {
    (a - b)
        .unwrap()
        .abs()
        .unwrap()
        .flatten_all()
        .unwrap()
        .max(0)
        .unwrap()
        .to_scalar::<f32>()
        .unwrap()
}

fn assert_images(images: &Tensor, batch_size: usize, resolution: usize) {
    assert_eq!(images.dims(), &[batch_size, 3, resolution, resolution]);
    let values = images.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    assert!(values.iter().all(|v| v.is_finite() && v.abs() <= 1.0));
}

fn write_biggan(dir: &TempDir) -> (PathBuf, PathBuf, VarMap, BigGanNet) {
    let config_path = dir.path().join("generator_config.json");
    fs::write(&config_path, BIGGAN_CONFIG).unwrap();
    let arch = BigGanConfig::from_file(&config_path)
        .unwrap()
        .resolve()
        .unwrap();
    let (net, varmap) = build(|vb| BigGanNet::new(&arch, vb));
    let weights = dir.path().join("G_ema.safetensors");
    save(&varmap, &weights, "", |_| false);
    (weights, config_path, varmap, net)
}

#[test]
fn test_big_gan_loads_strict_checkpoint() {
    let dir = TempDir::new().unwrap();
    let (weights, config, _, reference) = write_biggan(&dir);

    let factory = AdapterFactory::new(Device::Cpu);
    let adapter = factory.big_gan(&weights, &config, 3u32).unwrap();
    assert_eq!(adapter.family(), GeneratorFamily::BigGan);
    assert_eq!(adapter.dim_z().dims(), &[16]);
    assert_eq!(adapter.resolution(), 32);
    assert_eq!(adapter.num_classes(), 10);
    assert_eq!(adapter.shift_policy(), ShiftPolicy::RawSpace);

    let z = adapter.dim_z().zeros(2, &Device::Cpu).unwrap();
    let images = adapter.synthesize(&z, false).unwrap();
    assert_images(&images, 2, 32);

    let reference = ConditionalAdapter::new(Box::new(reference), 3u32).unwrap();
    let expected = reference.synthesize(&z, false).unwrap();
    assert!(max_abs_diff(&images, &expected) < 1e-5);
}

#[test]
fn test_big_gan_rejects_out_of_vocabulary_class() {
    let dir = TempDir::new().unwrap();
    let (weights, config, _, _) = write_biggan(&dir);

    let mut adapter = AdapterFactory::new(Device::Cpu)
        .big_gan(&weights, &config, 3u32)
        .unwrap();
    adapter.configure_classes(10u32).unwrap();
    let z = adapter.dim_z().zeros(1, &Device::Cpu).unwrap();
    let err = adapter.synthesize(&z, false).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidClass {
            class: 10,
            num_classes: 10
        }
    ));
}

#[test]
fn test_strict_family_fails_on_missing_key() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("generator_config.json");
    fs::write(&config, BIGGAN_CONFIG).unwrap();
    let arch = BigGanConfig::from_file(&config).unwrap().resolve().unwrap();
    let (_, varmap) = build(|vb| BigGanNet::new(&arch, vb));
    let weights = dir.path().join("partial.safetensors");
    save(&varmap, &weights, "", |name| name == "shared.weight");

    let err = AdapterFactory::new(Device::Cpu)
        .big_gan(&weights, &config, 0u32)
        .err()
        .unwrap();
    match err {
        Error::CheckpointLoad(message) => assert!(message.contains("shared.weight")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_strict_family_fails_on_unexpected_key() {
    let dir = TempDir::new().unwrap();
    let (_, config, varmap, _) = write_biggan(&dir);
    varmap
        .get((2, 2), "extra.weight", candle_nn::Init::Const(0.0), DType::F32, &Device::Cpu)
        .unwrap();
    let weights = dir.path().join("extra.safetensors");
    save(&varmap, &weights, "", |_| false);

    let err = AdapterFactory::new(Device::Cpu)
        .big_gan(&weights, &config, 0u32)
        .err()
        .unwrap();
    assert!(matches!(err, Error::CheckpointLoad(_)));
}

#[test]
fn test_big_bi_gan_tolerates_partial_checkpoint() {
    let dir = TempDir::new().unwrap();
    let arch = big_bi_gan_arch(128).unwrap();
    let (reference, varmap) = build(|vb| BigGanNet::new(&arch, vb));
    let weights = dir.path().join("bigbigan.safetensors");
    save(&varmap, &weights, "", |name| name.ends_with("sv0"));

    let adapter = AdapterFactory::new(Device::Cpu)
        .big_bi_gan(&weights, 128)
        .unwrap();
    assert_eq!(adapter.family(), GeneratorFamily::BigBiGan);
    assert_eq!(adapter.dim_z().dims(), &[120]);

    let z = adapter.dim_z().zeros(1, &Device::Cpu).unwrap();
    let images = adapter.synthesize(&z, false).unwrap();
    assert_images(&images, 1, 128);

    let expected = UnconditionalAdapter::new(Box::new(reference))
        .synthesize(&z, false)
        .unwrap();
    assert!(max_abs_diff(&images, &expected) < 1e-5);
}

#[test]
fn test_unregistered_resolution_fails_before_construction() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("never-written.safetensors");
    let err = AdapterFactory::new(Device::Cpu)
        .big_bi_gan(&missing, 64)
        .err()
        .unwrap();
    assert!(matches!(err, Error::UnsupportedConfiguration(_)));
}

#[test]
fn test_prog_gan_takes_spatial_latents() {
    let dir = TempDir::new().unwrap();
    let arch = ProgGanArch {
        resolution: 8,
        latent_size: 16,
        fmap_base: 64,
        fmap_max: 16,
    };
    let (_, varmap) = build(|vb| ProgGanNet::new(&arch, vb));
    let weights = dir.path().join("proggan.safetensors");
    save(&varmap, &weights, "", |_| false);

    let adapter = AdapterFactory::new(Device::Cpu)
        .prog_gan(&weights, &arch)
        .unwrap();
    assert_eq!(adapter.dim_z().dims(), &[16, 1, 1]);

    let z = adapter.dim_z().zeros(2, &Device::Cpu).unwrap();
    assert_images(&adapter.synthesize(&z, false).unwrap(), 2, 8);

    let flat = Tensor::zeros((2, 16), DType::F32, &Device::Cpu).unwrap();
    assert!(matches!(
        adapter.synthesize(&flat, false),
        Err(Error::ShapeMismatch { .. })
    ));
}

#[test]
fn test_sn_gan_from_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("args.json"),
        r#"{"model": "sn_resnet32", "distribution_dim": 16}"#,
    )
    .unwrap();
    let arch = SnGanArgs::from_file(dir.path().join("args.json"))
        .unwrap()
        .resolve()
        .unwrap();
    let (reference, varmap) = build(|vb| SnGanNet::new(&arch, vb));
    save(
        &varmap,
        &dir.path().join("generator.safetensors"),
        "",
        |_| false,
    );

    let adapter = AdapterFactory::new(Device::Cpu).sn_gan(dir.path()).unwrap();
    assert_eq!(adapter.family(), GeneratorFamily::SnGan);
    assert_eq!(adapter.resolution(), 32);

    let z = adapter.dim_z().zeros(1, &Device::Cpu).unwrap();
    let images = adapter.synthesize(&z, false).unwrap();
    assert_images(&images, 1, 32);

    let expected = DirectAdapter::new(Box::new(reference), GeneratorFamily::SnGan)
        .synthesize(&z, false)
        .unwrap();
    assert!(max_abs_diff(&images, &expected) < 1e-5);
}

#[test]
fn test_sn_gan_unknown_model() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("args.json"),
        r#"{"model": "sn_resnet1024", "distribution_dim": 16}"#,
    )
    .unwrap();
    let err = AdapterFactory::new(Device::Cpu)
        .sn_gan(dir.path())
        .err()
        .unwrap();
    assert!(matches!(err, Error::UnsupportedConfiguration(_)));
}

#[cfg(feature = "stylegan2")]
fn small_style_arch() -> StyleGanArch {
    StyleGanArch {
        size: 8,
        style_dim: 16,
        n_mlp: 2,
        channel_multiplier: 2,
        max_channels: 16,
    }
}

#[cfg(feature = "stylegan2")]
#[test]
fn test_style_gan2_reads_averaged_generator() {
    use latent_shift::nets::StyleGanNet;

    let dir = TempDir::new().unwrap();
    let arch = small_style_arch();
    let (_, varmap) = build(|vb| StyleGanNet::new(&arch, vb));
    let weights = dir.path().join("stylegan2.safetensors");
    save(&varmap, &weights, "g_ema.", |_| false);

    let factory = AdapterFactory::new(Device::Cpu);
    let adapter = factory.style_gan2(&weights, &arch, true).unwrap();
    assert_eq!(adapter.shift_policy(), ShiftPolicy::IntermediateSpace);
    assert_eq!(adapter.dim_shift().dims(), &[16]);

    let z = adapter.dim_z().zeros(2, &Device::Cpu).unwrap();
    assert_images(&adapter.synthesize(&z, false).unwrap(), 2, 8);

    let w = adapter.to_intermediate(&z).unwrap();
    assert_images(&adapter.synthesize(&w, true).unwrap(), 2, 8);

    let raw = factory.style_gan2(&weights, &arch, false).unwrap();
    assert_eq!(raw.shift_policy(), ShiftPolicy::RawSpace);
}

#[cfg(feature = "stylegan2")]
#[test]
fn test_style_gan2_without_prefix_is_rejected() {
    use latent_shift::nets::StyleGanNet;

    let dir = TempDir::new().unwrap();
    let arch = small_style_arch();
    let (_, varmap) = build(|vb| StyleGanNet::new(&arch, vb));
    let weights = dir.path().join("bare.safetensors");
    save(&varmap, &weights, "", |_| false);

    let err = AdapterFactory::new(Device::Cpu)
        .style_gan2(&weights, &arch, true)
        .err()
        .unwrap();
    assert!(matches!(err, Error::CheckpointLoad(_)));
}

#[test]
fn test_build_from_yaml_spec() {
    let dir = TempDir::new().unwrap();
    let (weights, config, _, _) = write_biggan(&dir);
    let spec_path = dir.path().join("adapter.yaml");
    fs::write(
        &spec_path,
        format!(
            "adapter:\n  family: big_gan\n  weights_root: {}\n  config: {}\n  target_classes: [1, 2]\n",
            weights.display(),
            config.display()
        ),
    )
    .unwrap();

    let mut adapter = latent_shift::load_adapter(&spec_path).unwrap();
    assert_eq!(adapter.family(), GeneratorFamily::BigGan);
    let conditional = adapter.as_conditional_mut().unwrap();
    assert_eq!(conditional.classes(), &[1, 2]);

    let z = adapter.dim_z().zeros(3, &Device::Cpu).unwrap();
    let shift = adapter.dim_shift().zeros(1, &Device::Cpu).unwrap();
    assert_images(&adapter.apply_shift(&z, &shift).unwrap(), 3, 32);
}

#[test]
fn test_build_rejects_invalid_spec_early() {
    let spec: AdapterSpec = serde_json::from_str(
        r#"{"family": "big_bi_gan", "weights_root": "/nowhere", "resolution": 96}"#,
    )
    .unwrap();
    let err = AdapterFactory::new(Device::Cpu)
        .build(&spec)
        .err()
        .unwrap();
    assert!(matches!(err, Error::UnsupportedConfiguration(_)));
}
