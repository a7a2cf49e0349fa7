//! Checkpoint reading and name-matched parameter loading
//!
//! Checkpoints are safetensors files keyed by parameter name. Networks are
//! built against a [`VarMap`] first, so the set of expected names and shapes
//! is known before any checkpoint tensor is materialized.

use candle_core::safetensors::{Load, MmapedSafetensors};
use candle_core::{DType, Device};
use candle_nn::VarMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// How strictly checkpoint keys must match the constructed network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Missing or unexpected keys fail the load
    Strict,
    /// Unmatched keys are ignored; missing parameters keep their initial values
    Lenient,
}

/// Outcome of a successful load
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Parameters copied from the checkpoint
    pub loaded: usize,
    /// Network parameters absent from the checkpoint
    pub missing: Vec<String>,
    /// Checkpoint entries with no matching parameter
    pub unexpected: Vec<String>,
}

/// A memory-mapped safetensors checkpoint
pub struct Checkpoint {
    path: PathBuf,
    tensors: MmapedSafetensors,
}

impl Checkpoint {
    /// Map a checkpoint file and parse its header
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        // SAFETY: the mapping is read-only and checkpoints are not modified while loaded.
        let tensors = unsafe { MmapedSafetensors::new(&path) }
            .map_err(|e| Error::checkpoint(format!("cannot read {}: {e}", path.display())))?;
        Ok(Self { path, tensors })
    }

    /// Path this checkpoint was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of all stored tensors
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tensors
            .tensors()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        names.sort();
        names
    }

    /// Copy matching tensors into the parameters of `varmap`.
    ///
    /// With a `prefix`, only entries under it are considered and the prefix is
    /// stripped before matching. Shapes must agree under either policy.
    pub fn load_into(
        &self,
        varmap: &VarMap,
        policy: LoadPolicy,
        prefix: Option<&str>,
        device: &Device,
    ) -> Result<LoadReport> {
        let provided: HashMap<String, _> = self
            .tensors
            .tensors()
            .into_iter()
            .filter_map(|(name, view)| match prefix {
                Some(p) => name.strip_prefix(p).map(|key| (key.to_string(), view)),
                None => Some((name, view)),
            })
            .collect();

        let vars = varmap
            .data()
            .lock()
            .map_err(|_| Error::checkpoint("parameter map lock poisoned"))?;

        let mut missing: Vec<String> = vars
            .keys()
            .filter(|name| !provided.contains_key(*name))
            .cloned()
            .collect();
        let mut unexpected: Vec<String> = provided
            .keys()
            .filter(|name| !vars.contains_key(*name))
            .cloned()
            .collect();
        missing.sort();
        unexpected.sort();

        if policy == LoadPolicy::Strict && (!missing.is_empty() || !unexpected.is_empty()) {
            return Err(Error::checkpoint(format!(
                "{} does not match the network: missing [{}], unexpected [{}]",
                self.path.display(),
                missing.join(", "),
                unexpected.join(", ")
            )));
        }

        let mut loaded = 0;
        for (name, var) in vars.iter() {
            let Some(view) = provided.get(name) else {
                continue;
            };
            if view.shape() != var.dims() {
                return Err(Error::checkpoint(format!(
                    "{}: parameter '{name}' has shape {:?}, network expects {:?}",
                    self.path.display(),
                    view.shape(),
                    var.dims()
                )));
            }
            let tensor = view
                .load(device)
                .map_err(|e| {
                    Error::checkpoint(format!("{}: parameter '{name}': {e}", self.path.display()))
                })?
                .to_dtype(var.dtype())?;
            var.set(&tensor)?;
            loaded += 1;
        }

        if !missing.is_empty() || !unexpected.is_empty() {
            debug!(
                missing = missing.len(),
                unexpected = unexpected.len(),
                "Partial checkpoint match tolerated"
            );
        }
        info!("Loaded {} parameters from {}", loaded, self.path.display());

        Ok(LoadReport {
            loaded,
            missing,
            unexpected,
        })
    }
}

/// Build a network against a fresh [`VarMap`] and fill it from `checkpoint`
pub fn load_network<N>(
    checkpoint: &Checkpoint,
    policy: LoadPolicy,
    prefix: Option<&str>,
    device: &Device,
    build: impl FnOnce(candle_nn::VarBuilder<'_>) -> Result<N>,
) -> Result<(N, LoadReport)> {
    let varmap = VarMap::new();
    let vb = candle_nn::VarBuilder::from_varmap(&varmap, DType::F32, device);
    let network = build(vb)?;
    let report = checkpoint.load_into(&varmap, policy, prefix, device)?;
    Ok((network, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Tensor;
    use candle_nn::{linear, Init};
    use tempfile::TempDir;

    fn save(dir: &TempDir, name: &str, tensors: Vec<(&str, Tensor)>) -> PathBuf {
        let path = dir.path().join(name);
        let map: HashMap<String, Tensor> = tensors
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        candle_core::safetensors::save(&map, &path).unwrap();
        path
    }

    fn build_linear(vb: candle_nn::VarBuilder<'_>) -> Result<candle_nn::Linear> {
        Ok(linear(3, 2, vb.pp("fc"))?)
    }

    #[test]
    fn test_strict_load_copies_weights() {
        let dir = TempDir::new().unwrap();
        let weight = Tensor::ones((2, 3), DType::F32, &Device::Cpu).unwrap();
        let bias = Tensor::zeros(2, DType::F32, &Device::Cpu).unwrap();
        let path = save(&dir, "fc.safetensors", vec![("fc.weight", weight), ("fc.bias", bias)]);

        let checkpoint = Checkpoint::open(&path).unwrap();
        let (layer, report) =
            load_network(&checkpoint, LoadPolicy::Strict, None, &Device::Cpu, build_linear)
                .unwrap();
        assert_eq!(report.loaded, 2);

        let x = Tensor::ones((1, 3), DType::F32, &Device::Cpu).unwrap();
        let y = candle_core::Module::forward(&layer, &x).unwrap();
        assert_eq!(y.to_vec2::<f32>().unwrap(), vec![vec![3.0, 3.0]]);
    }

    #[test]
    fn test_strict_load_rejects_missing_and_extra_keys() {
        let dir = TempDir::new().unwrap();
        let weight = Tensor::ones((2, 3), DType::F32, &Device::Cpu).unwrap();
        let extra = Tensor::ones(1, DType::F32, &Device::Cpu).unwrap();
        let path = save(&dir, "fc.safetensors", vec![("fc.weight", weight), ("fc.u0", extra)]);

        let checkpoint = Checkpoint::open(&path).unwrap();
        let err = load_network(&checkpoint, LoadPolicy::Strict, None, &Device::Cpu, build_linear)
            .err()
            .unwrap();
        let msg = err.to_string();
        assert!(matches!(err, Error::CheckpointLoad(_)));
        assert!(msg.contains("fc.bias"));
        assert!(msg.contains("fc.u0"));
    }

    #[test]
    fn test_lenient_load_keeps_initial_values() {
        let dir = TempDir::new().unwrap();
        let weight = Tensor::ones((2, 3), DType::F32, &Device::Cpu).unwrap();
        let extra = Tensor::ones(1, DType::F32, &Device::Cpu).unwrap();
        let path = save(&dir, "fc.safetensors", vec![("fc.weight", weight), ("fc.u0", extra)]);

        let checkpoint = Checkpoint::open(&path).unwrap();
        let (_, report) = load_network(
            &checkpoint,
            LoadPolicy::Lenient,
            None,
            &Device::Cpu,
            |vb| Ok(vb.get_with_hints((2, 3), "fc.weight", Init::Const(0.0))?),
        )
        .unwrap();
        assert_eq!(report.loaded, 1);
        assert!(report.missing.is_empty());
        assert_eq!(report.unexpected, vec!["fc.u0".to_string()]);
    }

    #[test]
    fn test_shape_mismatch_fails_even_when_lenient() {
        let dir = TempDir::new().unwrap();
        let weight = Tensor::ones((3, 3), DType::F32, &Device::Cpu).unwrap();
        let path = save(&dir, "fc.safetensors", vec![("fc.weight", weight)]);

        let checkpoint = Checkpoint::open(&path).unwrap();
        let result = load_network(&checkpoint, LoadPolicy::Lenient, None, &Device::Cpu, build_linear);
        assert!(matches!(result, Err(Error::CheckpointLoad(_))));
    }

    #[test]
    fn test_prefix_selects_section() {
        let dir = TempDir::new().unwrap();
        let weight = Tensor::ones((2, 3), DType::F32, &Device::Cpu).unwrap();
        let bias = Tensor::zeros(2, DType::F32, &Device::Cpu).unwrap();
        let other = Tensor::zeros(4, DType::F32, &Device::Cpu).unwrap();
        let path = save(
            &dir,
            "ema.safetensors",
            vec![
                ("g_ema.fc.weight", weight),
                ("g_ema.fc.bias", bias),
                ("d.fc.weight", other),
            ],
        );

        let checkpoint = Checkpoint::open(&path).unwrap();
        let (_, report) = load_network(
            &checkpoint,
            LoadPolicy::Strict,
            Some("g_ema."),
            &Device::Cpu,
            build_linear,
        )
        .unwrap();
        assert_eq!(report.loaded, 2);
    }

    #[test]
    fn test_half_precision_checkpoint_is_widened() {
        let dir = TempDir::new().unwrap();
        let values = [[1.5f32, -2.25, 3.0], [0.5, 4.0, -1.0]];
        let weight = Tensor::new(&values, &Device::Cpu).unwrap();
        let bias = Tensor::zeros(2, DType::F32, &Device::Cpu).unwrap();

        for dtype in [DType::F16, DType::BF16, DType::F64] {
            let path = save(
                &dir,
                &format!("fc_{dtype:?}.safetensors"),
                vec![
                    ("fc.weight", weight.to_dtype(dtype).unwrap()),
                    ("fc.bias", bias.to_dtype(dtype).unwrap()),
                ],
            );
            let checkpoint = Checkpoint::open(&path).unwrap();
            let (layer, report) =
                load_network(&checkpoint, LoadPolicy::Strict, None, &Device::Cpu, build_linear)
                    .unwrap();
            assert_eq!(report.loaded, 2);
            assert_eq!(layer.weight().dtype(), DType::F32);
            assert_eq!(
                layer.weight().to_vec2::<f32>().unwrap(),
                vec![vec![1.5, -2.25, 3.0], vec![0.5, 4.0, -1.0]],
                "{dtype:?}"
            );
        }
    }

    #[test]
    fn test_names_are_sorted() {
        let dir = TempDir::new().unwrap();
        let one = Tensor::ones(1, DType::F32, &Device::Cpu).unwrap();
        let path = save(&dir, "n.safetensors", vec![("b", one.clone()), ("a", one)]);
        assert_eq!(Checkpoint::open(&path).unwrap().names(), vec!["a", "b"]);
    }

    #[test]
    fn test_unreadable_checkpoint() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.safetensors");
        std::fs::write(&path, b"not a checkpoint").unwrap();

        assert!(matches!(
            Checkpoint::open(&path),
            Err(Error::CheckpointLoad(_))
        ));
        assert!(matches!(
            Checkpoint::open(dir.path().join("absent.safetensors")),
            Err(Error::CheckpointLoad(_))
        ));
    }
}
