//! Compact reference networks for each supported generator family
//!
//! Each network registers its parameters through a `VarBuilder`, so the
//! parameter names double as the checkpoint keys the factory matches.

mod biggan;
mod layers;
mod proggan;
mod sngan;
#[cfg(feature = "stylegan2")]
mod stylegan2;
mod trunk;

pub use biggan::BigGanNet;
pub use proggan::ProgGanNet;
pub use sngan::SnGanNet;
#[cfg(feature = "stylegan2")]
pub use stylegan2::StyleGanNet;
pub use trunk::{TrunkActivation, TrunkConfig, UpsampleTrunk};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BigGanArch, NormStyle, ProgGanArch, SnGanArch};
    use crate::generator::{ClassConditionalGenerator, NoiseGenerator};
    use candle_core::{DType, Device, Tensor};
    use candle_nn::{VarBuilder, VarMap};

    fn tiny_big_gan(spectral_norm: bool) -> BigGanArch {
        BigGanArch {
            ch: 4,
            dim_z: 8,
            shared_dim: 4,
            n_classes: 5,
            resolution: 16,
            attention: vec![16],
            norm: NormStyle::BatchNorm,
            spectral_norm,
            bn_eps: 1e-4,
            sn_eps: 1e-4,
        }
    }

    fn names(varmap: &VarMap) -> Vec<String> {
        let mut names: Vec<String> = varmap.data().lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    #[test]
    fn test_big_gan_parameter_names() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        BigGanNet::new(&tiny_big_gan(true), vb).unwrap();
        let found = names(&varmap);
        for expected in [
            "shared.weight",
            "linear.weight",
            "linear.sv0",
            "blocks.0.conv.weight",
            "blocks.0.bn.running_mean",
            "blocks.1.attn.gamma",
            "to_rgb.sv0",
        ] {
            assert!(found.iter().any(|n| n == expected), "missing {expected}");
        }

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        BigGanNet::new(&tiny_big_gan(false), vb).unwrap();
        assert!(!names(&varmap).iter().any(|n| n.ends_with("sv0")));
    }

    #[test]
    fn test_big_gan_output_and_vocabulary() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let net = BigGanNet::new(&tiny_big_gan(true), vb).unwrap();

        let z = Tensor::zeros((2, 8), DType::F32, &Device::Cpu).unwrap();
        let labels = Tensor::new(&[0u32, 4], &Device::Cpu).unwrap();
        let embedding = net.embed_classes(&labels).unwrap();
        assert_eq!(embedding.dims(), &[2, 4]);
        assert_eq!(net.forward(&z, &embedding).unwrap().dims(), &[2, 3, 16, 16]);

        let labels = Tensor::new(&[5u32], &Device::Cpu).unwrap();
        assert!(matches!(
            net.embed_classes(&labels),
            Err(crate::Error::InvalidClass {
                class: 5,
                num_classes: 5
            })
        ));
    }

    #[test]
    fn test_noise_generators_reach_declared_resolution() {
        let device = Device::Cpu;

        let varmap = VarMap::new();
        let prog = ProgGanNet::new(
            &ProgGanArch {
                resolution: 16,
                latent_size: 8,
                fmap_base: 32,
                fmap_max: 8,
            },
            VarBuilder::from_varmap(&varmap, DType::F32, &device),
        )
        .unwrap();
        let z = prog.dim_z().zeros(1, &device).unwrap();
        assert_eq!(prog.forward(&z).unwrap().dims(), &[1, 3, 16, 16]);

        let varmap = VarMap::new();
        let sn = SnGanNet::new(
            &SnGanArch {
                dim_z: 8,
                resolution: 8,
                ch: 16,
            },
            VarBuilder::from_varmap(&varmap, DType::F32, &device),
        )
        .unwrap();
        let z = sn.dim_z().zeros(3, &device).unwrap();
        assert_eq!(sn.forward(&z).unwrap().dims(), &[3, 3, 8, 8]);
    }

    #[cfg(feature = "stylegan2")]
    #[test]
    fn test_style_net_entry_points_agree() {
        use crate::config::StyleGanArch;
        use crate::generator::StyleGenerator;

        let varmap = VarMap::new();
        let arch = StyleGanArch {
            size: 16,
            style_dim: 8,
            n_mlp: 2,
            channel_multiplier: 1,
            max_channels: 8,
        };
        let net = StyleGanNet::new(
            &arch,
            VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu),
        )
        .unwrap();
        let z = Tensor::ones((2, 8), DType::F32, &Device::Cpu).unwrap();
        let w = net.to_intermediate(&z).unwrap();
        let from_z = net.forward(&z, false).unwrap();
        let from_w = net.forward(&w, true).unwrap();
        assert_eq!(from_z.dims(), &[2, 3, 16, 16]);
        let diff = (from_z - from_w)
            .unwrap()
            .abs()
            .unwrap()
            .sum_all()
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert_eq!(diff, 0.0);
    }
}
