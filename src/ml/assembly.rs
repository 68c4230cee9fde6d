// ============================================================
// Layer 5 — Model Assembly
// ============================================================
// Turns a run configuration into a ready BurnSession:
//
//   (a) load the pretrained directory (config.json + weights)
//   (b) optionally graft an external patch-embedding kernel and
//       bias into the vision encoder's Conv2d
//   (c) AdamW over every parameter
//   (d) ExponentialDecay(lr, lr_decay)
//   (e) LossScaler (enabled by `mixed_precision`)
//
// Either the whole session is returned or an error is; nothing
// partially built escapes.
//
// Reference: Burn Book §5 (Optimizers)
//            Loshchilov & Hutter (2019) AdamW

use burn::{
    module::Param,
    optim::{AdamWConfig, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::error::{Result, VqaError};
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::weights::{NamedTensor, PatchEmbeddingWeights};
use crate::ml::model::BlipVqaModel;
use crate::ml::scaler::LossScaler;
use crate::ml::schedule::ExponentialDecay;
use crate::ml::session::BurnSession;

pub fn assemble<B: AutodiffBackend>(
    cfg:    &TrainConfig,
    device: &B::Device,
) -> Result<BurnSession<B, impl Optimizer<BlipVqaModel<B>, B>>> {
    // ── (a) Pretrained weights ────────────────────────────────────────────────
    let pretrained = CheckpointManager::new(&cfg.pretrained_dir);
    let config    = pretrained.load_model_config()?;
    let mut model = pretrained.load_model::<B>(device)?;
    tracing::info!(
        "Pretrained model ready: d_model={}, vocab={}, {} patches",
        config.d_model, config.vocab_size, config.num_patches()
    );

    // ── (b) Patch-embedding graft ─────────────────────────────────────────────
    if let Some(file) = &cfg.patch_embedding_file {
        let weights = PatchEmbeddingWeights::load(file, &cfg.patch_weight_key, &cfg.patch_bias_key)?;
        model = graft_patch_embedding(model, &weights, device)?;
        tracing::info!("Grafted patch embedding from '{}'", file.display());
    }

    // ── (c) AdamW ─────────────────────────────────────────────────────────────
    let optimizer = AdamWConfig::new()
        .with_weight_decay(cfg.weight_decay as f32)
        .with_epsilon(1e-8)
        .init::<B, BlipVqaModel<B>>();

    // ── (d) + (e) Scheduler and loss scaler ───────────────────────────────────
    let scheduler = ExponentialDecay::new(cfg.learning_rate, cfg.lr_decay);
    let scaler    = LossScaler::new(cfg.mixed_precision);
    tracing::info!(
        "lr={:e} decay={} weight_decay={} loss_scaling={}",
        cfg.learning_rate, cfg.lr_decay, cfg.weight_decay, scaler.is_enabled()
    );

    Ok(BurnSession::new(model, config, optimizer, scheduler, scaler))
}

/// Overwrite the patch-embedding Conv2d kernel and bias in place.
pub fn graft_patch_embedding<B: Backend>(
    mut model: BlipVqaModel<B>,
    weights:   &PatchEmbeddingWeights,
    device:    &B::Device,
) -> Result<BlipVqaModel<B>> {
    let conv = &mut model.vision.patch_embedding.conv;

    let [out_ch, in_ch, kh, kw] = conv.weight.val().dims();
    check_shape(&weights.weight, &[out_ch, in_ch, kh, kw])?;
    check_shape(&weights.bias, &[out_ch])?;

    let kernel = Tensor::<B, 1>::from_floats(weights.weight.values.as_slice(), device)
        .reshape([out_ch, in_ch, kh, kw]);
    let bias   = Tensor::<B, 1>::from_floats(weights.bias.values.as_slice(), device);

    conv.weight = Param::from_tensor(kernel.require_grad());
    conv.bias   = Some(Param::from_tensor(bias.require_grad()));
    Ok(model)
}

fn check_shape(tensor: &NamedTensor, expected: &[usize]) -> Result<()> {
    if tensor.shape != expected || tensor.values.len() != expected.iter().product::<usize>() {
        return Err(VqaError::ShapeMismatch {
            tensor:   tensor.name.clone(),
            expected: expected.to_vec(),
            found:    tensor.shape.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    use crate::infra::weights::tests::write_safetensors;
    use crate::ml::model::tests::tiny_config;

    const W: &str = "encoder.conv1.weight";
    const B_: &str = "encoder.conv1.bias";

    fn patch(shape: Vec<usize>, value: f32) -> NamedTensor {
        let n = shape.iter().product();
        NamedTensor { name: W.into(), shape, values: vec![value; n] }
    }

    fn bias(len: usize) -> NamedTensor {
        NamedTensor { name: B_.into(), shape: vec![len], values: vec![0.25; len] }
    }

    #[test]
    fn test_graft_replaces_kernel_and_bias() {
        let device  = Default::default();
        let model   = tiny_config().init::<NdArray>(&device);
        let weights = PatchEmbeddingWeights { weight: patch(vec![8, 3, 4, 4], 0.5), bias: bias(8) };

        let model = graft_patch_embedding(model, &weights, &device).unwrap();
        let conv  = &model.vision.patch_embedding.conv;

        let kernel: Vec<f32> = conv.weight.val().into_data().to_vec().unwrap();
        assert!(kernel.iter().all(|&v| v == 0.5));
        let b: Vec<f32> = conv.bias.as_ref().unwrap().val().into_data().to_vec().unwrap();
        assert_eq!(b, vec![0.25; 8]);
    }

    #[test]
    fn test_graft_rejects_wrong_kernel_shape() {
        let device  = Default::default();
        let model   = tiny_config().init::<NdArray>(&device);
        let weights = PatchEmbeddingWeights { weight: patch(vec![8, 3, 2, 2], 0.5), bias: bias(8) };

        let err = graft_patch_embedding(model, &weights, &device).err().unwrap();
        match err {
            VqaError::ShapeMismatch { tensor, expected, found } => {
                assert_eq!(tensor, W);
                assert_eq!(expected, vec![8, 3, 4, 4]);
                assert_eq!(found, vec![8, 3, 2, 2]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_graft_rejects_wrong_bias_length() {
        let device  = Default::default();
        let model   = tiny_config().init::<NdArray>(&device);
        let weights = PatchEmbeddingWeights { weight: patch(vec![8, 3, 4, 4], 0.5), bias: bias(4) };

        let err = graft_patch_embedding(model, &weights, &device).err().unwrap();
        assert!(matches!(err, VqaError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_assemble_from_pretrained_directory_with_graft() {
        let dir        = tempfile::tempdir().unwrap();
        let pretrained = dir.path().join("base");
        let device     = Default::default();

        let manager = CheckpointManager::new(&pretrained);
        manager.save_model_config(&tiny_config()).unwrap();
        manager.save_model_atomically(&tiny_config().init::<NdArray>(&device)).unwrap();

        let graft = dir.path().join("patch.safetensors");
        write_safetensors(&graft, &[
            (W,  vec![8, 3, 4, 4], vec![0.1; 8 * 3 * 4 * 4]),
            (B_, vec![8],          vec![0.0; 8]),
        ]);

        let cfg = TrainConfig {
            pretrained_dir:       pretrained,
            patch_embedding_file: Some(graft),
            learning_rate:        1e-3,
            ..TrainConfig::default()
        };
        let session = assemble::<Autodiff<NdArray>>(&cfg, &device).unwrap();

        assert_eq!(session.config().d_model, 8);
        assert!((crate::domain::traits::FineTuneSession::learning_rate(&session) - 1e-3).abs() < 1e-15);
        let kernel: Vec<f32> = session.model().vision.patch_embedding.conv.weight.val()
            .into_data().to_vec().unwrap();
        assert!(kernel.iter().all(|&v| (v - 0.1).abs() < 1e-6));
    }

    #[test]
    fn test_assemble_without_pretrained_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { pretrained_dir: dir.path().join("absent"), ..TrainConfig::default() };

        let err = assemble::<Autodiff<NdArray>>(&cfg, &Default::default()).err().unwrap();
        assert!(matches!(err, VqaError::ConfigurationMissing { .. }));
    }
}
