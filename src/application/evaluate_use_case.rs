// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Loads a model directory (pretrained or fine-tuned) and runs
// one gradient-free pass over the `val` split, reporting the
// same loss statistics the training loop records per epoch.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use burn::backend::{wgpu::WgpuDevice, Wgpu};
use burn::data::dataset::Dataset;
use burn::prelude::*;

use crate::data::{
    dataset::VqaDataset,
    loader::{BatchLoader, LoaderOptions},
    processor::VqaProcessor,
    table::CsvExampleTable,
};
use crate::domain::example::Split;
use crate::domain::traits::ExampleSource;
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::trainer::evaluate_pass;

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluateConfig {
    pub model_dir:     PathBuf,
    pub dataset_file:  PathBuf,
    pub batch_size:    usize,
    pub show_progress: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalSummary {
    pub examples:  usize,
    pub batches:   usize,
    pub loss_sum:  f64,
    pub loss_mean: f64,
}

pub struct EvaluateUseCase {
    config: EvaluateConfig,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EvalSummary> {
        let device = WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        self.execute_on::<Wgpu>(device)
    }

    pub fn execute_on<B: Backend>(&self, device: B::Device) -> Result<EvalSummary> {
        let cfg = &self.config;

        let manager = CheckpointManager::new(&cfg.model_dir);
        let model   = manager
            .load_model::<B>(&device)
            .with_context(|| format!("Cannot load model from '{}'", cfg.model_dir.display()))?;
        let model_cfg = manager.load_model_config()?;
        if let Ok(best) = manager.load_best_epoch() {
            tracing::info!(
                "Checkpoint from epoch {} (eval_loss={:.4}, score={:.4})",
                best.epoch, best.eval_loss, best.score
            );
        }
        let tokenizer = TokenizerStore::new(&cfg.model_dir).load()?;

        let examples  = CsvExampleTable::open(&cfg.dataset_file)?.examples(Split::Val)?;
        let processor = Arc::new(VqaProcessor::new(
            tokenizer,
            model_cfg.image_size,
            model_cfg.max_question_len,
            model_cfg.max_answer_len,
        ));
        let dataset   = Arc::new(VqaDataset::new(Split::Val, examples, processor));
        let examples  = dataset.len();

        let mut loader = BatchLoader::<B>::new(
            dataset,
            LoaderOptions { batch_size: cfg.batch_size, shuffle: false, seed: 0 },
            device,
        )?;
        let (loss_sum, batches) = evaluate_pass(&model, &mut loader, cfg.show_progress)?;
        let loss_mean = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };

        tracing::info!(
            "Evaluated {} examples in {} batches: eval_loss={:.4}, eval_sum={:.4}",
            examples, batches, loss_mean, loss_sum
        );
        Ok(EvalSummary { examples, batches, loss_sum, loss_mean })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::application::init_use_case::tests::{scaffold, write_dataset};

    #[test]
    fn test_evaluates_val_split_of_scaffolded_model() {
        let dir     = tempfile::tempdir().unwrap();
        let dataset = write_dataset(dir.path(), 4, 5);
        let base    = dir.path().join("base");
        scaffold(&dataset, &base);

        let summary = EvaluateUseCase::new(EvaluateConfig {
            model_dir:     base,
            dataset_file:  dataset,
            batch_size:    2,
            show_progress: false,
        })
        .execute_on::<NdArray>(Default::default())
        .unwrap();

        assert_eq!(summary.examples, 5);
        assert_eq!(summary.batches, 3);
        assert!(summary.loss_sum.is_finite());
        assert!((summary.loss_mean - summary.loss_sum / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_model_directory_fails() {
        let dir     = tempfile::tempdir().unwrap();
        let dataset = write_dataset(dir.path(), 1, 1);

        let result = EvaluateUseCase::new(EvaluateConfig {
            model_dir:     dir.path().join("absent"),
            dataset_file:  dataset,
            batch_size:    2,
            show_progress: false,
        })
        .execute_on::<NdArray>(Default::default());
        assert!(result.is_err());
    }
}
