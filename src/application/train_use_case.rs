// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates one fine-tuning run in order:
//
//   Step 1: Read the dataset table           (Layer 4 - data)
//   Step 2: Read the pretrained config       (Layer 6 - infra)
//   Step 3: Load + copy the tokenizer        (Layer 6 - infra)
//   Step 4: Build the per-split datasets     (Layer 4 - data)
//   Step 5: Assemble and run the loop        (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::data::{dataset::VqaDataset, processor::VqaProcessor, table::CsvExampleTable};
use crate::domain::epoch::TrainingReport;
use crate::domain::error::VqaError;
use crate::domain::example::Split;
use crate::domain::training_state::ImprovementMetric;
use crate::domain::traits::ExampleSource;
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::trainer::{run_training, run_training_on};

pub const DEFAULT_CONFIG_PATH: &str = "configs/medical_data_preprocess.yml";

// ─── Training Configuration ──────────────────────────────────────────────────
// Read from YAML. `BATCH_SIZE` and `EPOCH` keep their upper-case
// keys; every other key is snake_case and optional. Unknown keys
// are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainConfig {
    #[serde(rename = "BATCH_SIZE")]
    pub batch_size:           usize,
    #[serde(rename = "EPOCH")]
    pub epochs:               usize,
    pub patience:             usize,
    pub dataset_file:         PathBuf,
    pub pretrained_dir:       PathBuf,
    pub patch_embedding_file: Option<PathBuf>,
    pub patch_weight_key:     String,
    pub patch_bias_key:       String,
    pub output_dir:           PathBuf,
    pub learning_rate:        f64,
    pub lr_decay:             f64,
    pub weight_decay:         f64,
    pub max_answer_len:       usize,
    pub improvement_metric:   ImprovementMetric,
    pub shuffle_seed:         u64,
    pub mixed_precision:      bool,
    pub show_progress:        bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            batch_size:           8,
            epochs:               50,
            patience:             10,
            dataset_file:         PathBuf::from("data/medical_vqa.csv"),
            pretrained_dir:       PathBuf::from("models/blip-vqa-base"),
            patch_embedding_file: None,
            patch_weight_key:     "encoder.conv1.weight".to_string(),
            patch_bias_key:       "encoder.conv1.bias".to_string(),
            output_dir:           PathBuf::from("models/medical_blip_vqa"),
            learning_rate:        4e-5,
            lr_decay:             0.9,
            weight_decay:         0.01,
            max_answer_len:       8,
            improvement_metric:   ImprovementMetric::Sum,
            shuffle_seed:         42,
            mixed_precision:      true,
            show_progress:        true,
        }
    }
}

impl TrainConfig {
    /// Parse a YAML run config. Missing keys take their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> crate::domain::error::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VqaError::ConfigurationMissing { path: path.to_path_buf() });
        }
        let text = fs::read_to_string(path)?;
        let cfg: Self = serde_yaml::from_str(&text).map_err(|source| VqaError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> crate::domain::error::Result<()> {
        let invalid = |msg: &str| Err(VqaError::InvalidConfig(msg.to_string()));
        if self.batch_size == 0 {
            return invalid("BATCH_SIZE must be greater than 0");
        }
        if self.epochs == 0 {
            return invalid("EPOCH must be at least 1");
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid("learning_rate must be a positive number");
        }
        if !(self.lr_decay > 0.0 && self.lr_decay <= 1.0) {
            return invalid("lr_decay must lie in (0, 1]");
        }
        if !(self.weight_decay >= 0.0) {
            return invalid("weight_decay must not be negative");
        }
        if self.max_answer_len == 0 {
            return invalid("max_answer_len must be greater than 0");
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run on the WGPU backend.
    pub fn execute(&self) -> Result<TrainingReport> {
        let (train, val) = self.prepare()?;
        run_training(&self.config, train, val).context("Training run failed")
    }

    /// Run on any autodiff backend.
    pub fn execute_on<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainingReport> {
        let (train, val) = self.prepare()?;
        run_training_on::<B>(&self.config, train, val, device).context("Training run failed")
    }

    /// Steps 1-4: everything up to the point where tensors appear.
    fn prepare(&self) -> Result<(Arc<VqaDataset>, Arc<VqaDataset>)> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: Dataset table ─────────────────────────────────────────────
        tracing::info!("Reading dataset table '{}'", cfg.dataset_file.display());
        let table          = CsvExampleTable::open(&cfg.dataset_file)?;
        let train_examples = table.examples(Split::Train)?;
        let val_examples   = table.examples(Split::Val)?;
        tracing::info!(
            "Split: {} train, {} validation",
            train_examples.len(),
            val_examples.len()
        );

        // ── Step 2: Pretrained architecture ───────────────────────────────────
        let model_cfg = CheckpointManager::new(&cfg.pretrained_dir)
            .load_model_config()
            .with_context(|| {
                format!("Cannot read the pretrained model in '{}'", cfg.pretrained_dir.display())
            })?;
        // The answer decoder has one query per answer position.
        if model_cfg.max_answer_len != cfg.max_answer_len {
            return Err(VqaError::InvalidConfig(format!(
                "max_answer_len {} does not match the pretrained decoder's {}",
                cfg.max_answer_len, model_cfg.max_answer_len
            ))
            .into());
        }

        // ── Step 3: Tokenizer ─────────────────────────────────────────────────
        // The output directory must be loadable on its own, so the
        // tokenizer travels with the fine-tuned weights.
        let store     = TokenizerStore::new(&cfg.pretrained_dir);
        let tokenizer = store.load()?;
        if tokenizer.get_vocab_size(true) > model_cfg.vocab_size {
            return Err(VqaError::InvalidConfig(format!(
                "tokenizer has {} tokens but the model only embeds {}",
                tokenizer.get_vocab_size(true),
                model_cfg.vocab_size
            ))
            .into());
        }
        store.copy_to(&cfg.output_dir)?;

        // ── Step 4: Per-split datasets ────────────────────────────────────────
        let processor = Arc::new(VqaProcessor::new(
            tokenizer,
            model_cfg.image_size,
            model_cfg.max_question_len,
            model_cfg.max_answer_len,
        ));
        let train = Arc::new(VqaDataset::new(Split::Train, train_examples, Arc::clone(&processor)));
        let val   = Arc::new(VqaDataset::new(Split::Val, val_examples, processor));

        Ok((train, val))
    }
}
