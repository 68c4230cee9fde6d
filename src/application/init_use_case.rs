// ============================================================
// Layer 2 — InitUseCase
// ============================================================
// Scaffolds a base model directory that `train` can start from
// when no pretrained checkpoint is at hand:
//
//   Step 1: Read the train split           (Layer 4 - data)
//   Step 2: Build a word-level tokenizer   (Layer 6 - infra)
//   Step 3: Size the architecture to it    (Layer 5 - ml)
//   Step 4: Save config.json + weights     (Layer 6 - infra)
//
// Weights are freshly initialised on the CPU backend.

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::backend::NdArray;

use crate::data::table::CsvExampleTable;
use crate::domain::example::Split;
use crate::domain::traits::ExampleSource;
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::model::BlipVqaConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct InitConfig {
    pub dataset_file:     PathBuf,
    pub model_dir:        PathBuf,
    pub vocab_size:       usize,
    pub image_size:       usize,
    pub patch_size:       usize,
    pub max_question_len: usize,
    pub max_answer_len:   usize,
    pub d_model:          usize,
    pub num_heads:        usize,
    pub vision_layers:    usize,
    pub text_layers:      usize,
    pub answer_layers:    usize,
    pub d_ff:             usize,
    pub dropout:          f64,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            dataset_file:     PathBuf::from("data/medical_vqa.csv"),
            model_dir:        PathBuf::from("models/blip-vqa-base"),
            vocab_size:       8192,
            image_size:       224,
            patch_size:       16,
            max_question_len: 32,
            max_answer_len:   8,
            d_model:          256,
            num_heads:        8,
            vision_layers:    4,
            text_layers:      4,
            answer_layers:    2,
            d_ff:             1024,
            dropout:          0.1,
        }
    }
}

pub struct InitUseCase {
    config: InitConfig,
}

impl InitUseCase {
    pub fn new(config: InitConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<BlipVqaConfig> {
        let cfg = &self.config;
        if cfg.patch_size == 0 || cfg.image_size % cfg.patch_size != 0 {
            anyhow::bail!(
                "image_size {} must be a multiple of patch_size {}",
                cfg.image_size,
                cfg.patch_size
            );
        }
        if cfg.num_heads == 0 || cfg.d_model % cfg.num_heads != 0 {
            anyhow::bail!(
                "d_model {} must be a multiple of num_heads {}",
                cfg.d_model,
                cfg.num_heads
            );
        }

        // ── Step 1: Train split text ──────────────────────────────────────────
        let table    = CsvExampleTable::open(&cfg.dataset_file)?;
        let examples = table.examples(Split::Train)?;
        let texts: Vec<String> = examples
            .iter()
            .flat_map(|e| [e.question.clone(), e.answer.clone()])
            .collect();
        tracing::info!("Building vocabulary from {} train examples", examples.len());

        // ── Step 2: Tokenizer ─────────────────────────────────────────────────
        let tokenizer = TokenizerStore::new(&cfg.model_dir)
            .build_and_save(&texts, cfg.vocab_size)
            .context("Cannot build tokenizer")?;
        let pad_token_id = tokenizer.token_to_id("[PAD]").unwrap_or(0) as usize;

        // ── Step 3: Architecture ──────────────────────────────────────────────
        let model_cfg = BlipVqaConfig::new(tokenizer.get_vocab_size(true))
            .with_image_size(cfg.image_size)
            .with_patch_size(cfg.patch_size)
            .with_max_question_len(cfg.max_question_len)
            .with_max_answer_len(cfg.max_answer_len)
            .with_d_model(cfg.d_model)
            .with_num_heads(cfg.num_heads)
            .with_vision_layers(cfg.vision_layers)
            .with_text_layers(cfg.text_layers)
            .with_answer_layers(cfg.answer_layers)
            .with_d_ff(cfg.d_ff)
            .with_dropout(cfg.dropout)
            .with_pad_token_id(pad_token_id);

        // ── Step 4: Persist ───────────────────────────────────────────────────
        let manager = CheckpointManager::new(&cfg.model_dir);
        manager.save_model_config(&model_cfg)?;
        let model = model_cfg.init::<NdArray>(&Default::default());
        manager.save_model_atomically(&model)?;

        tracing::info!(
            "Base model scaffolded in '{}': vocab={}, d_model={}",
            cfg.model_dir.display(),
            model_cfg.vocab_size,
            model_cfg.d_model
        );
        Ok(model_cfg)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use crate::data::processor::tests::write_png;
    use crate::infra::tokenizer_store::TOKENIZER_FILE;

    /// Write `n_train` + `n_val` rows and their images under `dir`.
    pub(crate) fn write_dataset(dir: &Path, n_train: usize, n_val: usize) -> PathBuf {
        let images = dir.join("images");
        fs::create_dir_all(&images).unwrap();

        let mut csv = String::from("split,question,answer,image_path\n");
        for (split, n) in [("train", n_train), ("val", n_val)] {
            for i in 0..n {
                let path = images.join(format!("{split}_{i}.png"));
                write_png(&path, 10, [(i * 30) as u8, 64, 128]);
                let answer = if i % 2 == 0 { "yes" } else { "no" };
                csv.push_str(&format!(
                    "{split},is there a fracture in the left femur,{answer},{}\n",
                    path.display()
                ));
            }
        }
        csv.push_str("test,is the liver enlarged,no,missing.png\n");

        let file = dir.join("dataset.csv");
        fs::write(&file, csv).unwrap();
        file
    }

    pub(crate) fn tiny_init(dataset: &Path, model_dir: &Path) -> InitConfig {
        InitConfig {
            dataset_file:     dataset.to_path_buf(),
            model_dir:        model_dir.to_path_buf(),
            vocab_size:       64,
            image_size:       8,
            patch_size:       4,
            max_question_len: 10,
            max_answer_len:   3,
            d_model:          8,
            num_heads:        2,
            vision_layers:    1,
            text_layers:      1,
            answer_layers:    1,
            d_ff:             16,
            dropout:          0.0,
        }
    }

    /// Scaffold a tiny base model directory from `dataset`.
    pub(crate) fn scaffold(dataset: &Path, model_dir: &Path) -> BlipVqaConfig {
        InitUseCase::new(tiny_init(dataset, model_dir)).execute().unwrap()
    }

    #[test]
    fn test_init_writes_loadable_model_directory() {
        let dir     = tempfile::tempdir().unwrap();
        let dataset = write_dataset(dir.path(), 4, 2);
        let base    = dir.path().join("base");

        let cfg = scaffold(&dataset, &base);
        // 5 specials + is there a fracture in the left femur yes no
        assert_eq!(cfg.vocab_size, 15);
        assert_eq!(cfg.pad_token_id, 0);
        assert!(base.join(TOKENIZER_FILE).exists());

        let manager = CheckpointManager::new(&base);
        assert_eq!(manager.load_model_config().unwrap(), cfg);
        assert!(manager.load_model::<NdArray>(&Default::default()).is_ok());
    }

    #[test]
    fn test_patch_size_must_divide_image_size() {
        let dir     = tempfile::tempdir().unwrap();
        let dataset = write_dataset(dir.path(), 2, 1);
        let config  = InitConfig { patch_size: 3, ..tiny_init(&dataset, &dir.path().join("base")) };

        assert!(InitUseCase::new(config).execute().is_err());
    }

    #[test]
    fn test_num_heads_must_divide_d_model() {
        let dir     = tempfile::tempdir().unwrap();
        let dataset = write_dataset(dir.path(), 2, 1);
        let base    = dir.path().join("base");
        let config  = InitConfig { num_heads: 3, ..tiny_init(&dataset, &base) };

        assert!(InitUseCase::new(config).execute().is_err());
        assert!(!base.join("config.json").exists());
    }
}
