// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands: `init`, `train` and `evaluate`.
//
// `train` reads its settings from the YAML config; the three
// flags --batch-size, --epochs and --patience override the file.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::evaluate_use_case::EvaluateConfig;
use crate::application::init_use_case::InitConfig;
use crate::application::train_use_case::{TrainConfig, DEFAULT_CONFIG_PATH};
use crate::domain::error::Result;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scaffold a base model directory (tokenizer, config, weights) from the dataset
    Init(InitArgs),

    /// Fine-tune with early stopping; the best epoch is kept in the output directory
    Train(TrainArgs),

    /// Report eval loss of a model directory on the val split
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// YAML run configuration
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Overrides BATCH_SIZE
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Overrides EPOCH
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Overrides patience
    #[arg(long)]
    pub patience: Option<usize>,
}

impl TrainArgs {
    /// Load the YAML file and apply the command-line overrides.
    pub fn resolve(&self) -> Result<TrainConfig> {
        let cfg = TrainConfig::from_yaml_file(&self.config)?;
        let cfg = self.apply_overrides(cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_overrides(&self, mut cfg: TrainConfig) -> TrainConfig {
        if let Some(batch_size) = self.batch_size {
            cfg.batch_size = batch_size;
        }
        if let Some(epochs) = self.epochs {
            cfg.epochs = epochs;
        }
        if let Some(patience) = self.patience {
            cfg.patience = patience;
        }
        cfg
    }
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// CSV with columns split,question,answer,image_path
    #[arg(long, default_value = "data/medical_vqa.csv")]
    pub dataset_file: PathBuf,

    /// Directory to create the base model in
    #[arg(long, default_value = "models/blip-vqa-base")]
    pub model_dir: PathBuf,

    /// Upper bound on the tokenizer vocabulary, specials included
    #[arg(long, default_value_t = 8192)]
    pub vocab_size: usize,

    #[arg(long, default_value_t = 224)]
    pub image_size: usize,

    /// Side of the square patches cut by the embedding convolution
    #[arg(long, default_value_t = 16)]
    pub patch_size: usize,

    #[arg(long, default_value_t = 32)]
    pub max_question_len: usize,

    /// Number of answer positions the decoder predicts
    #[arg(long, default_value_t = 8)]
    pub max_answer_len: usize,

    /// Hidden dimension shared by every encoder
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    /// d_model must be divisible by num_heads
    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 4)]
    pub vision_layers: usize,

    #[arg(long, default_value_t = 4)]
    pub text_layers: usize,

    #[arg(long, default_value_t = 2)]
    pub answer_layers: usize,

    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,
}

impl From<InitArgs> for InitConfig {
    fn from(a: InitArgs) -> Self {
        InitConfig {
            dataset_file:     a.dataset_file,
            model_dir:        a.model_dir,
            vocab_size:       a.vocab_size,
            image_size:       a.image_size,
            patch_size:       a.patch_size,
            max_question_len: a.max_question_len,
            max_answer_len:   a.max_answer_len,
            d_model:          a.d_model,
            num_heads:        a.num_heads,
            vision_layers:    a.vision_layers,
            text_layers:      a.text_layers,
            answer_layers:    a.answer_layers,
            d_ff:             a.d_ff,
            dropout:          a.dropout,
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Model directory holding config.json, tokenizer.json and weights
    #[arg(long, default_value = "models/medical_blip_vqa")]
    pub model_dir: PathBuf,

    #[arg(long, default_value = "data/medical_vqa.csv")]
    pub dataset_file: PathBuf,

    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    /// Hide the progress bar
    #[arg(long)]
    pub quiet: bool,
}

impl From<EvaluateArgs> for EvaluateConfig {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateConfig {
            model_dir:     a.model_dir,
            dataset_file:  a.dataset_file,
            batch_size:    a.batch_size,
            show_progress: !a.quiet,
        }
    }
}
