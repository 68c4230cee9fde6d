// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to its
// use case in Layer 2:
//
//   1. `init`     — scaffold a base model directory
//   2. `train`    — fine-tune from the YAML configuration
//   3. `evaluate` — eval loss of a model directory
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, InitArgs, TrainArgs};

use crate::domain::epoch::StopReason;

#[derive(Parser, Debug)]
#[command(
    name = "medvqa-finetune",
    version,
    about = "Fine-tune a BLIP-style VQA model on medical images with a grafted patch embedding."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the use case for the chosen subcommand.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Init(args)     => run_init(args),
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_init(args: InitArgs) -> Result<()> {
    use crate::application::init_use_case::InitUseCase;

    let model_dir = args.model_dir.clone();
    let cfg       = InitUseCase::new(args.into()).execute()?;
    println!(
        "Base model written to '{}' (vocab {}, {} patches).",
        model_dir.display(),
        cfg.vocab_size,
        cfg.num_patches()
    );
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let cfg = args.resolve()?;
    tracing::info!(
        "Fine-tuning '{}' on '{}' (BATCH_SIZE={}, EPOCH={}, patience={})",
        cfg.pretrained_dir.display(),
        cfg.dataset_file.display(),
        cfg.batch_size,
        cfg.epochs,
        cfg.patience,
    );

    let output = cfg.output_dir.clone();
    let report = TrainUseCase::new(cfg).execute()?;

    match report.stop_reason {
        StopReason::EpochLimit => println!("Training complete after {} epochs.", report.epochs_run()),
        StopReason::PatienceExhausted { epoch } => {
            println!("Early stop after epoch {epoch} ({} epochs run).", report.epochs_run())
        }
    }
    match report.best_epoch() {
        Some(epoch) => println!(
            "Best epoch {epoch} (score {:.4}) saved to '{}'.",
            report.best_score,
            output.display()
        ),
        None => println!("No epoch produced a finite eval loss; nothing was saved."),
    }
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let summary = EvaluateUseCase::new(args.into()).execute()?;
    println!(
        "val: {} examples, {} batches | eval_loss={:.4} | eval_sum={:.4}",
        summary.examples, summary.batches, summary.loss_mean, summary.loss_sum
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::application::train_use_case::TrainConfig;

    #[test]
    fn test_train_flags_override_yaml() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yml");
        fs::write(&path, "BATCH_SIZE: 16\nEPOCH: 20\npatience: 4\n").unwrap();

        let cli = Cli::try_parse_from([
            "medvqa-finetune", "train",
            "--config", path.to_str().unwrap(),
            "--epochs", "3",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };

        let cfg = args.resolve().unwrap();
        assert_eq!(cfg.batch_size, 16);
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.patience, 4);
    }

    #[test]
    fn test_zero_batch_size_override_is_rejected() {
        let args = TrainArgs {
            config:     "unused.yml".into(),
            batch_size: Some(0),
            epochs:     None,
            patience:   None,
        };
        let cfg = args.apply_overrides(TrainConfig::default());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_evaluate_defaults() {
        let cli = Cli::try_parse_from(["medvqa-finetune", "evaluate", "--quiet"]).unwrap();
        let Commands::Evaluate(args) = cli.command else { panic!("expected evaluate") };
        assert_eq!(args.batch_size, 8);
        assert!(args.quiet);
    }
}
