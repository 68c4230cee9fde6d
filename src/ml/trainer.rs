// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch loop with early stopping and best-only checkpointing.
//
//   Training(e) → Validating(e) → CheckpointDecision(e)
//        ▲                                 │
//        └───────── e + 1 ─────────────────┤
//                                          ▼
//                                       Stopped
//
// Per epoch:
//   1. every train batch once: forward, scaled backward, step
//   2. every eval batch once on the gradient-free model
//   3. record → metrics.csv → scheduler.step() → compare score
//      improved  → checkpoint, reset stale counter
//      otherwise → stale += 1, stop once stale > patience
//
// `train_loop` only sees the traits from domain/traits.rs, so the
// same code runs with Burn in production and with scripted
// fakes in the tests below. `run_training` wires the Burn side.
//
// Key Burn insight:
//   - Training uses TrainBackend (Autodiff<Wgpu>) for gradients
//   - model.valid() returns the model on the inner backend (Wgpu)
//   - The eval loader must therefore batch on B::InnerBackend
//
// Reference: Burn Book §5, Prechelt (1998) Early Stopping

use std::sync::Arc;

use burn::backend::{wgpu::WgpuDevice, Autodiff, Wgpu};
use burn::tensor::backend::AutodiffBackend;
use indicatif::{ProgressBar, ProgressStyle};

use crate::application::train_use_case::TrainConfig;
use crate::data::dataset::VqaDataset;
use crate::data::loader::{BatchLoader, LoaderOptions};
use crate::domain::epoch::{EpochRecord, StopReason, TrainingReport};
use crate::domain::error::Result;
use crate::domain::training_state::{ImprovementMetric, TrainingState, Verdict};
use crate::domain::traits::{BatchSource, Checkpointer, FineTuneSession, LossEvaluator};
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::MetricsLogger;
use crate::ml::assembly::assemble;

pub type TrainBackend = Autodiff<Wgpu>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopOptions {
    pub max_epochs:         usize,
    pub patience:           usize,
    pub improvement_metric: ImprovementMetric,
    pub show_progress:      bool,
}

impl From<&TrainConfig> for LoopOptions {
    fn from(cfg: &TrainConfig) -> Self {
        Self {
            max_epochs:         cfg.epochs,
            patience:           cfg.patience,
            improvement_metric: cfg.improvement_metric,
            show_progress:      cfg.show_progress,
        }
    }
}

/// Train on the WGPU backend.
pub fn run_training(
    cfg:   &TrainConfig,
    train: Arc<VqaDataset>,
    val:   Arc<VqaDataset>,
) -> Result<TrainingReport> {
    let device = WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    run_training_on::<TrainBackend>(cfg, train, val, device)
}

/// Assemble the session, build both loaders and run the loop.
/// Weights, config.json, best_epoch.json and metrics.csv land in
/// `cfg.output_dir`.
pub fn run_training_on<B: AutodiffBackend>(
    cfg:    &TrainConfig,
    train:  Arc<VqaDataset>,
    val:    Arc<VqaDataset>,
    device: B::Device,
) -> Result<TrainingReport> {
    let mut session = assemble::<B>(cfg, &device)?;

    let mut output = CheckpointManager::new(&cfg.output_dir).with_metric(cfg.improvement_metric);
    output.save_model_config(session.config())?;

    let mut train_loader = BatchLoader::<B>::new(
        train,
        LoaderOptions { batch_size: cfg.batch_size, shuffle: true, seed: cfg.shuffle_seed },
        device.clone(),
    )?;
    let mut val_loader = BatchLoader::<B::InnerBackend>::new(
        val,
        LoaderOptions { batch_size: cfg.batch_size, shuffle: false, seed: cfg.shuffle_seed },
        device,
    )?;
    let metrics = MetricsLogger::create(&cfg.output_dir)?;
    tracing::info!("Per-epoch metrics -> '{}'", metrics.csv_path().display());

    let report = train_loop(
        &mut session,
        &mut train_loader,
        &mut val_loader,
        &mut output,
        Some(&metrics),
        &LoopOptions::from(cfg),
    )?;

    if session.skipped_steps() > 0 {
        tracing::warn!("{} optimizer steps skipped on non-finite gradients", session.skipped_steps());
    }
    Ok(report)
}

pub fn train_loop<S, T, V, C>(
    session:      &mut S,
    train:        &mut T,
    val:          &mut V,
    checkpointer: &mut C,
    metrics:      Option<&MetricsLogger>,
    opts:         &LoopOptions,
) -> Result<TrainingReport>
where
    S: FineTuneSession,
    T: BatchSource<Batch = S::TrainBatch>,
    V: BatchSource<Batch = S::EvalBatch>,
    C: Checkpointer<S>,
{
    let mut state       = TrainingState::new();
    let mut history     = Vec::with_capacity(opts.max_epochs);
    let mut checkpoints = Vec::new();
    let mut stop_reason = StopReason::EpochLimit;

    for epoch in 0..opts.max_epochs {
        let learning_rate = session.learning_rate();

        // ── Training phase ────────────────────────────────────────────────────
        let bar = progress_bar(train.num_batches(), opts.show_progress);
        bar.set_prefix(format!("epoch {epoch} train"));

        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;
        for batch in train.epoch() {
            train_loss_sum += session.train_batch(batch?)?;
            train_batches  += 1;
            bar.set_message(format!("{:.4}", train_loss_sum / train_batches as f64));
            bar.inc(1);
        }
        bar.finish_and_clear();

        // ── Validation phase ──────────────────────────────────────────────────
        let (eval_loss_sum, eval_batches) = evaluate_pass(&*session, val, opts.show_progress)?;

        // ── Checkpoint decision ───────────────────────────────────────────────
        let record = EpochRecord::new(
            epoch,
            mean(train_loss_sum, train_batches),
            mean(eval_loss_sum, eval_batches),
            eval_loss_sum,
            learning_rate,
        );
        tracing::info!(
            "Epoch {:>3}/{} | train_loss={:.4} | eval_loss={:.4} | eval_sum={:.4} | lr={:.3e}",
            epoch + 1, opts.max_epochs,
            record.train_loss, record.eval_loss, record.eval_loss_sum, record.learning_rate,
        );
        if let Some(logger) = metrics {
            logger.log(&record)?;
        }
        history.push(record.clone());

        session.step_scheduler();

        match state.observe(opts.improvement_metric.score(&record), opts.patience) {
            Verdict::Improved => {
                checkpointer.save_best(session, &record)?;
                checkpoints.push(epoch);
            }
            Verdict::Stale(n) => {
                tracing::info!("No improvement for {n} epoch(s), best {:.4}", state.best_score());
            }
            Verdict::Exhausted => {
                tracing::info!(
                    "Early stop after epoch {epoch}: {} epochs without improvement",
                    state.stale_epochs()
                );
                stop_reason = StopReason::PatienceExhausted { epoch };
                break;
            }
        }
    }

    tracing::info!("Training complete!");
    Ok(TrainingReport {
        history,
        best_score: state.best_score(),
        checkpoints,
        stop_reason,
    })
}

/// One gradient-free pass. Returns (loss sum, batch count).
pub fn evaluate_pass<E, V>(evaluator: &E, val: &mut V, show_progress: bool) -> Result<(f64, usize)>
where
    E: LossEvaluator + ?Sized,
    V: BatchSource<Batch = E::EvalBatch>,
{
    let bar = progress_bar(val.num_batches(), show_progress);
    bar.set_prefix("eval");

    let mut sum     = 0.0f64;
    let mut batches = 0usize;
    for batch in val.epoch() {
        sum     += evaluator.eval_batch(batch?)?;
        batches += 1;
        bar.inc(1);
    }
    bar.finish_and_clear();

    Ok((sum, batches))
}

fn mean(sum: f64, count: usize) -> f64 {
    if count > 0 { sum / count as f64 } else { f64::NAN }
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} loss: {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar
}
