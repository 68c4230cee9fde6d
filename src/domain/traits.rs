// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training loop is written against these traits only, so it
// never names a tensor backend. Implementations:
//
//   ExampleSource  → CsvExampleTable   (data/table.rs)
//   BatchSource    → BatchLoader       (data/loader.rs)
//   LossEvaluator  → BlipVqaModel      (ml/model.rs)
//   FineTuneSession→ BurnSession       (ml/session.rs)
//   Checkpointer   → CheckpointManager (infra/checkpoint.rs)
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::epoch::EpochRecord;
use crate::domain::error::Result;
use crate::domain::example::{Example, Split};

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Anything that can hand out the immutable rows of one split.
pub trait ExampleSource {
    fn examples(&self, split: Split) -> Result<Vec<Example>>;
}

// ─── BatchSource ──────────────────────────────────────────────────────────────
/// A finite, restartable sequence of batches. Each call to
/// `epoch` starts a fresh pass over every example exactly once.
pub trait BatchSource {
    type Batch;

    /// Number of batches one pass yields.
    fn num_batches(&self) -> usize;

    fn epoch(&mut self) -> Box<dyn Iterator<Item = Result<Self::Batch>> + '_>;
}

// ─── LossEvaluator ────────────────────────────────────────────────────────────
/// Computes a scalar loss for a batch without touching parameters.
pub trait LossEvaluator {
    type EvalBatch;

    fn eval_batch(&self, batch: Self::EvalBatch) -> Result<f64>;
}

// ─── FineTuneSession ──────────────────────────────────────────────────────────
/// Model + optimizer + scheduler + loss scaler, driven by the loop.
pub trait FineTuneSession: LossEvaluator {
    type TrainBatch;

    /// Forward, scaled backward, optimizer step and scaler update.
    /// Returns the unscaled loss of the batch.
    fn train_batch(&mut self, batch: Self::TrainBatch) -> Result<f64>;

    fn learning_rate(&self) -> f64;

    /// Advance the learning-rate schedule by one epoch.
    fn step_scheduler(&mut self);
}

// ─── Checkpointer ─────────────────────────────────────────────────────────────
/// Persists the full state of a session when an epoch improves.
pub trait Checkpointer<S> {
    fn save_best(&mut self, session: &S, record: &EpochRecord) -> Result<()>;
}
