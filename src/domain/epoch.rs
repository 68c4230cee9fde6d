// ============================================================
// Layer 3 — Epoch Records
// ============================================================
// An EpochRecord is appended once per completed epoch and never
// changed afterwards. The ordered list of records plus the stop
// reason forms the TrainingReport returned by the loop.

use serde::{Deserialize, Serialize};

/// What one completed epoch produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// Zero-based epoch index
    pub epoch: usize,

    /// Train loss sum divided by the number of train batches
    pub train_loss: f64,

    /// Eval loss sum divided by the number of eval batches
    pub eval_loss: f64,

    /// Raw eval loss sum, the default improvement score
    pub eval_loss_sum: f64,

    /// Learning rate in effect during this epoch
    pub learning_rate: f64,
}

impl EpochRecord {
    pub fn new(
        epoch:         usize,
        train_loss:    f64,
        eval_loss:     f64,
        eval_loss_sum: f64,
        learning_rate: f64,
    ) -> Self {
        Self { epoch, train_loss, eval_loss, eval_loss_sum, learning_rate }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The configured maximum number of epochs ran
    EpochLimit,

    /// The stale-epoch counter exceeded the patience after this epoch
    PatienceExhausted { epoch: usize },
}

/// Summary of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub history:      Vec<EpochRecord>,
    pub best_score:   f64,
    pub checkpoints:  Vec<usize>,
    pub stop_reason:  StopReason,
}

impl TrainingReport {
    pub fn epochs_run(&self) -> usize {
        self.history.len()
    }

    /// Epoch whose weights are currently on disk, if any improved.
    pub fn best_epoch(&self) -> Option<usize> {
        self.checkpoints.last().copied()
    }
}
