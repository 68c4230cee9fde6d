// ============================================================
// Layer 3 — Early-Stopping State
// ============================================================
// Tracks the best improvement score seen so far and how many
// epochs in a row failed to beat it. Mutated once per epoch by
// the training loop, which owns it exclusively.
//
// Reference: Prechelt (1998) Early Stopping — But When?

use serde::{Deserialize, Serialize};

use crate::domain::epoch::EpochRecord;

/// Which eval statistic is compared across epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImprovementMetric {
    /// Accumulated eval loss over all eval batches
    #[default]
    Sum,

    /// Eval loss sum divided by the number of eval batches
    Mean,
}

impl ImprovementMetric {
    pub fn score(self, record: &EpochRecord) -> f64 {
        match self {
            ImprovementMetric::Sum  => record.eval_loss_sum,
            ImprovementMetric::Mean => record.eval_loss,
        }
    }
}

/// Outcome of observing one epoch's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Strictly better than every prior epoch — checkpoint now
    Improved,

    /// Not better; carries the updated stale-epoch count
    Stale(usize),

    /// Not better and the stale count now exceeds the patience
    Exhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingState {
    best_score:   f64,
    stale_epochs: usize,
}

impl TrainingState {
    pub fn new() -> Self {
        Self { best_score: f64::INFINITY, stale_epochs: 0 }
    }

    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    pub fn stale_epochs(&self) -> usize {
        self.stale_epochs
    }

    /// Record one epoch's score. Equal scores do not count as
    /// improvement; a NaN score is always stale.
    pub fn observe(&mut self, score: f64, patience: usize) -> Verdict {
        if score < self.best_score {
            self.best_score   = score;
            self.stale_epochs = 0;
            return Verdict::Improved;
        }

        self.stale_epochs += 1;
        if self.stale_epochs > patience {
            Verdict::Exhausted
        } else {
            Verdict::Stale(self.stale_epochs)
        }
    }
}

impl Default for TrainingState {
    fn default() -> Self {
        Self::new()
    }
}
