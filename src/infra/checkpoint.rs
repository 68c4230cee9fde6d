// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores a model directory using Burn's
// CompactRecorder. The same layout is used for the pretrained
// input and for the fine-tuned output:
//
//   <dir>/
//     config.json       ← BlipVqaConfig (architecture)
//     tokenizer.json    ← copied from the pretrained directory
//     model.mpk         ← weights of the best epoch so far
//     best_epoch.json   ← epoch + scores of those weights
//     metrics.csv       ← one row per epoch (infra/metrics.rs)
//
// Weights are overwritten on every improving epoch. Writes go to
// a staging file first and are renamed into place, so a crash
// mid-save never leaves a truncated model behind.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::fs;
use std::path::{Path, PathBuf};

use burn::{
    optim::Optimizer,
    prelude::*,
    record::{CompactRecorder, FileRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::domain::epoch::EpochRecord;
use crate::domain::error::{Result, VqaError};
use crate::domain::training_state::ImprovementMetric;
use crate::domain::traits::Checkpointer;
use crate::ml::model::{BlipVqaConfig, BlipVqaModel};
use crate::ml::session::BurnSession;

pub const CONFIG_FILE: &str = "config.json";
pub const BEST_EPOCH_FILE: &str = "best_epoch.json";

const MODEL_STEM: &str = "model";
const STAGING_STEM: &str = "model-partial";

/// Contents of best_epoch.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestEpoch {
    pub epoch:         usize,
    pub score:         f64,
    pub eval_loss:     f64,
    pub train_loss:    f64,
    pub learning_rate: f64,
}

pub struct CheckpointManager {
    dir:    PathBuf,
    metric: ImprovementMetric,
}

impl CheckpointManager {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf(), metric: ImprovementMetric::default() }
    }

    /// Choose which statistic is written as `score` in best_epoch.json.
    pub fn with_metric(mut self, metric: ImprovementMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Path of the weights file, including the recorder's extension.
    pub fn model_path<B: Backend>(&self) -> PathBuf {
        self.dir
            .join(MODEL_STEM)
            .with_extension(<CompactRecorder as FileRecorder<B>>::file_extension())
    }

    // ─── Architecture config ──────────────────────────────────────────────────

    pub fn load_model_config(&self) -> Result<BlipVqaConfig> {
        let path = self.dir.join(CONFIG_FILE);
        if !path.exists() {
            return Err(VqaError::ConfigurationMissing { path });
        }
        BlipVqaConfig::load(&path).map_err(|e| VqaError::Checkpoint {
            path,
            message: e.to_string(),
        })
    }

    pub fn save_model_config(&self, cfg: &BlipVqaConfig) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(CONFIG_FILE);
        cfg.save(&path)?;
        tracing::debug!("Saved model config to '{}'", path.display());
        Ok(())
    }

    // ─── Weights ──────────────────────────────────────────────────────────────

    /// Build the architecture from config.json and load the weights into it.
    pub fn load_model<B: Backend>(&self, device: &B::Device) -> Result<BlipVqaModel<B>> {
        let cfg  = self.load_model_config()?;
        let path = self.model_path::<B>();
        if !path.exists() {
            return Err(VqaError::ConfigurationMissing { path });
        }

        let record = CompactRecorder::new()
            .load(self.dir.join(MODEL_STEM), device)
            .map_err(|e| VqaError::Checkpoint { path: path.clone(), message: e.to_string() })?;

        tracing::info!("Loaded weights from '{}'", path.display());
        Ok(cfg.init::<B>(device).load_record(record))
    }

    /// Record to the staging stem, then rename over the live file.
    pub fn save_model_atomically<B: Backend>(&self, model: &BlipVqaModel<B>) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let extension = <CompactRecorder as FileRecorder<B>>::file_extension();
        let staged    = self.dir.join(STAGING_STEM).with_extension(extension);
        let target    = self.model_path::<B>();

        CompactRecorder::new()
            .record(model.clone().into_record(), self.dir.join(STAGING_STEM))
            .map_err(|e| VqaError::Checkpoint { path: staged.clone(), message: e.to_string() })?;
        fs::rename(&staged, &target)?;

        tracing::debug!("Saved weights to '{}'", target.display());
        Ok(())
    }

    // ─── Best-epoch pointer ───────────────────────────────────────────────────

    pub fn save_best_epoch(&self, best: &BestEpoch) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let target = self.dir.join(BEST_EPOCH_FILE);
        let staged = self.dir.join(format!("{BEST_EPOCH_FILE}.partial"));
        fs::write(&staged, serde_json::to_string_pretty(best)?)?;
        fs::rename(&staged, &target)?;
        Ok(())
    }

    pub fn load_best_epoch(&self) -> Result<BestEpoch> {
        let path = self.dir.join(BEST_EPOCH_FILE);
        if !path.exists() {
            return Err(VqaError::ConfigurationMissing { path });
        }
        Ok(serde_json::from_str(&fs::read_to_string(&path)?)?)
    }
}

impl<B, O> Checkpointer<BurnSession<B, O>> for CheckpointManager
where
    B: AutodiffBackend,
    O: Optimizer<BlipVqaModel<B>, B>,
{
    fn save_best(&mut self, session: &BurnSession<B, O>, record: &EpochRecord) -> Result<()> {
        self.save_model_atomically(session.model())?;
        self.save_best_epoch(&BestEpoch {
            epoch:         record.epoch,
            score:         self.metric.score(record),
            eval_loss:     record.eval_loss,
            train_loss:    record.train_loss,
            learning_rate: record.learning_rate,
        })?;
        tracing::info!(
            "Checkpoint saved to '{}' (epoch {})",
            self.dir.display(),
            record.epoch
        );
        Ok(())
    }
}
