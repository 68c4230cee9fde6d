// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one CSV row per completed epoch in the output
// directory, next to the checkpoint it describes.
//
// Example output:
//   epoch,train_loss,eval_loss,eval_loss_sum,learning_rate
//   0,2.412300,2.301100,9.204400,0.00004000
//   1,2.010700,2.250800,9.003200,0.00003600
//
// The file is recreated at the start of every run, so its rows
// always match the weights that run leaves behind.
//
// Reference: Rust Book §12 (I/O and File Handling)

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::epoch::EpochRecord;
use crate::domain::error::Result;

pub const METRICS_FILE: &str = "metrics.csv";

const HEADER: &str = "epoch,train_loss,eval_loss,eval_loss_sum,learning_rate";

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create `<dir>/metrics.csv` holding only the header row.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join(METRICS_FILE);
        let mut f    = fs::File::create(&csv_path)?;
        writeln!(f, "{HEADER}")?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    /// Append one epoch as a new row.
    pub fn log(&self, r: &EpochRecord) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.8}",
            r.epoch,
            r.train_loss,
            r.eval_loss,
            r.eval_loss_sum,
            r.learning_rate,
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
