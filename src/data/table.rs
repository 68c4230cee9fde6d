// ============================================================
// Layer 4 — Dataset Table
// ============================================================
// Reads the medical VQA table from CSV. Required columns:
//
//   split,question,answer,image_path
//   train,is there a fracture?,no,images/synpic100.jpg
//   val,what organ is shown?,liver,images/synpic204.jpg
//
// Rows whose split is neither `train` nor `val` are skipped.
// Extra columns are ignored. The whole table is read once and
// handed out per split through the ExampleSource trait.
//
// Reference: csv crate documentation (serde deserialisation)

use std::path::Path;

use serde::Deserialize;

use crate::domain::error::{Result, VqaError};
use crate::domain::example::{Example, Split};
use crate::domain::traits::ExampleSource;

#[derive(Debug, Deserialize)]
struct Row {
    split:      String,
    question:   String,
    answer:     String,
    image_path: String,
}

#[derive(Debug)]
pub struct CsvExampleTable {
    rows: Vec<Example>,
}

impl CsvExampleTable {
    /// Load every train/val row of the table at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(VqaError::ConfigurationMissing { path });
        }

        let table_err = |source| VqaError::Table { path: path.clone(), source };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(table_err)?;

        let mut rows    = Vec::new();
        let mut skipped = 0usize;
        for row in reader.deserialize::<Row>() {
            let row = row.map_err(table_err)?;
            match Split::from_tag(&row.split) {
                Some(split) => rows.push(Example::new(split, row.question, row.answer, row.image_path)),
                None        => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::debug!("Skipped {} rows outside the train/val splits", skipped);
        }
        tracing::info!("Read {} examples from '{}'", rows.len(), path.display());

        Ok(Self { rows })
    }
}

impl ExampleSource for CsvExampleTable {
    fn examples(&self, split: Split) -> Result<Vec<Example>> {
        Ok(self.rows.iter().filter(|e| e.split == split).cloned().collect())
    }
}
