// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every failure in a run is fatal: errors are typed here and
// propagate unchanged to the application layer, where anyhow
// adds context before the process exits.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::example::Split;

pub type Result<T> = std::result::Result<T, VqaError>;

#[derive(Debug, Error)]
pub enum VqaError {
    /// A required input (config file, dataset table, model directory) is absent.
    #[error("required input '{}' does not exist", path.display())]
    ConfigurationMissing { path: PathBuf },

    /// An image referenced by a dataset row cannot be found.
    #[error("image file '{}' does not exist", path.display())]
    MissingFile { path: PathBuf },

    /// A grafted weight tensor disagrees with its target parameter.
    #[error("tensor '{tensor}' has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        tensor:   String,
        expected: Vec<usize>,
        found:    Vec<usize>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("the {split} split has no examples")]
    EmptySplit { split: Split },

    #[error("example index {index} is out of range for {len} examples")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot parse config '{}': {source}", path.display())]
    ConfigParse {
        path:   PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cannot read dataset table '{}': {source}", path.display())]
    Table {
        path:   PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("cannot decode image '{}': {source}", path.display())]
    Image {
        path:   PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("cannot read weights from '{}': {message}", path.display())]
    Weights { path: PathBuf, message: String },

    #[error("checkpoint error at '{}': {message}", path.display())]
    Checkpoint { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
