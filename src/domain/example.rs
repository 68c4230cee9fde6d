// ============================================================
// Layer 3 — Example Domain Type
// ============================================================
// One row of the medical VQA table: a question about an image
// and its ground-truth answer. Rows are read once at start-up
// and never mutated.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which partition of the table a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
}

impl Split {
    /// Parse the value of the `split` column. Unknown tags yield None
    /// so that rows outside train/val are skipped.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "train" => Some(Split::Train),
            "val"   => Some(Split::Val),
            _       => None,
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => f.write_str("train"),
            Split::Val   => f.write_str("val"),
        }
    }
}

/// A single (question, answer, image) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub split:      Split,
    pub question:   String,
    pub answer:     String,
    pub image_path: PathBuf,
}

impl Example {
    pub fn new(
        split:      Split,
        question:   impl Into<String>,
        answer:     impl Into<String>,
        image_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            split,
            question:   question.into(),
            answer:     answer.into(),
            image_path: image_path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_tags() {
        assert_eq!(Split::from_tag("train"), Some(Split::Train));
        assert_eq!(Split::from_tag(" val "), Some(Split::Val));
        assert_eq!(Split::from_tag("test"), None);
    }

    #[test]
    fn test_split_display_matches_tag() {
        for split in [Split::Train, Split::Val] {
            assert_eq!(Split::from_tag(&split.to_string()), Some(split));
        }
    }
}
