use std::sync::Arc;

use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::processor::VqaProcessor;
use crate::domain::error::{Result, VqaError};
use crate::domain::example::{Example, Split};

/// One example after tokenisation and image preprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedExample {
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub pixel_values:   Vec<f32>,
    pub labels:         Vec<u32>,
}

/// Explicit handle over the rows of one split plus the processor
/// that encodes them. Shared with loaders through an Arc.
pub struct VqaDataset {
    split:     Split,
    examples:  Vec<Example>,
    processor: Arc<VqaProcessor>,
}

impl VqaDataset {
    pub fn new(split: Split, examples: Vec<Example>, processor: Arc<VqaProcessor>) -> Self {
        Self { split, examples, processor }
    }

    pub fn split(&self) -> Split { self.split }

    pub fn processor(&self) -> &VqaProcessor { &self.processor }

    /// Encode row `index`. Fails with MissingFile when its image is absent.
    pub fn encode(&self, index: usize) -> Result<EncodedExample> {
        let example = self.examples.get(index).ok_or(VqaError::IndexOutOfRange {
            index,
            len: self.examples.len(),
        })?;

        let (input_ids, attention_mask) = self.processor.encode_question(&example.question)?;
        let labels       = self.processor.encode_answer(&example.answer)?;
        let pixel_values = self.processor.load_image(&example.image_path)?;

        Ok(EncodedExample { input_ids, attention_mask, pixel_values, labels })
    }
}

impl Dataset<Example> for VqaDataset {
    fn get(&self, index: usize) -> Option<Example> {
        self.examples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}
