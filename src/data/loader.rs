// ============================================================
// Layer 4 — Batch Loader
// ============================================================
// Feeds VqaBatches to the training loop. One call to `epoch()`
// yields a lazy pass over the whole split:
//
//   BatchSampler  → index groups (shuffled or fixed)
//       │
//       ▼
//   VqaDataset    → encode each index (tokenise + load image)
//       │
//       ▼
//   VqaBatcher    → stack into tensors
//
// Encoding is fallible (a missing image aborts the run), so the
// iterator yields Result<VqaBatch>. Examples are only encoded when
// their batch is pulled.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use std::sync::Arc;

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    prelude::*,
};

use crate::data::batcher::{VqaBatch, VqaBatcher};
use crate::data::dataset::VqaDataset;
use crate::data::sampler::BatchSampler;
use crate::domain::error::{Result, VqaError};
use crate::domain::traits::BatchSource;

#[derive(Debug, Clone, Copy)]
pub struct LoaderOptions {
    pub batch_size: usize,
    pub shuffle:    bool,
    pub seed:       u64,
}

pub struct BatchLoader<B: Backend> {
    dataset: Arc<VqaDataset>,
    sampler: BatchSampler,
    batcher: VqaBatcher<B>,
}

impl<B: Backend> BatchLoader<B> {
    pub fn new(dataset: Arc<VqaDataset>, options: LoaderOptions, device: B::Device) -> Result<Self> {
        if dataset.len() == 0 {
            return Err(VqaError::EmptySplit { split: dataset.split() });
        }

        let sampler = BatchSampler::new(
            dataset.len(),
            options.batch_size,
            options.shuffle,
            options.seed,
        )?;
        let batcher = VqaBatcher::new(device, dataset.processor().image_size());

        tracing::debug!(
            "{} loader: {} examples in {} batches (shuffle={})",
            dataset.split(),
            dataset.len(),
            sampler.num_batches(),
            options.shuffle,
        );

        Ok(Self { dataset, sampler, batcher })
    }
}

impl<B: Backend> BatchSource for BatchLoader<B> {
    type Batch = VqaBatch<B>;

    fn num_batches(&self) -> usize {
        self.sampler.num_batches()
    }

    fn epoch(&mut self) -> Box<dyn Iterator<Item = Result<VqaBatch<B>>> + '_> {
        let plan    = self.sampler.next_epoch();
        let dataset = &self.dataset;
        let batcher = &self.batcher;

        Box::new(plan.into_iter().map(move |indices| {
            let items = indices
                .iter()
                .map(|&i| dataset.encode(i))
                .collect::<Result<Vec<_>>>()?;
            Ok(batcher.batch(items))
        }))
    }
}
