// ============================================================
// Layer 4 — Batch Sampler
// ============================================================
// Plans which example indices go into which batch for one pass.
//
//   shuffle = true   → indices permuted anew every pass
//   shuffle = false  → 0, 1, 2, ... in table order
//
// Batches are consecutive chunks of batch_size indices; only the
// final chunk may be shorter. Every index appears exactly once.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom, seeded so
// a run can be reproduced.
//
// Reference: rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::error::{Result, VqaError};

#[derive(Debug, Clone)]
pub struct BatchSampler {
    len:        usize,
    batch_size: usize,
    rng:        Option<StdRng>,
}

impl BatchSampler {
    /// `seed` is only consulted when `shuffle` is true.
    pub fn new(len: usize, batch_size: usize, shuffle: bool, seed: u64) -> Result<Self> {
        if batch_size == 0 {
            return Err(VqaError::InvalidConfig("batch size must be greater than zero".into()));
        }
        let rng = shuffle.then(|| StdRng::seed_from_u64(seed));
        Ok(Self { len, batch_size, rng })
    }

    pub fn num_batches(&self) -> usize {
        self.len.div_ceil(self.batch_size)
    }

    /// Index groups for the next pass.
    pub fn next_epoch(&mut self) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..self.len).collect();
        if let Some(rng) = self.rng.as_mut() {
            order.shuffle(rng);
        }
        order.chunks(self.batch_size).map(<[usize]>::to_vec).collect()
    }
}
