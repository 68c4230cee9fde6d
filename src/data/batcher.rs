// ============================================================
// Layer 4 — VQA Batcher
// ============================================================
// Implements Burn's Batcher trait to stack EncodedExamples into
// one VqaBatch of tensors.
//
//   Input:  Vec of N EncodedExamples
//   Output: VqaBatch with
//             input_ids      [N, Q]
//             attention_mask [N, Q]
//             pixel_values   [N, 3, S, S]
//             labels         [N, A]
//
// Every example is already padded to the same Q and A, and every
// image resized to S×S, so batching is flatten + reshape.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::EncodedExample;

// ─── VqaBatch ─────────────────────────────────────────────────────────────────
/// A batch ready for the model. Consumers take it apart by
/// destructuring; it is never mutated in place.
#[derive(Debug, Clone)]
pub struct VqaBatch<B: Backend> {
    /// Question token ids — shape: [batch, max_question_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding — shape: [batch, max_question_len]
    pub attention_mask: Tensor<B, 2, Int>,

    /// Normalised images — shape: [batch, 3, image_size, image_size]
    pub pixel_values: Tensor<B, 4>,

    /// Answer token ids — shape: [batch, max_answer_len]
    pub labels: Tensor<B, 2, Int>,
}

// ─── VqaBatcher ───────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct VqaBatcher<B: Backend> {
    pub device:     B::Device,
    pub image_size: usize,
}

impl<B: Backend> VqaBatcher<B> {
    pub fn new(device: B::Device, image_size: usize) -> Self {
        Self { device, image_size }
    }
}

impl<B: Backend> Batcher<EncodedExample, VqaBatch<B>> for VqaBatcher<B> {
    fn batch(&self, items: Vec<EncodedExample>) -> VqaBatch<B> {
        let batch_size = items.len();
        let q_len      = items[0].input_ids.len();
        let a_len      = items[0].labels.len();
        let side       = self.image_size;

        let input_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.input_ids.iter().map(|&x| x as i32))
            .collect();

        let mask_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.attention_mask.iter().map(|&x| x as i32))
            .collect();

        let label_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.labels.iter().map(|&x| x as i32))
            .collect();

        let pixel_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.pixel_values.iter().copied())
            .collect();

        let input_ids = Tensor::<B, 1, Int>::from_ints(input_flat.as_slice(), &self.device)
            .reshape([batch_size, q_len]);

        let attention_mask = Tensor::<B, 1, Int>::from_ints(mask_flat.as_slice(), &self.device)
            .reshape([batch_size, q_len]);

        let labels = Tensor::<B, 1, Int>::from_ints(label_flat.as_slice(), &self.device)
            .reshape([batch_size, a_len]);

        let pixel_values = Tensor::<B, 1>::from_floats(pixel_flat.as_slice(), &self.device)
            .reshape([batch_size, 3, side, side]);

        VqaBatch { input_ids, attention_mask, pixel_values, labels }
    }
}
