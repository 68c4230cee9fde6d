// ============================================================
// Layer 5 — BLIP-style VQA Model
// ============================================================
// A compact BLIP layout built from Burn modules:
//
//   pixels [b,3,S,S]
//     │  PatchEmbedding  (Conv2d kernel=stride=patch, + positions)
//     ▼
//   image tokens [b,N,d] ── VisionEncoder (self-attention blocks)
//     │
//   question ids [b,Q] ──── TextEncoder   (self-attn + cross-attn
//     │                                    to image tokens)
//     ▼
//   AnswerDecoder: one learned query per answer position attends
//   to the fused question states, then projects to the vocabulary
//     ▼
//   logits [b,A,vocab]  →  cross-entropy vs labels, pads ignored
//
// The patch-embedding convolution is the layer whose kernel and
// bias get replaced by an externally trained one (ml/assembly.rs).
//
// Reference: Li et al. (2022) BLIP
//            Dosovitskiy et al. (2021) ViT patch embeddings
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        conv::{Conv2d, Conv2dConfig},
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};

use crate::data::batcher::VqaBatch;
use crate::domain::error::Result as VqaResult;
use crate::domain::traits::LossEvaluator;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug, PartialEq)]
pub struct BlipVqaConfig {
    pub vocab_size: usize,
    #[config(default = 224)]
    pub image_size: usize,
    #[config(default = 16)]
    pub patch_size: usize,
    #[config(default = 32)]
    pub max_question_len: usize,
    #[config(default = 8)]
    pub max_answer_len: usize,
    #[config(default = 256)]
    pub d_model: usize,
    #[config(default = 8)]
    pub num_heads: usize,
    #[config(default = 4)]
    pub vision_layers: usize,
    #[config(default = 4)]
    pub text_layers: usize,
    #[config(default = 2)]
    pub answer_layers: usize,
    #[config(default = 1024)]
    pub d_ff: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
    #[config(default = 0)]
    pub pad_token_id: usize,
}

impl BlipVqaConfig {
    pub fn num_patches(&self) -> usize {
        let per_side = self.image_size / self.patch_size;
        per_side * per_side
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> BlipVqaModel<B> {
        let patch_embedding = PatchEmbedding {
            conv: Conv2dConfig::new([3, self.d_model], [self.patch_size, self.patch_size])
                .with_stride([self.patch_size, self.patch_size])
                .init(device),
            position: EmbeddingConfig::new(self.num_patches(), self.d_model).init(device),
        };
        let vision = VisionEncoder {
            patch_embedding,
            layers: (0..self.vision_layers).map(|_| self.encoder_block(device)).collect(),
            norm:   LayerNormConfig::new(self.d_model).init(device),
        };
        let text = TextEncoder {
            token_embedding:    EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            position_embedding: EmbeddingConfig::new(self.max_question_len, self.d_model).init(device),
            layers: (0..self.text_layers).map(|_| self.fusion_block(device)).collect(),
            norm:   LayerNormConfig::new(self.d_model).init(device),
        };
        let answer = AnswerDecoder {
            queries: EmbeddingConfig::new(self.max_answer_len, self.d_model).init(device),
            layers:  (0..self.answer_layers).map(|_| self.fusion_block(device)).collect(),
            norm:    LayerNormConfig::new(self.d_model).init(device),
            head:    LinearConfig::new(self.d_model, self.vocab_size).init(device),
        };

        BlipVqaModel {
            vision,
            text,
            answer,
            dropout:      DropoutConfig::new(self.dropout).init(),
            pad_token_id: self.pad_token_id,
        }
    }

    fn attention<B: Backend>(&self, device: &B::Device) -> MultiHeadAttention<B> {
        MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device)
    }

    fn encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        EncoderBlock {
            self_attn:   self.attention(device),
            ffn_linear1: LinearConfig::new(self.d_model, self.d_ff).init(device),
            ffn_linear2: LinearConfig::new(self.d_ff, self.d_model).init(device),
            norm1:       LayerNormConfig::new(self.d_model).init(device),
            norm2:       LayerNormConfig::new(self.d_model).init(device),
            dropout:     DropoutConfig::new(self.dropout).init(),
        }
    }

    fn fusion_block<B: Backend>(&self, device: &B::Device) -> FusionBlock<B> {
        FusionBlock {
            self_attn:   self.attention(device),
            cross_attn:  self.attention(device),
            ffn_linear1: LinearConfig::new(self.d_model, self.d_ff).init(device),
            ffn_linear2: LinearConfig::new(self.d_ff, self.d_model).init(device),
            norm1:       LayerNormConfig::new(self.d_model).init(device),
            norm2:       LayerNormConfig::new(self.d_model).init(device),
            norm3:       LayerNormConfig::new(self.d_model).init(device),
            dropout:     DropoutConfig::new(self.dropout).init(),
        }
    }
}

// ─── Blocks ───────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let attn = self.self_attn.forward(MhaInput::self_attn(x.clone())).context;
        let x    = self.norm1.forward(x + self.dropout.forward(attn));
        let ffn  = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm2.forward(x + self.dropout.forward(ffn))
    }
}

/// Self-attention, then cross-attention to a memory sequence, then FFN.
#[derive(Module, Debug)]
pub struct FusionBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub cross_attn:  MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub norm3:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> FusionBlock<B> {
    /// `self_pad` masks padded positions of `x`; `memory_pad` masks
    /// padded positions of `memory` (true = ignore).
    pub fn forward(
        &self,
        x:          Tensor<B, 3>,
        memory:     Tensor<B, 3>,
        self_pad:   Option<Tensor<B, 2, Bool>>,
        memory_pad: Option<Tensor<B, 2, Bool>>,
    ) -> Tensor<B, 3> {
        let mut self_input = MhaInput::self_attn(x.clone());
        if let Some(mask) = self_pad {
            self_input = self_input.mask_pad(mask);
        }
        let attn = self.self_attn.forward(self_input).context;
        let x    = self.norm1.forward(x + self.dropout.forward(attn));

        let mut cross_input = MhaInput::new(x.clone(), memory.clone(), memory);
        if let Some(mask) = memory_pad {
            cross_input = cross_input.mask_pad(mask);
        }
        let cross = self.cross_attn.forward(cross_input).context;
        let x     = self.norm2.forward(x + self.dropout.forward(cross));

        let ffn = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm3.forward(x + self.dropout.forward(ffn))
    }
}

// ─── Vision ───────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct PatchEmbedding<B: Backend> {
    pub conv:     Conv2d<B>,
    pub position: Embedding<B>,
}

impl<B: Backend> PatchEmbedding<B> {
    /// [b, 3, S, S] → [b, num_patches, d_model]
    pub fn forward(&self, pixels: Tensor<B, 4>) -> Tensor<B, 3> {
        let x = self.conv.forward(pixels);
        let [batch_size, d_model, grid_h, grid_w] = x.dims();
        let num_patches = grid_h * grid_w;
        let x = x.reshape([batch_size, d_model, num_patches]).swap_dims(1, 2);

        let positions = Tensor::<B, 1, Int>::arange(0..num_patches as i64, &x.device())
            .unsqueeze::<2>()
            .expand([batch_size, num_patches]);
        x + self.position.forward(positions)
    }
}

#[derive(Module, Debug)]
pub struct VisionEncoder<B: Backend> {
    pub patch_embedding: PatchEmbedding<B>,
    pub layers:          Vec<EncoderBlock<B>>,
    pub norm:            LayerNorm<B>,
}

impl<B: Backend> VisionEncoder<B> {
    pub fn forward(&self, pixels: Tensor<B, 4>) -> Tensor<B, 3> {
        let mut x = self.patch_embedding.forward(pixels);
        for layer in &self.layers {
            x = layer.forward(x);
        }
        self.norm.forward(x)
    }
}

// ─── Text ─────────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct TextEncoder<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<FusionBlock<B>>,
    pub norm:               LayerNorm<B>,
}

impl<B: Backend> TextEncoder<B> {
    pub fn forward(
        &self,
        input_ids: Tensor<B, 2, Int>,
        pad_mask:  Tensor<B, 2, Bool>,
        image:     Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let tok_emb   = self.token_embedding.forward(input_ids);
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);

        let mut x = tok_emb + self.position_embedding.forward(positions);
        for layer in &self.layers {
            x = layer.forward(x, image.clone(), Some(pad_mask.clone()), None);
        }
        self.norm.forward(x)
    }
}

// ─── Answer decoder ───────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct AnswerDecoder<B: Backend> {
    pub queries: Embedding<B>,
    pub layers:  Vec<FusionBlock<B>>,
    pub norm:    LayerNorm<B>,
    pub head:    Linear<B>,
}

impl<B: Backend> AnswerDecoder<B> {
    /// Fused question states [b,Q,d] → answer logits [b,A,vocab]
    pub fn forward(&self, text: Tensor<B, 3>, text_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let [batch_size, _, _] = text.dims();
        let [answer_len, _]    = self.queries.weight.val().dims();

        let slots = Tensor::<B, 1, Int>::arange(0..answer_len as i64, &text.device())
            .unsqueeze::<2>()
            .expand([batch_size, answer_len]);

        let mut x = self.queries.forward(slots);
        for layer in &self.layers {
            x = layer.forward(x, text.clone(), None, Some(text_pad.clone()));
        }
        self.head.forward(self.norm.forward(x))
    }
}

// ─── Full model ───────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct BlipVqaModel<B: Backend> {
    pub vision:       VisionEncoder<B>,
    pub text:         TextEncoder<B>,
    pub answer:       AnswerDecoder<B>,
    pub dropout:      Dropout,
    pub pad_token_id: usize,
}

impl<B: Backend> BlipVqaModel<B> {
    /// Answer logits — shape [batch, max_answer_len, vocab_size]
    pub fn forward(
        &self,
        pixel_values:   Tensor<B, 4>,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let pad_mask = attention_mask.equal_elem(0);
        let image    = self.dropout.forward(self.vision.forward(pixel_values));
        let text     = self.text.forward(input_ids, pad_mask.clone(), image);
        self.answer.forward(text, pad_mask)
    }

    /// Mean cross-entropy over non-pad answer positions.
    pub fn forward_loss(&self, batch: VqaBatch<B>) -> Tensor<B, 1> {
        let VqaBatch { input_ids, attention_mask, pixel_values, labels } = batch;

        let logits = self.forward(pixel_values, input_ids, attention_mask);
        let [batch_size, answer_len, vocab_size] = logits.dims();

        let ce = CrossEntropyLossConfig::new()
            .with_pad_tokens(Some(vec![self.pad_token_id]))
            .init(&logits.device());
        ce.forward(
            logits.reshape([batch_size * answer_len, vocab_size]),
            labels.reshape([batch_size * answer_len]),
        )
    }
}

impl<B: Backend> LossEvaluator for BlipVqaModel<B> {
    type EvalBatch = VqaBatch<B>;

    fn eval_batch(&self, batch: VqaBatch<B>) -> VqaResult<f64> {
        Ok(self.forward_loss(batch).into_scalar().elem::<f64>())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use burn::backend::NdArray;

    pub(crate) fn tiny_config() -> BlipVqaConfig {
        BlipVqaConfig::new(12)
            .with_image_size(8)
            .with_patch_size(4)
            .with_max_question_len(5)
            .with_max_answer_len(3)
            .with_d_model(8)
            .with_num_heads(2)
            .with_vision_layers(1)
            .with_text_layers(1)
            .with_answer_layers(1)
            .with_d_ff(16)
            .with_dropout(0.0)
    }

    pub(crate) fn tiny_batch<B: Backend>(device: &B::Device, batch_size: usize) -> VqaBatch<B> {
        let ids: Vec<i32>    = (0..batch_size * 5).map(|i| (i % 11 + 1) as i32).collect();
        let mask: Vec<i32>   = (0..batch_size).flat_map(|_| [1, 1, 1, 0, 0]).collect();
        let labels: Vec<i32> = (0..batch_size).flat_map(|_| [5, 6, 0]).collect();

        VqaBatch {
            input_ids:      Tensor::<B, 1, Int>::from_ints(ids.as_slice(), device).reshape([batch_size, 5]),
            attention_mask: Tensor::<B, 1, Int>::from_ints(mask.as_slice(), device).reshape([batch_size, 5]),
            pixel_values:   Tensor::<B, 4>::ones([batch_size, 3, 8, 8], device),
            labels:         Tensor::<B, 1, Int>::from_ints(labels.as_slice(), device).reshape([batch_size, 3]),
        }
    }

    #[test]
    fn test_patch_embedding_shape() {
        let device = Default::default();
        let model  = tiny_config().init::<NdArray>(&device);

        let tokens = model.vision.patch_embedding.forward(Tensor::zeros([2, 3, 8, 8], &device));
        assert_eq!(tokens.dims(), [2, 4, 8]);
    }

    #[test]
    fn test_forward_logit_shape() {
        let device = Default::default();
        let model  = tiny_config().init::<NdArray>(&device);
        let batch  = tiny_batch::<NdArray>(&device, 2);

        let logits = model.forward(batch.pixel_values, batch.input_ids, batch.attention_mask);
        assert_eq!(logits.dims(), [2, 3, 12]);
    }

    #[test]
    fn test_loss_is_finite_and_positive() {
        let device = Default::default();
        let model  = tiny_config().init::<NdArray>(&device);

        let loss = model.eval_batch(tiny_batch::<NdArray>(&device, 3)).unwrap();
        assert!(loss.is_finite());
        assert!(loss > 0.0);
    }

    #[test]
    fn test_num_patches() {
        assert_eq!(tiny_config().num_patches(), 4);
        assert_eq!(BlipVqaConfig::new(10).num_patches(), 196);
    }
}
