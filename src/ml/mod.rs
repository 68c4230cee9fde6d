// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor and autodiff code lives here:
//
//   model.rs    — BLIP-style VQA model: conv patch embedding,
//                 vision encoder, question/image fusion encoder,
//                 answer decoder, cross-entropy loss
//
//   scaler.rs   — dynamic loss scaler for reduced precision
//
//   schedule.rs — per-epoch exponential learning-rate decay
//
//   session.rs  — model + AdamW + schedule + scaler, one train
//                 step at a time
//
//   assembly.rs — pretrained load, patch-embedding graft, and
//                 session construction
//
//   trainer.rs  — the epoch loop with early stopping
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Li et al. (2022) BLIP

/// BLIP-style VQA model architecture
pub mod model;

/// Dynamic loss scaling
pub mod scaler;

/// Learning-rate schedule
pub mod schedule;

/// Training session bundling model and optimizer state
pub mod session;

/// Session assembly from a run configuration
pub mod assembly;

/// Training loop with validation, early stopping and checkpointing
pub mod trainer;
