// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Files on disk that the other layers read or produce:
//
//   checkpoint.rs      — model directory layout: config.json,
//                        CompactRecorder weights (atomic writes),
//                        best_epoch.json
//
//   tokenizer_store.rs — tokenizer.json load / copy / build
//
//   weights.rs         — safetensors reader for the grafted
//                        patch-embedding kernel and bias
//
//   metrics.rs         — per-epoch CSV log
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model directory saving and loading
pub mod checkpoint;

/// Tokenizer loading, copying, and building
pub mod tokenizer_store;

/// External weight tensors in safetensors format
pub mod weights;

/// Training metrics CSV logger
pub mod metrics;
