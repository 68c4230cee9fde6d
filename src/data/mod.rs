// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the dataset table to tensor batches:
//
//   CSV table         → reads split/question/answer/image_path
//       │
//       ▼
//   VqaProcessor      → tokenises text, loads + normalises images
//       │
//       ▼
//   VqaDataset        → explicit per-split handle, encodes by index
//       │
//       ▼
//   BatchSampler      → shuffled or ordered index groups
//       │
//       ▼
//   VqaBatcher        → stacks encoded examples into tensors
//       │
//       ▼
//   BatchLoader       → lazy, restartable pass fed to the loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads the tabular dataset into Examples
pub mod table;

/// Text and image preprocessing
pub mod processor;

/// Per-split dataset handle implementing Burn's Dataset trait
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Plans shuffled or ordered index batches
pub mod sampler;

/// Lazy batch iterator consumed by the training loop
pub mod loader;
