// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers for each CLI command:
//
//   init     — scaffold a base model directory from the dataset
//   train    — fine-tune with early stopping and checkpointing
//   evaluate — eval loss of a model directory on the val split
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination; errors gain anyhow context
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

/// Base model scaffolding
pub mod init_use_case;

/// The fine-tuning workflow and its YAML configuration
pub mod train_use_case;

/// Stand-alone evaluation of a model directory
pub mod evaluate_use_case;
