// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing the fine-tuning
// run: what an example is, what one epoch produces, how the
// early-stopping state evolves, and the seams the training loop
// is written against.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Typed error taxonomy shared by every layer
pub mod error;

// One (question, answer, image) row and its split tag
pub mod example;

// Per-epoch record and the final training report
pub mod epoch;

// Best-score / stale-epoch bookkeeping for early stopping
pub mod training_state;

// Core abstractions (traits) that other layers implement
pub mod traits;
