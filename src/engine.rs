// src/engine.rs
//
// The core of pixelgate: one facade call that validates parameters, runs the
// ordered transform pipeline over a single owned frame, selects the output
// codec, and encodes. This file is a facade over the decomposed modules in
// engine/.

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA. Beyond this is likely malicious.
pub const MAX_PIXELS: u64 = 100_000_000;

mod common;
mod facade;
mod format;
mod pipeline;

pub use facade::{TransformEngine, TransformMetrics, TransformResult};
pub use format::select_format;
pub use pipeline::{run_pipeline, ImageState};

pub(crate) use common::run_with_panic_policy;
