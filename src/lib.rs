// lib.rs
//
// pixelgate: an on-demand image transformation engine for image delivery
// proxies.
//
// Given raw image bytes and loosely-typed request parameters, the engine
// validates the parameters (stripping and reporting invalid ones), applies a
// deterministic order-sensitive pipeline of geometric transforms, picks an
// output codec and compression quality, and returns the encoded bytes plus
// metadata. Origin fetch, signing, and HTTP transport live in the
// surrounding service, not here.

// Memory allocator optimization - jemalloc for better performance
// Note: jemalloc is not supported on Windows/MSVC, so we exclude it on that platform
#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

pub mod backend;
pub mod codecs;
pub mod engine;
pub mod error;
pub mod params;
pub mod quality;
pub mod steps;

pub use backend::{
    plan_resize, CodecBackend, Color, EncodeFormat, FitMode, Gravity, NoSaliency, Region,
    ResizeSpec, SalientCropService, SourceInfo,
};
pub use codecs::PixelBackend;
pub use engine::{
    TransformEngine, TransformMetrics, TransformResult, MAX_DIMENSION, MAX_PIXELS,
};
pub use error::EngineError;
pub use params::{validate, ParamError, RawParams, ValidatedParams};
pub use steps::{build_step_order, Step};

use image::ImageReader;
use std::io::Cursor;

/// Probe width/height/format from the header bytes WITHOUT decoding pixels.
///
/// Useful to the surrounding fetch layer for content-type negotiation and
/// for rejecting oversized sources before spending CPU on a decode.
pub fn probe(bytes: &[u8]) -> Result<SourceInfo, EngineError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| EngineError::decode_failed(format!("failed to read image header: {e}")))?;

    let format = reader.format().map(|f| format!("{f:?}").to_lowercase());
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| EngineError::decode_failed(format!("failed to read dimensions: {e}")))?;

    Ok(SourceInfo {
        width,
        height,
        format,
    })
}
