// src/error.rs
//
// Error handling for pixelgate, using thiserror.
//
// Two severities exist in this engine:
// - Validation failures (bad `w`, malformed `crop`, ...) are NOT errors of
//   this type. The offending parameter is stripped and a message recorded in
//   the transform result (see params::ParamError).
// - Processing failures (decode, resize, extract, encode, saliency) are
//   fatal for the request and surface as EngineError.

use std::borrow::Cow;
use thiserror::Error;

/// Fatal processing errors. A transform that returns one of these produced
/// no partial output.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    #[error("Step '{step}' produced invalid dimensions {width}x{height}")]
    InvalidStepDimensions {
        step: &'static str,
        width: u32,
        height: u32,
    },

    #[error(
        "Extract region ({left}+{width}, {top}+{height}) exceeds image bounds ({img_width}x{img_height})"
    )]
    ExtractOutOfBounds {
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    },

    #[error("Resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): {message}")]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("Salient crop service failed: {message}")]
    SaliencyFailed { message: Cow<'static, str> },

    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

impl EngineError {
    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn invalid_step_dimensions(step: &'static str, width: u32, height: u32) -> Self {
        Self::InvalidStepDimensions {
            step,
            width,
            height,
        }
    }

    pub fn extract_out_of_bounds(
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    ) -> Self {
        Self::ExtractOutOfBounds {
            left,
            top,
            width,
            height,
            img_width,
            img_height,
        }
    }

    pub fn resize_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn saliency_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::SaliencyFailed {
            message: message.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }
}
