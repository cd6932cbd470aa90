// src/engine/facade.rs
//
// TransformEngine: the one-call surface the request layer uses.
// probe -> auto-rotate -> validate -> order steps -> pipeline -> select
// format -> encode.

use crate::backend::{CodecBackend, NoSaliency, SalientCropService};
use crate::engine::format::select_format;
use crate::engine::pipeline::{run_pipeline, ImageState};
use crate::error::EngineError;
use crate::params::{validate, RawParams};
use crate::steps::build_step_order;
use std::time::Instant;
use tracing::{debug, warn};

/// Per-request stage timings and sizes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TransformMetrics {
    /// Decode stage duration in milliseconds
    pub decode_ms: f64,
    /// Transform (pipeline) stage duration in milliseconds
    pub ops_ms: f64,
    /// Encode stage duration in milliseconds
    pub encode_ms: f64,
    /// Total wall-clock duration in milliseconds
    pub total_ms: f64,
    /// Input size in bytes
    pub bytes_in: u64,
    /// Output size in bytes
    pub bytes_out: u64,
}

/// Outcome of one transform invocation.
#[derive(Clone, Debug)]
pub struct TransformResult {
    /// Encoded output image.
    pub bytes: Vec<u8>,
    /// Lowercase output format name.
    pub format: String,
    /// Final image width.
    pub width: u32,
    /// Final image height.
    pub height: u32,
    /// Whether an EXIF orientation was applied during decode.
    pub rotated: bool,
    /// Messages for parameters that were stripped during validation, in
    /// validation order. The request still completed.
    pub errors: Vec<String>,
    pub metrics: TransformMetrics,
}

impl TransformResult {
    /// Validation messages joined for a diagnostic response header.
    pub fn errors_header(&self) -> String {
        self.errors.join(";")
    }
}

/// The transformation engine facade. Holds the injected codec backend and
/// saliency service; all per-request state lives on the stack of
/// [`TransformEngine::transform`], so one engine serves concurrent requests.
pub struct TransformEngine<B, S = NoSaliency> {
    backend: B,
    saliency: S,
}

impl<B: CodecBackend> TransformEngine<B, NoSaliency> {
    /// Engine without a saliency service: `crop_strategy=smart` degrades to
    /// a plain resize.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            saliency: NoSaliency,
        }
    }
}

impl<B, S> TransformEngine<B, S>
where
    B: CodecBackend,
    S: SalientCropService,
{
    pub fn with_saliency(backend: B, saliency: S) -> Self {
        Self { backend, saliency }
    }

    /// The injected saliency service.
    pub fn saliency(&self) -> &S {
        &self.saliency
    }

    /// Transform `bytes` according to `raw` request parameters.
    ///
    /// Invalid parameters are stripped and reported in the result; any
    /// decode/codec/saliency failure aborts with an [`EngineError`] and no
    /// partial output.
    pub fn transform(
        &self,
        bytes: &[u8],
        raw: &RawParams,
    ) -> Result<TransformResult, EngineError> {
        let started = Instant::now();

        let (frame, info) = self.backend.decode(bytes)?;
        let frame = self.backend.auto_rotate(frame, bytes)?;
        let (width, height) = self.backend.dimensions(&frame);
        let decode_ms = elapsed_ms(started);

        let (params, param_errors) = validate(raw);
        for err in &param_errors {
            warn!(field = err.field, "stripped invalid parameter");
        }
        let zoom = params.effective_zoom();
        let steps = build_step_order(raw.order(), &params);
        debug!(?steps, zoom, width, height, "transform plan");

        // Dim comparison cannot see 180° turns, mirrors, or a 90° turn of a
        // square, so ask the backend for the orientation tag itself.
        let rotated = matches!(self.backend.orientation(bytes), Some(2..=8));
        let mut state = ImageState::new(width, height, rotated);
        let ops_started = Instant::now();
        let frame = run_pipeline(
            &self.backend,
            &self.saliency,
            frame,
            &mut state,
            &steps,
            &params,
            zoom,
        )?;
        let ops_ms = elapsed_ms(ops_started);

        let format = select_format(&params, info.format.as_deref(), zoom);
        let encode_started = Instant::now();
        let data = self.backend.encode(&frame, &format)?;
        let encode_ms = elapsed_ms(encode_started);

        let format_name = format
            .name()
            .map(str::to_string)
            .or_else(|| info.format.clone())
            .unwrap_or_else(|| "unknown".to_string());

        let metrics = TransformMetrics {
            decode_ms,
            ops_ms,
            encode_ms,
            total_ms: elapsed_ms(started),
            bytes_in: bytes.len() as u64,
            bytes_out: data.len() as u64,
        };

        Ok(TransformResult {
            bytes: data,
            format: format_name,
            width: state.width,
            height: state.height,
            rotated,
            errors: param_errors.into_iter().map(|e| e.message).collect(),
            metrics,
        })
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
