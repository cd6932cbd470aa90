// src/engine/pipeline.rs
//
// The ordered transform pipeline and its dimension bookkeeping.
//
// One invocation owns one frame and one ImageState; steps execute strictly
// sequentially and every step leaves the tracked dimensions equal to the
// frame's actual dimensions. All dimension math here is pure; pixels are
// touched only through the backend trait.

use crate::backend::{
    plan_resize, CodecBackend, Color, FitMode, Gravity, Region, ResizeSpec, SalientCropService,
};
use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::EngineError;
use crate::params::{CropStrategy, ValidatedParams};
use crate::steps::Step;
use tracing::debug;

/// Logical width/height of the image as the pipeline mutates it, plus
/// whether EXIF auto-rotation swapped the probed axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageState {
    pub width: u32,
    pub height: u32,
    pub rotated: bool,
}

impl ImageState {
    pub fn new(width: u32, height: u32, rotated: bool) -> Self {
        Self {
            width,
            height,
            rotated,
        }
    }

    /// Record the dimensions a step produced. Zero in either axis means the
    /// request asked for an impossible geometry; that is fatal, not clamped.
    fn set(&mut self, step: &'static str, width: u32, height: u32) -> Result<(), EngineError> {
        if width == 0 || height == 0 {
            return Err(EngineError::invalid_step_dimensions(step, width, height));
        }
        self.width = width;
        self.height = height;
        Ok(())
    }
}

/// Round a target dimension scaled by zoom.
fn zoomed(value: u32, zoom: f64) -> u32 {
    (value as f64 * zoom).round().min(u32::MAX as f64) as u32
}

/// Execute the step sequence over one owned frame.
pub fn run_pipeline<B, S>(
    backend: &B,
    saliency: &S,
    mut frame: B::Frame,
    state: &mut ImageState,
    steps: &[Step],
    params: &ValidatedParams,
    zoom: f64,
) -> Result<B::Frame, EngineError>
where
    B: CodecBackend,
    S: SalientCropService,
{
    for step in steps {
        debug!(
            step = step.name(),
            width = state.width,
            height = state.height,
            "applying pipeline step"
        );
        frame = match step {
            Step::Crop => apply_crop(backend, frame, state, params)?,
            Step::Resize => apply_resize(backend, saliency, frame, state, params, zoom)?,
            Step::Fit => apply_fit(backend, frame, state, params, zoom)?,
            Step::Letterbox => apply_letterbox(backend, frame, state, params, zoom)?,
            Step::Scale => apply_scale(backend, frame, state, params, zoom)?,
        };
    }
    Ok(frame)
}

/// Explicit crop. Percentages resolve against the current dimensions, then
/// the rectangle is clamped into bounds with a minimum extent of 1.
fn apply_crop<B: CodecBackend>(
    backend: &B,
    frame: B::Frame,
    state: &mut ImageState,
    params: &ValidatedParams,
) -> Result<B::Frame, EngineError> {
    let Some(values) = params.crop else {
        return Ok(frame);
    };
    let raw_x = values[0].resolve(state.width);
    let raw_y = values[1].resolve(state.height);
    let raw_w = values[2].resolve(state.width);
    let raw_h = values[3].resolve(state.height);

    let x = raw_x.min(state.width);
    let y = raw_y.min(state.height);
    // Minimum extent of 1, but never past the right/bottom edge. When the
    // origin is clamped onto the far edge no extent is possible at all.
    let w = raw_w.max(1).min(state.width - x);
    let h = raw_h.max(1).min(state.height - y);
    if w == 0 || h == 0 {
        return Err(EngineError::invalid_step_dimensions("crop", w, h));
    }

    let frame = backend.extract(
        frame,
        Region {
            left: x,
            top: y,
            width: w,
            height: h,
        },
    )?;
    state.set("crop", w, h)?;
    Ok(frame)
}

/// Resize with optional saliency-aware pre-crop. Enlargement is never
/// permitted: the scale factor is capped at 1.
fn apply_resize<B, S>(
    backend: &B,
    saliency: &S,
    mut frame: B::Frame,
    state: &mut ImageState,
    params: &ValidatedParams,
    zoom: f64,
) -> Result<B::Frame, EngineError>
where
    B: CodecBackend,
    S: SalientCropService,
{
    let Some((target_w, target_h)) = params.resize else {
        return Ok(frame);
    };

    // Smart crop runs on the un-zoomed target aspect, against the current
    // (already rotated) buffer, and only when no explicit crop was given.
    if params.crop_strategy == Some(CropStrategy::Smart) && params.crop.is_none() {
        let bytes = backend.snapshot(&frame)?;
        if let Some(region) = saliency.crop(&bytes, target_w, target_h)? {
            debug!(
                left = region.left,
                top = region.top,
                width = region.width,
                height = region.height,
                "salient crop"
            );
            frame = backend.extract(frame, region)?;
            state.set("smart_crop", region.width, region.height)?;
        }
    }

    let spec = shrink_to_target(
        state,
        zoomed(target_w, zoom),
        zoomed(target_h, zoom),
        FitMode::Cover,
        resize_anchor(params),
        Color::BLACK,
    );
    apply_planned_resize(backend, frame, state, "resize", &spec)
}

/// Scale-to-fit inside the target box. No enlargement, no padding.
fn apply_fit<B: CodecBackend>(
    backend: &B,
    frame: B::Frame,
    state: &mut ImageState,
    params: &ValidatedParams,
    zoom: f64,
) -> Result<B::Frame, EngineError> {
    let Some((target_w, target_h)) = params.fit else {
        return Ok(frame);
    };
    let spec = shrink_to_target(
        state,
        zoomed(target_w, zoom),
        zoomed(target_h, zoom),
        FitMode::Inside,
        Gravity::Centre,
        Color::BLACK,
    );
    apply_planned_resize(backend, frame, state, "fit", &spec)
}

/// Letterbox: contain within the box and pad with the background color. The
/// output is always exactly the box.
fn apply_letterbox<B: CodecBackend>(
    backend: &B,
    frame: B::Frame,
    state: &mut ImageState,
    params: &ValidatedParams,
    zoom: f64,
) -> Result<B::Frame, EngineError> {
    let Some((target_w, target_h)) = params.lb else {
        return Ok(frame);
    };
    let spec = ResizeSpec {
        width: zoomed(target_w, zoom),
        height: zoomed(target_h, zoom),
        fit: FitMode::Contain,
        position: Gravity::Centre,
        background: params.background.unwrap_or(Color::BLACK),
        without_enlargement: true,
    };
    apply_planned_resize(backend, frame, state, "lb", &spec)
}

/// Combined `w`/`h` step. A missing axis is derived from the current aspect
/// ratio; `cover` applies when an explicit crop already ran, `inside`
/// otherwise.
fn apply_scale<B: CodecBackend>(
    backend: &B,
    frame: B::Frame,
    state: &mut ImageState,
    params: &ValidatedParams,
    zoom: f64,
) -> Result<B::Frame, EngineError> {
    let (base_w, base_h) = match (params.w, params.h) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => {
            let aspect = state.height as f64 / state.width as f64;
            (w, (w as f64 * aspect).round() as u32)
        }
        (None, Some(h)) => {
            let aspect = state.height as f64 / state.width as f64;
            ((h as f64 / aspect).round() as u32, h)
        }
        (None, None) => return Ok(frame),
    };
    let spec = ResizeSpec {
        width: zoomed(base_w, zoom),
        height: zoomed(base_h, zoom),
        fit: if params.crop.is_some() {
            FitMode::Cover
        } else {
            FitMode::Inside
        },
        position: Gravity::Centre,
        background: Color::BLACK,
        without_enlargement: true,
    };
    apply_planned_resize(backend, frame, state, "scale", &spec)
}

/// Residual-crop anchor for the resize step. A crop strategy outranks
/// `gravity`; the content-scoring strategies anchor at the centre.
fn resize_anchor(params: &ValidatedParams) -> Gravity {
    match params.crop_strategy {
        Some(CropStrategy::Entropy) | Some(CropStrategy::Attention) => Gravity::Centre,
        _ => params.gravity.unwrap_or_default(),
    }
}

/// Spec for resize/fit: scale = min(tw/w, th/h, 1) applied to both axes.
fn shrink_to_target(
    state: &ImageState,
    target_w: u32,
    target_h: u32,
    fit: FitMode,
    position: Gravity,
    background: Color,
) -> ResizeSpec {
    let scale = (target_w as f64 / state.width as f64)
        .min(target_h as f64 / state.height as f64)
        .min(1.0);
    ResizeSpec {
        width: (state.width as f64 * scale).round() as u32,
        height: (state.height as f64 * scale).round() as u32,
        fit,
        position,
        background,
        without_enlargement: true,
    }
}

/// Plan the output dimensions, run the backend resize, and keep the state
/// in lock-step with the produced buffer.
fn apply_planned_resize<B: CodecBackend>(
    backend: &B,
    frame: B::Frame,
    state: &mut ImageState,
    step: &'static str,
    spec: &ResizeSpec,
) -> Result<B::Frame, EngineError> {
    let (out_w, out_h) = plan_resize(state.width, state.height, spec);
    if out_w == 0 || out_h == 0 {
        return Err(EngineError::invalid_step_dimensions(step, out_w, out_h));
    }
    // Letterbox canvases can exceed the source; the output is subject to the
    // same bomb limits as decode, checked before the backend allocates.
    if out_w > MAX_DIMENSION || out_h > MAX_DIMENSION {
        return Err(EngineError::dimension_exceeds_limit(
            out_w.max(out_h),
            MAX_DIMENSION,
        ));
    }
    let out_pixels = out_w as u64 * out_h as u64;
    if out_pixels > MAX_PIXELS {
        return Err(EngineError::pixel_count_exceeds_limit(out_pixels, MAX_PIXELS));
    }
    let frame = backend.resize(frame, spec)?;
    state.set(step, out_w, out_h)?;
    Ok(frame)
}
