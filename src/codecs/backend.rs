// src/codecs/backend.rs
//
// The built-in pixel backend: owns decoded frames as DynamicImage, resamples
// with fast_image_resize (Lanczos3, alpha premultiplied), and dispatches to
// the tuned per-format encoders.

use crate::backend::{
    plan_resize, CodecBackend, Color, EncodeFormat, FitMode, Region, ResizeSpec, SourceInfo,
};
use crate::codecs::decoder::{
    apply_orientation, check_dimensions, decode_image, detect_exif_orientation,
};
use crate::codecs::encoder::{encode_avif, encode_jpeg, encode_png, encode_webp};
use crate::engine::run_with_panic_policy;
use crate::error::EngineError;
use crate::quality::DEFAULT_QUALITY;
use fast_image_resize::{self as fir, ImageBufferError, MulDiv, PixelType, ResizeOptions};
use image::{imageops, DynamicImage, ImageFormat, RgbImage, RgbaImage};
use std::io::Cursor;

/// One decoded image, exclusively owned by one transform invocation.
#[derive(Debug)]
pub struct Frame {
    pub image: DynamicImage,
    pub source_format: Option<ImageFormat>,
}

/// Default codec backend. Stateless; every frame is request-scoped.
#[derive(Clone, Copy, Debug, Default)]
pub struct PixelBackend;

impl PixelBackend {
    pub fn new() -> Self {
        Self
    }
}

fn format_name(format: ImageFormat) -> String {
    format!("{format:?}").to_lowercase()
}

impl CodecBackend for PixelBackend {
    type Frame = Frame;

    fn decode(&self, bytes: &[u8]) -> Result<(Frame, SourceInfo), EngineError> {
        let (image, source_format) = decode_image(bytes)?;
        let info = SourceInfo {
            width: image.width(),
            height: image.height(),
            format: source_format.map(format_name),
        };
        Ok((
            Frame {
                image,
                source_format,
            },
            info,
        ))
    }

    fn auto_rotate(&self, frame: Frame, source: &[u8]) -> Result<Frame, EngineError> {
        match detect_exif_orientation(source) {
            Some(orientation) if orientation > 1 => Ok(Frame {
                image: apply_orientation(frame.image, orientation),
                ..frame
            }),
            _ => Ok(frame),
        }
    }

    fn orientation(&self, source: &[u8]) -> Option<u16> {
        detect_exif_orientation(source)
    }

    fn dimensions(&self, frame: &Frame) -> (u32, u32) {
        (frame.image.width(), frame.image.height())
    }

    fn resize(&self, frame: Frame, spec: &ResizeSpec) -> Result<Frame, EngineError> {
        let (src_w, src_h) = (frame.image.width(), frame.image.height());
        let (dst_w, dst_h) = plan_resize(src_w, src_h, spec);
        if dst_w == 0 || dst_h == 0 {
            return Err(EngineError::resize_failed(
                (src_w, src_h),
                (spec.width, spec.height),
                "resize plan collapsed to zero",
            ));
        }
        // Contain targets can exceed the source; never allocate a canvas
        // beyond the decode bomb limits.
        check_dimensions(dst_w, dst_h)?;

        let image = match spec.fit {
            FitMode::Inside => {
                if (dst_w, dst_h) == (src_w, src_h) {
                    frame.image
                } else {
                    fast_resize(frame.image, dst_w, dst_h)?
                }
            }
            FitMode::Cover => {
                // Scale so the short side fills the box, then crop the
                // residual at the requested anchor.
                let mut scale =
                    (spec.width as f64 / src_w as f64).max(spec.height as f64 / src_h as f64);
                if spec.without_enlargement {
                    scale = scale.min(1.0);
                }
                let scaled_w = ((src_w as f64 * scale).round() as u32).max(1);
                let scaled_h = ((src_h as f64 * scale).round() as u32).max(1);
                let scaled = if (scaled_w, scaled_h) == (src_w, src_h) {
                    frame.image
                } else {
                    fast_resize(frame.image, scaled_w, scaled_h)?
                };
                if (scaled_w, scaled_h) == (dst_w, dst_h) {
                    scaled
                } else {
                    let (x, y) = spec.position.offsets((scaled_w, scaled_h), (dst_w, dst_h));
                    scaled.crop_imm(x, y, dst_w, dst_h)
                }
            }
            FitMode::Contain => {
                // Inner image fits inside the box; the rest is padded with
                // the background color.
                let inner_spec = ResizeSpec {
                    fit: FitMode::Inside,
                    ..*spec
                };
                let (inner_w, inner_h) = plan_resize(src_w, src_h, &inner_spec);
                let inner = if (inner_w, inner_h) == (src_w, src_h) {
                    frame.image
                } else {
                    fast_resize(frame.image, inner_w.max(1), inner_h.max(1))?
                };
                let Color(r, g, b) = spec.background;
                let mut canvas =
                    RgbaImage::from_pixel(dst_w, dst_h, image::Rgba([r, g, b, 255]));
                let (x, y) = spec
                    .position
                    .offsets((dst_w, dst_h), (inner.width(), inner.height()));
                imageops::overlay(&mut canvas, &inner.to_rgba8(), x as i64, y as i64);
                DynamicImage::ImageRgba8(canvas)
            }
        };

        Ok(Frame { image, ..frame })
    }

    fn extract(&self, frame: Frame, region: Region) -> Result<Frame, EngineError> {
        let (w, h) = (frame.image.width(), frame.image.height());
        let right = region.left.checked_add(region.width);
        let bottom = region.top.checked_add(region.height);
        let in_bounds = matches!((right, bottom), (Some(r), Some(b)) if r <= w && b <= h);
        if region.width == 0 || region.height == 0 || !in_bounds {
            return Err(EngineError::extract_out_of_bounds(
                region.left,
                region.top,
                region.width,
                region.height,
                w,
                h,
            ));
        }
        Ok(Frame {
            image: frame
                .image
                .crop_imm(region.left, region.top, region.width, region.height),
            ..frame
        })
    }

    fn snapshot(&self, frame: &Frame) -> Result<Vec<u8>, EngineError> {
        run_with_panic_policy("snapshot:png", || {
            let mut buf = Vec::new();
            frame
                .image
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| {
                    EngineError::encode_failed("png", format!("snapshot encode failed: {e}"))
                })?;
            Ok(buf)
        })
    }

    fn encode(&self, frame: &Frame, format: &EncodeFormat) -> Result<Vec<u8>, EngineError> {
        match format {
            EncodeFormat::Jpeg { quality } => encode_jpeg(&frame.image, *quality),
            EncodeFormat::Png { palette } => encode_png(&frame.image, *palette),
            EncodeFormat::WebP { quality } => encode_webp(&frame.image, *quality),
            EncodeFormat::Avif { quality } => encode_avif(&frame.image, *quality),
            EncodeFormat::Source => match frame.source_format {
                Some(ImageFormat::Jpeg) => encode_jpeg(&frame.image, DEFAULT_QUALITY),
                Some(ImageFormat::Png) => encode_png(&frame.image, false),
                Some(ImageFormat::WebP) => encode_webp(&frame.image, DEFAULT_QUALITY),
                Some(other) => Err(EngineError::unsupported_format(format_name(other))),
                None => Err(EngineError::unsupported_format("unknown")),
            },
        }
    }
}

/// Lanczos3 resample via fast_image_resize. RGBA input is premultiplied
/// before filtering and unpremultiplied after.
fn fast_resize(
    img: DynamicImage,
    dst_width: u32,
    dst_height: u32,
) -> Result<DynamicImage, EngineError> {
    let src_width = img.width();
    let src_height = img.height();
    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return Err(EngineError::resize_failed(
            (src_width, src_height),
            (dst_width, dst_height),
            "invalid dimensions for resize",
        ));
    }

    // Keep RGB as 3-channel instead of forcing RGBA
    let (pixel_type, mut src_pixels): (PixelType, Vec<u8>) = match img {
        DynamicImage::ImageRgb8(rgb) => (PixelType::U8x3, rgb.into_raw()),
        DynamicImage::ImageRgba8(rgba) => (PixelType::U8x4, rgba.into_raw()),
        other => (PixelType::U8x4, other.to_rgba8().into_raw()),
    };

    let fail = |reason: String| {
        EngineError::resize_failed((src_width, src_height), (dst_width, dst_height), reason)
    };

    let src_image = match fir::images::Image::from_slice_u8(
        src_width,
        src_height,
        src_pixels.as_mut_slice(),
        pixel_type,
    ) {
        Ok(src_image) => src_image,
        Err(ImageBufferError::InvalidBufferAlignment) => {
            // Rare: copy into a freshly aligned buffer
            let mut aligned = fir::images::Image::new(src_width, src_height, pixel_type);
            let buffer = aligned.buffer_mut();
            buffer.copy_from_slice(&src_pixels[..buffer.len()]);
            return resample(aligned, pixel_type, dst_width, dst_height).map_err(fail);
        }
        Err(other) => return Err(fail(format!("fir source image error: {other:?}"))),
    };

    resample(src_image, pixel_type, dst_width, dst_height).map_err(fail)
}

fn resample(
    mut src_image: fir::images::Image<'_>,
    pixel_type: PixelType,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<DynamicImage, String> {
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, pixel_type);

    let needs_premultiply = pixel_type == PixelType::U8x4;
    let mul_div = MulDiv::default();
    if needs_premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
    }

    let options =
        ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    if needs_premultiply {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
    }

    let dst_pixels = dst_image.into_vec();
    match pixel_type {
        PixelType::U8x3 => RgbImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "failed to build rgb image from resized data".to_string()),
        PixelType::U8x4 => RgbaImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| "failed to build rgba image from resized data".to_string()),
        _ => Err("unsupported pixel type after resize".to_string()),
    }
}
