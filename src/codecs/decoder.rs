// src/codecs/decoder.rs
//
// Decode routing: JPEG via mozjpeg (libjpeg-turbo), PNG via zune-png,
// WebP via libwebp, everything else via the image crate. All entry points
// run under the engine panic policy and enforce the decompression-bomb
// limits.

use crate::engine::{run_with_panic_policy, MAX_DIMENSION, MAX_PIXELS};
use crate::error::EngineError;
use image::{
    DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, RgbImage, RgbaImage,
};
use mozjpeg::Decompress;
use std::io::Cursor;
use webp::{BitstreamFeatures, Decoder as WebPDecoder};
use zune_core::bytestream::ZCursor;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_png::PngDecoder;

type DecoderResult<T> = std::result::Result<T, EngineError>;

/// Reject dimensions that smell like a decompression bomb.
pub fn check_dimensions(width: u32, height: u32) -> DecoderResult<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(EngineError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(EngineError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}

/// Detect input format from magic bytes. None if unknown.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Unified decode entrypoint: detect the format once, route to the fastest
/// decoder for it, return the pixels and the detected format.
pub fn decode_image(bytes: &[u8]) -> DecoderResult<(DynamicImage, Option<ImageFormat>)> {
    let detected = detect_format(bytes);
    let img = match detected {
        Some(ImageFormat::Jpeg) => decode_jpeg(bytes)?,
        Some(ImageFormat::Png) => decode_png(bytes)?,
        Some(ImageFormat::WebP) => decode_webp(bytes)?,
        _ => decode_fallback(bytes)?,
    };
    Ok((img, detected))
}

/// Decode JPEG using mozjpeg, significantly faster than the pure-Rust
/// decoder. Truncated files are rejected up front.
fn decode_jpeg(data: &[u8]) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:jpeg", || {
        if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
            return Err(EngineError::decode_failed("jpeg: missing EOI marker"));
        }

        let decompress = Decompress::new_mem(data)
            .map_err(|e| EngineError::decode_failed(format!("jpeg: init failed: {e:?}")))?;
        let mut decompress = decompress
            .rgb()
            .map_err(|e| EngineError::decode_failed(format!("jpeg: rgb conversion failed: {e:?}")))?;

        let width = decompress.width() as u32;
        let height = decompress.height() as u32;
        check_dimensions(width, height)?;

        let pixels: Vec<[u8; 3]> = decompress
            .read_scanlines()
            .map_err(|e| EngineError::decode_failed(format!("jpeg: scanline read failed: {e:?}")))?;
        let flat: Vec<u8> = pixels.into_iter().flatten().collect();

        RgbImage::from_raw(width, height, flat)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| EngineError::decode_failed("jpeg: raw buffer size mismatch"))
    })
}

/// Decode PNG using zune-png. 16-bit inputs are stripped to 8-bit.
fn decode_png(data: &[u8]) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:png", || {
        let options = DecoderOptions::default().png_set_strip_to_8bit(true);
        let mut decoder = PngDecoder::new_with_options(ZCursor::new(data), options);
        let pixels = decoder
            .decode()
            .map_err(|e| EngineError::decode_failed(format!("png: decode failed: {e}")))?;

        let info = decoder
            .info()
            .ok_or_else(|| EngineError::decode_failed("png: missing header info"))?;
        let width = info.width as u32;
        let height = info.height as u32;
        check_dimensions(width, height)?;

        let buf = match pixels {
            zune_core::result::DecodingResult::U8(v) => v,
            _ => return Err(EngineError::decode_failed("png: unexpected non-U8 buffer")),
        };

        let colorspace = decoder
            .colorspace()
            .ok_or_else(|| EngineError::decode_failed("png: missing colorspace"))?;
        let img = match colorspace {
            ColorSpace::RGB => RgbImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| EngineError::decode_failed("png: bad RGB buffer"))?,
            ColorSpace::RGBA | ColorSpace::YCbCr | ColorSpace::BGRA | ColorSpace::ARGB => {
                RgbaImage::from_raw(width, height, buf)
                    .map(DynamicImage::ImageRgba8)
                    .ok_or_else(|| EngineError::decode_failed("png: bad RGBA buffer"))?
            }
            ColorSpace::Luma => GrayImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| EngineError::decode_failed("png: bad Luma buffer"))?,
            ColorSpace::LumaA => GrayAlphaImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageLumaA8)
                .ok_or_else(|| EngineError::decode_failed("png: bad LumaA buffer"))?,
            other => {
                return Err(EngineError::decode_failed(format!(
                    "png: unsupported colorspace {other:?}"
                )))
            }
        };
        Ok(img)
    })
}

/// Decode WebP using libwebp. Animated WebP falls back to the image crate.
fn decode_webp(data: &[u8]) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:webp", || {
        let features = BitstreamFeatures::new(data)
            .ok_or_else(|| EngineError::decode_failed("webp: unreadable bitstream features"))?;

        if features.has_animation() {
            return image::load_from_memory(data).map_err(|e| {
                EngineError::decode_failed(format!("webp (animated) decode failed: {e}"))
            });
        }

        check_dimensions(features.width(), features.height())?;
        let decoded = WebPDecoder::new(data)
            .decode()
            .ok_or_else(|| EngineError::decode_failed("webp: decode failed"))?;
        Ok(decoded.to_image())
    })
}

/// Catch-all decode via the image crate.
fn decode_fallback(data: &[u8]) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:image", || {
        let img = image::load_from_memory(data)
            .map_err(|e| EngineError::decode_failed(format!("decode failed: {e}")))?;
        check_dimensions(img.width(), img.height())?;
        Ok(img)
    })
}

/// Extract the EXIF Orientation tag (1-8). None if missing or out of range.
pub fn detect_exif_orientation(bytes: &[u8]) -> Option<u16> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    // The tag may be stored Short or Long; get_uint covers both.
    let orientation = field.value.get_uint(0)? as u16;
    (1..=8).contains(&orientation).then_some(orientation)
}

/// Apply an EXIF orientation (2-8) to the decoded pixels.
pub fn apply_orientation(img: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(), // transpose
        6 => img.rotate90(),
        7 => img.rotate270().fliph(), // transverse
        8 => img.rotate270(),
        _ => img,
    }
}
