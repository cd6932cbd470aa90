// src/codecs/encoder.rs
//
// Encoder operations: JPEG (mozjpeg), PNG (image + oxipng), WebP (libwebp),
// AVIF (image crate's ravif-backed encoder), each tuned per quality band.

use crate::engine::{run_with_panic_policy, MAX_DIMENSION};
use crate::error::EngineError;
use image::codecs::avif::AvifEncoder;
use image::{DynamicImage, ImageFormat};
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::borrow::Cow;
use std::io::Cursor;

type EncoderResult<T> = std::result::Result<T, EngineError>;

/// Derives per-format encoder settings from a 0-100 quality value.
/// Bands:
/// - High (>=85): visual quality first, AVIF speed 6
/// - Balanced (70-84): quality/speed balance, AVIF speed 7
/// - Fast (50-69): speed leaning, AVIF speed 8
/// - Fastest (<50): fastest useful, AVIF speed 9
#[derive(Debug, Clone, Copy)]
pub struct QualitySettings {
    quality: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QualityBand {
    High,
    Balanced,
    Fast,
    Fastest,
}

impl QualitySettings {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.min(100) as f32,
        }
    }

    fn band(&self) -> QualityBand {
        if self.quality >= 85.0 {
            QualityBand::High
        } else if self.quality >= 70.0 {
            QualityBand::Balanced
        } else if self.quality >= 50.0 {
            QualityBand::Fast
        } else {
            QualityBand::Fastest
        }
    }

    // WebP: method 4 / single pass / no preprocessing across all bands.
    pub fn webp_method(&self) -> i32 {
        4
    }

    pub fn webp_pass(&self) -> i32 {
        1
    }

    pub fn webp_preprocessing(&self) -> i32 {
        0
    }

    pub fn webp_sns_strength(&self) -> i32 {
        match self.band() {
            QualityBand::High => 50,
            QualityBand::Balanced => 70,
            QualityBand::Fast | QualityBand::Fastest => 80,
        }
    }

    pub fn webp_filter_strength(&self) -> i32 {
        if self.quality >= 80.0 {
            20
        } else if self.quality >= 60.0 {
            30
        } else {
            40
        }
    }

    pub fn webp_filter_sharpness(&self) -> i32 {
        match self.band() {
            QualityBand::High => 2,
            _ => 0,
        }
    }

    // AVIF speed: 0 (slowest/best) to 10 (fastest/worst).
    pub fn avif_speed(&self) -> u8 {
        match self.band() {
            QualityBand::High => 6,
            QualityBand::Balanced => 7,
            QualityBand::Fast => 8,
            QualityBand::Fastest => 9,
        }
    }
}

/// Encode to progressive JPEG using mozjpeg with web-optimized settings.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        let quality = quality.min(100);

        // Avoid conversion if already RGB8
        let rgb: Cow<'_, image::RgbImage> = match img {
            DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
            _ => Cow::Owned(img.to_rgb8()),
        };
        let (w, h) = rgb.dimensions();
        let pixels: &[u8] = rgb.as_raw();

        if w == 0 || h == 0 {
            return Err(EngineError::encode_failed(
                "jpeg",
                "zero-sized frame cannot be encoded",
            ));
        }
        if w > MAX_DIMENSION || h > MAX_DIMENSION {
            return Err(EngineError::dimension_exceeds_limit(
                w.max(h),
                MAX_DIMENSION,
            ));
        }
        let expected_len = (w as usize) * (h as usize) * 3;
        if pixels.len() != expected_len {
            return Err(EngineError::encode_failed("jpeg", "raw buffer size mismatch"));
        }

        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);

        let quality_f32 = quality as f32;
        comp.set_quality(quality_f32);
        comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);
        comp.set_optimize_scans(true);
        comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);

        let smoothing = if quality_f32 >= 90.0 {
            0
        } else if quality_f32 >= 70.0 {
            5
        } else if quality_f32 >= 60.0 {
            10
        } else {
            18
        };
        comp.set_smoothing_factor(smoothing);

        let estimated_size = (w as usize * h as usize * 3 / 10).max(4096);
        let mut output = Vec::with_capacity(estimated_size);

        let mut writer = comp.start_compress(&mut output).map_err(|e| {
            EngineError::encode_failed("jpeg", format!("mozjpeg: failed to start compress: {e:?}"))
        })?;

        let stride = w as usize * 3;
        for row in pixels.chunks(stride) {
            writer.write_scanlines(row).map_err(|e| {
                EngineError::encode_failed(
                    "jpeg",
                    format!("mozjpeg: failed to write scanlines: {e:?}"),
                )
            })?;
        }

        writer.finish().map_err(|e| {
            EngineError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
        })?;

        Ok(output)
    })
}

/// Encode to PNG, then recompress losslessly with oxipng. `palette`
/// opts in to the aggressive bit-depth/palette reductions.
pub fn encode_png(img: &DynamicImage, palette: bool) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:png", || {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| EngineError::encode_failed("png", format!("PNG encode failed: {e}")))?;

        let mut options = oxipng::Options::from_preset(if palette { 4 } else { 2 });
        options.strip = oxipng::StripChunks::Safe;

        let optimized = oxipng::optimize_from_memory(&buf, &options).map_err(|e| {
            EngineError::encode_failed("png", format!("oxipng optimization failed: {e}"))
        })?;

        Ok(optimized)
    })
}

/// Encode to WebP. RGB input skips the alpha channel entirely.
pub fn encode_webp(img: &DynamicImage, quality: u8) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:webp", || {
        let mut config = webp::WebPConfig::new()
            .map_err(|_| EngineError::encode_failed("webp", "failed to create WebPConfig"))?;

        let settings = QualitySettings::new(quality);
        config.quality = quality.min(100) as f32;
        config.method = settings.webp_method();
        config.pass = settings.webp_pass();
        config.preprocessing = settings.webp_preprocessing();
        config.sns_strength = settings.webp_sns_strength();
        config.autofilter = 1;
        config.filter_strength = settings.webp_filter_strength();
        config.filter_sharpness = settings.webp_filter_sharpness();

        let (w, h) = (img.width(), img.height());
        let mem = if img.color().has_alpha() {
            let rgba: Cow<'_, image::RgbaImage> = match img {
                DynamicImage::ImageRgba8(rgba_img) => Cow::Borrowed(rgba_img),
                _ => Cow::Owned(img.to_rgba8()),
            };
            webp::Encoder::from_rgba(rgba.as_raw(), w, h).encode_advanced(&config)
        } else {
            let rgb: Cow<'_, image::RgbImage> = match img {
                DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
                _ => Cow::Owned(img.to_rgb8()),
            };
            webp::Encoder::from_rgb(rgb.as_raw(), w, h).encode_advanced(&config)
        }
        .map_err(|e| EngineError::encode_failed("webp", format!("WebP encode failed: {e:?}")))?;

        Ok(mem.to_vec())
    })
}

/// Encode to AVIF using the image crate's ravif-backed encoder.
pub fn encode_avif(img: &DynamicImage, quality: u8) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:avif", || {
        let quality = quality.min(100);
        let settings = QualitySettings::new(quality);

        // The AVIF encoder only accepts 8-bit and 16-bit layouts.
        let frame: Cow<'_, DynamicImage> = match img {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => Cow::Borrowed(img),
            other if other.color().has_alpha() => {
                Cow::Owned(DynamicImage::ImageRgba8(other.to_rgba8()))
            }
            other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
        };

        let mut buf = Vec::new();
        let encoder =
            AvifEncoder::new_with_speed_quality(&mut buf, settings.avif_speed(), quality);
        frame
            .write_with_encoder(encoder)
            .map_err(|e| EngineError::encode_failed("avif", format!("AVIF encode failed: {e}")))?;

        Ok(buf)
    })
}
