// src/engine/format.rs
//
// Output codec and quality decision.
//
// Priority: explicit avif, then explicit webp, then re-encode jpeg sources,
// then palette-optimize png sources, else pass the source format through.
// Quality comes from the validated parameter when present, otherwise from
// the zoom compression curve.

use crate::backend::EncodeFormat;
use crate::params::ValidatedParams;
use crate::quality::{zoom_default_quality, DEFAULT_QUALITY};

/// Pick the output codec for a transformed frame.
///
/// `source_format` is the probed lowercase source name; `zoom` feeds the
/// default quality curve when no explicit quality survived validation.
pub fn select_format(
    params: &ValidatedParams,
    source_format: Option<&str>,
    zoom: f64,
) -> EncodeFormat {
    let quality = params
        .quality
        .unwrap_or_else(|| zoom_default_quality(DEFAULT_QUALITY, zoom))
        .min(100);

    if params.avif == Some(true) {
        EncodeFormat::Avif { quality }
    } else if params.webp == Some(true) {
        EncodeFormat::WebP { quality }
    } else {
        match source_format {
            Some("jpeg") => EncodeFormat::Jpeg { quality },
            // PNG output is lossless palette optimization; quality does not
            // apply on this path.
            Some("png") => EncodeFormat::Png { palette: true },
            _ => EncodeFormat::Source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{validate, RawParams};

    fn params(pairs: &[(&str, &str)]) -> ValidatedParams {
        validate(&RawParams::from_pairs(pairs.iter().copied())).0
    }

    #[test]
    fn avif_wins_over_webp_and_source() {
        let p = params(&[("avif", "1"), ("webp", "1"), ("quality", "70")]);
        assert_eq!(
            select_format(&p, Some("jpeg"), 1.0),
            EncodeFormat::Avif { quality: 70 }
        );
    }

    #[test]
    fn webp_wins_over_source() {
        let p = params(&[("webp", "true")]);
        assert_eq!(
            select_format(&p, Some("png"), 1.0),
            EncodeFormat::WebP {
                quality: DEFAULT_QUALITY
            }
        );
    }

    #[test]
    fn explicit_false_flags_do_not_force_a_codec() {
        let p = params(&[("avif", "0"), ("webp", "false")]);
        assert_eq!(
            select_format(&p, Some("jpeg"), 1.0),
            EncodeFormat::Jpeg {
                quality: DEFAULT_QUALITY
            }
        );
    }

    #[test]
    fn jpeg_and_png_sources_reencode_in_kind() {
        let p = params(&[("quality", "55")]);
        assert_eq!(
            select_format(&p, Some("jpeg"), 1.0),
            EncodeFormat::Jpeg { quality: 55 }
        );
        assert_eq!(
            select_format(&p, Some("png"), 1.0),
            EncodeFormat::Png { palette: true }
        );
    }

    #[test]
    fn other_sources_pass_through() {
        let p = params(&[]);
        assert_eq!(select_format(&p, Some("webp"), 1.0), EncodeFormat::Source);
        assert_eq!(select_format(&p, None, 1.0), EncodeFormat::Source);
    }

    #[test]
    fn default_quality_follows_the_zoom_curve() {
        let p = params(&[]);
        assert_eq!(
            select_format(&p, Some("jpeg"), 2.0),
            EncodeFormat::Jpeg {
                quality: crate::quality::zoom_default_quality(DEFAULT_QUALITY, 2.0)
            }
        );
    }
}
