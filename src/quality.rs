// src/quality.rs
//
// Default compression quality as a function of zoom.
//
// Higher zoom levels magnify compression artifacts, so when the caller does
// not pin an explicit quality we drop the default along a logarithmic curve,
// bounded below by round(base / zoom).

/// Base quality when neither the caller nor the curve says otherwise.
/// Slightly above common encoder defaults.
pub const DEFAULT_QUALITY: u8 = 82;

/// Quality for a given zoom factor:
/// `round(d - (ln z / ln(d / z)) * (d * z))`, clamped to `[round(d / z), d]`.
///
/// `z == 1` is a boundary: `ln 1 = 0` would zero the numerator but the
/// clamp denominator math is also degenerate there, so it short-circuits to
/// the base quality. Non-positive zoom is treated the same way.
pub fn zoom_default_quality(base: u8, zoom: f64) -> u8 {
    if zoom <= 0.0 || zoom == 1.0 {
        return base;
    }
    let d = f64::from(base);
    let value = (d - (zoom.ln() / (d / zoom).ln()) * (d * zoom)).round();
    let min = (d / zoom).round();
    value.clamp(min.min(d), d) as u8
}
