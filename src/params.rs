// src/params.rs
//
// Request parameter validation.
//
// Raw parameters arrive as loosely-typed query-style strings in insertion
// order (the order drives pipeline step ordering). Validation is a pure
// function: each recognized field either parses under its syntactic contract
// or is stripped entirely with a recorded error. Unrecognized fields (e.g.
// X-Amz-* presign leftovers) are inert and simply never make it into the
// typed output.

use crate::backend::{Color, Gravity};

/// Raw request parameters, insertion order preserved.
#[derive(Clone, Debug, Default)]
pub struct RawParams {
    entries: Vec<(String, String)>,
}

impl RawParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parameter names in original insertion order (duplicates included).
    pub fn order(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A parameter that failed validation and was stripped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamError {
    pub field: &'static str,
    pub message: String,
}

impl ParamError {
    fn new(field: &'static str) -> Self {
        Self {
            field,
            message: format!("{field} arg is not valid"),
        }
    }
}

impl std::fmt::Display for ParamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// One crop component: a literal pixel count (`px` suffix) or a percentage
/// of the current dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropValue {
    Px(u32),
    Percent(u32),
}

impl CropValue {
    /// Resolve against the current dimension, percentages rounded.
    pub fn resolve(self, dimension: u32) -> u32 {
        match self {
            Self::Px(n) => n,
            Self::Percent(p) => (dimension as f64 * (p as f64 / 100.0)).round() as u32,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropStrategy {
    Smart,
    Entropy,
    Attention,
}

/// Typed parameters that survived validation. Absent means the parameter was
/// either not supplied or stripped; the pipeline never sees invalid values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidatedParams {
    pub w: Option<u32>,
    pub h: Option<u32>,
    pub quality: Option<u8>,
    pub resize: Option<(u32, u32)>,
    pub fit: Option<(u32, u32)>,
    pub lb: Option<(u32, u32)>,
    pub crop: Option<[CropValue; 4]>,
    pub crop_strategy: Option<CropStrategy>,
    pub gravity: Option<Gravity>,
    pub zoom: Option<f64>,
    pub webp: Option<bool>,
    pub avif: Option<bool>,
    pub background: Option<Color>,
}

impl ValidatedParams {
    /// Effective zoom factor. Absent, stripped, and zero all map to 1
    /// (zero would otherwise zero out every target dimension and the
    /// quality curve denominator).
    pub fn effective_zoom(&self) -> f64 {
        match self.zoom {
            Some(z) if z > 0.0 => z,
            _ => 1.0,
        }
    }
}

/// Positive integer without leading zeros, per the `w`/`h` contract.
fn parse_positive_int(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    if bytes.is_empty() || bytes[0] == b'0' || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    s.parse().ok()
}

/// 1-3 digit string with numeric value in [0, 100].
fn parse_quality(s: &str) -> Option<u8> {
    if s.is_empty() || s.len() > 3 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u16>().ok().filter(|q| *q <= 100).map(|q| q as u8)
}

/// `<int>[px]` dimension component.
fn parse_dim(s: &str) -> Option<u32> {
    let digits = s.strip_suffix("px").unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `<int>[px],<int>[px]` pair, used by resize/fit/lb.
fn parse_dim_pair(s: &str) -> Option<(u32, u32)> {
    let (a, b) = s.split_once(',')?;
    Some((parse_dim(a)?, parse_dim(b)?))
}

fn parse_crop_value(s: &str) -> Option<CropValue> {
    match s.strip_suffix("px") {
        Some(digits) => {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok().map(CropValue::Px)
        }
        None => {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            s.parse().ok().map(CropValue::Percent)
        }
    }
}

/// `x,y,w,h` with each component `<int>[px]`.
fn parse_crop(s: &str) -> Option<[CropValue; 4]> {
    let mut parts = s.split(',');
    let values = [
        parse_crop_value(parts.next()?)?,
        parse_crop_value(parts.next()?)?,
        parse_crop_value(parts.next()?)?,
        parse_crop_value(parts.next()?)?,
    ];
    if parts.next().is_some() {
        return None;
    }
    Some(values)
}

/// Unsigned decimal number string.
fn parse_zoom(s: &str) -> Option<f64> {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };
    let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !frac_part.map(all_digits).unwrap_or(true) {
        return None;
    }
    s.parse().ok()
}

fn parse_bool_token(s: &str) -> Option<bool> {
    match s {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

fn parse_crop_strategy(s: &str) -> Option<CropStrategy> {
    match s {
        "smart" => Some(CropStrategy::Smart),
        "entropy" => Some(CropStrategy::Entropy),
        "attention" => Some(CropStrategy::Attention),
        _ => None,
    }
}

/// Validate and normalize raw parameters.
///
/// Pure: produces the typed parameter set plus the ordered list of stripped
/// fields, and touches nothing else. Fields not in the recognized table pass
/// through untouched in `raw` and are simply absent here.
pub fn validate(raw: &RawParams) -> (ValidatedParams, Vec<ParamError>) {
    let mut params = ValidatedParams::default();
    let mut errors = Vec::new();

    // One closure per field keeps acceptance table-shaped: parse or strip.
    fn check<T>(
        raw: &RawParams,
        field: &'static str,
        parse: impl Fn(&str) -> Option<T>,
        errors: &mut Vec<ParamError>,
    ) -> Option<T> {
        let value = raw.get(field)?;
        match parse(value) {
            Some(parsed) => Some(parsed),
            None => {
                errors.push(ParamError::new(field));
                None
            }
        }
    }

    params.w = check(raw, "w", parse_positive_int, &mut errors);
    params.h = check(raw, "h", parse_positive_int, &mut errors);
    params.quality = check(raw, "quality", parse_quality, &mut errors);
    params.resize = check(raw, "resize", parse_dim_pair, &mut errors);
    params.fit = check(raw, "fit", parse_dim_pair, &mut errors);
    params.lb = check(raw, "lb", parse_dim_pair, &mut errors);
    params.crop = check(raw, "crop", parse_crop, &mut errors);
    params.crop_strategy = check(raw, "crop_strategy", parse_crop_strategy, &mut errors);
    params.gravity = check(raw, "gravity", Gravity::parse, &mut errors);
    params.zoom = check(raw, "zoom", parse_zoom, &mut errors);
    params.webp = check(raw, "webp", parse_bool_token, &mut errors);
    params.avif = check(raw, "avif", parse_bool_token, &mut errors);
    params.background = check(raw, "background", Color::from_hex, &mut errors);

    (params, errors)
}
