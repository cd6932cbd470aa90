// src/backend.rs
//
// Seams to the outside world: the codec backend that owns pixels and the
// saliency service that proposes content-aware crops. The pipeline only
// talks to these traits, so its ordering and dimension bookkeeping can be
// tested against fakes without decoding a single byte.

use crate::error::EngineError;

/// A rectangle on the current image, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// How a resize maps the source onto the target box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitMode {
    /// Fit fully inside the box, aspect preserved, no padding.
    Inside,
    /// Fill the box, aspect preserved, residual cropped at `position`.
    Cover,
    /// Fit inside the box and pad the rest with the background color.
    Contain,
}

/// Anchor for the residual crop a `Cover` resize implies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Gravity {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    #[default]
    Centre,
}

impl Gravity {
    /// Parse one of the nine directional tokens. `center` per the request
    /// parameter contract.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "north" => Some(Self::North),
            "northeast" => Some(Self::NorthEast),
            "east" => Some(Self::East),
            "southeast" => Some(Self::SouthEast),
            "south" => Some(Self::South),
            "southwest" => Some(Self::SouthWest),
            "west" => Some(Self::West),
            "northwest" => Some(Self::NorthWest),
            "center" => Some(Self::Centre),
            _ => None,
        }
    }

    /// Offset of an `inner`-sized window inside an `outer`-sized box.
    pub fn offsets(self, outer: (u32, u32), inner: (u32, u32)) -> (u32, u32) {
        let slack_x = outer.0.saturating_sub(inner.0);
        let slack_y = outer.1.saturating_sub(inner.1);
        let x = match self {
            Self::West | Self::NorthWest | Self::SouthWest => 0,
            Self::East | Self::NorthEast | Self::SouthEast => slack_x,
            _ => slack_x / 2,
        };
        let y = match self {
            Self::North | Self::NorthWest | Self::NorthEast => 0,
            Self::South | Self::SouthWest | Self::SouthEast => slack_y,
            _ => slack_y / 2,
        };
        (x, y)
    }
}

/// Letterbox padding color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const BLACK: Color = Color(0, 0, 0);

    /// Parse `#rgb` or `#rrggbb`, lowercase hex digits only.
    pub fn from_hex(s: &str) -> Option<Self> {
        let digits = s.strip_prefix('#')?;
        let ok = |b: u8| b.is_ascii_digit() || (b'a'..=b'f').contains(&b);
        if !digits.bytes().all(ok) {
            return None;
        }
        let full = match digits.len() {
            3 => digits.bytes().flat_map(|b| [b, b]).collect::<Vec<u8>>(),
            6 => digits.as_bytes().to_vec(),
            _ => return None,
        };
        let full = std::str::from_utf8(&full).ok()?;
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&full[range], 16).ok();
        Some(Color(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

/// Everything the backend needs to perform one resize call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResizeSpec {
    pub width: u32,
    pub height: u32,
    pub fit: FitMode,
    pub position: Gravity,
    pub background: Color,
    pub without_enlargement: bool,
}

/// Output dimensions a [`ResizeSpec`] will produce for a given source.
///
/// This is the single source of truth for resize dimension planning: the
/// pipeline uses it to keep the image state in sync, and the pixel backend
/// uses it to size its buffers.
pub fn plan_resize(src_w: u32, src_h: u32, spec: &ResizeSpec) -> (u32, u32) {
    if src_w == 0 || src_h == 0 {
        return (0, 0);
    }
    let scale_w = spec.width as f64 / src_w as f64;
    let scale_h = spec.height as f64 / src_h as f64;
    match spec.fit {
        FitMode::Inside => {
            let mut scale = scale_w.min(scale_h);
            if spec.without_enlargement {
                scale = scale.min(1.0);
            }
            (
                (src_w as f64 * scale).round() as u32,
                (src_h as f64 * scale).round() as u32,
            )
        }
        FitMode::Cover => {
            let mut scale = scale_w.max(scale_h);
            if spec.without_enlargement {
                scale = scale.min(1.0);
            }
            let resized_w = (src_w as f64 * scale).round() as u32;
            let resized_h = (src_h as f64 * scale).round() as u32;
            (resized_w.min(spec.width), resized_h.min(spec.height))
        }
        // The letterbox canvas is always exactly the target box.
        FitMode::Contain => (spec.width, spec.height),
    }
}

/// Source metadata probed from the encoded bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Lowercase format name (`jpeg`, `png`, `webp`, ...) if detected.
    pub format: Option<String>,
}

/// Output codec decision, produced by the format selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeFormat {
    Jpeg { quality: u8 },
    Png { palette: bool },
    WebP { quality: u8 },
    Avif { quality: u8 },
    /// Re-encode in the source format with backend defaults.
    Source,
}

impl EncodeFormat {
    /// Codec name, or None for source passthrough.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Self::Jpeg { .. } => Some("jpeg"),
            Self::Png { .. } => Some("png"),
            Self::WebP { .. } => Some("webp"),
            Self::Avif { .. } => Some("avif"),
            Self::Source => None,
        }
    }
}

/// The pixel-owning backend. One frame = one decoded image exclusively owned
/// by one transform invocation; the backend itself holds no per-request state.
pub trait CodecBackend {
    type Frame;

    /// Decode the source bytes and probe width/height/format.
    /// Must fail loudly on corrupt input, never emit a blank frame.
    fn decode(&self, bytes: &[u8]) -> Result<(Self::Frame, SourceInfo), EngineError>;

    /// Apply the EXIF orientation embedded in `source`, if any.
    fn auto_rotate(&self, frame: Self::Frame, source: &[u8]) -> Result<Self::Frame, EngineError>;

    /// The EXIF orientation tag (1-8) embedded in `source`, if any.
    /// Values 5-8 swap the probed axes when applied.
    fn orientation(&self, source: &[u8]) -> Option<u16> {
        let _ = source;
        None
    }

    /// Current pixel dimensions of the frame.
    fn dimensions(&self, frame: &Self::Frame) -> (u32, u32);

    /// Resize per `spec`. The output dimensions must match
    /// [`plan_resize`] for the frame's current dimensions.
    fn resize(&self, frame: Self::Frame, spec: &ResizeSpec) -> Result<Self::Frame, EngineError>;

    /// Extract a sub-rectangle. The region must lie within the frame.
    fn extract(&self, frame: Self::Frame, region: Region) -> Result<Self::Frame, EngineError>;

    /// Lossless snapshot of the current frame, for handing to the saliency
    /// service.
    fn snapshot(&self, frame: &Self::Frame) -> Result<Vec<u8>, EngineError>;

    /// Encode the frame with the selected codec.
    fn encode(&self, frame: &Self::Frame, format: &EncodeFormat) -> Result<Vec<u8>, EngineError>;
}

/// Content-aware crop proposals for a target aspect ratio.
pub trait SalientCropService {
    /// Return the most salient region of the image for the given target
    /// dimensions, or None when no proposal is available (the caller then
    /// resizes the uncropped image).
    fn crop(
        &self,
        bytes: &[u8],
        target_width: u32,
        target_height: u32,
    ) -> Result<Option<Region>, EngineError>;
}

/// Saliency service that never proposes a crop. Smart-crop requests fall
/// back to a plain resize.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSaliency;

impl SalientCropService for NoSaliency {
    fn crop(&self, _: &[u8], _: u32, _: u32) -> Result<Option<Region>, EngineError> {
        Ok(None)
    }
}
