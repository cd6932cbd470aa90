// src/codecs/mod.rs
//
// The built-in pixel backend: mozjpeg/zune-png/libwebp decode routing,
// fast_image_resize resampling, and tuned encoders.

mod backend;
mod decoder;
mod encoder;

pub use backend::{Frame, PixelBackend};
pub use decoder::{check_dimensions, decode_image, detect_exif_orientation};
pub use encoder::{encode_avif, encode_jpeg, encode_png, encode_webp};
