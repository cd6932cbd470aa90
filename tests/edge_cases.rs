// Degenerate and boundary inputs through the full engine.

use image::{DynamicImage, ImageFormat, RgbImage};
use pixelgate::{EngineError, PixelBackend, RawParams, TransformEngine};
use std::io::Cursor;

fn engine() -> TransformEngine<PixelBackend> {
    TransformEngine::new(PixelBackend::new())
}

fn png_source(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn zero_target_resize_is_fatal() {
    let source = png_source(100, 100);
    let raw = RawParams::from_pairs([("resize", "0,0")]);
    let err = engine().transform(&source, &raw).unwrap_err();
    assert!(matches!(err, EngineError::InvalidStepDimensions { .. }));
}

#[test]
fn crop_origin_on_the_far_edge_is_fatal() {
    let source = png_source(100, 50);
    // x = 100% of the width leaves no horizontal extent at all.
    let raw = RawParams::from_pairs([("crop", "100,0,50,50")]);
    let err = engine().transform(&source, &raw).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidStepDimensions { step: "crop", .. }
    ));
}

#[test]
fn oversized_crop_clamps_to_the_image() {
    let source = png_source(100, 50);
    let raw = RawParams::from_pairs([("crop", "50,0,100,100")]);
    let result = engine().transform(&source, &raw).unwrap();
    // Origin at x=50; the requested 100% extent clamps to the remainder.
    assert_eq!((result.width, result.height), (50, 50));
}

#[test]
fn zoom_zero_behaves_like_zoom_one() {
    let source = png_source(200, 100);
    let plain = engine()
        .transform(&source, &RawParams::from_pairs([("w", "100")]))
        .unwrap();
    let zoomed = engine()
        .transform(
            &source,
            &RawParams::from_pairs([("w", "100"), ("zoom", "0")]),
        )
        .unwrap();
    assert_eq!((plain.width, plain.height), (zoomed.width, zoomed.height));
    assert!(zoomed.errors.is_empty());
}

#[test]
fn unknown_parameters_are_inert() {
    let source = png_source(80, 40);
    let raw = RawParams::from_pairs([
        ("X-Amz-Signature", "deadbeef"),
        ("utm_source", "newsletter"),
        ("w", "40"),
    ]);
    let result = engine().transform(&source, &raw).unwrap();
    assert_eq!((result.width, result.height), (40, 20));
    assert!(result.errors.is_empty());
}

#[test]
fn duplicate_parameters_apply_once() {
    let source = png_source(400, 400);
    let raw = RawParams::from_pairs([("w", "200"), ("w", "100")]);
    let result = engine().transform(&source, &raw).unwrap();
    // First value wins; the step is not applied twice.
    assert_eq!((result.width, result.height), (200, 200));
}

#[test]
fn one_pixel_image_survives_every_step_kind() {
    let source = png_source(1, 1);
    for raw in [
        RawParams::from_pairs([("w", "100")]),
        RawParams::from_pairs([("fit", "10,10")]),
        RawParams::from_pairs([("resize", "10,10")]),
    ] {
        let result = engine().transform(&source, &raw).unwrap();
        assert_eq!((result.width, result.height), (1, 1));
    }
}

#[test]
fn letterbox_beyond_output_limits_fails_instead_of_allocating() {
    let source = png_source(1, 1);
    let raw = RawParams::from_pairs([("lb", "4294967295px,4294967295px")]);
    let err = engine().transform(&source, &raw).unwrap_err();
    assert!(matches!(err, EngineError::DimensionExceedsLimit { .. }));

    let raw = RawParams::from_pairs([("lb", "32000,32000")]);
    let err = engine().transform(&source, &raw).unwrap_err();
    assert!(matches!(err, EngineError::PixelCountExceedsLimit { .. }));
}

#[test]
fn letterbox_enlarges_the_canvas_but_not_the_pixels() {
    let source = png_source(10, 10);
    let raw = RawParams::from_pairs([("lb", "100,40")]);
    let result = engine().transform(&source, &raw).unwrap();
    assert_eq!((result.width, result.height), (100, 40));
}

#[test]
fn truncated_source_bytes_are_a_decode_error() {
    let mut source = png_source(64, 64);
    source.truncate(source.len() / 3);
    assert!(matches!(
        engine().transform(&source, &RawParams::new()),
        Err(EngineError::DecodeFailed { .. })
    ));
}

#[test]
fn empty_source_is_a_decode_error() {
    assert!(engine().transform(&[], &RawParams::new()).is_err());
}

#[test]
fn invalid_zoom_is_stripped_not_fatal() {
    let source = png_source(100, 100);
    let raw = RawParams::from_pairs([("zoom", "2x"), ("w", "50")]);
    let result = engine().transform(&source, &raw).unwrap();
    assert_eq!((result.width, result.height), (50, 50));
    assert_eq!(result.errors, vec!["zoom arg is not valid".to_string()]);
}

#[test]
fn explicit_crop_switches_scaling_to_cover() {
    // With a crop in the request, w+h fill the box exactly; the residual
    // is cropped at the centre.
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(200, 100, |x, _| {
        if x < 100 {
            image::Rgb([255, 0, 0])
        } else {
            image::Rgb([0, 0, 255])
        }
    }));
    let mut source = Vec::new();
    img.write_to(&mut Cursor::new(&mut source), ImageFormat::Png)
        .unwrap();

    let raw = RawParams::from_pairs([("w", "100"), ("h", "100"), ("crop", "0,0,100,100")]);
    let result = engine().transform(&source, &raw).unwrap();
    assert_eq!((result.width, result.height), (100, 100));
}
