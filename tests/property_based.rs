use pixelgate::engine::{run_pipeline, ImageState};
use pixelgate::quality::{zoom_default_quality, DEFAULT_QUALITY};
use pixelgate::{
    build_step_order, plan_resize, validate, CodecBackend, Color, EncodeFormat, EngineError,
    FitMode, Gravity, NoSaliency, RawParams, Region, ResizeSpec, SourceInfo,
};
use proptest::prelude::*;
use std::cell::Cell;

/// Dimensional backend that remembers the last extracted region.
struct RegionRecorder {
    region: Cell<Option<Region>>,
}

impl CodecBackend for RegionRecorder {
    type Frame = (u32, u32);

    fn decode(&self, _: &[u8]) -> Result<(Self::Frame, SourceInfo), EngineError> {
        unimplemented!("these tests never decode")
    }

    fn auto_rotate(&self, frame: Self::Frame, _: &[u8]) -> Result<Self::Frame, EngineError> {
        Ok(frame)
    }

    fn dimensions(&self, frame: &Self::Frame) -> (u32, u32) {
        *frame
    }

    fn resize(&self, frame: Self::Frame, spec: &ResizeSpec) -> Result<Self::Frame, EngineError> {
        Ok(plan_resize(frame.0, frame.1, spec))
    }

    fn extract(&self, _: Self::Frame, region: Region) -> Result<Self::Frame, EngineError> {
        self.region.set(Some(region));
        Ok((region.width, region.height))
    }

    fn snapshot(&self, _: &Self::Frame) -> Result<Vec<u8>, EngineError> {
        Ok(Vec::new())
    }

    fn encode(&self, _: &Self::Frame, _: &EncodeFormat) -> Result<Vec<u8>, EngineError> {
        Ok(Vec::new())
    }
}

fn crop_component(value: u32, px: bool) -> String {
    if px {
        format!("{value}px")
    } else {
        value.to_string()
    }
}

/// Mirrors how one crop component resolves against a dimension.
fn resolved(value: u32, px: bool, dimension: u32) -> u32 {
    if px {
        value
    } else {
        (dimension as f64 * (value as f64 / 100.0)).round() as u32
    }
}

fn arbitrary_spec(fit: FitMode) -> impl Strategy<Value = ResizeSpec> {
    (1u32..=4096, 1u32..=4096).prop_map(move |(width, height)| ResizeSpec {
        width,
        height,
        fit,
        position: Gravity::Centre,
        background: Color::BLACK,
        without_enlargement: true,
    })
}

proptest! {
    #[test]
    fn inside_plan_fits_the_box_and_never_enlarges(
        src_w in 1u32..=4096,
        src_h in 1u32..=4096,
        spec in arbitrary_spec(FitMode::Inside),
    ) {
        let (out_w, out_h) = plan_resize(src_w, src_h, &spec);
        prop_assert!(out_w <= spec.width.max(src_w));
        prop_assert!(out_h <= spec.height.max(src_h));
        prop_assert!(out_w <= src_w);
        prop_assert!(out_h <= src_h);
    }

    #[test]
    fn cover_plan_never_exceeds_box_or_source(
        src_w in 1u32..=4096,
        src_h in 1u32..=4096,
        spec in arbitrary_spec(FitMode::Cover),
    ) {
        let (out_w, out_h) = plan_resize(src_w, src_h, &spec);
        prop_assert!(out_w <= spec.width);
        prop_assert!(out_h <= spec.height);
        prop_assert!(out_w <= src_w);
        prop_assert!(out_h <= src_h);
    }

    #[test]
    fn contain_plan_is_exactly_the_box(
        src_w in 1u32..=4096,
        src_h in 1u32..=4096,
        spec in arbitrary_spec(FitMode::Contain),
    ) {
        prop_assert_eq!(plan_resize(src_w, src_h, &spec), (spec.width, spec.height));
    }

    #[test]
    fn inside_plan_roughly_preserves_aspect(
        src_w in 16u32..=4096,
        src_h in 16u32..=4096,
        spec in arbitrary_spec(FitMode::Inside),
    ) {
        let (out_w, out_h) = plan_resize(src_w, src_h, &spec);
        prop_assume!(out_w > 8 && out_h > 8);
        let src_aspect = src_w as f64 / src_h as f64;
        let out_aspect = out_w as f64 / out_h as f64;
        // Rounding each axis independently moves the ratio by at most ~1px
        // per axis.
        let tolerance = src_aspect * (1.0 / out_w as f64 + 1.0 / out_h as f64 + 0.01);
        prop_assert!((src_aspect - out_aspect).abs() <= tolerance,
            "aspect drifted: {src_aspect} -> {out_aspect} for {src_w}x{src_h} into {}x{}",
            spec.width, spec.height);
    }

    #[test]
    fn validation_never_panics_on_arbitrary_values(
        value in "\\PC*",
        field_idx in 0usize..13,
    ) {
        let fields = [
            "w", "h", "quality", "resize", "fit", "lb", "crop",
            "crop_strategy", "gravity", "zoom", "webp", "avif", "background",
        ];
        let raw = RawParams::from_pairs([(fields[field_idx], value.as_str())]);
        let (_, errors) = validate(&raw);
        // Either the value parsed or exactly this field was stripped.
        prop_assert!(errors.len() <= 1);
        if let Some(err) = errors.first() {
            prop_assert_eq!(err.field, fields[field_idx]);
        }
    }

    #[test]
    fn stripped_fields_report_the_contract_message(
        garbage in "[^0-9]{1,12}",
    ) {
        let raw = RawParams::from_pairs([("w", garbage.as_str())]);
        let (params, errors) = validate(&raw);
        prop_assert_eq!(params.w, None);
        prop_assert_eq!(errors.len(), 1);
        prop_assert_eq!(errors[0].message.as_str(), "w arg is not valid");
    }

    #[test]
    fn crop_rectangle_always_lands_inside_the_image(
        img_w in 1u32..=64,
        img_h in 1u32..=64,
        x in 0u32..=300,
        x_px in any::<bool>(),
        y in 0u32..=300,
        y_px in any::<bool>(),
        w in 0u32..=300,
        w_px in any::<bool>(),
        h in 0u32..=300,
        h_px in any::<bool>(),
    ) {
        let crop = format!(
            "{},{},{},{}",
            crop_component(x, x_px),
            crop_component(y, y_px),
            crop_component(w, w_px),
            crop_component(h, h_px),
        );
        let raw = RawParams::from_pairs([("crop", crop.as_str())]);
        let (params, errors) = validate(&raw);
        prop_assert!(errors.is_empty(), "crop {:?} failed validation", crop);

        let steps = build_step_order(raw.order(), &params);
        let backend = RegionRecorder { region: Cell::new(None) };
        let mut state = ImageState::new(img_w, img_h, false);
        let result = run_pipeline(
            &backend,
            &NoSaliency,
            (img_w, img_h),
            &mut state,
            &steps,
            &params,
            params.effective_zoom(),
        );

        match result {
            Ok(_) => {
                let region = backend.region.get();
                prop_assert!(region.is_some(), "crop {:?} completed without extracting", crop);
                let region = region.unwrap();
                prop_assert!(region.width >= 1 && region.height >= 1);
                prop_assert!(region.left + region.width <= img_w,
                    "crop {:?} escaped {img_w}x{img_h} horizontally: {region:?}", crop);
                prop_assert!(region.top + region.height <= img_h,
                    "crop {:?} escaped {img_w}x{img_h} vertically: {region:?}", crop);
                prop_assert_eq!((state.width, state.height), (region.width, region.height));
            }
            // Fatal only when the clamped origin lands on the far edge.
            Err(EngineError::InvalidStepDimensions { .. }) => {
                prop_assert!(
                    resolved(x, x_px, img_w) >= img_w || resolved(y, y_px, img_h) >= img_h,
                    "crop {:?} on {img_w}x{img_h} failed without an out-of-bounds origin", crop
                );
            }
            Err(other) => prop_assert!(false, "crop {:?}: unexpected error {other:?}", crop),
        }
    }

    #[test]
    fn zoom_quality_stays_within_curve_bounds(
        base in 1u8..=100,
        zoom_times_ten in 1u32..=100,
    ) {
        let zoom = zoom_times_ten as f64 / 10.0;
        let q = zoom_default_quality(base, zoom);
        prop_assert!(q >= 1, "quality {q} below floor for base={base} zoom={zoom}");
        prop_assert!(q <= base, "quality {q} above base={base} for zoom={zoom}");
    }

    #[test]
    fn zoom_quality_is_monotonic_in_zoom(
        zoom_times_ten in 11u32..=90,
    ) {
        let lower = zoom_default_quality(DEFAULT_QUALITY, zoom_times_ten as f64 / 10.0);
        let higher = zoom_default_quality(DEFAULT_QUALITY, (zoom_times_ten + 10) as f64 / 10.0);
        prop_assert!(higher <= lower,
            "deeper zoom must not raise quality: z={} -> {lower}, z+1 -> {higher}",
            zoom_times_ten as f64 / 10.0);
    }
}
