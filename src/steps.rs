// src/steps.rs
//
// Pipeline step ordering.
//
// Steps run in original query-parameter order, with two fix-ups:
// - `crop` always moves to the front (a combined crop+resize request must
//   crop first no matter which parameter the caller listed first — and some
//   gateways don't preserve query order for us anyway).
// - `w` and `h` are aliases for one combined scale step, triggered once at
//   the first occurrence of either.

use crate::params::ValidatedParams;

/// Executable transform steps. Dispatch is over this closed enum, never over
/// raw parameter names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Crop,
    Resize,
    Fit,
    Letterbox,
    Scale,
}

impl Step {
    pub fn name(self) -> &'static str {
        match self {
            Self::Crop => "crop",
            Self::Resize => "resize",
            Self::Fit => "fit",
            Self::Letterbox => "lb",
            Self::Scale => "scale",
        }
    }

    fn from_param(name: &str) -> Option<Self> {
        match name {
            "crop" => Some(Self::Crop),
            "resize" => Some(Self::Resize),
            "fit" => Some(Self::Fit),
            "lb" => Some(Self::Letterbox),
            "w" | "h" => Some(Self::Scale),
            _ => None,
        }
    }

    /// A step only executes when its parameter survived validation.
    fn is_armed(self, params: &ValidatedParams) -> bool {
        match self {
            Self::Crop => params.crop.is_some(),
            Self::Resize => params.resize.is_some(),
            Self::Fit => params.fit.is_some(),
            Self::Letterbox => params.lb.is_some(),
            Self::Scale => params.w.is_some() || params.h.is_some(),
        }
    }
}

/// Build the executable step sequence from the original parameter order.
///
/// Non-geometric and unrecognized names are skipped, duplicates collapse to
/// the first occurrence, and `crop` is hoisted to the front.
pub fn build_step_order<'a>(
    order: impl Iterator<Item = &'a str>,
    params: &ValidatedParams,
) -> Vec<Step> {
    let mut steps: Vec<Step> = Vec::new();
    for name in order {
        let Some(step) = Step::from_param(name) else {
            continue;
        };
        if steps.contains(&step) || !step.is_armed(params) {
            continue;
        }
        steps.push(step);
    }
    if let Some(pos) = steps.iter().position(|s| *s == Step::Crop) {
        let crop = steps.remove(pos);
        steps.insert(0, crop);
    }
    steps
}
