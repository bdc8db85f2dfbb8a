//! Per-pixel (per-run) composite dispatch: the PDF 1.4 compose formula plus
//! the non-isolated group-alpha and shape-weighted-average extensions.
//!
//! A source's polymorphic blend behavior is replaced here by one
//! parametrized function; the choice of which extensions apply is captured
//! once per source object in [`crate::context::SourceState`] rather than
//! re-derived per pixel.

use crate::cce::blend::{apply_blend, remove_backdrop_contribution, weighted_average, BlendMode, ColorSpace};
use crate::cce::overprint::OverprintParams;
use crate::cce::rop::rop_channel;
use crate::color::{ColorInfo, ColorValue};

/// One premultiplied-or-demultiplied-consistent pixel value being composed.
#[derive(Debug, Clone)]
pub struct PixelInput {
    pub color: Vec<f32>,
    pub alpha: f32,
    pub group_alpha: f32,
    pub shape: f32,
    pub info: ColorInfo,
}

#[derive(Debug, Clone)]
pub struct PixelResult {
    pub color: Vec<f32>,
    pub alpha: f32,
    pub group_alpha: f32,
    pub info: ColorInfo,
    /// `false` means the source didn't contribute at all (label=0 or fully
    /// transparent non-knockout source): the caller should leave the
    /// background untouched.
    pub drew: bool,
}

/// Parameters captured once per source object by `runInfo`.
#[derive(Debug, Clone, Copy)]
pub struct DispatchParams {
    pub mode: BlendMode,
    pub space: ColorSpace,
    pub non_isolated: bool,
    pub shape_aware: bool,
    pub knockout: bool,
    /// Per-channel overprint resolution, applied after the normal blend
    /// path; mutually exclusive with `pcl_rop` (ROP wins if both are set).
    pub overprint: Option<OverprintParams>,
    /// A PCL raster-op code, applied in place of the normal blend path
    /// entirely: `rop(source, source, background, code)` per channel, with
    /// the texture operand standing in for source (the well-known ROP3
    /// codes this engine exposes don't depend on a distinct pattern).
    pub pcl_rop: Option<u8>,
}

/// The full per-pixel compose sequence, operating on one run's worth of
/// (source, background) since every pixel in a run shares the same inputs
/// by construction.
#[must_use]
pub fn composite_color(params: DispatchParams, source: &PixelInput, background: &PixelInput, immediate_background: &PixelInput, initial: Option<&PixelInput>) -> PixelResult {
    if source.info.is_unlabelled() || (source.alpha == 0.0 || source.shape == 0.0) && !params.knockout {
        return PixelResult { color: background.color.clone(), alpha: background.alpha, group_alpha: background.group_alpha, info: background.info, drew: false };
    }

    let mut source_color = source.color.clone();
    if params.non_isolated {
        if let Some(initial) = initial {
            for (i, c) in source_color.iter_mut().enumerate() {
                *c = remove_backdrop_contribution(*c, initial.color[i], initial.alpha, source.group_alpha.max(1e-6));
            }
        }
    }

    let (mut color, mut alpha) = blend_compose(params.mode, params.space, &source_color, source.alpha, &background.color, background.alpha);

    let group_alpha = if params.non_isolated {
        let (_, ga) = blend_compose(params.mode, params.space, &source_color, source.alpha, &background.color, background.group_alpha);
        ga
    } else {
        alpha
    };

    if params.shape_aware {
        for (i, c) in color.iter_mut().enumerate() {
            *c = weighted_average(*c, immediate_background.color[i], source.shape);
        }
        alpha = weighted_average(alpha, immediate_background.alpha, source.shape);
    }

    if let Some(code) = params.pcl_rop {
        let src: Vec<ColorValue> = source.color.iter().map(|&c| ColorValue::from_f32(c)).collect();
        let dest: Vec<ColorValue> = background.color.iter().map(|&c| ColorValue::from_f32(c)).collect();
        color = src.iter().zip(&dest).map(|(&s, &d)| rop_channel(s, s, d, code).to_f32()).collect();
        alpha = 1.0;
    } else if let Some(overprint) = &params.overprint {
        let src: Vec<ColorValue> = color.iter().map(|&c| ColorValue::from_f32(c)).collect();
        let dest: Vec<ColorValue> = background.color.iter().map(|&c| ColorValue::from_f32(c)).collect();
        color = overprint.resolve(&src, &dest).iter().map(|c| c.to_f32()).collect();
    }

    let mut info = background.info;
    info.pixel_label |= source.info.pixel_label;
    if !source.info.is_unlabelled() {
        info.color_type = source.info.color_type;
        info.rendering_intent = source.info.rendering_intent;
    }

    PixelResult { color, alpha, group_alpha, info, drew: true }
}

/// The PDF 1.4 compose formula, reused for both the ordinary alpha channel
/// and, with a different background alpha argument, the group-alpha
/// channel. `cb` is premultiplied (table storage convention throughout
/// insert mode); `apply_blend` itself wants demultiplied channels, so a
/// demultiplied copy is built just for that call, while the outer
/// Porter-Duff terms use the premultiplied value directly.
fn blend_compose(mode: BlendMode, space: ColorSpace, cs: &[f32], alpha_s: f32, cb: &[f32], alpha_b: f32) -> (Vec<f32>, f32) {
    let cb_demult: Vec<f32> = cb.iter().map(|&c| if alpha_b > 0.0 { (c / alpha_b).clamp(0.0, 1.0) } else { 0.0 }).collect();
    let blended = apply_blend(mode, space, &cb_demult, cs);
    let alpha_r = alpha_s + alpha_b - alpha_s * alpha_b;
    let color = (0..cs.len())
        .map(|i| (1.0 - alpha_s) * cb[i] + (1.0 - alpha_b) * cs[i] * alpha_s + alpha_s * alpha_b * blended[i])
        .collect();
    (color, alpha_r)
}
