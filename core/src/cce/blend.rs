//! Separable and non-separable PDF 1.4 blend modes, plus the two pixel-wise
//! helpers used around them: removing a non-isolated group's backdrop
//! contribution, and the fractional-shape weighted average.
//!
//! Modeled as a per-pixel blend-mode switch over demultiplied `f32`
//! channels for clarity; callers convert via
//! [`crate::color::ColorValue::to_f32`]/`from_f32` at the boundary.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    #[must_use]
    pub const fn is_separable(self) -> bool {
        !matches!(self, Self::Hue | Self::Saturation | Self::Color | Self::Luminosity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
}

/// `B(cb, cs)` for one of the twelve separable blend modes, operating on a
/// single demultiplied channel in `[0, 1]`.
#[must_use]
pub fn separable(mode: BlendMode, cb: f32, cs: f32) -> f32 {
    match mode {
        BlendMode::Normal => cs,
        BlendMode::Multiply => cb * cs,
        BlendMode::Screen => cb + cs - cb * cs,
        BlendMode::Overlay => separable(BlendMode::HardLight, cs, cb),
        BlendMode::Darken => cb.min(cs),
        BlendMode::Lighten => cb.max(cs),
        BlendMode::ColorDodge => color_dodge(cb, cs),
        BlendMode::ColorBurn => color_burn(cb, cs),
        BlendMode::HardLight => {
            if cs <= 0.5 {
                separable(BlendMode::Multiply, cb, 2.0 * cs)
            } else {
                separable(BlendMode::Screen, cb, 2.0 * cs - 1.0)
            }
        }
        BlendMode::SoftLight => soft_light(cb, cs),
        BlendMode::Difference => (cb - cs).abs(),
        BlendMode::Exclusion => cb + cs - 2.0 * cb * cs,
        // Non-separable modes are dispatched through `nonseparable_rgb`;
        // treat them as Normal if reached here directly (Gray collapse).
        BlendMode::Hue | BlendMode::Saturation | BlendMode::Color | BlendMode::Luminosity => cs,
    }
}

fn color_dodge(cb: f32, cs: f32) -> f32 {
    if cb == 0.0 {
        0.0
    } else if cs >= 1.0 {
        1.0
    } else {
        (cb / (1.0 - cs)).min(1.0)
    }
}

fn color_burn(cb: f32, cs: f32) -> f32 {
    if cb >= 1.0 {
        1.0
    } else if cs == 0.0 {
        0.0
    } else {
        1.0 - ((1.0 - cb) / cs).min(1.0)
    }
}

fn soft_light_d(x: f32) -> f32 {
    if x <= 0.25 {
        ((16.0 * x - 12.0) * x + 4.0) * x
    } else {
        x.sqrt()
    }
}

fn soft_light(cb: f32, cs: f32) -> f32 {
    if cs <= 0.5 {
        cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
    } else {
        cb + (2.0 * cs - 1.0) * (soft_light_d(cb) - cb)
    }
}

fn lum(c: [f32; 3]) -> f32 {
    0.3 * c[0] + 0.59 * c[1] + 0.11 * c[2]
}

fn clip_color(c: [f32; 3]) -> [f32; 3] {
    let l = lum(c);
    let n = c[0].min(c[1]).min(c[2]);
    let x = c[0].max(c[1]).max(c[2]);
    let mut out = c;
    if n < 0.0 {
        for v in &mut out {
            *v = l + (*v - l) * l / (l - n);
        }
    }
    if x > 1.0 {
        for v in &mut out {
            *v = l + (*v - l) * (1.0 - l) / (x - l);
        }
    }
    out
}

fn set_lum(c: [f32; 3], l: f32) -> [f32; 3] {
    let d = l - lum(c);
    clip_color([c[0] + d, c[1] + d, c[2] + d])
}

fn sat(c: [f32; 3]) -> f32 {
    c[0].max(c[1]).max(c[2]) - c[0].min(c[1]).min(c[2])
}

fn set_sat(c: [f32; 3], s: f32) -> [f32; 3] {
    let mut idx = [0usize, 1, 2];
    idx.sort_by(|&a, &b| c[a].partial_cmp(&c[b]).unwrap());
    let (min_i, mid_i, max_i) = (idx[0], idx[1], idx[2]);
    let mut out = [0.0f32; 3];
    if c[max_i] > c[min_i] {
        out[mid_i] = (c[mid_i] - c[min_i]) * s / (c[max_i] - c[min_i]);
        out[max_i] = s;
    }
    out[min_i] = 0.0;
    out
}

/// The four non-separable blend modes, defined only over RGB triples.
#[must_use]
pub fn nonseparable_rgb(mode: BlendMode, cb: [f32; 3], cs: [f32; 3]) -> [f32; 3] {
    match mode {
        BlendMode::Hue => set_lum(set_sat(cs, sat(cb)), lum(cb)),
        BlendMode::Saturation => set_lum(set_sat(cb, sat(cs)), lum(cb)),
        BlendMode::Color => set_lum(cs, lum(cb)),
        BlendMode::Luminosity => set_lum(cb, lum(cs)),
        _ => cs,
    }
}

/// Applies `mode` over `backdrop`/`source` channel vectors in `space`.
/// Gray collapses non-separable modes to Normal; CMYK converts its C/M/Y
/// triple to a pseudo-RGB complement for the non-separable formulas and
/// keeps K from whichever operand the PDF 1.4 spec designates per mode
/// (backdrop's K for Hue/Saturation/Color, source's K for Luminosity).
#[must_use]
pub fn apply_blend(mode: BlendMode, space: ColorSpace, backdrop: &[f32], source: &[f32]) -> Vec<f32> {
    match space {
        ColorSpace::Gray => {
            vec![if mode.is_separable() { separable(mode, backdrop[0], source[0]) } else { source[0] }]
        }
        ColorSpace::Rgb => {
            if mode.is_separable() {
                (0..3).map(|i| separable(mode, backdrop[i], source[i])).collect()
            } else {
                nonseparable_rgb(mode, [backdrop[0], backdrop[1], backdrop[2]], [source[0], source[1], source[2]]).to_vec()
            }
        }
        ColorSpace::Cmyk => {
            if mode.is_separable() {
                (0..4).map(|i| separable(mode, backdrop[i], source[i])).collect()
            } else {
                let cb_rgb = [1.0 - backdrop[0], 1.0 - backdrop[1], 1.0 - backdrop[2]];
                let cs_rgb = [1.0 - source[0], 1.0 - source[1], 1.0 - source[2]];
                let result_rgb = nonseparable_rgb(mode, cb_rgb, cs_rgb);
                let k = if matches!(mode, BlendMode::Luminosity) { source[3] } else { backdrop[3] };
                vec![1.0 - result_rgb[0], 1.0 - result_rgb[1], 1.0 - result_rgb[2], k]
            }
        }
    }
}

/// `cceRemoveBackdropContribution`: recovers a non-isolated source's own
/// contribution by subtracting the initial backdrop's share back out of an
/// already-composited (demultiplied) channel (PDF 1.4 §11.4.6).
#[must_use]
pub fn remove_backdrop_contribution(composited: f32, initial: f32, initial_alpha: f32, group_alpha: f32) -> f32 {
    if group_alpha <= 0.0 {
        return composited;
    }
    composited + (composited - initial) * (initial_alpha / group_alpha - 1.0)
}

/// Blends the fully composited result toward the immediate background by
/// the fractional shape value.
#[must_use]
pub fn weighted_average(composited: f32, background: f32, shape: f32) -> f32 {
    background + shape * (composited - background)
}
