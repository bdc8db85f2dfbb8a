//! Color values, per-sample info, and the color-conversion seam.
//!
//! A [`ColorValue`] is a 16-bit fixed-point channel in `[0, COLORVALUE_ONE]`.
//! Colors stored in insert-mode tables are premultiplied by alpha; alpha is
//! divided out exactly once, at block completion (or folded into a final
//! page composite for `compositeToPage` stores).

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{BackdropError, Result};

/// The maximum number of colorants a single table entry can carry. Most
/// groups run CMYK or fewer, but the colorant set is per-group and can run
/// to a small spot-color list.
pub const MAX_COMPONENTS: usize = 32;

/// Upper bound of a [`ColorValue`] channel.
pub const COLORVALUE_ONE: u16 = 0xFFFF;

/// A single premultiplied (or, transiently, demultiplied) color channel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColorValue(pub u16);

impl ColorValue {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(COLORVALUE_ONE);

    #[must_use]
    pub fn from_f32(v: f32) -> Self {
        Self((v.clamp(0.0, 1.0) * f32::from(COLORVALUE_ONE)).round() as u16)
    }

    #[must_use]
    pub fn to_f32(self) -> f32 {
        f32::from(self.0) / f32::from(COLORVALUE_ONE)
    }

    /// Multiply this channel by an alpha/shape/groupAlpha value in the same
    /// fixed-point range, rounding to nearest.
    #[must_use]
    pub fn multiply(self, alpha: Self) -> Self {
        let product = u32::from(self.0) * u32::from(alpha.0);
        Self(((product + u32::from(COLORVALUE_ONE) / 2) / u32::from(COLORVALUE_ONE)) as u16)
    }

    /// Divide this (premultiplied) channel by alpha, the left inverse of
    /// [`ColorValue::multiply`] for `alpha > 0`. Division by zero yields
    /// zero.
    #[must_use]
    pub fn divide(self, alpha: Self) -> Self {
        if alpha.0 == 0 {
            return Self::ZERO;
        }
        let numerator = u32::from(self.0) * u32::from(COLORVALUE_ONE);
        let result = numerator / u32::from(alpha.0);
        Self(result.min(u32::from(COLORVALUE_ONE)) as u16)
    }
}

/// A bounded run of color channels; `SmallVec` avoids a heap allocation on
/// the common 1-4 colorant path while still supporting a full spot-color
/// list up to [`MAX_COMPONENTS`].
pub type ColorArray = SmallVec<[ColorValue; 4]>;

/// Rendering intent, mirrored from the PDF/PostScript color management
/// model. Stored byte-exact in [`ColorInfo`] for equality purposes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RenderingIntent {
    #[default]
    Perceptual = 0,
    RelativeColorimetric = 1,
    Saturation = 2,
    AbsoluteColorimetric = 3,
}

impl RenderingIntent {
    #[must_use]
    pub const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::RelativeColorimetric,
            2 => Self::Saturation,
            3 => Self::AbsoluteColorimetric,
            _ => Self::Perceptual,
        }
    }
}

/// Opaque per-sample attributes carried alongside color+alpha in every
/// table entry.
///
/// Equality is byte-exact. A zero `label` denotes "no object contributes
/// here" and short-circuits several operations (composite dispatch,
/// background loading).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorInfo {
    pub spot_number: u16,
    pub color_type: u8,
    pub rendering_intent: RenderingIntent,
    pub black_type: u8,
    pub reproduction_model: u8,
    /// Zero means "nothing drawn here yet".
    pub pixel_label: u32,
    pub flags: ColorInfoFlags,
}

impl ColorInfo {
    #[must_use]
    pub const fn is_unlabelled(&self) -> bool {
        self.pixel_label == 0
    }

    /// Words hashed by [`crate::table::Table::hash_val`], kept in a stable
    /// order so the hash is reproducible across runs.
    #[must_use]
    pub fn hash_words(&self) -> [u32; 2] {
        let w0 = u32::from(self.spot_number)
            | (u32::from(self.color_type) << 16)
            | (u32::from(self.rendering_intent as u8) << 24);
        let w1 = self.pixel_label ^ (u32::from(self.black_type) << 8)
            | (u32::from(self.reproduction_model) << 16)
            | (u32::from(self.flags.0) << 24);
        [w0, w1]
    }
}

/// Per-sample bit flags (independence from the page group, PCL-object
/// marker, etc.), packed into one byte so [`ColorInfo`] stays small and
/// `Copy`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorInfoFlags(pub u8);

impl ColorInfoFlags {
    pub const INDEPENDENT: u8 = 1 << 0;
    pub const PCL_OBJECT: u8 = 1 << 1;
    pub const TRAPPED: u8 = 1 << 2;

    #[must_use]
    pub const fn has(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    pub fn set(&mut self, bit: u8, value: bool) {
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

/// Output pixel format chosen for a converted table: 8-bit or 16-bit
/// samples.
#[derive(Debug, Clone)]
pub enum ConvertedOutput {
    Bytes8(Vec<u8>),
    Bytes16(Vec<u16>),
}

/// The color-conversion batch call invoked on block completion.
/// Implemented externally by the embedding RIP; the crate treats it as a
/// black box.
pub trait ColorConverter {
    /// Number of output components this converter produces per input entry.
    fn out_components(&self) -> usize;

    /// Whether outputs should be written as 8-bit or 16-bit samples.
    fn out_is_8_bit(&self) -> bool;

    /// Convert `nUsedSlots` input entries (one [`ColorArray`] + [`ColorInfo`]
    /// per used slot) into the output buffer. `out` is pre-sized to
    /// `inputs.len() * out_components()` samples of the right width.
    fn convert(&self, infos: &[ColorInfo], colors_in: &[ColorArray], out: &mut ConvertedOutput) -> Result<()>;
}

/// Identity converter used by tests and the demo binary: truncates each
/// 16-bit channel to 8 bits, or passes it through unchanged for 16-bit
/// output.
pub struct PassthroughConverter {
    pub out_comps: usize,
    pub eight_bit: bool,
}

impl ColorConverter for PassthroughConverter {
    fn out_components(&self) -> usize {
        self.out_comps
    }

    fn out_is_8_bit(&self) -> bool {
        self.eight_bit
    }

    fn convert(&self, _infos: &[ColorInfo], colors_in: &[ColorArray], out: &mut ConvertedOutput) -> Result<()> {
        match out {
            ConvertedOutput::Bytes8(buf) => {
                if buf.len() != colors_in.len() * self.out_comps {
                    return Err(BackdropError::Programmer("convert: output buffer mis-sized"));
                }
                for (entry, chunk) in colors_in.iter().zip(buf.chunks_mut(self.out_comps)) {
                    for (c, out_byte) in entry.iter().take(self.out_comps).zip(chunk.iter_mut()) {
                        *out_byte = (c.0 >> 8) as u8;
                    }
                }
                Ok(())
            }
            ConvertedOutput::Bytes16(buf) => {
                if buf.len() != colors_in.len() * self.out_comps {
                    return Err(BackdropError::Programmer("convert: output buffer mis-sized"));
                }
                for (entry, chunk) in colors_in.iter().zip(buf.chunks_mut(self.out_comps)) {
                    for (c, out_word) in entry.iter().take(self.out_comps).zip(chunk.iter_mut()) {
                        *out_word = c.0;
                    }
                }
                Ok(())
            }
        }
    }
}
