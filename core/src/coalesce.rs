//! Coalescer (C6): buffers contiguous span-blit contributions and flushes
//! them as a single block-blit once they stop being extendable, so the
//! repeat-row optimisation in [`crate::composite`] applies to the coalesced
//! rectangle instead of one row at a time.

use crate::color::{ColorArray, ColorInfo, ColorValue};

/// A source is coalescable when it is a plain fill/quad without a soft
/// mask; anything else (backdrop composite, image, PCL pattern) is
/// processed directly and never passed through here.
#[derive(Debug, Clone)]
struct PendingRect {
    x0: u16,
    y0: u16,
    x1: u16,
    y1: u16,
    color: ColorArray,
    alpha: ColorValue,
    info: ColorInfo,
}

/// The flushed contribution handed to the composite core.
#[derive(Debug, Clone, Copy)]
pub struct BlockBlit<'a> {
    pub x0: u16,
    pub y0: u16,
    pub x1: u16,
    pub y1: u16,
    pub color: &'a ColorArray,
    pub alpha: ColorValue,
    pub info: ColorInfo,
}

#[derive(Default)]
pub struct Coalescer {
    pending: Option<PendingRect>,
}

impl Coalescer {
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Buffers one span; returns a flushed rectangle if the new span could
    /// not be merged with what was pending (the caller composites it, then
    /// this span becomes the new pending rectangle).
    #[must_use]
    pub fn push_span(&mut self, x: u16, y: u16, run_len: u16, color: ColorArray, alpha: ColorValue, info: ColorInfo) -> Option<(u16, u16, u16, u16, ColorArray, ColorValue, ColorInfo)> {
        let x1 = x + run_len;
        if let Some(p) = &mut self.pending {
            let same_paint = p.color == color && p.alpha == alpha && p.info == info;
            if same_paint && p.y0 == y && p.y1 == y + 1 && p.x1 == x {
                // Extends the same row rightward.
                p.x1 = x1;
                return None;
            }
            if same_paint && p.x0 == x && p.x1 == x1 && p.y1 == y {
                // A full-width repeat of the preceding row: grow downward.
                p.y1 = y + 1;
                return None;
            }
        }
        let flushed = self.pending.take().map(|p| (p.x0, p.y0, p.x1, p.y1, p.color, p.alpha, p.info));
        self.pending = Some(PendingRect { x0: x, y0: y, x1, y1: y + 1, color, alpha, info });
        flushed
    }

    /// Flushes any pending rectangle unconditionally, e.g. at `runInfo`
    /// (source change) or region close.
    #[must_use]
    pub fn flush(&mut self) -> Option<(u16, u16, u16, u16, ColorArray, ColorValue, ColorInfo)> {
        self.pending.take().map(|p| (p.x0, p.y0, p.x1, p.y1, p.color, p.alpha, p.info))
    }
}
