//! Composite context (C5): the per-thread compositing workspace held for
//! the duration of one region.

use crate::cce::blend::BlendMode;
use crate::coalesce::Coalescer;
use crate::color::{ColorInfo, RenderingIntent};
use crate::composite::dispatch::DispatchParams;

/// `(xiNext, yiNext)` hints: short-circuit the per-line setup when
/// successive inserts target the same block and advance monotonically.
/// Invalidated on block or source change.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hints {
    pub xi_next: Option<u16>,
    pub yi_next: Option<u16>,
}

impl Hints {
    pub fn invalidate(&mut self) {
        self.xi_next = None;
        self.yi_next = None;
    }
}

/// State declared once per source object by `runInfo`, consumed by every
/// `compositeSpan`/`compositeBlock`/`compositeBackdrop` call until the next
/// `runInfo`.
#[derive(Debug, Clone, Copy)]
pub struct SourceState {
    pub blend_mode: BlendMode,
    pub color_type: u8,
    pub rendering_intent: RenderingIntent,
    pub black_type: u8,
    pub reproduction_model: u8,
    pub independent: bool,
    pub pixel_label: u32,
    pub overprint: bool,
    pub soft_mask: bool,
    pub pcl_active: bool,
    pub force_process_kos: bool,
    /// Whether this source may be buffered through the coalescer (a plain
    /// fill/quad without a soft mask).
    pub coalescable: bool,
}

impl SourceState {
    #[must_use]
    pub fn info(&self) -> ColorInfo {
        ColorInfo {
            color_type: self.color_type,
            rendering_intent: self.rendering_intent,
            black_type: self.black_type,
            reproduction_model: self.reproduction_model,
            pixel_label: self.pixel_label,
            ..Default::default()
        }
    }
}

/// Per-thread workspace: one context is held for the duration of a
/// worker's region.
#[derive(Default)]
pub struct CompositeContext {
    pub coalesce: Coalescer,
    pub source: Option<SourceState>,
    /// The dispatch parameters active while whatever is currently pending in
    /// `coalesce` was accumulated — needed because a flush happens on the
    /// *next* source's `runInfo` call, by which point `source` has already
    /// moved on.
    pub dispatch: Option<DispatchParams>,
    pub hints: Hints,
    /// Whether this context has grabbed its page-start safety reserve.
    pub reserve_grabbed: bool,
}

impl CompositeContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `runInfo`: flush whatever the coalescer had pending under the
    /// previous source (paired with the dispatch params that were active
    /// while it accumulated), then install the new source state and
    /// invalidate the block-change hints.
    #[allow(clippy::type_complexity)]
    pub fn run_info(
        &mut self,
        dispatch: DispatchParams,
        source: SourceState,
    ) -> Option<(u16, u16, u16, u16, crate::color::ColorArray, crate::color::ColorValue, ColorInfo, DispatchParams)> {
        let flushed = self.coalesce.flush().and_then(|(x0, y0, x1, y1, color, alpha, info)| self.dispatch.map(|prev| (x0, y0, x1, y1, color, alpha, info, prev)));
        self.dispatch = Some(dispatch);
        self.source = Some(source);
        self.hints.invalidate();
        flushed
    }
}
