//! Per-line loading: before compositing at `(xi, yi)`, the block loader
//! pre-positions against the mask, background, background-for-shape, and
//! PCL pattern run structures, then the chosen run length is the minimum
//! across all of them.

use crate::block::Block;
use crate::pcl::PclPatternIterator;

/// The combination of optional per-run sources consulted before a
/// composite call. Which fields are `Some` is decided once per source
/// object (the "chosen `loadRun` variant").
pub struct LoadSources<'a> {
    pub background: &'a Block,
    pub mask: Option<&'a Block>,
    pub background_for_shape: Option<&'a Block>,
    pub pcl: Option<&'a mut dyn PclPatternIterator>,
}

/// The run length usable for the next composite call at `(xi, yi)`: the
/// minimum of the remaining span length and every consulted source's own
/// run length at that position.
#[must_use]
pub fn load_run_len(sources: &mut LoadSources<'_>, xi: u16, yi: u16, remaining: u16) -> u16 {
    let mut len = remaining.min(sources.background.run_len_at(xi, yi));
    if let Some(mask) = sources.mask {
        len = len.min(mask.run_len_at(xi, yi));
    }
    if let Some(bg_shape) = sources.background_for_shape {
        len = len.min(bg_shape.run_len_at(xi, yi));
    }
    if let Some(pcl) = sources.pcl.as_deref_mut() {
        len = len.min(pcl.run_len_at(xi, yi));
    }
    len
}
