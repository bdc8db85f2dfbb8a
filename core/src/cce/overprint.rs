//! Compatible- and opaque-overprint composites, driven by per-channel
//! `blit_channel_state` flags: each output channel is either painted by the
//! source, left as the destination, or resolved by max-blit (the darker
//! channel wins).

use crate::color::ColorValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// The source paints this channel.
    Present,
    /// The source does not carry this colorant; the destination passes
    /// through untouched.
    Missing,
    /// Resolve by taking the darker of source and destination.
    MaxBlit,
}

/// Whether a higher [`ColorValue`] means "darker" in this space (ink-based
/// spaces like CMYK/Gray) or lower does (RGB). Max-blit semantics with
/// source alpha `< 1` treat the source as opaque after the ROP, rather than
/// guessing a fractional blend.
#[must_use]
pub fn max_blit(src: ColorValue, dest: ColorValue, darker_is_higher: bool) -> ColorValue {
    if darker_is_higher {
        src.max(dest)
    } else {
        src.min(dest)
    }
}

fn resolve_channel(state: ChannelState, src: ColorValue, dest: ColorValue, darker_is_higher: bool) -> ColorValue {
    match state {
        ChannelState::Present => src,
        ChannelState::Missing => dest,
        ChannelState::MaxBlit => max_blit(src, dest, darker_is_higher),
    }
}

/// Compatible overprint: per-channel resolution driven by `states`, one
/// entry per output colorant.
#[must_use]
pub fn compatible_overprint(src: &[ColorValue], dest: &[ColorValue], states: &[ChannelState], darker_is_higher: bool) -> Vec<ColorValue> {
    src.iter().zip(dest).zip(states).map(|((&s, &d), &state)| resolve_channel(state, s, d, darker_is_higher)).collect()
}

/// Opaque overprint: identical channel resolution to compatible overprint,
/// but channels with no state entry (beyond `states.len()`) default to
/// `Present` rather than `Missing` — an opaque object paints every channel
/// it has data for, the rest pass through only if explicitly marked.
#[must_use]
pub fn opaque_overprint(src: &[ColorValue], dest: &[ColorValue], states: &[ChannelState], darker_is_higher: bool) -> Vec<ColorValue> {
    src.iter()
        .zip(dest)
        .enumerate()
        .map(|(i, (&s, &d))| resolve_channel(states.get(i).copied().unwrap_or(ChannelState::Present), s, d, darker_is_higher))
        .collect()
}

/// Upper bound on the number of colorants one [`OverprintParams`] can carry
/// a state for. Kept as a fixed array (rather than a `Vec`) so `DispatchParams`
/// — which embeds this by value and is passed by copy through the composite
/// hot path — stays `Copy`.
pub const MAX_OVERPRINT_CHANNELS: usize = 8;

/// A source object's overprint selection, captured once per object and
/// applied per run: which channels the source paints vs. leaves alone, and
/// whether the object is opaque (uncovered channels default to `Present`)
/// or compatible (uncovered channels default to `Missing`).
#[derive(Debug, Clone, Copy)]
pub struct OverprintParams {
    states: [ChannelState; MAX_OVERPRINT_CHANNELS],
    n_states: u8,
    pub darker_is_higher: bool,
    pub opaque: bool,
}

impl OverprintParams {
    /// Builds a state list from `states` (truncated to [`MAX_OVERPRINT_CHANNELS`]).
    #[must_use]
    pub fn new(states: &[ChannelState], darker_is_higher: bool, opaque: bool) -> Self {
        let n = states.len().min(MAX_OVERPRINT_CHANNELS);
        let mut padded = [ChannelState::Missing; MAX_OVERPRINT_CHANNELS];
        padded[..n].copy_from_slice(&states[..n]);
        Self { states: padded, n_states: n as u8, darker_is_higher, opaque }
    }

    #[must_use]
    pub fn states(&self) -> &[ChannelState] {
        &self.states[..self.n_states as usize]
    }

    #[must_use]
    pub fn resolve(&self, src: &[ColorValue], dest: &[ColorValue]) -> Vec<ColorValue> {
        if self.opaque {
            opaque_overprint(src, dest, self.states(), self.darker_is_higher)
        } else {
            compatible_overprint(src, dest, self.states(), self.darker_is_higher)
        }
    }
}
