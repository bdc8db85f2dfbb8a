//! Composite (C7): `runInfo` / `compositeSpan` / `compositeBlock` /
//! `compositeBackdrop` — the glue between a source object's contributions
//! and the store/block/table primitives. One source object's lifetime is
//! `runInfo` (declares blend state) followed by any number of span/block
//! calls, ended by the next `runInfo` or the region closing.

pub mod dispatch;
pub mod load;

use crate::block::{Block, TableRef};
use crate::color::{ColorArray, ColorInfo, ColorValue};
use crate::context::{CompositeContext, SourceState};
use crate::error::Result;
use crate::store::{Rect, Store, StoreArena, StoreRef};
use crate::table::{Table, TableVariant};

pub use dispatch::{composite_color, DispatchParams, PixelInput, PixelResult};

fn table_variant_for(store: &Store) -> TableVariant {
    match (store.isolated, store.shape) {
        (true, true) => TableVariant::IsolatedShape,
        (true, false) => TableVariant::Isolated,
        (false, true) => TableVariant::NonIsolatedShape,
        (false, false) => TableVariant::NonIsolated,
    }
}

fn read_pixel(block: &Block, xi: u16, yi: u16, n_comps: usize) -> PixelInput {
    let slot = block.slot_at(xi, yi);
    let table = block.table(block.table_ref_at(yi));
    let color = table.color(slot);
    PixelInput {
        color: (0..n_comps).map(|i| color.get(i).copied().unwrap_or(ColorValue::ZERO).to_f32()).collect(),
        alpha: table.alpha(slot).to_f32(),
        group_alpha: table.group_alpha(slot).to_f32(),
        shape: if table.variant.has_shape() { table.shape(slot).to_f32() } else { table.alpha(slot).to_f32() },
        info: table.info(slot),
    }
}

/// Writes one composited run `[xi, xi+run_len)` into `block`. Allocates a
/// fresh table when the run's end position no longer fits the row's current
/// table or that table carries the wrong variant; otherwise grows the
/// existing one in place. The entry is stored at `slot = end`, matching the
/// index-equals-run-end convention every row reader relies on.
fn write_composited(block: &mut Block, xi: u16, yi: u16, run_len: u16, variant: TableVariant, result: &PixelResult, source_shape: ColorValue) {
    let end = xi + run_len - 1;
    let n_comps = block.n_comps;
    let current = block.table_ref_at(yi);
    let table_ref = if block.table(current).variant == variant && end < block.table(current).n_max_slots() {
        current
    } else {
        let t = Table::new(variant, n_comps, block.width);
        block.tables.push(t);
        TableRef((block.tables.len() - 1) as u16)
    };

    let color: ColorArray = result.color.iter().map(|&c| ColorValue::from_f32(c)).collect();
    let alpha = ColorValue::from_f32(result.alpha);
    let group_alpha = ColorValue::from_f32(result.group_alpha);

    let table = block.table_mut(table_ref);
    table.init_entry(end, &color, alpha, group_alpha, result.info);
    table.set_shape(end, source_shape);
    table.set_group_alpha(end, group_alpha);
    let used = table.n_used_slots().max(end + 1);
    table.set_n_used_slots(used);

    block.write_run(xi, yi, run_len, table_ref, end);
}

/// One run's worth of composite-and-write, shared by every entry point
/// below: clamp `run_len` to the initial backdrop's own run length (it can
/// change underneath a background run the caller already measured), read
/// the background, blend, and (if the source actually drew) write the
/// result back. Returns the run length actually consumed.
fn composite_run(block: &mut Block, initial_block: Option<&Block>, xi: u16, yi: u16, run_len: u16, params: DispatchParams, variant: TableVariant, source: &PixelInput) -> u16 {
    let run_len = match initial_block {
        Some(ib) => run_len.min(ib.run_len_at(xi, yi)),
        None => run_len,
    };
    let background = read_pixel(block, xi, yi, block.n_comps);
    let initial_px = initial_block.map(|ib| read_pixel(ib, xi, yi, block.n_comps));
    let result = composite_color(params, source, &background, &background, initial_px.as_ref());
    if result.drew {
        write_composited(block, xi, yi, run_len, variant, &result, ColorValue::from_f32(source.shape));
    }
    run_len
}

/// `runInfo`: declares a new source object's blend state. Flushes whatever
/// the coalescer accumulated under the previous source (using that source's
/// dispatch params, not the new one) before recording the new state.
pub fn run_info(ctx: &mut CompositeContext, arena: &mut StoreArena, store: StoreRef, params: DispatchParams, source: SourceState) -> Result<()> {
    if let Some((x0, y0, x1, y1, color, alpha, info, prev_params)) = ctx.run_info(params, source) {
        composite_block(arena, store, prev_params, x0, y0, x1, y1, &color, alpha, info)?;
    }
    Ok(())
}

/// `compositeSpan`: one run on one row. Coalescable sources are buffered
/// through the context's coalescer and only actually composited once a
/// rectangle stops growing; everything else (images, soft-masked fills,
/// PCL patterns) composites immediately.
pub fn composite_span(ctx: &mut CompositeContext, arena: &mut StoreArena, store: StoreRef, params: DispatchParams, coalescable: bool, x: u16, y: u16, run_len: u16, color: ColorArray, alpha: ColorValue, info: ColorInfo) -> Result<()> {
    if coalescable {
        if let Some((x0, y0, x1, y1, c, a, i)) = ctx.coalesce.push_span(x, y, run_len, color, alpha, info) {
            composite_block(arena, store, params, x0, y0, x1, y1, &c, a, i)?;
        }
        return Ok(());
    }
    let st = arena.get(store);
    let variant = table_variant_for(st);
    let block_w = st.shared.block_width;
    let block_h = st.shared.block_height;
    let initial = st.initial;
    let isolated = st.isolated;
    let bx = x / block_w;
    let by = y / block_h;
    let local_x = x - bx * block_w;
    let local_y = y - by * block_h;

    let initial_block: Option<Block> = if isolated { None } else { initial.and_then(|i| arena.get(i).block(bx, by).cloned()) };
    let block = ensure_block(arena, store, if isolated { None } else { initial }, bx, by);
    let source = PixelInput { color: color.iter().map(|c| c.to_f32()).collect(), alpha: alpha.to_f32(), group_alpha: alpha.to_f32(), shape: alpha.to_f32(), info };

    let mut xi = local_x;
    let end = local_x + run_len;
    while xi < end {
        let remaining = end - xi;
        let run = remaining.min(block.run_len_at(xi, local_y));
        xi += composite_run(block, initial_block.as_ref(), xi, local_y, run, params, variant, &source);
    }
    Ok(())
}

/// Ensures the block at `(bx, by)` exists, creating it isolated or
/// non-isolated as the store requires. `initial` supplies the aligned block
/// of the store's initial backdrop for non-isolated stores (looked up by
/// the caller, since the arena only exposes index-based dual borrows).
fn ensure_block<'a>(arena: &'a mut StoreArena, store: StoreRef, initial: Option<StoreRef>, bx: u16, by: u16) -> &'a mut Block {
    let isolated = arena.get(store).isolated;
    if isolated || initial.is_none() {
        return arena.get_mut(store).ensure_isolated_block(bx, by);
    }
    let (st, init_st) = arena.get2_mut(store, initial.expect("checked above"));
    let initial_block = init_st.block(bx, by).expect("initial backdrop block must already exist at this tile");
    st.ensure_non_isolated_block(bx, by, initial_block)
}

/// `compositeBlock`: composites one axis-aligned rectangle of uniform
/// source color/alpha/info across as many blocks as it spans. This is what
/// a coalescer flush turns into, and also the entry point for callers that
/// already know they have a full rectangular fill (PCL solid patterns, an
/// opaque quad from the page description).
#[allow(clippy::too_many_arguments)]
pub fn composite_block(arena: &mut StoreArena, store: StoreRef, params: DispatchParams, x0: u16, y0: u16, x1: u16, y1: u16, color: &ColorArray, alpha: ColorValue, info: ColorInfo) -> Result<()> {
    if x0 >= x1 || y0 >= y1 {
        return Ok(());
    }
    let st = arena.get(store);
    let variant = table_variant_for(st);
    let block_w = st.shared.block_width;
    let block_h = st.shared.block_height;
    let initial = st.initial;
    let isolated = st.isolated;

    let source = PixelInput { color: color.iter().map(|c| c.to_f32()).collect(), alpha: alpha.to_f32(), group_alpha: alpha.to_f32(), shape: alpha.to_f32(), info };

    let bx0 = x0 / block_w;
    let bx1 = (x1 - 1) / block_w;
    let by0 = y0 / block_h;
    let by1 = (y1 - 1) / block_h;

    for by in by0..=by1 {
        for bx in bx0..=bx1 {
            let block_x0 = bx * block_w;
            let block_y0 = by * block_h;
            let rx0 = x0.max(block_x0) - block_x0;
            let rx1 = x1.min(block_x0 + block_w) - block_x0;
            let ry0 = y0.max(block_y0) - block_y0;
            let ry1 = y1.min(block_y0 + block_h) - block_y0;

            // The group's initial backdrop lives in a distinct, unmutated
            // store (`Store::initial`); a clone is taken up front so the
            // read doesn't fight the mutable borrow on the block below.
            let initial_block: Option<Block> = if isolated { None } else { initial.and_then(|i| arena.get(i).block(bx, by).cloned()) };
            let block = ensure_block(arena, store, if isolated { None } else { initial }, bx, by);
            for yi in ry0..ry1 {
                let mut xi = rx0;
                while xi < rx1 {
                    let remaining = rx1 - xi;
                    let run = remaining.min(block.run_len_at(xi, yi));
                    xi += composite_run(block, initial_block.as_ref(), xi, yi, run, params, variant, &source);
                }
            }
        }
    }
    Ok(())
}

/// `compositeBackdrop`: merges every entry of a completed child store into
/// its parent over `bounds`, used when a group closes. Unlike
/// `compositeBlock`, the source color varies per entry — it comes from the
/// child's own tables rather than one literal value.
pub fn composite_backdrop(arena: &mut StoreArena, parent: StoreRef, child: StoreRef, params: DispatchParams, bounds: Rect) -> Result<()> {
    let parent_st = arena.get(parent);
    let variant = table_variant_for(parent_st);
    let block_w = parent_st.shared.block_width;
    let block_h = parent_st.shared.block_height;
    let initial = parent_st.initial;
    let isolated = parent_st.isolated;
    let n_comps = parent_st.in_comps;

    for y in bounds.y0 as u16..bounds.y1 as u16 {
        let mut x = bounds.x0 as u16;
        while x < bounds.x1 as u16 {
            let child_st = arena.get(child);
            let cbx = x / child_st.shared.block_width;
            let cby = y / child_st.shared.block_height;
            let Some(child_block) = child_st.block(cbx, cby) else {
                x += child_st.shared.block_width;
                continue;
            };
            let local_x = x - cbx * child_st.shared.block_width;
            let local_y = y - cby * child_st.shared.block_height;
            let remaining = bounds.x1 as u16 - x;
            let run_len = remaining.min(child_block.run_len_at(local_x, local_y));
            let source = read_pixel(child_block, local_x, local_y, n_comps);

            let pbx = x / block_w;
            let pby = y / block_h;
            let p_local_x = x - pbx * block_w;
            let p_local_y = y - pby * block_h;
            let initial_block: Option<Block> = if isolated { None } else { initial.and_then(|i| arena.get(i).block(pbx, pby).cloned()) };
            let block = ensure_block(arena, parent, if isolated { None } else { initial }, pbx, pby);
            x += composite_run(block, initial_block.as_ref(), p_local_x, p_local_y, run_len, params, variant, &source);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cce::blend::{BlendMode, ColorSpace};
    use crate::color::PassthroughConverter;
    use crate::spill::MemSpill;
    use crate::store::{BackdropShared, RetentionMode};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn test_store(arena: &mut StoreArena, isolated: bool) -> StoreRef {
        let shared = Arc::new(BackdropShared::new(16, 16, 16, RetentionMode::RetainNothing, 0, Box::new(MemSpill::default()), 4));
        let store = Store::new(
            shared,
            Rect { x0: 0, y0: 0, x1: 16, y1: 16 },
            isolated,
            false,
            false,
            None,
            false,
            3,
            3,
            Arc::new(PassthroughConverter { out_comps: 3, eight_bit: true }),
            None,
            None,
            ColorArray::from_elem(ColorValue::ZERO, 3),
            ColorValue::ZERO,
            ColorArray::from_elem(ColorValue::ONE, 3),
        );
        arena.insert(store)
    }

    fn red() -> ColorArray {
        ColorArray::from_vec(vec![ColorValue::ONE, ColorValue::ZERO, ColorValue::ZERO])
    }

    #[test]
    fn composite_block_paints_full_rect_opaque() {
        let mut arena = StoreArena::new();
        let store = test_store(&mut arena, true);
        let params = DispatchParams { mode: BlendMode::Normal, space: ColorSpace::Rgb, non_isolated: false, shape_aware: false, knockout: false, overprint: None, pcl_rop: None };
        composite_block(&mut arena, store, params, 0, 0, 16, 16, &red(), ColorValue::ONE, ColorInfo { pixel_label: 1, ..Default::default() }).unwrap();

        let st = arena.get(store);
        let block = st.block(0, 0).unwrap();
        let px = read_pixel(block, 4, 4, 3);
        assert!((px.color[0] - 1.0).abs() < 1e-4);
        assert!((px.color[1]).abs() < 1e-4);
        assert_eq!(px.alpha, 1.0);
    }

    #[test]
    fn composite_span_through_coalescer_merges_then_flushes_on_run_info() {
        let mut arena = StoreArena::new();
        let store = test_store(&mut arena, true);
        let mut ctx = CompositeContext::new();
        let params = DispatchParams { mode: BlendMode::Normal, space: ColorSpace::Rgb, non_isolated: false, shape_aware: false, knockout: false, overprint: None, pcl_rop: None };
        let info = ColorInfo { pixel_label: 1, ..Default::default() };
        let source = SourceState {
            blend_mode: BlendMode::Normal,
            color_type: 0,
            rendering_intent: crate::color::RenderingIntent::Perceptual,
            black_type: 0,
            reproduction_model: 0,
            independent: true,
            pixel_label: 1,
            overprint: false,
            soft_mask: false,
            pcl_active: false,
            force_process_kos: false,
            coalescable: true,
        };
        run_info(&mut ctx, &mut arena, store, params, source).unwrap();
        composite_span(&mut ctx, &mut arena, store, params, true, 0, 0, 16, red(), ColorValue::ONE, info).unwrap();
        composite_span(&mut ctx, &mut arena, store, params, true, 0, 1, 16, red(), ColorValue::ONE, info).unwrap();

        // Before the next runInfo, nothing has actually been written yet.
        assert!(arena.get(store).block(0, 0).unwrap().run_len_at(0, 0) >= 16);

        run_info(&mut ctx, &mut arena, store, params, source).unwrap();
        let block = arena.get(store).block(0, 0).unwrap();
        let px = read_pixel(block, 0, 1, 3);
        assert!((px.color[0] - 1.0).abs() < 1e-4);
    }
}
