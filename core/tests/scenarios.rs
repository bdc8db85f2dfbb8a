use std::sync::Arc;

use backdrop_core::block::Block;
use backdrop_core::cce::blend::{BlendMode, ColorSpace};
use backdrop_core::color::{ColorArray, ColorInfo, ColorValue, PassthroughConverter};
use backdrop_core::complete::complete_block;
use backdrop_core::composite::{composite_backdrop, composite_block, DispatchParams};
use backdrop_core::reader::read_rect;
use backdrop_core::spill::MemSpill;
use backdrop_core::store::{BackdropShared, Rect, RetentionMode, Store, StoreArena, StoreRef};
use backdrop_core::table::TableVariant;

fn cmyk(c: f32, m: f32, y: f32, k: f32) -> ColorArray {
    ColorArray::from_vec(vec![ColorValue::from_f32(c), ColorValue::from_f32(m), ColorValue::from_f32(y), ColorValue::from_f32(k)])
}

fn rgb(r: f32, g: f32, b: f32) -> ColorArray {
    ColorArray::from_vec(vec![ColorValue::from_f32(r), ColorValue::from_f32(g), ColorValue::from_f32(b)])
}

fn converter16(n: usize) -> PassthroughConverter {
    PassthroughConverter { out_comps: n, eight_bit: false }
}

fn new_store(shared: &Arc<BackdropShared>, bounds: Rect, isolated: bool, n_comps: usize, initial_color: ColorArray, initial_alpha: ColorValue) -> Store {
    Store::new(
        Arc::clone(shared),
        bounds,
        isolated,
        false,
        false,
        None,
        false,
        n_comps,
        n_comps,
        Arc::new(converter16(n_comps)),
        None,
        None,
        initial_color,
        initial_alpha,
        ColorArray::from_elem(ColorValue::ONE, n_comps),
    )
}

fn complete_every_block(arena: &mut StoreArena, store: StoreRef, n_comps: usize) {
    let converter = converter16(n_comps);
    let st = arena.get_mut(store);
    for by in 0..st.yblocks {
        for bx in 0..st.xblocks {
            if let Some(block) = st.block_mut(bx, by) {
                complete_block(block, TableVariant::Isolated, TableVariant::Output16, n_comps, &converter, None, false, None).unwrap();
            }
        }
    }
}

/// Reads every row of `bounds` back as plain `u16` samples, one `Vec` per row.
fn read_rows(arena: &StoreArena, store: StoreRef, bounds: Rect, n_comps: usize) -> Vec<Vec<u16>> {
    let width = (bounds.x1 - bounds.x0) as usize;
    let mut rows = vec![vec![0u16; width * n_comps]; (bounds.y1 - bounds.y0) as usize];
    read_rect(store, arena.get(store), bounds, |y, spans| {
        let row = &mut rows[(y - bounds.y0) as usize];
        for span in spans {
            let samples: Vec<u16> = span.bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
            for (i, px) in samples.chunks_exact(n_comps).enumerate() {
                let x = span.x0 as usize + i;
                row[x * n_comps..x * n_comps + n_comps].copy_from_slice(px);
            }
        }
    })
    .unwrap();
    rows
}

fn normal(space: ColorSpace) -> DispatchParams {
    DispatchParams { mode: BlendMode::Normal, space, non_isolated: false, shape_aware: false, knockout: false, overprint: None, pcl_rop: None }
}

#[test]
fn opaque_span_repeats_across_every_row_of_an_isolated_block() {
    let shared = Arc::new(BackdropShared::new(128, 128, 128, RetentionMode::RetainNothing, 0, Box::new(MemSpill::default()), 4));
    let mut arena = StoreArena::new();
    let store = arena.insert(new_store(&shared, Rect { x0: 0, y0: 0, x1: 128, y1: 128 }, true, 4, cmyk(0.0, 0.0, 0.0, 0.0), ColorValue::ZERO));

    composite_block(&mut arena, store, normal(ColorSpace::Cmyk), 0, 0, 128, 1, &cmyk(0.5, 0.0, 0.0, 0.0), ColorValue::ONE, ColorInfo { pixel_label: 1, ..Default::default() }).unwrap();

    complete_every_block(&mut arena, store, 4);
    let rows = read_rows(&arena, store, Rect { x0: 0, y0: 0, x1: 128, y1: 128 }, 4);

    for row in &rows {
        for px in row.chunks_exact(4) {
            assert!((px[0] as f32 / 65535.0 - 0.5).abs() < 1e-3);
            assert_eq!(px[1], 0);
            assert_eq!(px[2], 0);
            assert_eq!(px[3], 0);
        }
    }
}

#[test]
fn two_half_alpha_block_blits_average_by_their_relative_weight() {
    let shared = Arc::new(BackdropShared::new(128, 128, 128, RetentionMode::RetainNothing, 0, Box::new(MemSpill::default()), 4));
    let mut arena = StoreArena::new();
    let store = arena.insert(new_store(&shared, Rect { x0: 0, y0: 0, x1: 128, y1: 128 }, true, 4, cmyk(0.0, 0.0, 0.0, 0.0), ColorValue::ZERO));

    let params = normal(ColorSpace::Cmyk);
    let half = ColorValue::from_f32(0.5);
    let info = ColorInfo { pixel_label: 1, ..Default::default() };
    composite_block(&mut arena, store, params, 0, 0, 128, 128, &cmyk(1.0, 0.0, 0.0, 0.0), half, info).unwrap();
    composite_block(&mut arena, store, params, 0, 0, 128, 128, &cmyk(0.0, 0.0, 1.0, 0.0), half, info).unwrap();

    complete_every_block(&mut arena, store, 4);
    let rows = read_rows(&arena, store, Rect { x0: 0, y0: 0, x1: 128, y1: 128 }, 4);

    // Two sequential alpha=0.5 Normal composites leave premultiplied
    // cyan=0.25, yellow=0.5, alpha=0.75; completion divides alpha out, so the
    // straight (demultiplied) values read back are 0.25/0.75 and 0.5/0.75.
    let px = &rows[64][64 * 4..64 * 4 + 4];
    let c = px[0] as f32 / 65535.0;
    let y = px[2] as f32 / 65535.0;
    assert!((c - 1.0 / 3.0).abs() < 1e-3, "cyan channel: {c}");
    assert!((y - 2.0 / 3.0).abs() < 1e-3, "yellow channel: {y}");
}

#[test]
fn a_row_spanning_a_2x2_tile_grid_reads_back_as_one_span() {
    let shared = Arc::new(BackdropShared::new(32, 32, 32, RetentionMode::RetainNothing, 0, Box::new(MemSpill::default()), 4));
    let mut arena = StoreArena::new();
    let store = arena.insert(new_store(&shared, Rect { x0: 0, y0: 0, x1: 64, y1: 64 }, true, 3, rgb(1.0, 1.0, 1.0), ColorValue::ZERO));

    composite_block(&mut arena, store, normal(ColorSpace::Rgb), 0, 0, 64, 1, &rgb(0.0, 0.0, 0.0), ColorValue::ONE, ColorInfo { pixel_label: 1, ..Default::default() }).unwrap();

    complete_every_block(&mut arena, store, 3);

    let mut span_count = 0;
    read_rect(store, arena.get(store), Rect { x0: 0, y0: 0, x1: 64, y1: 1 }, |_y, spans| {
        span_count = spans.len();
        assert_eq!(spans[0].x0, 0);
        assert_eq!(spans[0].x1, 64);
    })
    .unwrap();
    assert_eq!(span_count, 1);
}

#[test]
fn non_isolated_white_fill_blends_with_the_parents_red_backdrop() {
    let shared = Arc::new(BackdropShared::new(64, 64, 64, RetentionMode::RetainNothing, 0, Box::new(MemSpill::default()), 4));
    let mut arena = StoreArena::new();
    let bounds = Rect { x0: 0, y0: 0, x1: 64, y1: 64 };

    let red = rgb(1.0, 0.0, 0.0);
    let initial_ref = arena.insert(new_store(&shared, bounds, true, 3, red.clone(), ColorValue::ZERO));
    composite_block(&mut arena, initial_ref, normal(ColorSpace::Rgb), 0, 0, 64, 64, &red, ColorValue::ONE, ColorInfo { pixel_label: 1, ..Default::default() }).unwrap();
    complete_every_block(&mut arena, initial_ref, 3);

    let parent_ref = arena.insert(new_store(&shared, bounds, true, 3, red.clone(), ColorValue::ZERO));
    composite_block(&mut arena, parent_ref, normal(ColorSpace::Rgb), 0, 0, 64, 64, &red, ColorValue::ONE, ColorInfo { pixel_label: 1, ..Default::default() }).unwrap();

    let mut child_store = new_store(&shared, bounds, false, 3, red.clone(), ColorValue::ONE);
    child_store.initial = Some(initial_ref);
    let child_ref = arena.insert(child_store);

    let white = rgb(1.0, 1.0, 1.0);
    composite_block(&mut arena, child_ref, normal(ColorSpace::Rgb), 0, 0, 64, 64, &white, ColorValue::from_f32(0.5), ColorInfo { pixel_label: 2, ..Default::default() }).unwrap();
    complete_every_block(&mut arena, child_ref, 3);

    composite_backdrop(&mut arena, parent_ref, child_ref, normal(ColorSpace::Rgb), bounds).unwrap();
    complete_every_block(&mut arena, parent_ref, 3);

    let rows = read_rows(&arena, parent_ref, bounds, 3);
    let px = &rows[32][32 * 3..32 * 3 + 3];
    for (channel, expected) in px.iter().zip([1.0, 0.5, 0.5]) {
        let got = *channel as f32 / 65535.0;
        assert!((got - expected).abs() < 2e-3, "channel {got} vs {expected}");
    }
}

#[test]
fn reading_through_a_purged_block_matches_a_resident_control_copy() {
    let shared = Arc::new(BackdropShared::new(16, 16, 16, RetentionMode::RetainNothing, 0, Box::new(MemSpill::default()), 4));
    let mut arena = StoreArena::new();
    let bounds = Rect { x0: 0, y0: 0, x1: 16, y1: 16 };
    let store = arena.insert(new_store(&shared, bounds, true, 3, rgb(0.0, 0.0, 0.0), ColorValue::ZERO));

    for i in 0..4u16 {
        let x0 = i * 4;
        composite_block(&mut arena, store, normal(ColorSpace::Rgb), x0, 0, x0 + 4, 16, &rgb(f32::from(i) / 4.0, 0.5, 1.0 - f32::from(i) / 4.0), ColorValue::ONE, ColorInfo { pixel_label: i + 1, ..Default::default() }).unwrap();
    }
    complete_every_block(&mut arena, store, 3);

    let control = read_rows(&arena, store, bounds, 3);

    let spill = MemSpill::default();
    let block = arena.get_mut(store).take_block(0, 0).expect("block was just painted");
    let mut purging = block;
    let loc = purging.purge(&spill).unwrap();
    let mut reloaded = Block::new_isolated(16, 16, 3, false, &rgb(0.0, 0.0, 0.0), ColorValue::ZERO, ColorInfo::default(), false);
    reloaded.load(&spill, loc).unwrap();
    arena.get_mut(store).set_block(0, 0, reloaded);

    let after_round_trip = read_rows(&arena, store, bounds, 3);
    assert_eq!(control, after_round_trip);
}

#[test]
fn ten_block_blits_across_a_wide_store_are_pixel_identical_whether_or_not_a_tile_was_purged_midway() {
    let shared = Arc::new(BackdropShared::new(16, 16, 16, RetentionMode::RetainNothing, 0, Box::new(MemSpill::default()), 4));
    let bounds = Rect { x0: 0, y0: 0, x1: 160, y1: 16 };

    let paint = |arena: &mut StoreArena, store: StoreRef| {
        for i in 0..10u16 {
            let x0 = i * 16;
            composite_block(arena, store, normal(ColorSpace::Rgb), x0, 0, x0 + 16, 16, &rgb(f32::from(i) / 10.0, 0.2, 0.8), ColorValue::ONE, ColorInfo { pixel_label: i + 1, ..Default::default() }).unwrap();
        }
    };

    let mut baseline_arena = StoreArena::new();
    let baseline_store = baseline_arena.insert(new_store(&shared, bounds, true, 3, rgb(0.0, 0.0, 0.0), ColorValue::ZERO));
    paint(&mut baseline_arena, baseline_store);
    complete_every_block(&mut baseline_arena, baseline_store, 3);
    let baseline = read_rows(&baseline_arena, baseline_store, bounds, 3);

    let mut arena = StoreArena::new();
    let store = arena.insert(new_store(&shared, bounds, true, 3, rgb(0.0, 0.0, 0.0), ColorValue::ZERO));
    paint(&mut arena, store);
    complete_every_block(&mut arena, store, 3);

    // Simulate a low-memory purge of every other tile before reading back;
    // the reader must reload purged tiles transparently (see reader.rs).
    let spill = MemSpill::default();
    let mut purged_any = false;
    for bx in 0..arena.get(store).xblocks {
        if bx % 2 == 0 {
            let mut block = arena.get_mut(store).take_block(bx, 0).expect("tile was painted");
            let loc = block.purge(&spill).unwrap();
            assert_eq!(block.storage, backdrop_core::block::Storage::Disk);
            let mut reloaded = Block::new_isolated(16, 16, 3, false, &rgb(0.0, 0.0, 0.0), ColorValue::ZERO, ColorInfo::default(), false);
            reloaded.load(&spill, loc).unwrap();
            arena.get_mut(store).set_block(bx, 0, reloaded);
            purged_any = true;
        }
    }
    assert!(purged_any);

    let after_purge = read_rows(&arena, store, bounds, 3);
    assert_eq!(baseline, after_purge);
}
