use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use backdrop_core::cce::blend::{BlendMode, ColorSpace};
use backdrop_core::color::{ColorArray, ColorInfo, ColorValue, PassthroughConverter};
use backdrop_core::complete::complete_block;
use backdrop_core::composite::{composite_block, DispatchParams};
use backdrop_core::spill::MemSpill;
use backdrop_core::store::{BackdropShared, Rect, RetentionMode, Store, StoreArena};
use backdrop_core::table::TableVariant;

fn test_store() -> (StoreArena, backdrop_core::store::StoreRef) {
    let shared = Arc::new(BackdropShared::new(128, 128, 128, RetentionMode::RetainNothing, 0, Box::new(MemSpill::default()), 4));
    let store = Store::new(
        shared,
        Rect { x0: 0, y0: 0, x1: 512, y1: 512 },
        true,
        false,
        false,
        None,
        false,
        4,
        4,
        Arc::new(PassthroughConverter { out_comps: 4, eight_bit: true }),
        None,
        None,
        ColorArray::from_elem(ColorValue::ZERO, 4),
        ColorValue::ZERO,
        ColorArray::from_elem(ColorValue::ONE, 4),
    );
    let mut arena = StoreArena::new();
    let store_ref = arena.insert(store);
    (arena, store_ref)
}

fn ink(c: f32, m: f32, y: f32, k: f32) -> ColorArray {
    ColorArray::from_vec(vec![ColorValue::from_f32(c), ColorValue::from_f32(m), ColorValue::from_f32(y), ColorValue::from_f32(k)])
}

fn composite_full_page_benchmark(c: &mut Criterion) {
    let params = DispatchParams { mode: BlendMode::Normal, space: ColorSpace::Cmyk, non_isolated: false, shape_aware: false, knockout: false, overprint: None, pcl_rop: None };
    let color = ink(0.2, 0.8, 0.1, 0.05);
    let info = ColorInfo { pixel_label: 1, ..Default::default() };

    c.bench_function("composite_block over a 512x512 page", |b| {
        b.iter(|| {
            let (mut arena, store) = test_store();
            composite_block(&mut arena, store, params, 0, 0, 512, 512, &color, ColorValue::ONE, info).unwrap();
        });
    });
}

fn composite_overlapping_runs_benchmark(c: &mut Criterion) {
    let normal = DispatchParams { mode: BlendMode::Normal, space: ColorSpace::Cmyk, non_isolated: false, shape_aware: false, knockout: false, overprint: None, pcl_rop: None };
    let multiply = DispatchParams { mode: BlendMode::Multiply, space: ColorSpace::Cmyk, non_isolated: false, shape_aware: false, knockout: false, overprint: None, pcl_rop: None };
    let red = ink(0.0, 1.0, 1.0, 0.0);
    let blue = ink(1.0, 1.0, 0.0, 0.0);
    let info = ColorInfo { pixel_label: 1, ..Default::default() };

    c.bench_function("overlapping multiply blends fragment every row into a map", |b| {
        b.iter(|| {
            let (mut arena, store) = test_store();
            for i in 0..64 {
                let x0 = i * 4;
                composite_block(&mut arena, store, normal, 0, 0, 512, 512, &red, ColorValue::ONE, info).unwrap();
                composite_block(&mut arena, store, multiply, x0, 0, x0 + 8, 512, &blue, ColorValue::from_f32(0.5), info).unwrap();
            }
        });
    });
}

fn complete_block_benchmark(c: &mut Criterion) {
    let params = DispatchParams { mode: BlendMode::Normal, space: ColorSpace::Cmyk, non_isolated: false, shape_aware: false, knockout: false, overprint: None, pcl_rop: None };
    let colors: Vec<ColorArray> = (0..32).map(|i| ink(i as f32 / 32.0, 0.5, 0.2, 0.0)).collect();
    let info = ColorInfo { pixel_label: 1, ..Default::default() };
    let converter = PassthroughConverter { out_comps: 4, eight_bit: true };

    c.bench_function("complete_block dedup+merge+convert on a noisy 128x128 tile", |b| {
        b.iter(|| {
            let (mut arena, store) = test_store();
            for (i, color) in colors.iter().enumerate() {
                let x0 = (i as u16 * 16) % 512;
                composite_block(&mut arena, store, params, x0, 0, x0 + 16, 128, color, ColorValue::ONE, info).unwrap();
            }
            let st = arena.get_mut(store);
            let block = st.block_mut(0, 0).unwrap();
            complete_block(block, TableVariant::Isolated, TableVariant::Output8, 4, &converter, None, false, None).unwrap();
        });
    });
}

criterion_group!(benches, composite_full_page_benchmark, composite_overlapping_runs_benchmark, complete_block_benchmark);
criterion_main!(benches);
