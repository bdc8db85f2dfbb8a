//! # Transparency Compositing Backdrop Engine — Demo Driver
//!
//! ## How the demo page gets built
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │ 1. Open a page Store (isolated) and a nested group Store                │
//! │ 2. Paint a couple of overlapping rectangles into the group with         │
//! │    composite_block(), under Multiply then Normal blend                  │
//! │ 3. region_complete(): complete_block() every touched tile of the group  │
//! │ 4. composite_backdrop(): merge the completed group into the page        │
//! │ 5. complete_block() every touched page tile                             │
//! │ 6. reader::read_rect() walks the page out row by row, optionally        │
//! │    dumping it as a PNG behind the `png-dump` feature                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use backdrop_core::cce::blend::{BlendMode, ColorSpace};
use backdrop_core::color::{ColorArray, ColorConverter, ColorInfo, ColorValue, PassthroughConverter, RenderingIntent};
use backdrop_core::complete::complete_block;
use backdrop_core::composite::{composite_backdrop, composite_block, DispatchParams};
use backdrop_core::reader::read_rect;
use backdrop_core::spill::MemSpill;
use backdrop_core::store::{BackdropShared, Rect, RetentionMode, Store, StoreArena};
use backdrop_core::table::TableVariant;

const PAGE_SIZE: u32 = 64;
const BLOCK_SIZE: u16 = 32;

fn init_logging() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let log_to_file = args.iter().any(|a| a == "--log-on-file");

    #[cfg(feature = "file-log")]
    if log_to_file {
        logger::init_logger(logger::LogKind::FILE);
    }
    #[cfg(not(feature = "file-log"))]
    let _ = log_to_file;

    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();
}

fn build_page(shared: Arc<BackdropShared>) -> Store {
    Store::new(
        shared,
        Rect { x0: 0, y0: 0, x1: PAGE_SIZE, y1: PAGE_SIZE },
        true,
        false,
        false,
        None,
        false,
        3,
        3,
        Arc::new(PassthroughConverter { out_comps: 3, eight_bit: true }),
        None,
        None,
        ColorArray::from_elem(ColorValue::ONE, 3),
        ColorValue::ONE,
        ColorArray::from_elem(ColorValue::ONE, 3),
    )
}

fn build_group(shared: Arc<BackdropShared>) -> Store {
    Store::new(
        shared,
        Rect { x0: 0, y0: 0, x1: PAGE_SIZE, y1: PAGE_SIZE },
        true,
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
    )
}

fn complete_all_blocks(store: &mut Store, variant: TableVariant, converter: &dyn ColorConverter) {
    let page_color = store.composite_to_page.then(|| store.page_color.clone());
    for by in 0..store.yblocks {
        for bx in 0..store.xblocks {
            if let Some(block) = store.block_mut(bx, by) {
                if !block.flags.complete {
                    complete_block(block, variant, TableVariant::Output8, 3, converter, page_color.as_ref(), false, None).expect("completing a demo block never fails");
                }
            }
        }
    }
}

fn main() {
    init_logging();

    let spill = Box::new(MemSpill::default());
    let shared = Arc::new(BackdropShared::new(BLOCK_SIZE, BLOCK_SIZE, BLOCK_SIZE, RetentionMode::RetainPage, 0, spill, 4));

    let mut arena = StoreArena::new();
    let page_ref = arena.insert(build_page(Arc::clone(&shared)));
    let group_ref = arena.insert(build_group(Arc::clone(&shared)));

    let green = ColorArray::from_vec(vec![ColorValue::ZERO, ColorValue::ONE, ColorValue::ZERO]);
    let blue = ColorArray::from_vec(vec![ColorValue::ZERO, ColorValue::ZERO, ColorValue::ONE]);
    let label = ColorInfo { pixel_label: 1, rendering_intent: RenderingIntent::Perceptual, ..Default::default() };

    let normal = DispatchParams { mode: BlendMode::Normal, space: ColorSpace::Rgb, non_isolated: false, shape_aware: false, knockout: false, overprint: None, pcl_rop: None };
    let multiply = DispatchParams { mode: BlendMode::Multiply, space: ColorSpace::Rgb, non_isolated: false, shape_aware: false, knockout: false, overprint: None, pcl_rop: None };

    composite_block(&mut arena, group_ref, normal, 8, 8, 48, 48, &green, ColorValue::ONE, ColorInfo { pixel_label: 1, ..label }).expect("composite_block never fails on a fresh demo group");
    composite_block(&mut arena, group_ref, multiply, 24, 24, 56, 56, &blue, ColorValue::from_f32(0.6), ColorInfo { pixel_label: 2, ..label }).expect("composite_block never fails on a fresh demo group");

    let converter = PassthroughConverter { out_comps: 3, eight_bit: true };
    complete_all_blocks(arena.get_mut(group_ref), TableVariant::Isolated, &converter);

    let backdrop_params = DispatchParams { mode: BlendMode::Normal, space: ColorSpace::Rgb, non_isolated: false, shape_aware: false, knockout: false, overprint: None, pcl_rop: None };
    composite_backdrop(&mut arena, page_ref, group_ref, backdrop_params, Rect { x0: 0, y0: 0, x1: PAGE_SIZE, y1: PAGE_SIZE }).expect("composite_backdrop never fails on a fresh demo page");
    complete_all_blocks(arena.get_mut(page_ref), TableVariant::Isolated, &converter);

    let mut out_rows: Vec<Vec<u8>> = Vec::with_capacity(PAGE_SIZE as usize);
    read_rect(page_ref, arena.get(page_ref), Rect { x0: 0, y0: 0, x1: PAGE_SIZE, y1: PAGE_SIZE }, |_y, spans| {
        let mut row = vec![0u8; PAGE_SIZE as usize * 3];
        for span in spans {
            let width = (span.x1 - span.x0) as usize;
            for px in 0..width {
                row[(span.x0 as usize + px) * 3..(span.x0 as usize + px) * 3 + 3].copy_from_slice(&span.bytes[..3]);
            }
        }
        out_rows.push(row);
    })
    .expect("reading a fully completed demo page never fails");

    tracing::info!(rows = out_rows.len(), "demo page composited");

    #[cfg(feature = "png-dump")]
    dump_png(&out_rows);
    #[cfg(not(feature = "png-dump"))]
    let _ = &out_rows;

    logger::flush();
}

#[cfg(feature = "png-dump")]
fn dump_png(rows: &[Vec<u8>]) {
    let mut buf = Vec::with_capacity(rows.len() * rows[0].len());
    for row in rows {
        buf.extend_from_slice(row);
    }
    let path = std::env::temp_dir().join("backdrop-demo.png");
    image::save_buffer(&path, &buf, PAGE_SIZE, rows.len() as u32, image::ColorType::Rgb8).expect("writing the demo PNG never fails on a valid buffer");
    tracing::info!(path = %path.display(), "wrote demo PNG");
}
