//! # Transparency Compositing Backdrop Engine
//!
//! This crate implements the PDF/PostScript transparency imaging model for a
//! raster image processor: isolated/non-isolated groups, soft masks,
//! shape/opacity, blend modes, knockout, and overprint/ROP interactions. It
//! accepts source contributions (spans, rectangular blocks, or whole
//! upstream backdrops) and composites them into a nested tree of group
//! backdrops, finally emitting the top page backdrop's color-converted
//! pixels to the raster output.
//!
//! ## How a region gets composited
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      One region, one worker thread                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  1. Open a Store tree (Backdrop, per group)                             │
//! │  2. For each source object: run_info() declares state, then             │
//! │     composite_span / composite_block / composite_backdrop() feed it     │
//! │     through the Coalescer into the leaf Store's Blocks                  │
//! │  3. region_complete(): each touched Block is compacted, deduped,        │
//! │     merged, and color-converted (Block::complete)                      │
//! │  4. The parent Store imports the child via composite_backdrop()         │
//! │  5. The page Store is read out via Reader for the raster backend        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module map
//!
//! | Module        | Component | Responsibility                                   |
//! |---------------|-----------|---------------------------------------------------|
//! | [`table`]     | C1        | Fixed-capacity slot array of premultiplied color   |
//! | [`block`]     | C2        | A rectangular tile: RLE/map/uniform row storage    |
//! | [`resource`]  | C3        | Fixed-size reusable block-sized allocation         |
//! | [`store`]     | C4        | The 2D grid of blocks for one group                |
//! | [`context`]   | C5        | Per-thread compositing workspace                   |
//! | [`coalesce`]  | C6        | Buffers span-blits into block-blits                |
//! | [`composite`] | C7        | Span/block/backdrop insertion, blend dispatch      |
//! | [`complete`]  | C8        | Compact, dedup, merge, color-convert on region close |
//! | [`cce`]       | C9        | Blend-mode primitives, ROP table, overprint         |
//! | [`reader`]    | C10       | Block-by-block iterator for the raster pipeline    |

pub mod error;

pub mod color;
pub mod hash;
pub mod table;

pub mod block;
pub mod resource;

pub mod pool;
pub mod spill;
pub mod store;

pub mod coalesce;
pub mod context;
pub mod pcl;

pub mod cce;
pub mod composite;
pub mod complete;

pub mod reader;

pub use error::{BackdropError, Result};
