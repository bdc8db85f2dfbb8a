//! Reader (C10): read-back over a completed store. A block that's been
//! purged to disk is reloaded into a scratch copy for the duration of the
//! read and discarded afterward — the resident copy stays purged; reading
//! never promotes a block back into memory.

use crate::block::Block;
use crate::color::ConvertedOutput;
use crate::error::{BackdropError, Result};
use crate::store::{PurgeEntry, Rect, Store, StoreRef};

/// One run of identical output bytes within a single image row, in store
/// pixel coordinates.
#[derive(Debug, Clone)]
pub struct OutputSpan {
    pub x0: u32,
    pub x1: u32,
    pub bytes: Vec<u8>,
}

fn output_table(block: &Block) -> Option<&crate::table::Table> {
    block.tables.iter().find(|t| t.variant.is_output())
}

/// Extracts the byte range for one slot from an output table's buffer,
/// widening 16-bit samples to their little-endian byte pairs so callers
/// always see a flat byte slice regardless of sample width.
fn slot_bytes(table: &crate::table::Table, slot: u16, out_comps: usize) -> Result<Vec<u8>> {
    let start = slot as usize * out_comps;
    match table.output().ok_or(BackdropError::Programmer("block read before color-convert"))? {
        ConvertedOutput::Bytes8(buf) => Ok(buf[start..start + out_comps].to_vec()),
        ConvertedOutput::Bytes16(buf) => Ok(buf[start..start + out_comps].iter().flat_map(|v| v.to_le_bytes()).collect()),
    }
}

/// Reads one row of one already-in-memory (or freshly-reloaded scratch)
/// block, clipped to `[x0, x1)` in block-local coordinates, as minimal
/// output-byte spans.
fn read_block_row(block: &Block, local_y: u16, x0: u16, x1: u16, out_comps: usize) -> Result<Vec<(u16, u16, Vec<u8>)>> {
    let table = output_table(block).ok_or(BackdropError::Programmer("block has no color-converted output table"))?;
    let mut spans = Vec::new();
    let mut x = x0;
    while x < x1 {
        let run = block.run_len_at(x, local_y).min(x1 - x);
        let slot = block.slot_at(x, local_y);
        spans.push((x, x + run, slot_bytes(table, slot, out_comps)?));
        x += run;
    }
    Ok(spans)
}

/// Either a block still resident in the store, or an owned scratch copy
/// reloaded from disk for the duration of one block-row's worth of reads.
enum BlockSource<'a> {
    Resident(&'a Block),
    Scratch(Block),
}

impl BlockSource<'_> {
    fn get(&self) -> &Block {
        match self {
            Self::Resident(b) => b,
            Self::Scratch(b) => b,
        }
    }
}

/// Visits every row of `bounds` within `store`, in top-to-bottom,
/// block-row-major order, calling `visit(y, spans)` once per image row with
/// that row's output-byte spans in ascending x order. A tile with no block
/// at all (never touched) is skipped — the caller already knows the
/// store's initial color for untouched ground. Disk-resident tiles are
/// unlinked from the purge list, reloaded once, and relinked per block-row
/// rather than once per pixel row.
pub fn read_rect(store_ref: StoreRef, store: &Store, bounds: Rect, mut visit: impl FnMut(u32, &[OutputSpan])) -> Result<()> {
    let block_w = u32::from(store.shared.block_width);
    let block_h = u32::from(store.shared.block_height);
    let out_comps = store.out_comps;

    let bx0 = (bounds.x0 / block_w) as u16;
    let bx1 = ((bounds.x1 - 1) / block_w) as u16;
    let by0 = (bounds.y0 / block_h) as u16;
    let by1 = ((bounds.y1 - 1) / block_h) as u16;

    for by in by0..=by1 {
        let mut sources: Vec<Option<BlockSource<'_>>> = Vec::with_capacity((bx1 - bx0 + 1) as usize);
        for bx in bx0..=bx1 {
            let source = match store.block(bx, by) {
                None => None,
                Some(block) if block.storage == crate::block::Storage::Disk => {
                    let loc = block.disk_loc.expect("disk-resident block must carry a location");
                    store.shared.unlink_purgeable(store_ref, bx, by);
                    let mut scratch = block.clone();
                    let result = scratch.load(store.shared.spill.as_ref(), loc);
                    store.shared.relink_purgeable(PurgeEntry { store: store_ref, bx, by });
                    result?;
                    Some(BlockSource::Scratch(scratch))
                }
                Some(block) => Some(BlockSource::Resident(block)),
            };
            sources.push(source);
        }

        let row_y0 = (u32::from(by) * block_h).max(bounds.y0);
        let row_y1 = ((u32::from(by) + 1) * block_h).min(bounds.y1);
        for y in row_y0..row_y1 {
            let local_y = (y - u32::from(by) * block_h) as u16;
            let mut row: Vec<OutputSpan> = Vec::new();

            for (i, bx) in (bx0..=bx1).enumerate() {
                let Some(source) = &sources[i] else { continue };
                let block = source.get();
                let block_x0 = u32::from(bx) * block_w;
                let local_x0 = (bounds.x0.max(block_x0) - block_x0) as u16;
                let local_x1 = (bounds.x1.min(block_x0 + block_w) - block_x0) as u16;

                for (x0, x1, bytes) in read_block_row(block, local_y, local_x0, local_x1, out_comps)? {
                    row.push(OutputSpan { x0: block_x0 + u32::from(x0), x1: block_x0 + u32::from(x1), bytes });
                }
            }

            visit(y, &row);
        }
    }
    Ok(())
}
