//! Complete (C8): the block-completion sequence run once per touched block
//! when a region closes — compact insert-mode rows back to RLE, dedup
//! entries across the block's tables via a hash probe, merge what's left
//! into one table, detect a uniform block, and color-convert for the
//! raster backend.

use std::collections::HashMap;

use smallvec::{smallvec, SmallVec};

use crate::block::{Block, RleRun, Row, Storage, TableRef};
use crate::color::{ColorArray, ColorConverter};
use crate::error::Result;
use crate::store::RetentionMode;
use crate::table::{SoftMaskTransfer, Table, TableVariant, HASH_BUCKETS};

/// Converts one row back from its insert-mode `Map` form into minimal RLE
/// runs, merging adjacent positions whose entries are equal per
/// `Table::equal_entry` (not just whose slot happens to match — two writes
/// of the same color to adjacent runs should still compact together).
fn compact_row(block: &Block, yi: u16) -> Row {
    match &block.rows[yi as usize] {
        Row::Repeat => Row::Repeat,
        existing @ Row::Rle { .. } => existing.clone(),
        Row::Map { table, indices } => {
            let t = block.table(*table);
            let mut runs: SmallVec<[RleRun; 4]> = SmallVec::new();
            let mut x = 0u16;
            while x < block.width {
                let slot = indices[x as usize];
                let mut end = x;
                while end + 1 < block.width && Table::equal_entry(t, slot, t, indices[end as usize + 1]) {
                    end += 1;
                }
                runs.push(RleRun { run_len: end - x + 1, slot });
                x = end + 1;
            }
            Row::Rle { table: *table, runs }
        }
    }
}

/// Dedups every table entry actually referenced by a (now fully-RLE) block
/// into one canonical table, using `Table::hash_val` to bucket candidates
/// instead of comparing every pair. Every row's runs are rewritten to point
/// at the merged table.
fn dedup_and_merge(block: &mut Block, variant: TableVariant) {
    let mut refs: Vec<(u16, u16)> = Vec::new();
    for row in &block.rows {
        if let Row::Rle { table, runs } = row {
            refs.extend(runs.iter().map(|r| (table.0, r.slot)));
        }
    }
    refs.sort_unstable();
    refs.dedup();

    let mut merged = Table::new(variant, block.n_comps, refs.len().max(1) as u16);
    let mut buckets: Vec<Vec<u16>> = vec![Vec::new(); HASH_BUCKETS];
    let mut remap: HashMap<(u16, u16), u16> = HashMap::with_capacity(refs.len());
    let mut next_slot = 0u16;

    for (table_idx, slot) in refs {
        let src = block.table(TableRef(table_idx));
        let bucket = src.hash_val(slot) as usize;
        let existing = buckets[bucket].iter().copied().find(|&cand| Table::equal_entry(&merged, cand, src, slot));
        let new_slot = existing.unwrap_or_else(|| {
            let s = next_slot;
            merged.init_entry(s, src.color(slot), src.alpha(slot), src.group_alpha(slot), src.info(slot));
            merged.set_shape(s, src.shape(slot));
            buckets[bucket].push(s);
            next_slot += 1;
            s
        });
        remap.insert((table_idx, slot), new_slot);
    }
    merged.set_n_used_slots(next_slot);

    for row in &mut block.rows {
        if let Row::Rle { table, runs } = row {
            for run in runs.iter_mut() {
                run.slot = remap[&(table.0, run.slot)];
            }
            *table = TableRef(0);
        }
    }
    block.tables = vec![merged];
}

/// Whether every row of the block (already compacted to RLE) reduces to one
/// equal entry, in which case the whole block can collapse to
/// [`Storage::Uniform`] instead of carrying per-row data.
fn uniform_entry(block: &Block) -> Option<u16> {
    let table = block.tables.first()?;
    let mut candidate: Option<u16> = None;
    for row in &block.rows {
        let Row::Rle { runs, .. } = row else { continue };
        if runs.len() != 1 || runs[0].run_len != block.width {
            return None;
        }
        let slot = runs[0].slot;
        match candidate {
            None => candidate = Some(slot),
            Some(c) if Table::equal_entry(table, c, table, slot) => {}
            Some(_) => return None,
        }
    }
    candidate
}

/// `blockComplete`: runs the whole completion sequence on a touched block:
/// compact/dedup/merge/uniform-detect, then resolve premultiplied alpha
/// (composite-to-page or divide-alpha), resolve a non-isolated group's final
/// alpha from its group alpha, apply a soft mask's luminosity/alpha
/// transfer, and finally color-convert for the raster backend.
///
/// `composite_to_page` is `Some(page_color)` for a store with
/// `compositeToPage` set (page color is normal-composited in at alpha 1
/// instead of dividing alpha back out); `resolve_group_alpha` is true for a
/// non-isolated group whose blend space is its parent's; `soft_mask_transfer`
/// applies a soft mask's transfer function to the final alpha.
#[allow(clippy::too_many_arguments)]
pub fn complete_block(
    block: &mut Block,
    variant: TableVariant,
    out_variant: TableVariant,
    out_comps: usize,
    converter: &dyn ColorConverter,
    composite_to_page: Option<&ColorArray>,
    resolve_group_alpha: bool,
    soft_mask_transfer: Option<&dyn SoftMaskTransfer>,
) -> Result<()> {
    for yi in 0..block.height {
        if matches!(block.rows[yi as usize], Row::Map { .. }) {
            block.rows[yi as usize] = compact_row(block, yi);
        }
    }

    dedup_and_merge(block, variant);

    if let Some(slot) = uniform_entry(block) {
        let src = block.table(TableRef(0)).clone();
        let mut uniform = Table::new(variant, block.n_comps, 1);
        uniform.init_entry(0, src.color(slot), src.alpha(slot), src.group_alpha(slot), src.info(slot));
        uniform.set_shape(0, src.shape(slot));
        uniform.set_n_used_slots(1);
        block.tables = vec![uniform];
        let mut rows = vec![Row::Rle { table: TableRef(0), runs: smallvec![RleRun { run_len: block.width, slot: 0 }] }];
        rows.extend(std::iter::repeat(Row::Repeat).take(block.height as usize - 1));
        block.rows = rows;
        block.storage = Storage::Uniform;
    }

    let table = &mut block.tables[0];
    if table.variant.has_color() {
        match composite_to_page {
            Some(page_color) => table.composite_to_page(page_color),
            None => table.divide_alpha(),
        }
    }
    if resolve_group_alpha && table.variant.has_group_alpha() {
        table.set_alpha_from_group_alpha();
    }
    if let Some(transfer) = soft_mask_transfer {
        table.apply_soft_mask_transfer(transfer);
    }

    let converted = block.tables[0].color_convert(out_variant, out_comps, converter)?;
    block.tables.push(converted);

    block.flags.complete = true;
    Ok(())
}

/// Whether a completed block is worth retaining at all, per the store's
/// retention policy. `RetainNothing` purges every completed block
/// immediately; `RetainBand`/`RetainPage` keep it available for later reads
/// within the current band/page.
#[must_use]
pub const fn should_retain(retention: RetentionMode) -> bool {
    !matches!(retention, RetentionMode::RetainNothing)
}

/// The "poaching" shortcut: a completed block that came out uniform and
/// equal to the fresh-block template (nothing was ever actually drawn into
/// it) doesn't need its own resource at all — the caller can return the
/// resource to the pool untouched instead of writing it back.
#[must_use]
pub fn is_blank(block: &Block, template: &Block) -> bool {
    block.storage == Storage::Uniform
        && template.storage == Storage::Uniform
        && matches!((&block.rows[0], &template.rows[0]), (Row::Rle { table: t1, .. }, Row::Rle { table: t2, .. })
            if Table::equal_entry(block.table(*t1), 0, template.table(*t2), 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ColorArray, ColorInfo, ColorValue, PassthroughConverter};
    use pretty_assertions::assert_eq;

    fn cmyk(c: f32, m: f32, y: f32, k: f32) -> ColorArray {
        ColorArray::from_vec(vec![
            ColorValue::from_f32(c),
            ColorValue::from_f32(m),
            ColorValue::from_f32(y),
            ColorValue::from_f32(k),
        ])
    }

    #[test]
    fn freshly_initialised_block_completes_uniform() {
        let mut block = Block::new_isolated(8, 4, 4, false, &cmyk(0.0, 0.0, 0.0, 0.0), ColorValue::ZERO, ColorInfo::default(), false);
        let converter = PassthroughConverter { out_comps: 4, eight_bit: true };
        complete_block(&mut block, TableVariant::Isolated, TableVariant::Output8, 4, &converter, None, false, None).unwrap();
        assert_eq!(block.storage, Storage::Uniform);
    }

    #[test]
    fn dedup_collapses_equal_entries_written_to_distinct_slots() {
        let mut block = Block::new_isolated(4, 1, 1, false, &ColorArray::from_vec(vec![ColorValue::ZERO]), ColorValue::ZERO, ColorInfo::default(), false);
        let info = ColorInfo { pixel_label: 1, ..Default::default() };
        let color = ColorArray::from_vec(vec![ColorValue::from_f32(0.5)]);

        let mut t = Table::new(TableVariant::Isolated, 1, 4);
        t.init_entry(1, &color, ColorValue::ONE, ColorValue::ZERO, info);
        t.init_entry(3, &color, ColorValue::ONE, ColorValue::ZERO, info);
        t.set_n_used_slots(4);
        block.tables.push(t);
        block.write_run(0, 0, 2, TableRef(1), 1);
        block.write_run(2, 0, 2, TableRef(1), 3);

        let converter = PassthroughConverter { out_comps: 1, eight_bit: true };
        complete_block(&mut block, TableVariant::Isolated, TableVariant::Output8, 1, &converter, None, false, None).unwrap();
        assert_eq!(block.storage, Storage::Uniform);
    }

    #[test]
    fn blank_completed_block_is_recognised_as_poachable() {
        let converter = PassthroughConverter { out_comps: 1, eight_bit: true };
        let mut a = Block::new_isolated(4, 2, 1, false, &ColorArray::from_vec(vec![ColorValue::ZERO]), ColorValue::ZERO, ColorInfo::default(), false);
        let mut b = Block::new_isolated(4, 2, 1, false, &ColorArray::from_vec(vec![ColorValue::ZERO]), ColorValue::ZERO, ColorInfo::default(), false);
        complete_block(&mut a, TableVariant::Isolated, TableVariant::Output8, 1, &converter, None, false, None).unwrap();
        complete_block(&mut b, TableVariant::Isolated, TableVariant::Output8, 1, &converter, None, false, None).unwrap();
        assert!(is_blank(&a, &b));
    }
}
