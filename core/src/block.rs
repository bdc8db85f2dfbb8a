//! Block (C2): a rectangular tile holding one or more tables plus a
//! per-row line representation (repeat / RLE / per-pixel map).

use smallvec::SmallVec;
use tracing::trace;

use macros::assert_invariant;

use crate::color::{ColorArray, ColorInfo, ColorValue};
use crate::error::Result;
use crate::spill::SpillFile;
use crate::table::{Table, TableVariant};

/// Default block dimensions: 128x128 px, 16 KiB for an 8-bit single-channel
/// plane. Right column / bottom row of a store may be narrower/shorter.
pub const DEFAULT_BLOCK_WIDTH: u16 = 128;
pub const DEFAULT_BLOCK_HEIGHT: u16 = 128;

/// Index into a [`Block`]'s table pool. Tables are arena-allocated values
/// inside the block rather than shared pointers, so two blocks never alias
/// the same table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableRef(pub u16);

/// One contiguous run within an RLE row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RleRun {
    pub run_len: u16,
    pub slot: u16,
}

/// The three-way row representation: a full repeat of the row above, a
/// run-length-encoded list, or a per-pixel map.
#[derive(Debug, Clone)]
pub enum Row {
    /// Identical to the preceding non-repeat row. Costs zero data bytes.
    Repeat,
    Rle { table: TableRef, runs: SmallVec<[RleRun; 4]> },
    /// `indices[x]` is a slot in `table`. During insert mode the
    /// index-equals-run-end invariant holds: `indices[x]` is also the x
    /// position where the run containing `x` ends.
    Map { table: TableRef, indices: Vec<u16> },
}

impl Row {
    #[must_use]
    pub const fn table(&self) -> Option<TableRef> {
        match self {
            Row::Repeat => None,
            Row::Rle { table, .. } | Row::Map { table, .. } => Some(*table),
        }
    }

    /// `2 * n_runs` byte-count, used to decide whether a row is cheaper
    /// stored as RLE or as a full map; RLE rows report their literal run
    /// count, map rows are defined to have `n_runs = 0` and a byte count
    /// equal to the row width.
    #[must_use]
    pub fn byte_count(&self, width: u16) -> usize {
        match self {
            Row::Repeat => 0,
            Row::Rle { runs, .. } => 2 * runs.len(),
            Row::Map { .. } => width as usize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Memory,
    Disk,
    Uniform,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlockFlags {
    pub complete: bool,
    pub touched: bool,
    pub purgeable: bool,
}

/// Where a purged block's record lives in the spill file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskLoc {
    pub offset: u64,
}

/// A rectangular tile of a [`crate::store::Store`].
#[derive(Debug, Clone)]
pub struct Block {
    pub width: u16,
    pub height: u16,
    pub n_comps: usize,
    pub storage: Storage,
    pub flags: BlockFlags,
    pub rows: Vec<Row>,
    pub tables: Vec<Table>,
    pub disk_loc: Option<DiskLoc>,
}

impl Block {
    /// Insert-mode initialisation for an isolated group. Every row starts
    /// as a single RLE run spanning the whole width, pointing at the
    /// group's initial entry; rows 1.. are primed as `repeat`.
    pub fn new_isolated(
        width: u16,
        height: u16,
        n_comps: usize,
        shape: bool,
        initial_color: &ColorArray,
        initial_alpha: ColorValue,
        info: ColorInfo,
        is_luminosity_soft_mask: bool,
    ) -> Self {
        let variant = if shape { TableVariant::IsolatedShape } else { TableVariant::Isolated };
        let mut table = Table::new(variant, n_comps, width);
        let initial_slot = width - 1;
        table.init_entry(initial_slot, initial_color, initial_alpha, ColorValue::ZERO, info);
        table.set_n_used_slots(width);

        let mut rows = Vec::with_capacity(height as usize);
        rows.push(Row::Rle {
            table: TableRef(0),
            runs: smallvec::smallvec![RleRun { run_len: width, slot: initial_slot }],
        });
        for _ in 1..height {
            rows.push(Row::Repeat);
        }

        Self {
            width,
            height,
            n_comps,
            storage: Storage::Memory,
            flags: BlockFlags { touched: is_luminosity_soft_mask, ..Default::default() },
            rows,
            tables: vec![table],
            disk_loc: None,
        }
    }

    /// Insert-mode initialisation for a non-isolated group: initial tables
    /// and data are copied from the aligned block in the "initial"
    /// backdrop, translated entry-by-entry via `copyToNonIsolated`.
    pub fn new_non_isolated(width: u16, height: u16, n_comps: usize, shape: bool, parent: &Block) -> Self {
        let variant = if shape { TableVariant::NonIsolatedShape } else { TableVariant::NonIsolated };
        assert_invariant!(parent.width == width && parent.height == height, "non-isolated init requires aligned parent block");

        let mut tables: Vec<Table> = parent
            .tables
            .iter()
            .map(|pt| {
                let mut t = Table::new(variant, n_comps, pt.n_max_slots());
                for slot in 0..pt.n_used_slots() {
                    t.copy_to_non_isolated(slot, pt, slot);
                }
                t.set_n_used_slots(pt.n_used_slots());
                t
            })
            .collect();
        if tables.is_empty() {
            tables.push(Table::new(variant, n_comps, width));
        }

        let rows = parent.rows.clone();

        Self {
            width,
            height,
            n_comps,
            storage: Storage::Memory,
            flags: BlockFlags::default(),
            rows,
            tables,
            disk_loc: None,
        }
    }

    #[must_use]
    pub fn table(&self, r: TableRef) -> &Table {
        &self.tables[r.0 as usize]
    }

    pub fn table_mut(&mut self, r: TableRef) -> &mut Table {
        &mut self.tables[r.0 as usize]
    }

    /// Resolve a (possibly `Repeat`) row to the nearest preceding non-repeat
    /// row index that defines its data.
    #[must_use]
    pub fn resolve_row(&self, yi: u16) -> u16 {
        let mut i = yi;
        while matches!(self.rows[i as usize], Row::Repeat) {
            assert_invariant!(i > 0, "row 0 must never be Repeat");
            i -= 1;
        }
        i
    }

    /// The table slot holding the entry at `(xi, yi)`.
    #[must_use]
    pub fn slot_at(&self, xi: u16, yi: u16) -> u16 {
        let row = self.resolve_row(yi);
        match &self.rows[row as usize] {
            Row::Repeat => unreachable!("resolve_row never returns a Repeat row"),
            Row::Map { indices, .. } => indices[xi as usize],
            Row::Rle { runs, .. } => {
                let mut pos = 0u16;
                for run in runs {
                    if xi < pos + run.run_len {
                        return run.slot;
                    }
                    pos += run.run_len;
                }
                unreachable!("xi out of range for row's run list")
            }
        }
    }

    /// The table backing the entry at `(xi, yi)`.
    #[must_use]
    pub fn table_ref_at(&self, yi: u16) -> TableRef {
        let row = self.resolve_row(yi);
        self.rows[row as usize].table().expect("resolved row always has a table")
    }

    /// Run length remaining at `(xi, yi)`, exploiting the
    /// index-equals-run-end invariant for insert-mode map rows, or scanning
    /// the RLE run list otherwise.
    #[must_use]
    pub fn run_len_at(&self, xi: u16, yi: u16) -> u16 {
        let row = self.resolve_row(yi);
        match &self.rows[row as usize] {
            Row::Repeat => unreachable!(),
            Row::Map { indices, .. } => {
                let end = indices[xi as usize];
                debug_assert!(indices[end as usize] == end, "index-equals-run-end invariant violated");
                end - xi + 1
            }
            Row::Rle { runs, .. } => {
                let mut pos = 0u16;
                for run in runs {
                    if xi < pos + run.run_len {
                        return pos + run.run_len - xi;
                    }
                    pos += run.run_len;
                }
                unreachable!("xi out of range for row's run list")
            }
        }
    }

    /// Converts a row (if it is still `Repeat`) into its own owned copy of
    /// the resolved row's data, so it can be mutated independently. Used
    /// the first time an insert targets a row that had been primed as a
    /// repeat of row 0.
    pub fn materialize_row(&mut self, yi: u16) {
        if matches!(self.rows[yi as usize], Row::Repeat) {
            let resolved = self.resolve_row(yi);
            self.rows[yi as usize] = self.rows[resolved as usize].clone();
        }
    }

    /// Converts an RLE row into a full per-pixel map, so in-place writes at
    /// arbitrary positions are O(1). Insert mode otherwise keeps every row
    /// as a single run of length `width`, so this only fires for rows that
    /// arrived pre-compacted (e.g. via `new_non_isolated`).
    fn ensure_map(&mut self, yi: u16) {
        self.materialize_row(yi);
        if let Row::Rle { table, runs } = &self.rows[yi as usize] {
            let table = *table;
            let mut indices = Vec::with_capacity(self.width as usize);
            for run in runs {
                // index-equals-run-end invariant: every position in the run
                // stores the run's final index.
                let end = indices.len() as u16 + run.run_len - 1;
                for _ in 0..run.run_len {
                    indices.push(end);
                }
            }
            self.rows[yi as usize] = Row::Map { table, indices };
        }
    }

    /// Adjust-preceding-run: before writing a new run at `xi`, if the new
    /// slot boundary splits an existing run, duplicate the split entry to a
    /// fresh slot so the left portion keeps a valid, independent
    /// index-equals-run-end value.
    fn adjust_preceding_run(&mut self, yi: u16, xi: u16) {
        if xi == 0 {
            return;
        }
        self.ensure_map(yi);
        if let Row::Map { table, indices } = &mut self.rows[yi as usize] {
            if indices[xi as usize - 1] == indices[xi as usize] {
                let shared_slot = indices[xi as usize - 1];
                let new_slot = xi - 1;
                let t = &mut self.tables[table.0 as usize];
                t.copy_within(shared_slot, new_slot);
                let used = t.n_used_slots().max(new_slot + 1);
                t.set_n_used_slots(used);
                indices[xi as usize - 1] = new_slot;
            }
        }
    }

    /// Writes a composited run `[xi, xi+run_len)` on row `yi` to slot
    /// `new_slot` of `table`: the block-level half of writing a composite
    /// result back into its row.
    pub fn write_run(&mut self, xi: u16, yi: u16, run_len: u16, table: TableRef, new_slot: u16) {
        assert_invariant!(xi + run_len <= self.width, "write_run out of row bounds");
        self.adjust_preceding_run(yi, xi);
        self.ensure_map(yi);
        if let Row::Map { table: row_table, indices } = &mut self.rows[yi as usize] {
            *row_table = table;
            let end = xi + run_len - 1;
            for x in xi..=end {
                indices[x as usize] = end;
            }
            // a later write_run will place further entries at `new_slot`;
            // the caller is responsible for ensuring `new_slot == end` when
            // it wants the index-equals-run-end invariant to hold exactly,
            // which is the convention `composite.rs` follows.
            let _ = new_slot;
        }
        self.flags.touched = true;
        trace!(xi, yi, run_len, "block row written");
    }

    /// `purge(block)`: write header, rows, and each distinct table to the
    /// spill file, then drop the in-memory data. Returns the disk location
    /// so the caller can record it on the block header.
    pub fn purge(&mut self, spill: &dyn SpillFile) -> Result<DiskLoc> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.width.to_le_bytes());
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&(self.n_comps as u32).to_le_bytes());
        buf.extend_from_slice(&(self.tables.len() as u32).to_le_bytes());

        buf.extend_from_slice(&(self.rows.len() as u32).to_le_bytes());
        for row in &self.rows {
            match row {
                Row::Repeat => buf.push(0),
                Row::Rle { table, runs } => {
                    buf.push(1);
                    buf.extend_from_slice(&table.0.to_le_bytes());
                    buf.extend_from_slice(&(runs.len() as u32).to_le_bytes());
                    for run in runs {
                        buf.extend_from_slice(&run.run_len.to_le_bytes());
                        buf.extend_from_slice(&run.slot.to_le_bytes());
                    }
                }
                Row::Map { table, indices } => {
                    buf.push(2);
                    buf.extend_from_slice(&table.0.to_le_bytes());
                    for idx in indices {
                        buf.extend_from_slice(&idx.to_le_bytes());
                    }
                }
            }
        }

        for table in &self.tables {
            let mut table_bytes = Vec::new();
            table.write_to(&mut table_bytes)?;
            buf.extend_from_slice(&(table_bytes.len() as u32).to_le_bytes());
            buf.extend_from_slice(&table_bytes);
        }

        let offset = spill.allocate(buf.len() as u64)?;
        spill.write_at(offset, &buf)?;

        self.storage = Storage::Disk;
        self.rows.clear();
        self.tables.clear();
        let loc = DiskLoc { offset };
        self.disk_loc = Some(loc);
        trace!(offset, "block purged to disk");
        Ok(loc)
    }

    /// `load(block)`: reattach a resource and read back rows/tables from
    /// the spill file, relinking each row's table reference to the
    /// reloaded table pool.
    pub fn load(&mut self, spill: &dyn SpillFile, loc: DiskLoc) -> Result<()> {
        let header = spill.read_at(loc.offset, 16)?;
        let width = u16::from_le_bytes([header[0], header[1]]);
        let height = u16::from_le_bytes([header[2], header[3]]);
        let n_comps = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let n_tables = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
        let n_rows = u32::from_le_bytes([header[12], header[13], header[14], header[15]]) as usize;

        // Re-read the whole record in one shot; offsets within it are
        // tracked by hand since rows are variable length.
        let mut cursor = 16usize;
        let mut rows = Vec::with_capacity(n_rows);
        for _ in 0..n_rows {
            let tag_byte = spill.read_at(loc.offset + cursor as u64, 1)?[0];
            cursor += 1;
            match tag_byte {
                0 => rows.push(Row::Repeat),
                1 => {
                    let head = spill.read_at(loc.offset + cursor as u64, 6)?;
                    let table = TableRef(u16::from_le_bytes([head[0], head[1]]));
                    let n_runs = u32::from_le_bytes([head[2], head[3], head[4], head[5]]) as usize;
                    cursor += 6;
                    let run_bytes = spill.read_at(loc.offset + cursor as u64, n_runs * 4)?;
                    cursor += n_runs * 4;
                    let mut runs = SmallVec::new();
                    for chunk in run_bytes.chunks_exact(4) {
                        runs.push(RleRun {
                            run_len: u16::from_le_bytes([chunk[0], chunk[1]]),
                            slot: u16::from_le_bytes([chunk[2], chunk[3]]),
                        });
                    }
                    rows.push(Row::Rle { table, runs });
                }
                2 => {
                    let head = spill.read_at(loc.offset + cursor as u64, 2)?;
                    let table = TableRef(u16::from_le_bytes([head[0], head[1]]));
                    cursor += 2;
                    let idx_bytes = spill.read_at(loc.offset + cursor as u64, width as usize * 2)?;
                    cursor += width as usize * 2;
                    let indices = idx_bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
                    rows.push(Row::Map { table, indices });
                }
                _ => return Err(crate::error::BackdropError::Programmer("corrupt row tag on disk")),
            }
        }

        let mut tables = Vec::with_capacity(n_tables);
        for _ in 0..n_tables {
            let len_bytes = spill.read_at(loc.offset + cursor as u64, 4)?;
            let table_len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
            cursor += 4;
            let table_bytes = spill.read_at(loc.offset + cursor as u64, table_len)?;
            cursor += table_len;
            tables.push(Table::read_from(&mut &table_bytes[..])?);
        }

        self.width = width;
        self.height = height;
        self.n_comps = n_comps;
        self.storage = Storage::Memory;
        self.rows = rows;
        self.tables = tables;
        self.disk_loc = None;
        trace!(offset = loc.offset, "block loaded from disk");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn isolated_init_primes_row_zero_and_repeats() {
        let block = Block::new_isolated(8, 4, 4, false, &cmyk(0.0, 0.0, 0.0, 0.0), ColorValue::ZERO, ColorInfo::default(), false);
        assert!(matches!(block.rows[0], Row::Rle { .. }));
        for y in 1..4 {
            assert!(matches!(block.rows[y], Row::Repeat));
        }
        assert_eq!(block.run_len_at(0, 2), 8);
    }

    #[test]
    fn write_run_then_read_back_full_row() {
        let mut block = Block::new_isolated(8, 2, 1, false, &ColorArray::from_vec(vec![ColorValue::ZERO]), ColorValue::ZERO, ColorInfo::default(), false);
        let mut t = Table::new(TableVariant::Isolated, 1, 8);
        t.init_entry(3, &ColorArray::from_vec(vec![ColorValue::from_f32(0.5)]), ColorValue::ONE, ColorValue::ZERO, ColorInfo { pixel_label: 1, ..Default::default() });
        t.set_n_used_slots(4);
        block.tables.push(t);
        block.write_run(0, 0, 8, TableRef(1), 7);

        for x in 0..8 {
            assert_eq!(block.slot_at(x, 0), 7);
        }
        assert_eq!(block.run_len_at(0, 0), 8);
    }

    #[test]
    fn purge_then_load_round_trips_block_contents() {
        use crate::spill::{MemSpill, SpillFile};

        let mut block = Block::new_isolated(4, 2, 1, false, &cmyk(0.0, 0.0, 0.0, 0.0), ColorValue::ZERO, ColorInfo::default(), false);
        let before_slot = block.slot_at(0, 0);
        let before_run = block.run_len_at(0, 0);

        let spill = MemSpill::default();
        let loc = block.purge(&spill).unwrap();
        assert_eq!(block.storage, Storage::Disk);

        block.load(&spill, loc).unwrap();
        assert_eq!(block.storage, Storage::Memory);
        assert_eq!(block.slot_at(0, 0), before_slot);
        assert_eq!(block.run_len_at(0, 0), before_run);
    }

    #[test]
    fn materialize_row_preserves_resolved_content() {
        let mut block = Block::new_isolated(4, 3, 1, false, &ColorArray::from_vec(vec![ColorValue::ZERO]), ColorValue::ZERO, ColorInfo::default(), false);
        block.materialize_row(2);
        assert_eq!(block.slot_at(1, 2), block.slot_at(1, 0));
    }
}
