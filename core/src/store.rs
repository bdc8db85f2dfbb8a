//! Store / `Backdrop` (C4): the 2D grid of blocks for one group, plus the
//! state ([`BackdropShared`]) common to every store on one page.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::block::Block;
use crate::color::{ColorArray, ColorConverter, ColorInfo, ColorValue};
use crate::pool::ResourcePool;
use crate::spill::SpillFile;

/// Controls whether completed blocks may be freed, kept for a band, or kept
/// for the whole page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionMode {
    RetainNothing,
    RetainBand,
    RetainPage,
}

/// A soft mask's evaluation basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftMaskType {
    Alpha,
    Luminosity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    #[must_use]
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1.min(other.x1);
        let y1 = self.y1.min(other.y1);
        (x0 < x1 && y0 < y1).then_some(Rect { x0, y0, x1, y1 })
    }
}

/// An entry on the shared purgeable-block list: which store and tile.
#[derive(Debug, Clone, Copy)]
pub struct PurgeEntry {
    pub store: StoreRef,
    pub bx: u16,
    pub by: u16,
}

/// State shared by every store on one page: block dimensions, retention
/// policy, the purge list, and the disk-spill backend.
pub struct BackdropShared {
    pub block_width: u16,
    pub block_height: u16,
    pub region_height: u16,
    pub retention: RetentionMode,
    pub reserve_size: usize,
    pub spill: Box<dyn SpillFile>,
    pub resources: ResourcePool,
    /// Mutated only under this mutex: purge-list splice and unlink/relink
    /// bookkeeping during reads.
    purge_list: Mutex<VecDeque<PurgeEntry>>,
}

impl BackdropShared {
    #[must_use]
    pub fn new(block_width: u16, block_height: u16, region_height: u16, retention: RetentionMode, reserve_size: usize, spill: Box<dyn SpillFile>, max_resources_per_key: usize) -> Self {
        Self {
            block_width,
            block_height,
            region_height,
            retention,
            reserve_size,
            spill,
            resources: ResourcePool::new(max_resources_per_key),
            purge_list: Mutex::new(VecDeque::new()),
        }
    }

    pub fn mark_purgeable(&self, entry: PurgeEntry) {
        let mut list = self.purge_list.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        list.push_back(entry);
    }

    /// Removes a block from the purge list for the duration of a read: the
    /// purge thread must not free a block a reader has temporarily
    /// unlinked.
    pub fn unlink_purgeable(&self, store: StoreRef, bx: u16, by: u16) -> bool {
        let mut list = self.purge_list.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(pos) = list.iter().position(|e| e.store == store && e.bx == bx && e.by == by) {
            list.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn relink_purgeable(&self, entry: PurgeEntry) {
        self.mark_purgeable(entry);
    }

    #[must_use]
    pub fn purge_list_len(&self) -> usize {
        self.purge_list.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }
}

/// An index into a [`StoreArena`]. Non-isolated stores hold their "initial"
/// backdrop and their parent as `StoreRef`s rather than owning pointers,
/// since a group and its initial backdrop can reference each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreRef(pub usize);

/// The grid of blocks for one group.
pub struct Store {
    pub shared: Arc<BackdropShared>,
    pub bounds: Rect,
    pub xblocks: u16,
    pub yblocks: u16,
    blocks: Vec<Option<Block>>,
    pub isolated: bool,
    pub knockout: bool,
    pub shape: bool,
    pub soft_mask: Option<SoftMaskType>,
    pub composite_to_page: bool,
    pub in_comps: usize,
    pub out_comps: usize,
    pub converter: Arc<dyn ColorConverter>,
    pub parent: Option<StoreRef>,
    /// Back-reference only, for non-isolated initial-color lookup; not an
    /// ownership edge.
    pub initial: Option<StoreRef>,
    pub initial_color: ColorArray,
    pub initial_alpha: ColorValue,
    pub initial_info: ColorInfo,
    pub page_color: ColorArray,
}

impl Store {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        shared: Arc<BackdropShared>,
        bounds: Rect,
        isolated: bool,
        knockout: bool,
        shape: bool,
        soft_mask: Option<SoftMaskType>,
        composite_to_page: bool,
        in_comps: usize,
        out_comps: usize,
        converter: Arc<dyn ColorConverter>,
        parent: Option<StoreRef>,
        initial: Option<StoreRef>,
        initial_color: ColorArray,
        initial_alpha: ColorValue,
        page_color: ColorArray,
    ) -> Self {
        let xblocks = bounds.width().div_ceil(u32::from(shared.block_width)) as u16;
        let yblocks = bounds.height().div_ceil(u32::from(shared.block_height)) as u16;
        Self {
            shared,
            bounds,
            xblocks,
            yblocks,
            blocks: (0..(xblocks as usize * yblocks as usize)).map(|_| None).collect(),
            isolated,
            knockout,
            shape,
            soft_mask,
            composite_to_page,
            in_comps,
            out_comps,
            converter,
            parent,
            initial,
            initial_color,
            initial_alpha,
            initial_info: ColorInfo::default(),
            page_color,
        }
    }

    fn tile_index(&self, bx: u16, by: u16) -> usize {
        by as usize * self.xblocks as usize + bx as usize
    }

    /// Width in pixels of the tile at `(bx, by)`: the default block width,
    /// except the rightmost column which may be narrower to tile the
    /// store exactly.
    #[must_use]
    pub fn tile_width(&self, bx: u16) -> u16 {
        let full = self.shared.block_width;
        let remaining = self.bounds.width() - u32::from(bx) * u32::from(full);
        remaining.min(u32::from(full)) as u16
    }

    #[must_use]
    pub fn tile_height(&self, by: u16) -> u16 {
        let full = self.shared.block_height;
        let remaining = self.bounds.height() - u32::from(by) * u32::from(full);
        remaining.min(u32::from(full)) as u16
    }

    #[must_use]
    pub fn block(&self, bx: u16, by: u16) -> Option<&Block> {
        self.blocks[self.tile_index(bx, by)].as_ref()
    }

    pub fn block_mut(&mut self, bx: u16, by: u16) -> Option<&mut Block> {
        let idx = self.tile_index(bx, by);
        self.blocks[idx].as_mut()
    }

    pub fn set_block(&mut self, bx: u16, by: u16, block: Block) {
        let idx = self.tile_index(bx, by);
        self.blocks[idx] = Some(block);
    }

    pub fn take_block(&mut self, bx: u16, by: u16) -> Option<Block> {
        let idx = self.tile_index(bx, by);
        self.blocks[idx].take()
    }

    /// Lazily creates an isolated-group insert-mode block on first touch
    /// within a region.
    pub fn ensure_isolated_block(&mut self, bx: u16, by: u16) -> &mut Block {
        let idx = self.tile_index(bx, by);
        if self.blocks[idx].is_none() {
            let width = self.tile_width(bx);
            let height = self.tile_height(by);
            let is_luminosity_mask = self.soft_mask == Some(SoftMaskType::Luminosity);
            debug!(bx, by, width, height, "creating isolated block");
            self.blocks[idx] = Some(Block::new_isolated(width, height, self.in_comps, self.shape, &self.initial_color, self.initial_alpha, self.initial_info, is_luminosity_mask));
        }
        self.blocks[idx].as_mut().expect("just inserted")
    }

    /// Lazily creates a non-isolated insert-mode block, copying initial
    /// state from the aligned tile of `initial_block` (the store's
    /// "initial" backdrop, looked up by the caller via the store arena).
    pub fn ensure_non_isolated_block(&mut self, bx: u16, by: u16, initial_block: &Block) -> &mut Block {
        let idx = self.tile_index(bx, by);
        if self.blocks[idx].is_none() {
            let width = self.tile_width(bx);
            let height = self.tile_height(by);
            debug!(bx, by, width, height, "creating non-isolated block");
            self.blocks[idx] = Some(Block::new_non_isolated(width, height, self.in_comps, self.shape, initial_block));
        }
        self.blocks[idx].as_mut().expect("just inserted")
    }
}

/// Owns every store on a page; cross-store references go through
/// [`StoreRef`] rather than raw pointers.
#[derive(Default)]
pub struct StoreArena {
    stores: Vec<Store>,
}

impl StoreArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, store: Store) -> StoreRef {
        self.stores.push(store);
        StoreRef(self.stores.len() - 1)
    }

    #[must_use]
    pub fn get(&self, r: StoreRef) -> &Store {
        &self.stores[r.0]
    }

    pub fn get_mut(&mut self, r: StoreRef) -> &mut Store {
        &mut self.stores[r.0]
    }

    /// Splits out two mutable borrows by index; used when composing a
    /// non-isolated child's block against its initial backdrop's block.
    pub fn get2_mut(&mut self, a: StoreRef, b: StoreRef) -> (&mut Store, &mut Store) {
        assert_ne!(a.0, b.0, "get2_mut requires distinct stores");
        if a.0 < b.0 {
            let (left, right) = self.stores.split_at_mut(b.0);
            (&mut left[a.0], &mut right[0])
        } else {
            let (left, right) = self.stores.split_at_mut(a.0);
            (&mut right[0], &mut left[b.0])
        }
    }
}
