//! Table (C1): a fixed-capacity slot array of premultiplied color + alpha
//! (+groupAlpha)(+shape)(+info).

use std::io::{self, Read, Write};

use macros::assert_invariant;
use smallvec::SmallVec;

use crate::color::{ColorArray, ColorConverter, ColorInfo, ColorValue, ConvertedOutput};
use crate::error::{BackdropError, Result};
use crate::hash::hsieh_hash_words;

/// Default width of the dedup hash table used by [`crate::complete`]; kept
/// a power of two so the mask in [`Table::hash_val`] is a single `&`.
pub const HASH_BUCKETS: usize = 2048;

/// Which optional fields a table carries, and how its colors are
/// interpreted at completion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableVariant {
    Isolated,
    IsolatedShape,
    NonIsolated,
    NonIsolatedShape,
    /// Alpha-only storage, used for soft masks.
    Alpha,
    Output8,
    Output16,
}

impl TableVariant {
    #[must_use]
    pub const fn has_group_alpha(self) -> bool {
        matches!(self, Self::NonIsolated | Self::NonIsolatedShape)
    }

    #[must_use]
    pub const fn has_shape(self) -> bool {
        matches!(self, Self::IsolatedShape | Self::NonIsolatedShape)
    }

    #[must_use]
    pub const fn has_color(self) -> bool {
        !matches!(self, Self::Alpha)
    }

    #[must_use]
    pub const fn is_output(self) -> bool {
        matches!(self, Self::Output8 | Self::Output16)
    }
}

/// A homogeneously-typed, fixed-capacity array of up to 256 entries.
///
/// Field vectors are all allocated to `n_max_slots` up front (invariant
/// (e): layout is derived purely from `(variant, n_comps, n_max_slots)`, so
/// nothing here is a raw/persisted pointer).
#[derive(Debug, Clone)]
pub struct Table {
    pub variant: TableVariant,
    pub n_comps: usize,
    n_max_slots: u16,
    n_used_slots: u16,
    colors: Vec<ColorArray>,
    alpha: Vec<ColorValue>,
    group_alpha: Vec<ColorValue>,
    shape: Vec<ColorValue>,
    info: Vec<ColorInfo>,
    output: Option<ConvertedOutput>,
}

impl Table {
    /// Byte count for `(variant, n_comps, n_slots)`, 8-byte aligned, used
    /// both for in-memory provisioning estimates and disk-record sizing.
    #[must_use]
    pub fn size(variant: TableVariant, n_comps: usize, n_slots: usize) -> usize {
        let mut bytes = 0usize;
        if variant.has_color() {
            bytes += n_slots * n_comps * 2;
        }
        bytes += n_slots * 2; // alpha
        if variant.has_group_alpha() {
            bytes += n_slots * 2;
        }
        if variant.has_shape() {
            bytes += n_slots * 2;
        }
        bytes += n_slots * std::mem::size_of::<ColorInfo>();
        (bytes + 7) & !7
    }

    /// `init(variant, nComps, nMaxSlots)`.
    #[must_use]
    pub fn new(variant: TableVariant, n_comps: usize, n_max_slots: u16) -> Self {
        let n = n_max_slots as usize;
        Self {
            variant,
            n_comps,
            n_max_slots,
            n_used_slots: 0,
            colors: vec![ColorArray::from_elem(ColorValue::ZERO, n_comps); if variant.has_color() { n } else { 0 }],
            alpha: vec![ColorValue::ZERO; n],
            group_alpha: vec![ColorValue::ZERO; if variant.has_group_alpha() { n } else { 0 }],
            shape: vec![ColorValue::ZERO; if variant.has_shape() { n } else { 0 }],
            info: vec![ColorInfo::default(); n],
            output: None,
        }
    }

    /// `reset(nComps)` — re-lay the table out for a new component count,
    /// dropping all entries.
    pub fn reset(&mut self, n_comps: usize) {
        let n = self.n_max_slots as usize;
        self.n_comps = n_comps;
        self.n_used_slots = 0;
        if self.variant.has_color() {
            self.colors = vec![ColorArray::from_elem(ColorValue::ZERO, n_comps); n];
        }
        self.alpha = vec![ColorValue::ZERO; n];
        if self.variant.has_group_alpha() {
            self.group_alpha = vec![ColorValue::ZERO; n];
        }
        if self.variant.has_shape() {
            self.shape = vec![ColorValue::ZERO; n];
        }
        self.info = vec![ColorInfo::default(); n];
    }

    #[must_use]
    pub const fn n_max_slots(&self) -> u16 {
        self.n_max_slots
    }

    #[must_use]
    pub const fn n_used_slots(&self) -> u16 {
        self.n_used_slots
    }

    #[must_use]
    pub fn output(&self) -> Option<&ConvertedOutput> {
        self.output.as_ref()
    }

    pub fn set_n_used_slots(&mut self, n: u16) {
        assert_invariant!(n <= self.n_max_slots, "n_used_slots must not exceed n_max_slots");
        self.n_used_slots = n;
    }

    #[must_use]
    pub fn color(&self, slot: u16) -> &ColorArray {
        &self.colors[slot as usize]
    }

    #[must_use]
    pub fn alpha(&self, slot: u16) -> ColorValue {
        self.alpha[slot as usize]
    }

    #[must_use]
    pub fn group_alpha(&self, slot: u16) -> ColorValue {
        self.group_alpha.get(slot as usize).copied().unwrap_or(ColorValue::ZERO)
    }

    #[must_use]
    pub fn shape(&self, slot: u16) -> ColorValue {
        self.shape.get(slot as usize).copied().unwrap_or(ColorValue::ZERO)
    }

    #[must_use]
    pub fn info(&self, slot: u16) -> ColorInfo {
        self.info[slot as usize]
    }

    /// `initEntry(slot, color, alpha, groupAlpha, info)`.
    pub fn init_entry(&mut self, slot: u16, color: &ColorArray, alpha: ColorValue, group_alpha: ColorValue, info: ColorInfo) {
        assert_invariant!(slot < self.n_max_slots, "slot out of range");
        let i = slot as usize;
        if self.variant.has_color() {
            self.colors[i] = color.clone();
        }
        self.alpha[i] = alpha;
        if self.variant.has_group_alpha() {
            self.group_alpha[i] = group_alpha;
        }
        if self.variant.has_shape() {
            self.shape[i] = alpha;
        }
        self.info[i] = info;
    }

    /// Overwrites a slot's shape value after `initEntry` (which seeds shape
    /// from alpha, the correct value only for freshly-initialised entries).
    pub fn set_shape(&mut self, slot: u16, value: ColorValue) {
        if self.variant.has_shape() {
            self.shape[slot as usize] = value;
        }
    }

    /// Overwrites a slot's groupAlpha value after `initEntry`.
    pub fn set_group_alpha(&mut self, slot: u16, value: ColorValue) {
        if self.variant.has_group_alpha() {
            self.group_alpha[slot as usize] = value;
        }
    }

    /// `copyEntry(fromTable, fromSlot, toTable, toSlot)` for distinct tables.
    pub fn copy_entry_from(&mut self, to_slot: u16, from: &Table, from_slot: u16) {
        assert_invariant!(self.variant == from.variant, "copy_entry_from requires matching variants");
        let (ti, fi) = (to_slot as usize, from_slot as usize);
        if self.variant.has_color() {
            self.colors[ti] = from.colors[fi].clone();
        }
        self.alpha[ti] = from.alpha[fi];
        if self.variant.has_group_alpha() {
            self.group_alpha[ti] = from.group_alpha[fi];
        }
        if self.variant.has_shape() {
            self.shape[ti] = from.shape[fi];
        }
        self.info[ti] = from.info[fi];
    }

    /// `copyEntry` within the same table (e.g. the adjust-preceding-run
    /// step, which duplicates an entry to a fresh index before truncating
    /// the run that used to own it).
    pub fn copy_within(&mut self, from_slot: u16, to_slot: u16) {
        let (fi, ti) = (from_slot as usize, to_slot as usize);
        if self.variant.has_color() {
            self.colors[ti] = self.colors[fi].clone();
        }
        self.alpha[ti] = self.alpha[fi];
        if self.variant.has_group_alpha() {
            self.group_alpha[ti] = self.group_alpha[fi];
        }
        if self.variant.has_shape() {
            self.shape[ti] = self.shape[fi];
        }
        self.info[ti] = self.info[fi];
    }

    /// `equalEntry(t1, s1, t2, s2, nComps)`. `label==0` is wild: if either
    /// side is unlabelled, they compare equal regardless of other fields —
    /// "nothing drawn here" is interchangeable wherever it occurs.
    #[must_use]
    pub fn equal_entry(t1: &Table, s1: u16, t2: &Table, s2: u16) -> bool {
        assert_invariant!(t1.variant == t2.variant, "equal_entry requires matching variants");
        let (i1, i2) = (s1 as usize, s2 as usize);
        if t1.info[i1].is_unlabelled() && t2.info[i2].is_unlabelled() {
            return true;
        }
        if t1.info[i1] != t2.info[i2] {
            return false;
        }
        if t1.variant == TableVariant::Alpha {
            return t1.alpha[i1] == t2.alpha[i2];
        }
        if t1.alpha[i1] != t2.alpha[i2] {
            return false;
        }
        if t1.variant.has_group_alpha() && t1.group_alpha[i1] != t2.group_alpha[i2] {
            return false;
        }
        if t1.variant.has_shape() && t1.shape[i1] != t2.shape[i2] {
            return false;
        }
        if t1.variant.has_color() {
            return t1.colors[i1] == t2.colors[i2];
        }
        true
    }

    /// `hashVal(slot)` — 32-bit Hsieh accumulator over color + info words +
    /// alpha(+groupAlpha)(+shape), masked to [`HASH_BUCKETS`].
    #[must_use]
    pub fn hash_val(&self, slot: u16) -> u32 {
        let i = slot as usize;
        let mut words: SmallVec<[u32; 40]> = SmallVec::new();
        if self.variant.has_color() {
            for c in &self.colors[i] {
                words.push(u32::from(c.0));
            }
        }
        words.push(u32::from(self.alpha[i].0));
        if self.variant.has_group_alpha() {
            words.push(u32::from(self.group_alpha[i].0));
        }
        if self.variant.has_shape() {
            words.push(u32::from(self.shape[i].0));
        }
        let [w0, w1] = self.info[i].hash_words();
        words.push(w0);
        words.push(w1);
        let hash = hsieh_hash_words(&words, 0);
        hash & (HASH_BUCKETS as u32 - 1)
    }

    /// `copyToNonIsolated(fromTable, fromSlot, toTable, toSlot)` —
    /// initialises a non-isolated entry from an isolated/non-isolated
    /// parent entry: groupAlpha and shape are zeroed, label is forced to 0
    /// (the initial backdrop has definitionally drawn nothing yet).
    pub fn copy_to_non_isolated(&mut self, to_slot: u16, from: &Table, from_slot: u16) {
        assert_invariant!(self.variant.has_group_alpha(), "destination of copy_to_non_isolated must be non-isolated");
        let (ti, fi) = (to_slot as usize, from_slot as usize);
        if self.variant.has_color() && from.variant.has_color() {
            self.colors[ti] = from.colors[fi].clone();
        }
        self.alpha[ti] = from.alpha[fi];
        self.group_alpha[ti] = ColorValue::ZERO;
        if self.variant.has_shape() {
            self.shape[ti] = ColorValue::ZERO;
        }
        self.info[ti] = ColorInfo::default();
    }

    /// `compositeToPage(nComps, pageColor)` — for every used slot,
    /// normal-composite with the page color at alpha 1. Labels are
    /// preserved.
    pub fn composite_to_page(&mut self, page_color: &ColorArray) {
        assert_invariant!(self.variant.has_color(), "compositeToPage requires a colored table");
        for i in 0..self.n_used_slots as usize {
            let a = self.alpha[i];
            for (c, page_c) in self.colors[i].iter_mut().zip(page_color.iter()) {
                let src_premult = *c;
                let bg_contrib = page_c.multiply(ColorValue(ColorValue::ONE.0.wrapping_sub(a.0)));
                c.0 = src_premult.0.saturating_add(bg_contrib.0);
            }
            self.alpha[i] = ColorValue::ONE;
        }
    }

    /// `divideAlpha(nComps)` — unpremultiply every used slot; divide by
    /// zero yields zero.
    pub fn divide_alpha(&mut self) {
        assert_invariant!(self.variant.has_color(), "divideAlpha requires a colored table");
        for i in 0..self.n_used_slots as usize {
            let a = self.alpha[i];
            for c in &mut self.colors[i] {
                *c = c.divide(a);
            }
        }
    }

    /// `setAlphaFromGroupAlpha()` — final alpha becomes groupAlpha, used
    /// when a non-isolated group's blend space is the parent's.
    pub fn set_alpha_from_group_alpha(&mut self) {
        assert_invariant!(self.variant.has_group_alpha(), "setAlphaFromGroupAlpha requires groupAlpha");
        for i in 0..self.n_used_slots as usize {
            self.alpha[i] = self.group_alpha[i];
        }
    }

    /// `applySoftMaskTransfer(transfer)` — evaluate a monotonic 1D
    /// function on each used slot's alpha.
    pub fn apply_soft_mask_transfer(&mut self, transfer: &dyn SoftMaskTransfer) {
        for i in 0..self.n_used_slots as usize {
            self.alpha[i] = transfer.evaluate(self.alpha[i]);
        }
    }

    /// `colorConvert(inputTable, outVariant, outComps, converter,
    /// outputTable)`. When the output variant needs no reshuffling besides
    /// color (i.e. `info`/`alpha`/`shape` already line up), writes directly
    /// into a freshly allocated output table sized to `n_used_slots`.
    pub fn color_convert(&self, out_variant: TableVariant, out_comps: usize, converter: &dyn ColorConverter) -> Result<Table> {
        assert_invariant!(out_variant.is_output(), "color_convert destination must be an output variant");
        let n = self.n_used_slots;
        let mut out = Table::new(out_variant, out_comps, n);
        out.n_used_slots = n;
        let infos: Vec<ColorInfo> = self.info[..n as usize].to_vec();
        let colors: Vec<ColorArray> = if self.variant.has_color() {
            self.colors[..n as usize].to_vec()
        } else {
            vec![ColorArray::new(); n as usize]
        };
        let mut buf = if out_variant == TableVariant::Output8 {
            ConvertedOutput::Bytes8(vec![0u8; n as usize * out_comps])
        } else {
            ConvertedOutput::Bytes16(vec![0u16; n as usize * out_comps])
        };
        converter.convert(&infos, &colors, &mut buf)?;
        out.info.clone_from(&infos);
        out.output = Some(buf);
        Ok(out)
    }

    /// Sequential disk write: header, info array, color array, with
    /// `nMaxSlots` reset to `nUsedSlots` so the reload is exact.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&(self.variant as u8 as u32).to_le_bytes())?;
        w.write_all(&(self.n_comps as u32).to_le_bytes())?;
        w.write_all(&u32::from(self.n_used_slots).to_le_bytes())?;
        for i in 0..self.n_used_slots as usize {
            let info = self.info[i];
            w.write_all(&info.spot_number.to_le_bytes())?;
            w.write_all(&[info.color_type, info.rendering_intent as u8, info.black_type, info.reproduction_model])?;
            w.write_all(&info.pixel_label.to_le_bytes())?;
            w.write_all(&[info.flags.0])?;
            w.write_all(&self.alpha[i].0.to_le_bytes())?;
            if self.variant.has_group_alpha() {
                w.write_all(&self.group_alpha[i].0.to_le_bytes())?;
            }
            if self.variant.has_shape() {
                w.write_all(&self.shape[i].0.to_le_bytes())?;
            }
            if self.variant.has_color() {
                for c in &self.colors[i] {
                    w.write_all(&c.0.to_le_bytes())?;
                }
            }
        }
        match &self.output {
            None => w.write_all(&[0])?,
            Some(ConvertedOutput::Bytes8(buf)) => {
                w.write_all(&[1])?;
                w.write_all(&(buf.len() as u32).to_le_bytes())?;
                w.write_all(buf)?;
            }
            Some(ConvertedOutput::Bytes16(buf)) => {
                w.write_all(&[2])?;
                w.write_all(&(buf.len() as u32).to_le_bytes())?;
                for v in buf {
                    w.write_all(&v.to_le_bytes())?;
                }
            }
        }
        Ok(())
    }

    /// Inverse of [`Table::write_to`]: `variant`/`n_comps` are recomputed
    /// from the header, never trusted from the caller.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Table> {
        let mut buf4 = [0u8; 4];
        r.read_exact(&mut buf4)?;
        let variant = variant_from_u32(u32::from_le_bytes(buf4))?;
        r.read_exact(&mut buf4)?;
        let n_comps = u32::from_le_bytes(buf4) as usize;
        r.read_exact(&mut buf4)?;
        let n_used = u32::from_le_bytes(buf4) as u16;

        let mut table = Table::new(variant, n_comps, n_used);
        table.n_used_slots = n_used;
        for i in 0..n_used as usize {
            let mut u16b = [0u8; 2];
            r.read_exact(&mut u16b)?;
            let spot_number = u16::from_le_bytes(u16b);
            let mut four = [0u8; 4];
            r.read_exact(&mut four)?;
            let [color_type, rendering_intent, black_type, reproduction_model] = four;
            let mut u32b = [0u8; 4];
            r.read_exact(&mut u32b)?;
            let pixel_label = u32::from_le_bytes(u32b);
            let mut one = [0u8; 1];
            r.read_exact(&mut one)?;
            table.info[i] = ColorInfo {
                spot_number,
                color_type,
                rendering_intent: crate::color::RenderingIntent::from_u8(rendering_intent),
                black_type,
                reproduction_model,
                pixel_label,
                flags: crate::color::ColorInfoFlags(one[0]),
            };
            r.read_exact(&mut u16b)?;
            table.alpha[i] = ColorValue(u16::from_le_bytes(u16b));
            if variant.has_group_alpha() {
                r.read_exact(&mut u16b)?;
                table.group_alpha[i] = ColorValue(u16::from_le_bytes(u16b));
            }
            if variant.has_shape() {
                r.read_exact(&mut u16b)?;
                table.shape[i] = ColorValue(u16::from_le_bytes(u16b));
            }
            if variant.has_color() {
                let mut color = ColorArray::with_capacity(n_comps);
                for _ in 0..n_comps {
                    r.read_exact(&mut u16b)?;
                    color.push(ColorValue(u16::from_le_bytes(u16b)));
                }
                table.colors[i] = color;
            }
        }

        let mut tag = [0u8; 1];
        r.read_exact(&mut tag)?;
        table.output = match tag[0] {
            0 => None,
            1 => {
                let mut len_bytes = [0u8; 4];
                r.read_exact(&mut len_bytes)?;
                let len = u32::from_le_bytes(len_bytes) as usize;
                let mut buf = vec![0u8; len];
                r.read_exact(&mut buf)?;
                Some(ConvertedOutput::Bytes8(buf))
            }
            2 => {
                let mut len_bytes = [0u8; 4];
                r.read_exact(&mut len_bytes)?;
                let len = u32::from_le_bytes(len_bytes) as usize;
                let mut buf = Vec::with_capacity(len);
                let mut word = [0u8; 2];
                for _ in 0..len {
                    r.read_exact(&mut word)?;
                    buf.push(u16::from_le_bytes(word));
                }
                Some(ConvertedOutput::Bytes16(buf))
            }
            _ => return Err(BackdropError::Programmer("corrupt table output tag on disk")),
        };
        Ok(table)
    }
}

fn variant_from_u32(v: u32) -> Result<TableVariant> {
    Ok(match v {
        0 => TableVariant::Isolated,
        1 => TableVariant::IsolatedShape,
        2 => TableVariant::NonIsolated,
        3 => TableVariant::NonIsolatedShape,
        4 => TableVariant::Alpha,
        5 => TableVariant::Output8,
        6 => TableVariant::Output16,
        _ => return Err(BackdropError::Unsupported("unknown table variant tag on disk")),
    })
}

/// A monotonic 1D soft-mask transfer function.
pub trait SoftMaskTransfer {
    fn evaluate(&self, alpha: ColorValue) -> ColorValue;
}

impl<F: Fn(ColorValue) -> ColorValue> SoftMaskTransfer for F {
    fn evaluate(&self, alpha: ColorValue) -> ColorValue {
        self(alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PassthroughConverter;
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
    fn equal_entry_treats_unlabelled_as_wild() {
        let mut t1 = Table::new(TableVariant::Isolated, 4, 2);
        let mut t2 = Table::new(TableVariant::Isolated, 4, 2);
        t1.init_entry(0, &cmyk(0.1, 0.0, 0.0, 0.0), ColorValue::ONE, ColorValue::ZERO, ColorInfo::default());
        t2.init_entry(0, &cmyk(0.9, 0.5, 0.2, 0.1), ColorValue::ZERO, ColorValue::ZERO, ColorInfo::default());
        assert!(Table::equal_entry(&t1, 0, &t2, 0));
    }

    #[test]
    fn equal_entry_requires_matching_labelled_fields() {
        let mut t1 = Table::new(TableVariant::Isolated, 4, 2);
        let mut t2 = Table::new(TableVariant::Isolated, 4, 2);
        let info = ColorInfo { pixel_label: 7, ..Default::default() };
        t1.init_entry(0, &cmyk(0.1, 0.0, 0.0, 0.0), ColorValue::ONE, ColorValue::ZERO, info);
        t2.init_entry(0, &cmyk(0.1, 0.0, 0.0, 0.0), ColorValue::ONE, ColorValue::ZERO, info);
        assert!(Table::equal_entry(&t1, 0, &t2, 0));
        t2.init_entry(0, &cmyk(0.2, 0.0, 0.0, 0.0), ColorValue::ONE, ColorValue::ZERO, info);
        assert!(!Table::equal_entry(&t1, 0, &t2, 0));
    }

    #[test]
    fn divide_alpha_is_left_inverse_of_multiply_for_nonzero_alpha() {
        let mut t = Table::new(TableVariant::Isolated, 1, 1);
        let alpha = ColorValue::from_f32(0.4);
        let color = ColorValue::from_f32(0.6);
        let premult = ColorArray::from_vec(vec![color.multiply(alpha)]);
        t.init_entry(0, &premult, alpha, ColorValue::ZERO, ColorInfo { pixel_label: 1, ..Default::default() });
        t.set_n_used_slots(1);
        t.divide_alpha();
        assert!((i32::from(t.color(0)[0].0) - i32::from(color.0)).abs() <= 1);
    }

    #[test]
    fn color_convert_truncates_to_8_bit() {
        let mut t = Table::new(TableVariant::Isolated, 1, 1);
        t.init_entry(0, &ColorArray::from_vec(vec![ColorValue(0xABCD)]), ColorValue::ONE, ColorValue::ZERO, ColorInfo { pixel_label: 1, ..Default::default() });
        t.set_n_used_slots(1);
        let converter = PassthroughConverter { out_comps: 1, eight_bit: true };
        let out = t.color_convert(TableVariant::Output8, 1, &converter).unwrap();
        match out.output().unwrap() {
            ConvertedOutput::Bytes8(bytes) => assert_eq!(bytes[0], 0xAB),
            ConvertedOutput::Bytes16(_) => panic!("expected 8-bit output"),
        }
    }

    #[test]
    fn disk_round_trip_preserves_entries() {
        let mut t = Table::new(TableVariant::Isolated, 4, 4);
        t.init_entry(0, &cmyk(0.5, 0.0, 0.25, 0.0), ColorValue::ONE, ColorValue::ZERO, ColorInfo { pixel_label: 3, ..Default::default() });
        t.set_n_used_slots(1);

        let mut buf = Vec::new();
        t.write_to(&mut buf).unwrap();
        let reloaded = Table::read_from(&mut &buf[..]).unwrap();

        assert_eq!(reloaded.n_used_slots(), 1);
        assert_eq!(reloaded.n_max_slots(), 1);
        assert!(Table::equal_entry(&t, 0, &reloaded, 0));
    }

    #[test]
    fn disk_round_trip_preserves_converted_output_bytes() {
        let mut t = Table::new(TableVariant::Isolated, 1, 1);
        t.init_entry(0, &ColorArray::from_vec(vec![ColorValue(0xABCD)]), ColorValue::ONE, ColorValue::ZERO, ColorInfo { pixel_label: 1, ..Default::default() });
        t.set_n_used_slots(1);
        let converter = PassthroughConverter { out_comps: 1, eight_bit: true };
        let out = t.color_convert(TableVariant::Output8, 1, &converter).unwrap();

        let mut buf = Vec::new();
        out.write_to(&mut buf).unwrap();
        let reloaded = Table::read_from(&mut &buf[..]).unwrap();
        match reloaded.output().unwrap() {
            ConvertedOutput::Bytes8(bytes) => assert_eq!(bytes[0], 0xAB),
            ConvertedOutput::Bytes16(_) => panic!("expected 8-bit output"),
        }
    }
}
