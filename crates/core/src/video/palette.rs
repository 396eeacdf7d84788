//! Indexed palettes: RAM palettes the CPU writes and PROM palettes fixed
//! at power-on.
//!
//! A RAM palette keeps the raw bytes the CPU wrote and converts entries to
//! ARGB lazily. Writes mark an entry dirty; a frame's used-colors pass
//! marks which entries the frame references; [`Palette::recalc`] converts
//! only entries that are both. Unused dirty entries keep their flag until a
//! frame uses them, so the colors on screen always match a full recompute.

use crate::logging::{log, LogCategory, LogLevel};

/// Maps color indices to ARGB values.
pub trait IndexedPalette {
    /// Get the color for a palette index as 0xAARRGGBB.
    fn get_color(&self, index: usize) -> u32;

    fn set_color(&mut self, index: usize, color: u32);

    /// Get the number of colors in this palette.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

const OPAQUE_BLACK: u32 = 0xFF000000;

/// Converted colors.
#[derive(Debug, Clone)]
pub struct RamPalette {
    colors: Vec<u32>,
}

impl RamPalette {
    pub fn new(size: usize) -> Self {
        Self {
            colors: vec![OPAQUE_BLACK; size],
        }
    }

    pub fn from_colors(colors: Vec<u32>) -> Self {
        Self { colors }
    }

    pub fn colors(&self) -> &[u32] {
        &self.colors
    }
}

impl IndexedPalette for RamPalette {
    fn get_color(&self, index: usize) -> u32 {
        self.colors.get(index).copied().unwrap_or(OPAQUE_BLACK)
    }

    fn set_color(&mut self, index: usize, color: u32) {
        if let Some(slot) = self.colors.get_mut(index) {
            *slot = color;
        }
    }

    fn len(&self) -> usize {
        self.colors.len()
    }
}

fn argb(r: u8, g: u8, b: u8) -> u32 {
    OPAQUE_BLACK | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

fn pal4bit(v: u16) -> u8 {
    let v = (v & 0x0F) as u8;
    (v << 4) | v
}

fn pal5bit(v: u16) -> u8 {
    let v = (v & 0x1F) as u8;
    (v << 3) | (v >> 2)
}

/// Layout of one 16-bit palette entry. The two bytes of an entry sit at
/// consecutive addresses, high byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteFormat {
    /// `xBBBBBGGGGGRRRRR`, high byte at the even address
    Xbgr555Swapped,
    /// `RRRRGGGGBBBBxxxx`
    Rgbx444,
    /// `xxxxBBBBGGGGRRRR`
    Xbgr444,
}

impl PaletteFormat {
    pub const BYTES_PER_ENTRY: usize = 2;

    /// Convert the raw entry word to ARGB
    pub fn decode(self, word: u16) -> u32 {
        match self {
            PaletteFormat::Xbgr555Swapped => {
                argb(pal5bit(word), pal5bit(word >> 5), pal5bit(word >> 10))
            }
            PaletteFormat::Rgbx444 => argb(pal4bit(word >> 12), pal4bit(word >> 8), pal4bit(word >> 4)),
            PaletteFormat::Xbgr444 => argb(pal4bit(word), pal4bit(word >> 4), pal4bit(word >> 8)),
        }
    }
}

/// 4-bit resistor network weights (bit 0 = 470 ohm ... bit 3 = 220 ohm
/// ladders), as on most 1980s color PROM boards
fn prom_weight(v: u8) -> u8 {
    let bit = |n: u8| (v >> n) & 1;
    0x0e * bit(0) + 0x1f * bit(1) + 0x43 * bit(2) + 0x8f * bit(3)
}

/// Decode three stacked 4-bit color PROMs (red, green, blue, `entries`
/// bytes each) into ARGB colors. Missing bytes read as 0.
pub fn decode_rgb_proms(prom: &[u8], entries: usize) -> Vec<u32> {
    let at = |i: usize| prom.get(i).copied().unwrap_or(0);
    (0..entries)
        .map(|i| {
            argb(
                prom_weight(at(i)),
                prom_weight(at(i + entries)),
                prom_weight(at(i + 2 * entries)),
            )
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Palette {
    /// `None` for PROM palettes: colors are fixed
    format: Option<PaletteFormat>,
    ram: Vec<u8>,
    colors: RamPalette,
    dirty: Vec<bool>,
    used: Vec<bool>,
    /// Pen -> color entry, for boards with color lookup PROMs
    indirect: Option<Vec<u16>>,
}

impl Palette {
    /// CPU-writable palette of `entries` colors, all black
    pub fn new(format: PaletteFormat, entries: usize) -> Self {
        Self {
            format: Some(format),
            ram: vec![0; entries * PaletteFormat::BYTES_PER_ENTRY],
            colors: RamPalette::new(entries),
            dirty: vec![false; entries],
            used: vec![true; entries],
            indirect: None,
        }
    }

    /// Fixed palette, e.g. from [`decode_rgb_proms`]
    pub fn from_colors(colors: Vec<u32>) -> Self {
        let entries = colors.len();
        Self {
            format: None,
            ram: Vec::new(),
            colors: RamPalette::from_colors(colors),
            dirty: vec![false; entries],
            used: vec![true; entries],
            indirect: None,
        }
    }

    /// Route pens through a lookup table: pen `n` shows color entry
    /// `table[n]`. Pens past the table show entry 0.
    pub fn with_indirection(mut self, table: Vec<u16>) -> Self {
        self.set_indirection(table);
        self
    }

    /// Replace the lookup table, e.g. after the lookup PROM is loaded
    pub fn set_indirection(&mut self, table: Vec<u16>) {
        self.indirect = Some(table);
    }

    /// Color entry pen `pen` displays
    pub fn resolve(&self, pen: usize) -> usize {
        match &self.indirect {
            Some(table) => table.get(pen).copied().unwrap_or(0) as usize,
            None => pen,
        }
    }

    /// Number of color entries
    pub fn entries(&self) -> usize {
        self.colors.len()
    }

    /// Raw palette RAM byte
    pub fn read(&self, offset: usize) -> u8 {
        self.ram.get(offset).copied().unwrap_or(0)
    }

    /// CPU write to palette RAM
    pub fn write(&mut self, offset: usize, data: u8) {
        if let Some(slot) = self.ram.get_mut(offset) {
            if *slot != data {
                *slot = data;
                self.dirty[offset / PaletteFormat::BYTES_PER_ENTRY] = true;
            }
        }
    }

    fn word(&self, entry: usize) -> u16 {
        let at = entry * PaletteFormat::BYTES_PER_ENTRY;
        ((self.ram[at] as u16) << 8) | self.ram[at + 1] as u16
    }

    /// Forget last frame's used colors
    pub fn clear_used(&mut self) {
        self.used.fill(false);
    }

    /// Mark the color entry behind `pen` as used this frame
    pub fn mark_used(&mut self, pen: usize) {
        let entry = self.resolve(pen);
        if let Some(used) = self.used.get_mut(entry) {
            *used = true;
        }
    }

    /// Mark every pen `offset + n` where bit n of `pen_usage` is set.
    pub fn mark_pens(&mut self, offset: u32, pen_usage: u32) {
        let mut bits = pen_usage;
        while bits != 0 {
            let pen = bits.trailing_zeros();
            self.mark_used((offset + pen) as usize);
            bits &= bits - 1;
        }
    }

    pub fn mark_all_used(&mut self) {
        self.used.fill(true);
    }

    pub fn is_dirty(&self, entry: usize) -> bool {
        self.dirty.get(entry).copied().unwrap_or(false)
    }

    pub fn is_used(&self, entry: usize) -> bool {
        self.used.get(entry).copied().unwrap_or(false)
    }

    /// Convert entries that are dirty and used. Returns how many changed.
    pub fn recalc(&mut self) -> usize {
        let Some(format) = self.format else {
            return 0;
        };
        let mut converted = 0;
        for entry in 0..self.dirty.len() {
            if self.dirty[entry] && self.used[entry] {
                self.colors.set_color(entry, format.decode(self.word(entry)));
                self.dirty[entry] = false;
                converted += 1;
            }
        }
        if converted > 0 {
            log(LogCategory::Video, LogLevel::Trace, || {
                format!("palette: {} entries recalculated", converted)
            });
        }
        converted
    }

    /// Convert every entry regardless of use
    pub fn full_recalc(&mut self) {
        if let Some(format) = self.format {
            for entry in 0..self.dirty.len() {
                self.colors.set_color(entry, format.decode(self.word(entry)));
            }
            self.dirty.fill(false);
        }
    }
}

/// Indexed by pen: lookups go through the indirection table when there is
/// one.
impl IndexedPalette for Palette {
    fn get_color(&self, index: usize) -> u32 {
        self.colors.get_color(self.resolve(index))
    }

    fn set_color(&mut self, index: usize, color: u32) {
        let entry = self.resolve(index);
        self.colors.set_color(entry, color);
    }

    fn len(&self) -> usize {
        match &self.indirect {
            Some(table) => table.len(),
            None => self.colors.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ram_palette_defaults_and_bounds() {
        let mut palette = RamPalette::new(4);
        assert_eq!(palette.get_color(0), 0xFF000000);
        palette.set_color(10, 0xFFFF0000);
        assert_eq!(palette.get_color(10), 0xFF000000);
        assert!(!palette.is_empty());
    }

    #[test]
    fn test_formats() {
        assert_eq!(PaletteFormat::Xbgr555Swapped.decode(0x001F), 0xFFFF0000);
        assert_eq!(PaletteFormat::Xbgr555Swapped.decode(0x7C00), 0xFF0000FF);
        assert_eq!(PaletteFormat::Rgbx444.decode(0xF0A0), 0xFFFF00AA);
        assert_eq!(PaletteFormat::Xbgr444.decode(0x0F0A), 0xFFAA00FF);
    }

    #[test]
    fn test_prom_decode() {
        // entry 0: red 0xF, green 0x0, blue 0x1
        let prom = [0x0F, 0x00, 0x00, 0x00, 0x01, 0x00];
        let colors = decode_rgb_proms(&prom, 2);
        assert_eq!(colors[0], 0xFFFF000E);
        assert_eq!(colors[1], 0xFF000000);
    }

    #[test]
    fn test_write_marks_entry_dirty() {
        let mut palette = Palette::new(PaletteFormat::Xbgr555Swapped, 4);
        palette.write(2, 0x00);
        assert!(!palette.is_dirty(1));
        palette.write(3, 0x1F);
        assert!(palette.is_dirty(1));
        assert_eq!(palette.read(3), 0x1F);
    }

    #[test]
    fn test_lazy_recalc_matches_full_recompute() {
        let mut lazy = Palette::new(PaletteFormat::Xbgr444, 16);
        for offset in 0..32 {
            lazy.write(offset, (offset * 7) as u8);
        }
        let mut full = lazy.clone();
        full.full_recalc();

        lazy.clear_used();
        lazy.mark_pens(4, 0b1011);
        assert_eq!(lazy.recalc(), 3);
        for entry in [4, 5, 7] {
            assert_eq!(lazy.get_color(entry), full.get_color(entry));
        }
        // Unused entries stay dirty until a frame uses them
        assert!(lazy.is_dirty(6));

        lazy.mark_all_used();
        lazy.recalc();
        for entry in 0..16 {
            assert_eq!(lazy.get_color(entry), full.get_color(entry));
        }
    }

    #[test]
    fn test_indirection() {
        let mut palette = Palette::new(PaletteFormat::Xbgr444, 2).with_indirection(vec![1, 0, 1]);
        palette.write(3, 0x0F);
        palette.clear_used();
        palette.mark_used(2);
        assert!(palette.is_used(1));
        assert_eq!(palette.recalc(), 1);
        assert_eq!(palette.get_color(0), 0xFFFF0000);
        assert_eq!(palette.get_color(1), 0xFF000000);
        assert_eq!(palette.len(), 3);
        assert_eq!(palette.entries(), 2);
    }

    #[test]
    fn test_prom_palette_is_fixed() {
        let mut palette = Palette::from_colors(vec![0xFF123456]);
        palette.write(0, 0xFF);
        assert_eq!(palette.recalc(), 0);
        assert_eq!(palette.get_color(0), 0xFF123456);
    }
}
