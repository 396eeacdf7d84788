//! Graphics ROM decoding.
//!
//! Arcade boards store tiles and sprites as bitplanes scattered across one
//! or more ROMs. A [`GfxLayout`] describes where each bit of an element
//! lives, the same way a MAME `gfx_layout` does: per-plane, per-column and
//! per-row bit offsets plus a stride between elements. Decoding produces a
//! [`GfxSet`] of one pen byte per pixel.

use crate::error::ConfigError;

/// Planar element layout. All offsets are in bits, most significant bit of
/// each byte first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfxLayout {
    pub width: u32,
    pub height: u32,
    /// Element count; `None` decodes as many as the ROM holds
    pub total: Option<u32>,
    /// Plane 0 supplies the most significant pen bit
    pub plane_offsets: Vec<u32>,
    pub x_offsets: Vec<u32>,
    pub y_offsets: Vec<u32>,
    /// Bits from one element to the next
    pub char_increment: u32,
}

fn read_bit(rom: &[u8], offset: usize) -> bool {
    rom.get(offset / 8)
        .is_some_and(|b| (b << (offset % 8)) & 0x80 != 0)
}

impl GfxLayout {
    /// Packed layout: `planes` bits per pixel, pixels consecutive within a
    /// row, rows consecutive within an element.
    pub fn packed(width: u32, height: u32, planes: u32) -> Self {
        Self {
            width,
            height,
            total: None,
            plane_offsets: (0..planes).collect(),
            x_offsets: (0..width).map(|x| x * planes).collect(),
            y_offsets: (0..height).map(|y| y * width * planes).collect(),
            char_increment: width * height * planes,
        }
    }

    pub fn planes(&self) -> u32 {
        self.plane_offsets.len() as u32
    }

    /// Pen of pixel (`x`, `y`) in element `code`
    pub fn decode_pixel(&self, rom: &[u8], code: u32, x: u32, y: u32) -> u8 {
        let base = code as usize * self.char_increment as usize
            + self.y_offsets[y as usize] as usize
            + self.x_offsets[x as usize] as usize;
        let planes = self.plane_offsets.len();
        let mut pen = 0u8;
        for (plane, &offset) in self.plane_offsets.iter().enumerate() {
            if read_bit(rom, base + offset as usize) {
                pen |= 1 << (planes - 1 - plane);
            }
        }
        pen
    }

    fn element_count(&self, rom_len: usize) -> u32 {
        match self.total {
            Some(total) => total,
            None if self.char_increment == 0 => 0,
            None => (rom_len as u64 * 8 / self.char_increment as u64) as u32,
        }
    }

    /// Decode every element of `rom`.
    ///
    /// `granularity` is the number of palette entries between consecutive
    /// color codes (16 for a 4bpp set).
    pub fn decode(&self, name: &str, rom: &[u8], granularity: u32) -> Result<GfxSet, ConfigError> {
        let count = self.element_count(rom.len());
        let last_bit = |offsets: &[u32]| offsets.iter().copied().max().unwrap_or(0) as usize;
        if count > 0 {
            let needed_bits = (count as usize - 1) * self.char_increment as usize
                + last_bit(&self.plane_offsets)
                + last_bit(&self.x_offsets)
                + last_bit(&self.y_offsets)
                + 1;
            let needed = needed_bits.div_ceil(8);
            if needed > rom.len()
                || self.x_offsets.len() != self.width as usize
                || self.y_offsets.len() != self.height as usize
            {
                return Err(ConfigError::GfxLayout {
                    name: name.to_string(),
                    needed,
                    len: rom.len(),
                });
            }
        }

        let size = (self.width * self.height) as usize;
        let mut pens = Vec::with_capacity(size * count as usize);
        for code in 0..count {
            for y in 0..self.height {
                for x in 0..self.width {
                    pens.push(self.decode_pixel(rom, code, x, y));
                }
            }
        }
        Ok(GfxSet::from_pens(self.width, self.height, granularity, pens))
    }
}

/// Decoded graphics: one pen byte per pixel, `count` elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfxSet {
    width: u32,
    height: u32,
    count: u32,
    granularity: u32,
    color_base: u32,
    pens: Vec<u8>,
    pen_usage: Vec<u32>,
}

impl GfxSet {
    /// Build from already decoded pens, computing per-element pen usage.
    /// A trailing partial element is dropped.
    pub fn from_pens(width: u32, height: u32, granularity: u32, mut pens: Vec<u8>) -> Self {
        let size = (width * height) as usize;
        let count = pens.len().checked_div(size).unwrap_or(0);
        pens.truncate(count * size);
        let pen_usage = pens
            .chunks(size.max(1))
            .map(|element| {
                element
                    .iter()
                    .fold(0u32, |usage, &pen| usage | 1u32.checked_shl(pen as u32).unwrap_or(0))
            })
            .collect();
        Self {
            width,
            height,
            count: count as u32,
            granularity,
            color_base: 0,
            pens,
            pen_usage,
        }
    }

    /// Palette entry the first color code of this set starts at
    pub fn with_color_base(mut self, base: u32) -> Self {
        self.color_base = base;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn granularity(&self) -> u32 {
        self.granularity
    }

    /// Codes past the end alias the last element, as an undersized ROM
    /// socket would.
    pub fn clamp_code(&self, code: u32) -> u32 {
        code.min(self.count.saturating_sub(1))
    }

    /// Pixels of element `code` (after clamping), row-major
    pub fn element(&self, code: u32) -> &[u8] {
        let size = (self.width * self.height) as usize;
        let start = self.clamp_code(code) as usize * size;
        self.pens.get(start..start + size).unwrap_or(&[])
    }

    /// Bitmask of the pens element `code` uses (bit n = pen n)
    pub fn pen_usage(&self, code: u32) -> u32 {
        self.pen_usage
            .get(self.clamp_code(code) as usize)
            .copied()
            .unwrap_or(0)
    }

    /// First palette entry of color code `color`
    pub fn color_offset(&self, color: u32) -> u32 {
        self.color_base + color * self.granularity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 8x8, 2 planes stored in two separate halves of the ROM
    fn split_plane_layout(rom_len: u32) -> GfxLayout {
        GfxLayout {
            width: 8,
            height: 8,
            total: Some(rom_len / 8 / 2),
            plane_offsets: vec![0, rom_len * 8 / 2],
            x_offsets: (0..8).collect(),
            y_offsets: (0..8).map(|y| y * 8).collect(),
            char_increment: 64,
        }
    }

    #[test]
    fn test_planar_decode() {
        let mut rom = vec![0u8; 32];
        // element 0 row 0: plane 0 = 1010_1010, plane 1 = 1111_0000
        rom[0] = 0b1010_1010;
        rom[16] = 0b1111_0000;
        let set = split_plane_layout(32).decode("chars", &rom, 4).unwrap();

        assert_eq!(set.count(), 2);
        let e = set.element(0);
        assert_eq!(&e[0..8], &[3, 1, 3, 1, 2, 0, 2, 0]);
        assert_eq!(set.pen_usage(0), 0b1111);
        assert_eq!(set.pen_usage(1), 0b0001);
    }

    #[test]
    fn test_packed_4bpp() {
        // 2x1 elements, 4bpp: one byte per element
        let rom = vec![0x5A, 0x0F];
        let set = GfxLayout::packed(2, 1, 4).decode("packed", &rom, 16).unwrap();
        assert_eq!(set.count(), 2);
        assert_eq!(set.element(0), &[5, 10]);
        assert_eq!(set.element(1), &[0, 15]);
    }

    #[test]
    fn test_code_clamps_to_last_element() {
        let set = GfxSet::from_pens(1, 1, 16, vec![1, 2, 3]);
        assert_eq!(set.clamp_code(2), 2);
        assert_eq!(set.clamp_code(0x1234), 2);
        assert_eq!(set.element(99), &[3]);
        assert_eq!(set.pen_usage(99), 1 << 3);
    }

    #[test]
    fn test_rom_too_small_is_config_error() {
        let mut layout = split_plane_layout(32);
        layout.total = Some(8);
        let err = layout.decode("tiles", &[0; 32], 4).unwrap_err();
        assert!(matches!(err, ConfigError::GfxLayout { len: 32, .. }));
    }

    #[test]
    fn test_color_offset() {
        let set = GfxSet::from_pens(1, 1, 16, vec![0]).with_color_base(0x100);
        assert_eq!(set.color_offset(0), 0x100);
        assert_eq!(set.color_offset(3), 0x130);
    }
}
