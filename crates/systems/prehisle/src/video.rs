//! Three tile layers and a two-bank sprite list.
//!
//! The background map is not in RAM: it is a 1024x32 tile map read from
//! its own ROM and only scrolled by the CPU. The foreground layer (256x32
//! tiles) and the 32x32 text layer live in word-wide video RAM.

use arcade_core::types::Frame;
use arcade_core::video::{
    read_word, Bitmap, Compositor, DrawStep, DrawSurface, GfxLayout, GfxSet, LayerRegisters,
    Palette, PaletteFormat, Rect, ScanOrder, Scene, Screen, ScreenFlip, SpriteEntry, TileInfo,
    Tilemap,
};
use arcade_core::ConfigError;

/// ROM-backed background
pub const BG: usize = 0;
/// RAM foreground
pub const FG: usize = 1;
/// Text
pub const TX: usize = 2;

/// Sprites drawn between the background and the foreground
pub const SPRITES_BACK: usize = 0;
/// Sprites drawn over the foreground
pub const SPRITES_FRONT: usize = 1;

pub const TX_RAM_SIZE: usize = 0x800;
pub const FG_RAM_SIZE: usize = 0x4000;
pub const PALETTE_SIZE: usize = 0x800;
const PALETTE_ENTRIES: usize = PALETTE_SIZE / PaletteFormat::BYTES_PER_ENTRY;

const SPRITE_STRIDE: usize = 8;
/// Raw Y values past this mark an unused sprite slot
const OFFSCREEN_Y: u16 = 254;
const TRANSPARENT_PEN: u8 = 15;

const SCREEN_WIDTH: u32 = 256;
const SCREEN_HEIGHT: u32 = 256;

/// 16x16 4bpp, left and right 8-pixel halves 64 bytes apart
fn tile_layout() -> GfxLayout {
    GfxLayout {
        width: 16,
        height: 16,
        total: None,
        plane_offsets: vec![0, 1, 2, 3],
        x_offsets: (0..16).map(|x| (x % 8) * 4 + (x / 8) * 64 * 8).collect(),
        y_offsets: (0..16).map(|y| y * 32).collect(),
        char_increment: 128 * 8,
    }
}

/// Decoded graphics of every layer and the sprites
#[derive(Debug, Clone)]
pub struct Graphics {
    pub chars: GfxSet,
    pub bg_tiles: GfxSet,
    pub fg_tiles: GfxSet,
    pub sprites: GfxSet,
}

impl Graphics {
    pub fn decode_chars(rom: &[u8]) -> Result<GfxSet, ConfigError> {
        GfxLayout::packed(8, 8, 4).decode("chars", rom, 16)
    }

    pub fn decode_bg_tiles(rom: &[u8]) -> Result<GfxSet, ConfigError> {
        Ok(tile_layout().decode("bg tiles", rom, 16)?.with_color_base(768))
    }

    pub fn decode_fg_tiles(rom: &[u8]) -> Result<GfxSet, ConfigError> {
        Ok(tile_layout().decode("fg tiles", rom, 16)?.with_color_base(512))
    }

    pub fn decode_sprites(rom: &[u8]) -> Result<GfxSet, ConfigError> {
        Ok(tile_layout().decode("sprites", rom, 16)?.with_color_base(256))
    }
}

/// Background cell from the map ROM. Codes come from the upper half of
/// the tile ROM; bit 11 flips X.
pub fn bg_tile(map: &[u8], index: usize) -> TileInfo {
    let attr = read_word(map, index);
    TileInfo::new(((attr & 0x7FF) | 0x800) as u32, (attr >> 12) as u32)
        .flipped(attr & 0x800 != 0, false)
}

/// Foreground cell; bit 11 flips Y
pub fn fg_tile(ram: &[u8], index: usize) -> TileInfo {
    let attr = read_word(ram, index);
    TileInfo::new((attr & 0x7FF) as u32, (attr >> 12) as u32).flipped(false, attr & 0x800 != 0)
}

pub fn tx_tile(ram: &[u8], index: usize) -> TileInfo {
    let attr = read_word(ram, index);
    TileInfo::new((attr & 0xFFF) as u32, (attr >> 12) as u32)
}

/// 9-bit two's complement sprite coordinate
fn sign_extend_9(value: u16) -> i32 {
    let v = (value & 0x1FF) as i32;
    if v & 0x100 != 0 {
        v - 0x200
    } else {
        v
    }
}

/// Decode sprite RAM into the two priority banks, in RAM order.
///
/// Colors 0-3 go over the foreground layer, the rest behind it.
pub fn sprite_banks(ram: &[u8], flip: &ScreenFlip) -> [Vec<SpriteEntry>; 2] {
    let mut banks = [Vec::new(), Vec::new()];
    for entry in 0..ram.len() / SPRITE_STRIDE {
        let word = |n: usize| read_word(ram, entry * 4 + n);
        let y = word(0);
        if y > OFFSCREEN_Y {
            continue;
        }
        let attr = word(2);
        let color = (word(3) >> 12) as u32;
        let sprite = SpriteEntry::new((attr & 0x1FFF) as u32, sign_extend_9(word(1)), y as i32, color)
            .flipped(attr & 0x4000 != 0, attr & 0x8000 != 0);
        let bank = if color < 4 { SPRITES_FRONT } else { SPRITES_BACK };
        banks[bank].push(flip.apply(sprite));
    }
    banks
}

/// Layer state, video RAM and latched sprites
#[derive(Debug, Clone)]
pub struct Playfield {
    pub regs: [LayerRegisters; 2],
    tx_ram: Vec<u8>,
    fg_ram: Vec<u8>,
    bg_map: Vec<u8>,
    maps: [Tilemap; 3],
    gfx: Graphics,
    flip: ScreenFlip,
    sprites: [Vec<SpriteEntry>; 2],
}

impl Playfield {
    pub fn new(gfx: Graphics, bg_map: &[u8]) -> Self {
        let extent = |map: Tilemap| {
            map.with_flip_extent(SCREEN_WIDTH, SCREEN_HEIGHT)
        };
        Self {
            regs: [LayerRegisters::new(); 2],
            tx_ram: vec![0; TX_RAM_SIZE],
            fg_ram: vec![0; FG_RAM_SIZE],
            bg_map: bg_map.to_vec(),
            maps: [
                extent(Tilemap::new("bg", ScanOrder::ColumnMajor, 16, 16, 1024, 32)),
                extent(
                    Tilemap::new("fg", ScanOrder::ColumnMajor, 16, 16, 256, 32)
                        .with_transparent_pen(TRANSPARENT_PEN),
                ),
                extent(
                    Tilemap::new("tx", ScanOrder::RowMajor, 8, 8, 32, 32)
                        .with_transparent_pen(TRANSPARENT_PEN),
                ),
            ],
            gfx,
            flip: ScreenFlip::new(240, 240),
            sprites: [Vec::new(), Vec::new()],
        }
    }

    pub fn set_flip_screen(&mut self, flipped: bool) {
        self.flip.enabled = flipped;
    }

    pub fn flip_screen(&self) -> bool {
        self.flip.enabled
    }

    pub fn read_tx_ram(&self, offset: u32) -> u8 {
        self.tx_ram.get(offset as usize).copied().unwrap_or(0)
    }

    pub fn write_tx_ram(&mut self, offset: u32, data: u8) {
        if let Some(slot) = self.tx_ram.get_mut(offset as usize) {
            *slot = data;
            self.maps[TX].mark_dirty(offset as usize / 2);
        }
    }

    pub fn read_fg_ram(&self, offset: u32) -> u8 {
        self.fg_ram.get(offset as usize).copied().unwrap_or(0)
    }

    pub fn write_fg_ram(&mut self, offset: u32, data: u8) {
        if let Some(slot) = self.fg_ram.get_mut(offset as usize) {
            *slot = data;
            self.maps[FG].mark_dirty(offset as usize / 2);
        }
    }

    /// New background map ROM contents
    pub fn load_bg_map(&mut self, map: &[u8]) {
        self.bg_map = map.to_vec();
        self.maps[BG].mark_all_dirty();
    }

    pub fn tilemap(&self, layer: usize) -> &Tilemap {
        &self.maps[layer]
    }

    pub fn sprites(&self, bank: usize) -> &[SpriteEntry] {
        &self.sprites[bank]
    }

    pub fn latch_sprites(&mut self, sprite_ram: &[u8]) {
        self.sprites = sprite_banks(sprite_ram, &self.flip);
    }

    fn gfx(&self, layer: usize) -> &GfxSet {
        match layer {
            BG => &self.gfx.bg_tiles,
            FG => &self.gfx.fg_tiles,
            _ => &self.gfx.chars,
        }
    }

    fn reset(&mut self) {
        for regs in &mut self.regs {
            regs.reset();
        }
        self.flip.enabled = false;
        self.sprites = [Vec::new(), Vec::new()];
    }
}

impl Scene for Playfield {
    fn prepare(&mut self) {
        let Self {
            regs,
            tx_ram,
            fg_ram,
            bg_map,
            maps,
            flip,
            ..
        } = self;
        for (layer, regs) in [BG, FG].into_iter().zip(regs.iter()) {
            maps[layer].set_scroll(regs.scroll_x() as i32, regs.scroll_y() as i32);
        }
        for map in maps.iter_mut() {
            map.set_flip(flip.enabled);
        }
        maps[BG].update(|index| bg_tile(bg_map, index));
        maps[FG].update(|index| fg_tile(fg_ram, index));
        maps[TX].update(|index| tx_tile(tx_ram, index));
    }

    fn mark_colors(&self, palette: &mut Palette) {
        for layer in [BG, FG, TX] {
            self.maps[layer].mark_colors(self.gfx(layer), palette);
        }
        for sprite in self.sprites.iter().flatten() {
            sprite.mark_colors(&self.gfx.sprites, palette);
        }
    }

    fn draw_layer(&self, layer: usize, opaque: bool, surface: &mut dyn DrawSurface) {
        if opaque {
            self.maps[layer].draw_opaque(self.gfx(layer), surface);
        } else {
            self.maps[layer].draw(self.gfx(layer), surface);
        }
    }

    fn draw_sprites(&self, bank: usize, surface: &mut dyn DrawSurface) {
        for sprite in &self.sprites[bank] {
            sprite.draw(&self.gfx.sprites, surface, TRANSPARENT_PEN);
        }
    }
}

/// Palette RAM, layers and the output stage
#[derive(Debug, Clone)]
pub struct Video {
    pub palette: Palette,
    pub playfield: Playfield,
    compositor: Compositor,
    bitmap: Bitmap,
    screen: Screen,
}

impl Video {
    pub fn new(gfx: Graphics, bg_map: &[u8]) -> Self {
        Self {
            palette: Palette::new(PaletteFormat::Rgbx444, PALETTE_ENTRIES),
            playfield: Playfield::new(gfx, bg_map),
            compositor: Compositor::new(vec![
                DrawStep::Layer(BG),
                DrawStep::Sprites(SPRITES_BACK),
                DrawStep::Layer(FG),
                DrawStep::Sprites(SPRITES_FRONT),
                DrawStep::Layer(TX),
            ]),
            bitmap: Bitmap::new(SCREEN_WIDTH, SCREEN_HEIGHT),
            screen: Screen::new("prehisle", Rect::new(0, 255, 16, 239)),
        }
    }

    pub fn graphics_mut(&mut self) -> &mut Graphics {
        &mut self.playfield.gfx
    }

    pub fn render(&mut self, sprite_ram: &[u8]) -> &Frame {
        self.playfield.latch_sprites(sprite_ram);
        self.compositor
            .render(&mut self.playfield, &mut self.palette, &mut self.bitmap);
        self.screen.resolve(&self.bitmap, &self.palette)
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    pub fn reset(&mut self) {
        self.playfield.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graphics() -> Graphics {
        Graphics {
            chars: Graphics::decode_chars(&[0; 0x20]).unwrap(),
            bg_tiles: Graphics::decode_bg_tiles(&[0; 0x80]).unwrap(),
            fg_tiles: Graphics::decode_fg_tiles(&[0; 0x80]).unwrap(),
            sprites: Graphics::decode_sprites(&[0; 0x80]).unwrap(),
        }
    }

    fn put_word(ram: &mut [u8], index: usize, value: u16) {
        ram[index * 2] = (value >> 8) as u8;
        ram[index * 2 + 1] = value as u8;
    }

    #[test]
    fn test_tile_attributes() {
        let mut ram = vec![0u8; 8];
        put_word(&mut ram, 1, 0x5923);

        let bg = bg_tile(&ram, 1);
        assert_eq!((bg.code, bg.color), (0x923, 5));
        assert!(bg.flip_x && !bg.flip_y);

        let fg = fg_tile(&ram, 1);
        assert_eq!((fg.code, fg.color), (0x123, 5));
        assert!(!fg.flip_x && fg.flip_y);

        let tx = tx_tile(&ram, 1);
        assert_eq!((tx.code, tx.color), (0x923, 5));
        assert!(!tx.flip_x && !tx.flip_y);

        // Background codes always come from the upper half
        assert_eq!(bg_tile(&ram, 0).code, 0x800);
    }

    #[test]
    fn test_sprite_banks_and_sentinel() {
        let mut ram = vec![0u8; 4 * SPRITE_STRIDE];
        // Behind the foreground, flipped X
        put_word(&mut ram, 0, 0x0040);
        put_word(&mut ram, 1, 0x0030);
        put_word(&mut ram, 2, 0x4123);
        put_word(&mut ram, 3, 0x5000);
        // Over the foreground, negative X, flipped Y
        put_word(&mut ram, 4, 0x0010);
        put_word(&mut ram, 5, 0x01F0);
        put_word(&mut ram, 6, 0x9FFF);
        put_word(&mut ram, 7, 0x3000);
        // Unused slots
        put_word(&mut ram, 8, 0x00FF);
        put_word(&mut ram, 12, 0x0100);

        let banks = sprite_banks(&ram, &ScreenFlip::new(240, 240));
        assert_eq!(banks[SPRITES_BACK].len(), 1);
        assert_eq!(banks[SPRITES_FRONT].len(), 1);

        let back = banks[SPRITES_BACK][0];
        assert_eq!((back.code, back.color, back.x, back.y), (0x123, 5, 0x30, 0x40));
        assert!(back.flip_x && !back.flip_y);

        let front = banks[SPRITES_FRONT][0];
        assert_eq!((front.code, front.color, front.x, front.y), (0x1FFF, 3, -0x10, 0x10));
        assert!(!front.flip_x && front.flip_y);
    }

    #[test]
    fn test_sentinel_boundary() {
        let mut ram = vec![0u8; SPRITE_STRIDE];
        put_word(&mut ram, 0, 254);
        assert_eq!(sprite_banks(&ram, &ScreenFlip::new(240, 240))[SPRITES_BACK].len(), 1);
    }

    #[test]
    fn test_flipped_sprites_mirror() {
        let mut ram = vec![0u8; SPRITE_STRIDE];
        put_word(&mut ram, 0, 0x0040);
        put_word(&mut ram, 1, 0x0030);
        let mut flip = ScreenFlip::new(240, 240);
        flip.enabled = true;
        let s = sprite_banks(&ram, &flip)[SPRITES_BACK][0];
        assert_eq!((s.x, s.y), (240 - 0x30, 240 - 0x40));
        assert!(s.flip_x && s.flip_y);
    }

    #[test]
    fn test_layer_scan_orders() {
        let mut field = Playfield::new(graphics(), &[]);
        field.write_fg_ram(2 * 33, 0x12);
        field.write_fg_ram(2 * 33 + 1, 0x34);
        field.write_tx_ram(2 * 33 + 1, 0x56);
        field.prepare();
        // Foreground is column major: index 33 is column 1, row 1
        assert_eq!(field.tilemap(FG).tile(33).unwrap().code, 0x234);
        assert_eq!(field.tilemap(TX).tile(33).unwrap().code, 0x056);
    }

    #[test]
    fn test_ram_writes_dirty_one_cell() {
        let mut field = Playfield::new(graphics(), &[]);
        field.prepare();
        field.write_fg_ram(0x101, 0x01);
        assert!(field.tilemap(FG).is_dirty(0x80));
        assert!(!field.tilemap(FG).is_dirty(0x81));
        assert!(!field.tilemap(TX).is_dirty(0x80));
        assert_eq!(field.read_fg_ram(0x101), 0x01);
    }

    #[test]
    fn test_bg_map_reload_invalidates() {
        let mut field = Playfield::new(graphics(), &[]);
        field.prepare();
        assert!(!field.tilemap(BG).is_dirty(0));
        let mut map = vec![0u8; 0x10000];
        put_word(&mut map, 0, 0x2005);
        field.load_bg_map(&map);
        assert!(field.tilemap(BG).is_dirty(0));
        field.prepare();
        assert_eq!(field.tilemap(BG).tile(0).unwrap().code, 0x805);
        assert_eq!(field.tilemap(BG).tile(0).unwrap().color, 2);
    }
}
