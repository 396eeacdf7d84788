//! Two playfields and one sprite list.
//!
//! Playfield 1 shows its RAM either as a 64x32 map of 8x8 characters or as
//! a 64x32 map of 16x16 tiles, picked by a control register bit.
//! Playfield 2 is always 16x16 tiles and is the backmost layer. Both tile
//! maps store their cells as two 32x32 halves.

use arcade_core::logging::{log, LogCategory, LogLevel};
use arcade_core::types::Frame;
use arcade_core::video::{
    read_word, Bitmap, Compositor, DrawStep, DrawSurface, GfxLayout, GfxSet, Palette,
    PaletteFormat, Rect, ScanOrder, Scene, Screen, ScreenFlip, SpriteEntry, SpriteSize, TileInfo,
    Tilemap, WordRegisters,
};
use arcade_core::ConfigError;

pub const PF2: usize = 0;
pub const PF1_TILES: usize = 1;
pub const PF1_TEXT: usize = 2;

pub const PF_RAM_SIZE: usize = 0x1000;
pub const PALETTE_SIZE: usize = 0x800;
const PALETTE_ENTRIES: usize = PALETTE_SIZE / PaletteFormat::BYTES_PER_ENTRY;

/// Word registers of the playfield control block
pub mod ctrl {
    pub const FLIP: usize = 0;
    pub const PF1_SCROLL_X: usize = 1;
    pub const PF1_SCROLL_Y: usize = 2;
    pub const PF2_SCROLL_X: usize = 3;
    pub const PF2_SCROLL_Y: usize = 4;
    /// Bit 7 selects the 8x8 character map for playfield 1
    pub const PF1_MODE: usize = 6;
    pub const COUNT: usize = 8;
}

const CONTROL_BIT: u16 = 0x80;

const SPRITE_STRIDE: usize = 8;
const TRANSPARENT_PEN: u8 = 0;

const SCREEN_WIDTH: u32 = 320;
const SCREEN_HEIGHT: u32 = 256;
/// Sprite coordinates are mirrored around these
const SPRITE_MAX_X: i32 = 304;
const SPRITE_MAX_Y: i32 = 240;

/// 8x8 characters, two planes per byte pair, planes 2-3 in the upper half
fn char_layout(rom_len: usize) -> GfxLayout {
    let half = (rom_len / 2 * 8) as u32;
    GfxLayout {
        width: 8,
        height: 8,
        total: Some(half / 128),
        plane_offsets: vec![half + 8, half, 8, 0],
        x_offsets: (0..8).collect(),
        y_offsets: (0..8).map(|y| y * 16).collect(),
        char_increment: 16 * 8,
    }
}

/// 16x16 tiles in the same ROM; the left column of pixels is the second
/// 32 bytes of each tile
fn tile_layout(rom_len: usize) -> GfxLayout {
    let half = (rom_len / 2 * 8) as u32;
    GfxLayout {
        width: 16,
        height: 16,
        total: Some(half / 512),
        plane_offsets: vec![half + 8, half, 8, 0],
        x_offsets: (0..16).map(|x| if x < 8 { 32 * 8 + x } else { x - 8 }).collect(),
        y_offsets: (0..16).map(|y| y * 16).collect(),
        char_increment: 64 * 8,
    }
}

fn sprite_layout() -> GfxLayout {
    GfxLayout {
        width: 16,
        height: 16,
        total: None,
        plane_offsets: vec![24, 8, 16, 0],
        x_offsets: (0..16).map(|x| if x < 8 { 512 + x } else { x - 8 }).collect(),
        y_offsets: (0..16).map(|y| y * 32).collect(),
        char_increment: 32 * 32,
    }
}

/// Decoded graphics of both playfields and the sprites
#[derive(Debug, Clone)]
pub struct Graphics {
    pub chars: GfxSet,
    pub pf1_tiles: GfxSet,
    pub pf2_tiles: GfxSet,
    pub sprites: GfxSet,
}

impl Graphics {
    /// Decode the playfield ROM (characters and both tile views) and the
    /// sprite ROM
    pub fn decode(playfield_rom: &[u8], sprite_rom: &[u8]) -> Result<Self, ConfigError> {
        let (chars, pf1_tiles, pf2_tiles) = Self::decode_playfield(playfield_rom)?;
        Ok(Self {
            chars,
            pf1_tiles,
            pf2_tiles,
            sprites: Self::decode_sprites(sprite_rom)?,
        })
    }

    /// Replace everything decoded from the playfield ROM
    pub fn load_playfield(&mut self, rom: &[u8]) -> Result<(), ConfigError> {
        (self.chars, self.pf1_tiles, self.pf2_tiles) = Self::decode_playfield(rom)?;
        Ok(())
    }

    pub fn decode_sprites(rom: &[u8]) -> Result<GfxSet, ConfigError> {
        sprite_layout().decode("sprites", rom, 16)
    }

    /// Characters, then the tiles under each playfield's colors
    fn decode_playfield(rom: &[u8]) -> Result<(GfxSet, GfxSet, GfxSet), ConfigError> {
        let chars = char_layout(rom.len()).decode("chars", rom, 16)?;
        let tiles = tile_layout(rom.len()).decode("tiles", rom, 16)?;
        Ok((
            chars.with_color_base(256),
            tiles.clone().with_color_base(256),
            tiles.with_color_base(512),
        ))
    }
}

/// 64x32 map stored as two 32x32 halves side by side
fn split_scan(col: u32, row: u32, _cols: u32, _rows: u32) -> usize {
    ((col & 0x1F) + ((row & 0x1F) << 5) + ((col & 0x60) << 5)) as usize
}

pub fn playfield_tile(ram: &[u8], index: usize) -> TileInfo {
    let attr = read_word(ram, index);
    TileInfo::new((attr & 0x0FFF) as u32, (attr >> 12) as u32)
}

/// 9-bit coordinate, values at or past `limit` wrap negative
fn wrap_coordinate(value: u16, limit: i32) -> i32 {
    let v = (value & 0x1FF) as i32;
    if v >= limit {
        v - 512
    } else {
        v
    }
}

/// Decode sprite RAM in draw order.
///
/// Entries with code 0 are unused. Flashing sprites are left out on odd
/// frames. A sprite 1, 2, 4 or 8 cells tall is anchored by its bottom
/// cell.
pub fn sprite_list(ram: &[u8], flip: &ScreenFlip, frame: u64) -> Vec<SpriteEntry> {
    let mut sprites = Vec::new();
    for entry in 0..ram.len() / SPRITE_STRIDE {
        let word = |n: usize| read_word(ram, entry * 4 + n);
        let code = (word(1) & 0x3FFF) as u32;
        if code == 0 {
            continue;
        }
        let attr = word(0);
        if attr & 0x1000 != 0 && frame & 1 == 1 {
            continue;
        }
        let x_word = word(2);
        let x = SPRITE_MAX_X - wrap_coordinate(x_word, 320);
        if x > 320 {
            continue;
        }
        let bottom = SPRITE_MAX_Y - wrap_coordinate(attr, 256);
        let extra = (1i32 << ((attr & 0x0600) >> 9)) - 1;
        let sprite = SpriteEntry::new(code, x, bottom - extra * 16, ((x_word >> 9) & 0x0F) as u32)
            .flipped(attr & 0x2000 != 0, attr & 0x4000 != 0)
            .sized(SpriteSize::Tall(extra as u8 + 1));
        sprites.push(flip.apply(sprite));
    }
    sprites
}

/// Screen flip for sprites; tall sprites keep their top edge in place
fn sprite_flip() -> ScreenFlip {
    [2u8, 4, 8]
        .into_iter()
        .fold(ScreenFlip::new(SPRITE_MAX_X, SPRITE_MAX_Y), |flip, n| {
            flip.with_correction(SpriteSize::Tall(n), 0, -16 * (n as i32 - 1))
        })
}

/// Playfield RAM, control registers and latched sprites
#[derive(Debug, Clone)]
pub struct Playfield {
    control: WordRegisters,
    pf1_ram: Vec<u8>,
    pf2_ram: Vec<u8>,
    maps: [Tilemap; 3],
    gfx: Graphics,
    flip: ScreenFlip,
    sprites: Vec<SpriteEntry>,
}

impl Playfield {
    pub fn new(gfx: Graphics) -> Self {
        let extent = |map: Tilemap| map.with_flip_extent(SCREEN_WIDTH, SCREEN_HEIGHT);
        Self {
            control: WordRegisters::new(ctrl::COUNT),
            pf1_ram: vec![0; PF_RAM_SIZE],
            pf2_ram: vec![0; PF_RAM_SIZE],
            maps: [
                extent(Tilemap::new("pf2", ScanOrder::Custom(split_scan), 16, 16, 64, 32)),
                extent(
                    Tilemap::new("pf1", ScanOrder::Custom(split_scan), 16, 16, 64, 32)
                        .with_transparent_pen(TRANSPARENT_PEN),
                ),
                extent(
                    Tilemap::new("pf1 text", ScanOrder::RowMajor, 8, 8, 64, 32)
                        .with_transparent_pen(TRANSPARENT_PEN),
                ),
            ],
            gfx,
            flip: sprite_flip(),
            sprites: Vec::new(),
        }
    }

    pub fn write_control(&mut self, offset: u32, data: u8) {
        if let Some((ctrl::FLIP, value)) = self.control.write(offset, data) {
            log(LogCategory::Video, LogLevel::Debug, || {
                format!("flip screen {}", value & CONTROL_BIT != 0)
            });
        }
    }

    pub fn control(&self, index: usize) -> u16 {
        self.control.word(index)
    }

    pub fn flip_screen(&self) -> bool {
        self.control(ctrl::FLIP) & CONTROL_BIT != 0
    }

    pub fn text_mode(&self) -> bool {
        self.control(ctrl::PF1_MODE) & CONTROL_BIT != 0
    }

    pub fn read_pf1_ram(&self, offset: u32) -> u8 {
        self.pf1_ram.get(offset as usize).copied().unwrap_or(0)
    }

    /// Both views of playfield 1 share the RAM
    pub fn write_pf1_ram(&mut self, offset: u32, data: u8) {
        if let Some(slot) = self.pf1_ram.get_mut(offset as usize) {
            *slot = data;
            self.maps[PF1_TILES].mark_dirty(offset as usize / 2);
            self.maps[PF1_TEXT].mark_dirty(offset as usize / 2);
        }
    }

    pub fn read_pf2_ram(&self, offset: u32) -> u8 {
        self.pf2_ram.get(offset as usize).copied().unwrap_or(0)
    }

    pub fn write_pf2_ram(&mut self, offset: u32, data: u8) {
        if let Some(slot) = self.pf2_ram.get_mut(offset as usize) {
            *slot = data;
            self.maps[PF2].mark_dirty(offset as usize / 2);
        }
    }

    pub fn tilemap(&self, layer: usize) -> &Tilemap {
        &self.maps[layer]
    }

    pub fn sprites(&self) -> &[SpriteEntry] {
        &self.sprites
    }

    pub fn graphics_mut(&mut self) -> &mut Graphics {
        &mut self.gfx
    }

    pub fn latch_sprites(&mut self, sprite_ram: &[u8], frame: u64) {
        self.flip.enabled = self.flip_screen();
        self.sprites = sprite_list(sprite_ram, &self.flip, frame);
    }

    fn gfx(&self, layer: usize) -> &GfxSet {
        match layer {
            PF2 => &self.gfx.pf2_tiles,
            PF1_TILES => &self.gfx.pf1_tiles,
            _ => &self.gfx.chars,
        }
    }

    pub fn reset(&mut self) {
        self.control.reset();
        self.flip.enabled = false;
        self.sprites.clear();
    }
}

impl Scene for Playfield {
    fn prepare(&mut self) {
        let flipped = self.flip_screen();
        let text = self.text_mode();
        // Playfields sit one pixel off the sprites, the other way when flipped
        let nudge = if flipped { 1 } else { -1 };
        let word = |index: usize| self.control.word(index) as i32;
        let pf1 = (word(ctrl::PF1_SCROLL_X) + nudge, word(ctrl::PF1_SCROLL_Y));
        let pf2 = (word(ctrl::PF2_SCROLL_X) + nudge, word(ctrl::PF2_SCROLL_Y));

        let Self {
            pf1_ram,
            pf2_ram,
            maps,
            ..
        } = self;
        maps[PF2].set_scroll(pf2.0, pf2.1);
        maps[PF1_TILES].set_scroll(pf1.0, pf1.1);
        maps[PF1_TEXT].set_scroll(pf1.0, pf1.1);
        maps[PF1_TILES].enabled = !text;
        maps[PF1_TEXT].enabled = text;
        for map in maps.iter_mut() {
            map.set_flip(flipped);
        }
        maps[PF2].update(|index| playfield_tile(pf2_ram, index));
        maps[PF1_TILES].update(|index| playfield_tile(pf1_ram, index));
        maps[PF1_TEXT].update(|index| playfield_tile(pf1_ram, index));
    }

    fn mark_colors(&self, palette: &mut Palette) {
        for layer in [PF2, PF1_TILES, PF1_TEXT] {
            self.maps[layer].mark_colors(self.gfx(layer), palette);
        }
        for sprite in &self.sprites {
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

    fn draw_sprites(&self, _bank: usize, surface: &mut dyn DrawSurface) {
        for sprite in &self.sprites {
            sprite.draw(&self.gfx.sprites, surface, TRANSPARENT_PEN);
        }
    }
}

/// Palette RAM, playfields and the output stage
#[derive(Debug, Clone)]
pub struct Video {
    pub palette: Palette,
    pub playfield: Playfield,
    compositor: Compositor,
    bitmap: Bitmap,
    screen: Screen,
}

impl Video {
    pub fn new(gfx: Graphics) -> Self {
        Self {
            palette: Palette::new(PaletteFormat::Xbgr444, PALETTE_ENTRIES),
            playfield: Playfield::new(gfx),
            // Only one of the two playfield 1 views is enabled at a time
            compositor: Compositor::new(vec![
                DrawStep::Layer(PF2),
                DrawStep::Layer(PF1_TILES),
                DrawStep::Layer(PF1_TEXT),
                DrawStep::Sprites(0),
            ]),
            bitmap: Bitmap::new(SCREEN_WIDTH, SCREEN_HEIGHT),
            screen: Screen::new("tumblep", Rect::new(0, 319, 8, 247)),
        }
    }

    pub fn render(&mut self, sprite_ram: &[u8], frame: u64) -> &Frame {
        self.playfield.latch_sprites(sprite_ram, frame);
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
        Graphics::decode(&[0; 0x80], &[0; 0x80]).unwrap()
    }

    fn put_word(ram: &mut [u8], index: usize, value: u16) {
        ram[index * 2] = (value >> 8) as u8;
        ram[index * 2 + 1] = value as u8;
    }

    fn sprite_ram(words: [u16; 3]) -> Vec<u8> {
        let mut ram = vec![0u8; SPRITE_STRIDE];
        for (i, &w) in words.iter().enumerate() {
            put_word(&mut ram, i, w);
        }
        ram
    }

    fn codes(sprite: &SpriteEntry) -> Vec<u32> {
        sprite.cells().iter().map(|c| c.code).collect()
    }

    #[test]
    fn test_gfx_counts() {
        let gfx = Graphics::decode(&vec![0; 0x80000], &vec![0; 0x100000]).unwrap();
        assert_eq!(gfx.chars.count(), 0x4000);
        assert_eq!(gfx.pf1_tiles.count(), 0x1000);
        assert_eq!(gfx.sprites.count(), 0x2000);
    }

    #[test]
    fn test_tile_layout_left_half_second() {
        let mut rom = vec![0u8; 0x80];
        // First byte of the tile: plane 3 of row 0, right half
        rom[0] = 0x80;
        let tiles = tile_layout(rom.len()).decode("tiles", &rom, 16).unwrap();
        assert_eq!(tiles.element(0)[8], 0x01);
        assert_eq!(tiles.element(0)[0], 0x00);
    }

    #[test]
    fn test_tall_sprite_anchored_at_bottom() {
        // Four cells tall, color 5
        let ram = sprite_ram([0x0410, 0x0125, 0x0A30]);
        let sprites = sprite_list(&ram, &sprite_flip(), 0);
        assert_eq!(sprites.len(), 1);
        let s = sprites[0];
        assert_eq!(s.size, SpriteSize::Tall(4));
        assert_eq!((s.x, s.color), (304 - 0x30, 5));
        // Bottom cell at 240 - y, three cells above it
        assert_eq!(s.y, 240 - 0x10 - 48);
        assert_eq!(codes(&s), vec![0x124, 0x125, 0x126, 0x127]);
    }

    #[test]
    fn test_sprite_flip_bits() {
        let ram = sprite_ram([0x6210, 0x0040, 0x0030]);
        let s = sprite_list(&ram, &sprite_flip(), 0)[0];
        assert!(s.flip_x && s.flip_y);
        assert_eq!(codes(&s), vec![0x41, 0x40]);
    }

    #[test]
    fn test_unused_and_offscreen_sprites_skipped() {
        let mut ram = vec![0u8; 3 * SPRITE_STRIDE];
        // Code 0: unused
        put_word(&mut ram, 0, 0x0010);
        put_word(&mut ram, 2, 0x0030);
        // X wraps to -32, lands past the right edge
        put_word(&mut ram, 4, 0x0010);
        put_word(&mut ram, 5, 0x0001);
        put_word(&mut ram, 6, 0x01E0);
        // X wraps to -16, still visible
        put_word(&mut ram, 8, 0x0010);
        put_word(&mut ram, 9, 0x0002);
        put_word(&mut ram, 10, 0x01F0);

        let sprites = sprite_list(&ram, &sprite_flip(), 0);
        assert_eq!(sprites.len(), 1);
        assert_eq!((sprites[0].code, sprites[0].x), (2, 320));
    }

    #[test]
    fn test_flashing_sprites_on_even_frames_only() {
        let ram = sprite_ram([0x1010, 0x0001, 0x0030]);
        assert_eq!(sprite_list(&ram, &sprite_flip(), 2).len(), 1);
        assert!(sprite_list(&ram, &sprite_flip(), 3).is_empty());
    }

    #[test]
    fn test_flipped_tall_sprite_keeps_top_edge() {
        let ram = sprite_ram([0x0210, 0x0040, 0x0030]);
        let mut flip = sprite_flip();
        flip.enabled = true;
        let s = sprite_list(&ram, &flip, 0)[0];
        assert_eq!((s.x, s.y), (0x30, 0x10));
        assert!(s.flip_x && s.flip_y);
        // Flipped: the highest code is on top
        assert_eq!(codes(&s), vec![0x41, 0x40]);
    }

    #[test]
    fn test_split_scan_halves() {
        let mut field = Playfield::new(graphics());
        field.prepare();
        // Word 0x400 is column 32, row 0 of the tile view
        field.write_pf1_ram(0x800, 0x20);
        field.write_pf1_ram(0x801, 0x05);
        assert!(field.tilemap(PF1_TILES).is_dirty(0x400));
        assert!(field.tilemap(PF1_TEXT).is_dirty(0x400));
        assert!(!field.tilemap(PF2).is_dirty(0x400));
        field.prepare();
        let tile = field.tilemap(PF1_TILES).tile(0x400).unwrap();
        assert_eq!((tile.code, tile.color), (0x005, 2));
    }

    #[test]
    fn test_text_mode_switches_views() {
        let mut field = Playfield::new(graphics());
        field.prepare();
        assert!(field.tilemap(PF1_TILES).enabled);
        assert!(!field.tilemap(PF1_TEXT).enabled);

        field.write_control(ctrl::PF1_MODE as u32 * 2 + 1, 0x80);
        field.prepare();
        assert!(!field.tilemap(PF1_TILES).enabled);
        assert!(field.tilemap(PF1_TEXT).enabled);
    }

    #[test]
    fn test_scroll_nudge_follows_flip() {
        let mut field = Playfield::new(graphics());
        field.write_control(ctrl::PF1_SCROLL_X as u32 * 2 + 1, 0x10);
        field.write_control(ctrl::PF2_SCROLL_Y as u32 * 2 + 1, 0x08);
        field.prepare();
        assert_eq!(field.tilemap(PF1_TEXT).scroll(), (0x0F, 0));
        assert_eq!(field.tilemap(PF2).scroll(), (-1, 0x08));

        field.write_control(ctrl::FLIP as u32 * 2 + 1, 0x80);
        field.prepare();
        assert!(field.tilemap(PF1_TILES).is_flipped());
        assert_eq!(field.tilemap(PF1_TILES).scroll(), (0x11, 0));
    }
}
