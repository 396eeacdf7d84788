//! Column-strip tile layers and sprites.
//!
//! There is no fixed tilemap. Each of the three layers is described by a
//! 128-byte block of scroll RAM: 32 column entries of four bytes. Byte 1 of
//! an entry picks which 64-byte strip of video RAM (32 tiles of code and
//! attribute) fills that column. Byte 0 of the first entry scrolls the
//! whole layer up, byte 3 scrolls it right.

use arcade_core::types::Frame;
use arcade_core::video::{
    decode_rgb_proms, Bitmap, Blit, Compositor, DrawStep, DrawSurface, GfxLayout, GfxSet,
    Palette, Rect, Scene, Screen, SpriteEntry,
};
use arcade_core::ConfigError;

const LAYER_BLOCK: usize = 0x80;
const COLUMN_ENTRY: usize = 4;
const STRIP_BYTES: usize = 64;
const SPRITE_STRIDE: usize = 4;

pub const PALETTE_ENTRIES: usize = 512;
const SPRITE_COLOR_BASE: u32 = 256;
const TRANSPARENT_PEN: u8 = 15;
/// Pen behind all layers
const BACKDROP: u16 = 511;

const SCREEN_WIDTH: u32 = 256;
const SCREEN_HEIGHT: u32 = 256;

/// 8x8 chars, planes split between the ROM halves
fn char_layout(rom_len: usize) -> GfxLayout {
    let half = (rom_len * 8 / 2) as u32;
    GfxLayout {
        width: 8,
        height: 8,
        total: Some((rom_len / 2 / 16) as u32),
        plane_offsets: vec![half, half + 4, 0, 4],
        x_offsets: vec![3, 2, 1, 0, 8 + 3, 8 + 2, 8 + 1, 8],
        y_offsets: (0..8).map(|y| y * 16).collect(),
        char_increment: 16 * 8,
    }
}

/// 16x16 sprites, two 8-pixel halves per row 256 bits apart
fn sprite_layout(rom_len: usize) -> GfxLayout {
    let half = (rom_len * 8 / 2) as u32;
    let nibbles: [u32; 8] = [3, 2, 1, 0, 8 + 3, 8 + 2, 8 + 1, 8];
    GfxLayout {
        width: 16,
        height: 16,
        total: Some((rom_len / 2 / 64) as u32),
        plane_offsets: vec![half, half + 4, 0, 4],
        x_offsets: (0..16).map(|x| nibbles[x % 8] + (x / 8) as u32 * 16 * 16).collect(),
        y_offsets: (0..16).map(|y| y * 16).collect(),
        char_increment: 64 * 8,
    }
}

fn decode_chars(gfx1: &[u8]) -> Result<GfxSet, ConfigError> {
    char_layout(gfx1.len()).decode("chars", gfx1, 16)
}

fn decode_sprites(gfx2: &[u8]) -> Result<GfxSet, ConfigError> {
    Ok(sprite_layout(gfx2.len())
        .decode("sprites", gfx2, 16)?
        .with_color_base(SPRITE_COLOR_BASE))
}

/// One cell of a column strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripTile {
    pub code: u32,
    pub color: u32,
}

/// Tile `row` of strip `strip`. Strips past the end of video RAM wrap.
pub fn strip_tile(video_ram: &[u8], strip: u8, row: usize) -> StripTile {
    let at = |i: usize| match video_ram.len() {
        0 => 0,
        len => video_ram[i % len],
    };
    let base = STRIP_BYTES * strip as usize + 2 * row;
    let attr = at(base + 1);
    StripTile {
        code: at(base) as u32 + (((attr & 0x0F) as u32) << 8),
        color: (attr >> 4) as u32,
    }
}

/// Blits of one layer, in draw order
pub fn layer_blits(video_ram: &[u8], block: &[u8], flip: bool) -> Vec<Blit> {
    let mut blits = Vec::new();
    if block.len() < LAYER_BLOCK {
        return blits;
    }
    let scroll_x = block[3] as i32;
    let scroll_y = -(block[0] as i32);
    for (column, entry) in block.chunks_exact(COLUMN_ENTRY).enumerate() {
        let mut sx = 8 * column as i32 + scroll_x;
        if flip {
            sx = 248 - sx;
        }
        sx &= 0xFF;
        for row in 0..32 {
            let mut sy = 8 * row as i32 + scroll_y;
            if flip {
                sy = 248 - sy;
            }
            sy &= 0xFF;
            let tile = strip_tile(video_ram, entry[1], row);
            let blit = Blit::new(tile.code, tile.color, sx, sy)
                .flipped(flip, flip)
                .transparent(TRANSPARENT_PEN);
            blits.push(blit);
            // Wraparound
            if sx > 248 {
                blits.push(Blit { x: sx - 256, ..blit });
            }
        }
    }
    blits
}

/// Sprite list, last entry first so entry 0 ends up on top
pub fn sprite_list(sprite_ram: &[u8], flip: bool) -> Vec<SpriteEntry> {
    sprite_ram
        .chunks_exact(SPRITE_STRIDE)
        .rev()
        .map(|s| {
            let attr = s[1];
            let mut x = s[3] as i32;
            let mut y = 240 - s[0] as i32;
            let mut flip_x = attr & 0x40 != 0;
            let mut flip_y = attr & 0x80 != 0;
            if flip {
                x = 240 - x;
                y = 240 - y;
                flip_x = !flip_x;
                flip_y = !flip_y;
            }
            let code = s[2] as u32 + (((attr & 0x30) as u32) << 4);
            SpriteEntry::new(code, x, y, (attr & 0x0F) as u32).flipped(flip_x, flip_y)
        })
        .collect()
}

/// One frame's view of the board's video RAM
struct Playfield<'a> {
    chars: &'a GfxSet,
    sprite_gfx: &'a GfxSet,
    video_ram: &'a [u8],
    scroll_ram: &'a [u8],
    flip: bool,
    sprites: Vec<SpriteEntry>,
}

impl Playfield<'_> {
    fn block(&self, layer: usize) -> &[u8] {
        self.scroll_ram
            .get(layer * LAYER_BLOCK..(layer + 1) * LAYER_BLOCK)
            .unwrap_or(&[])
    }
}

impl Scene for Playfield<'_> {
    fn prepare(&mut self) {}

    // Colors come from PROMs: nothing to convert
    fn mark_colors(&self, palette: &mut Palette) {
        palette.mark_all_used();
    }

    fn draw_layer(&self, layer: usize, _opaque: bool, surface: &mut dyn DrawSurface) {
        for blit in layer_blits(self.video_ram, self.block(layer), self.flip) {
            surface.draw_tile(self.chars, &blit);
        }
    }

    fn draw_sprites(&self, _bank: usize, surface: &mut dyn DrawSurface) {
        for sprite in &self.sprites {
            sprite.draw(self.sprite_gfx, surface, TRANSPARENT_PEN);
            let wrapped = SpriteEntry {
                x: sprite.x - 256,
                ..*sprite
            };
            wrapped.draw(self.sprite_gfx, surface, TRANSPARENT_PEN);
        }
    }
}

/// Video RAM contents a frame is drawn from
#[derive(Debug, Clone, Copy)]
pub struct VideoRam<'a> {
    pub video: &'a [u8],
    pub scroll: &'a [u8],
    pub sprites: &'a [u8],
}

/// Graphics, PROM palette and the output stage.
#[derive(Debug, Clone)]
pub struct Video {
    pub palette: Palette,
    chars: GfxSet,
    sprite_gfx: GfxSet,
    compositor: Compositor,
    bitmap: Bitmap,
    screen: Screen,
}

impl Video {
    pub fn new(gfx1: &[u8], gfx2: &[u8], proms: &[u8]) -> Result<Self, ConfigError> {
        Ok(Self {
            palette: Palette::from_colors(decode_rgb_proms(proms, PALETTE_ENTRIES)),
            chars: decode_chars(gfx1)?,
            sprite_gfx: decode_sprites(gfx2)?,
            compositor: Compositor::new(vec![
                DrawStep::Fill(BACKDROP),
                DrawStep::Layer(0),
                DrawStep::Layer(1),
                DrawStep::Sprites(0),
                DrawStep::Layer(2),
            ])
            .without_used_colors_pass(),
            bitmap: Bitmap::new(SCREEN_WIDTH, SCREEN_HEIGHT),
            screen: Screen::new("lsasquad", Rect::new(0, 255, 16, 239)),
        })
    }

    pub fn load_chars(&mut self, gfx1: &[u8]) -> Result<(), ConfigError> {
        self.chars = decode_chars(gfx1)?;
        Ok(())
    }

    pub fn load_sprites(&mut self, gfx2: &[u8]) -> Result<(), ConfigError> {
        self.sprite_gfx = decode_sprites(gfx2)?;
        Ok(())
    }

    pub fn load_color_proms(&mut self, proms: &[u8]) {
        self.palette = Palette::from_colors(decode_rgb_proms(proms, PALETTE_ENTRIES));
    }

    /// Compose a frame from the current video RAM
    pub fn render(&mut self, ram: VideoRam<'_>, flip: bool) -> &Frame {
        let mut scene = Playfield {
            chars: &self.chars,
            sprite_gfx: &self.sprite_gfx,
            video_ram: ram.video,
            scroll_ram: ram.scroll,
            flip,
            sprites: sprite_list(ram.sprites, flip),
        };
        self.compositor
            .render(&mut scene, &mut self.palette, &mut self.bitmap);
        self.screen.resolve(&self.bitmap, &self.palette)
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tile_fields() {
        let mut ram = vec![0u8; 0x2000];
        // Strip 3, row 5
        ram[3 * 64 + 10] = 0x34;
        ram[3 * 64 + 11] = 0xA7;
        let tile = strip_tile(&ram, 3, 5);
        assert_eq!(tile.code, 0x734);
        assert_eq!(tile.color, 0xA);
    }

    #[test]
    fn test_strip_past_video_ram_wraps() {
        let mut ram = vec![0u8; 0x2000];
        ram[0] = 0x42;
        // Strip 128 starts at 0x2000
        assert_eq!(strip_tile(&ram, 128, 0).code, 0x42);
        assert_eq!(strip_tile(&[], 5, 5).code, 0);
    }

    #[test]
    fn test_layer_columns_and_scroll() {
        let ram = vec![0u8; 0x2000];
        let mut block = vec![0u8; LAYER_BLOCK];
        let blits = layer_blits(&ram, &block, false);
        assert_eq!(blits.len(), 32 * 32);
        assert_eq!((blits[0].x, blits[0].y), (0, 0));
        assert_eq!((blits[33].x, blits[33].y), (8, 8));

        block[0] = 0x10;
        block[3] = 0x04;
        let blits = layer_blits(&ram, &block, false);
        // Up 16, right 4
        assert_eq!((blits[2].x, blits[2].y), (4, 0));
        assert_eq!(blits[0].y, 0xF0);
    }

    #[test]
    fn test_layer_wraps_right_edge() {
        let ram = vec![0u8; 0x2000];
        let mut block = vec![0u8; LAYER_BLOCK];
        block[3] = 0x04;
        let blits = layer_blits(&ram, &block, false);
        // Column 31 at 252 is drawn again at -4
        assert_eq!(blits.len(), 32 * 32 + 32);
        assert!(blits.iter().any(|b| b.x == 252));
        assert!(blits.iter().any(|b| b.x == -4));
    }

    #[test]
    fn test_flipped_layer() {
        let ram = vec![0u8; 0x2000];
        let block = vec![0u8; LAYER_BLOCK];
        let blits = layer_blits(&ram, &block, true);
        assert_eq!((blits[0].x, blits[0].y), (248, 248));
        assert!(blits[0].flip_x && blits[0].flip_y);
    }

    #[test]
    fn test_sprite_decode() {
        let mut ram = vec![0u8; 8];
        ram[0..4].copy_from_slice(&[0x40, 0x75, 0x12, 0x30]);
        let sprites = sprite_list(&ram, false);
        assert_eq!(sprites.len(), 2);
        // Entry 0 comes last
        let s = sprites[1];
        assert_eq!(s.code, 0x312);
        assert_eq!(s.color, 5);
        assert_eq!((s.x, s.y), (0x30, 240 - 0x40));
        assert!(s.flip_x);
        assert!(!s.flip_y);

        let s = sprite_list(&ram, true)[1];
        assert_eq!((s.x, s.y), (240 - 0x30, 0x40));
        assert!(!s.flip_x);
        assert!(s.flip_y);
    }

    #[test]
    fn test_gfx_element_counts() {
        assert_eq!(decode_chars(&vec![0; 0x20000]).unwrap().count(), 4096);
        assert_eq!(decode_sprites(&vec![0; 0x20000]).unwrap().count(), 1024);
    }
}
