//! Konami 005885 pair: two 64x32 tile layers, two sprite lists.

use arcade_core::types::Frame;
use arcade_core::video::{
    Bitmap, Compositor, DrawStep, DrawSurface, GfxLayout, GfxSet, LayerRegisters, Palette,
    PaletteFormat, Rect, ScanOrder, Scene, Screen, ScreenFlip, SpriteEntry, SpriteSize, TileInfo,
    Tilemap,
};
use arcade_core::ConfigError;

/// Chip 0: foreground layer, first sprite list
pub const FG: usize = 0;
/// Chip 1: background layer, second sprite list
pub const BG: usize = 1;

pub const VIDEO_RAM_SIZE: usize = 0x1000;
pub const PALETTE_SIZE: usize = 0x80;
const PALETTE_ENTRIES: usize = PALETTE_SIZE / PaletteFormat::BYTES_PER_ENTRY;
/// Tile code bytes sit this far above their attribute bytes
const CODE_OFFSET: usize = 0x400;

const SPRITE_STRIDE: usize = 5;
/// Bytes of sprite RAM each chip scans
const SPRITE_LIST_LEN: [usize; 2] = [0x07D, 0x140];
/// Colors per sprite set; the first set has a single fixed color
const SPRITE_COLORS: [u32; 2] = [1, 16];

const SCREEN_WIDTH: u32 = 256;
const SCREEN_HEIGHT: u32 = 256;

/// Cell (col, row) of a 64x32 layer: two 32x32 halves side by side
fn tilemap_scan(col: u32, row: u32, _cols: u32, _rows: u32) -> usize {
    ((col & 0x1F) + ((row & 0x1F) << 5) + ((col & 0x20) << 6)) as usize
}

fn char_layout() -> GfxLayout {
    GfxLayout::packed(8, 8, 4)
}

/// 16x16 sprites stored as four 8x8 quadrants
fn sprite_layout() -> GfxLayout {
    GfxLayout {
        width: 16,
        height: 16,
        total: None,
        plane_offsets: vec![0, 1, 2, 3],
        x_offsets: (0..16).map(|x| (x % 8) * 4 + (x / 8) * 32 * 8).collect(),
        y_offsets: (0..16).map(|y| (y % 8) * 32 + (y / 8) * 16 * 32).collect(),
        char_increment: 32 * 32,
    }
}

/// Tile graphics of each chip, in `gfx1`
fn decode_chars(gfx1: &[u8]) -> Result<[GfxSet; 2], ConfigError> {
    let half = gfx1.len() / 2;
    let fg = char_layout().decode("fg chars", &gfx1[..half], 16)?.with_color_base(48);
    let bg = char_layout().decode("bg chars", &gfx1[half..], 16)?;
    Ok([fg, bg])
}

/// Sprite graphics of each chip, in `gfx2`
fn decode_sprites(gfx2: &[u8]) -> Result<[GfxSet; 2], ConfigError> {
    let half = gfx2.len() / 2;
    let first = sprite_layout().decode("sprites 1", &gfx2[..half], 16)?.with_color_base(16);
    let second = sprite_layout().decode("sprites 2", &gfx2[half..], 16)?.with_color_base(0x40);
    Ok([first, second])
}

/// Pen -> color entry table. Pens below 0x40 show their own entry; the
/// second sprite set's pens go through the lookup PROM into entries
/// 0x10-0x1F.
pub fn color_table(prom: &[u8]) -> Vec<u16> {
    let mut table: Vec<u16> = (0..0x40).collect();
    table.extend((0..0x100).map(|i| ((prom.get(i).copied().unwrap_or(0) & 0x0F) | 0x10) as u16));
    table
}

/// Resolve one tile from a chip's video RAM.
///
/// The attribute byte supplies bank bits 0-1 (bits 6-7) and bank bit 2
/// (bit 5), ORed with the chip's char bank register. Bits 4 and 5 are also
/// the flip bits.
pub fn tile_info(ram: &[u8], char_bank: u8, index: usize) -> TileInfo {
    let attr = ram.get(index).copied().unwrap_or(0);
    let num = ram.get(index + CODE_OFFSET).copied().unwrap_or(0) as u32;
    let bank = ((attr >> 6) & 3) as u32 + 4 * (((attr >> 5) & 1) | char_bank) as u32;
    TileInfo::new(num + 256 * bank, 0).flipped(attr & 0x10 != 0, attr & 0x20 != 0)
}

fn sprite_size(attr: u8) -> SpriteSize {
    match attr & 0x1C {
        0x10 => SpriteSize::S32x32,
        0x08 => SpriteSize::S16x32,
        0x04 => SpriteSize::S32x16,
        _ => SpriteSize::S16x16,
    }
}

/// Decode one chip's sprite list, screen flip applied
pub fn sprite_list(ram: &[u8], len: usize, colors: u32, flip: &ScreenFlip) -> Vec<SpriteEntry> {
    let ram = &ram[..len.min(ram.len())];
    ram.chunks_exact(SPRITE_STRIDE)
        .map(|s| {
            let code = s[0] as u32 | (((s[1] & 0x07) as u32) << 8);
            let attr = s[4];
            let x = s[3] as i32 | (((attr & 0x01) as i32) << 8);
            let y = s[2] as i32;
            let color = ((s[1] >> 4) as u32) % colors;
            let sprite = SpriteEntry::new(code, x, y, color)
                .flipped(attr & 0x20 != 0, attr & 0x40 != 0)
                .sized(sprite_size(attr));
            flip.apply(sprite)
        })
        .collect()
}

/// Everything the compositor draws: both chips' registers, video RAM,
/// cached tilemaps and latched sprite lists.
#[derive(Debug, Clone)]
pub struct Playfield {
    pub regs: [LayerRegisters; 2],
    ram: [Vec<u8>; 2],
    maps: [Tilemap; 2],
    chars: [GfxSet; 2],
    sprite_gfx: [GfxSet; 2],
    flip: [ScreenFlip; 2],
    sprites: [Vec<SpriteEntry>; 2],
}

impl Playfield {
    fn new(gfx1: &[u8], gfx2: &[u8]) -> Result<Self, ConfigError> {
        let layer = |name| {
            Tilemap::new(name, ScanOrder::Custom(tilemap_scan), 8, 8, 64, 32)
                .with_flip_extent(SCREEN_WIDTH, SCREEN_HEIGHT)
        };
        // Big sprites land one cell off when flipped; the board shifts them back
        let flip = ScreenFlip::new(240, 240).with_correction(SpriteSize::S32x32, -0x10, -0x10);
        Ok(Self {
            regs: [LayerRegisters::new(); 2],
            ram: [vec![0; VIDEO_RAM_SIZE], vec![0; VIDEO_RAM_SIZE]],
            maps: [layer("fg").with_transparent_pen(0), layer("bg")],
            chars: decode_chars(gfx1)?,
            sprite_gfx: decode_sprites(gfx2)?,
            flip: [flip.clone(), flip],
            sprites: [Vec::new(), Vec::new()],
        })
    }

    /// 005885 register write
    pub fn write_register(&mut self, chip: usize, offset: u32, data: u8) {
        let regs = &mut self.regs[chip];
        match offset {
            0 => regs.set_scroll_y(data as u16),
            1 => regs.set_scroll_x_low(data),
            2 => regs.set_scroll_x_high(data),
            3 => {
                if regs.set_bank((data & 0x02) >> 1) {
                    self.maps[chip].mark_all_dirty();
                }
            }
            4 => regs.control = data,
            _ => {}
        }
    }

    pub fn flip_screen(&self, chip: usize) -> bool {
        self.regs[chip].control & 0x08 != 0
    }

    pub fn read_ram(&self, chip: usize, offset: u32) -> u8 {
        self.ram[chip].get(offset as usize).copied().unwrap_or(0)
    }

    pub fn write_ram(&mut self, chip: usize, offset: u32, data: u8) {
        if let Some(slot) = self.ram[chip].get_mut(offset as usize) {
            *slot = data;
            self.maps[chip].mark_dirty(offset as usize & !CODE_OFFSET);
        }
    }

    pub fn tilemap(&self, chip: usize) -> &Tilemap {
        &self.maps[chip]
    }

    pub fn sprites(&self, chip: usize) -> &[SpriteEntry] {
        &self.sprites[chip]
    }

    /// Copy both sprite lists out of sprite RAM, as the chips do at vblank
    pub fn latch_sprites(&mut self, sprite_ram: [&[u8]; 2]) {
        for chip in 0..2 {
            self.flip[chip].enabled = self.flip_screen(chip);
            self.sprites[chip] = sprite_list(
                sprite_ram[chip],
                SPRITE_LIST_LEN[chip],
                SPRITE_COLORS[chip],
                &self.flip[chip],
            );
        }
    }

    fn reset(&mut self) {
        for chip in 0..2 {
            self.regs[chip].reset();
            self.maps[chip].mark_all_dirty();
            self.sprites[chip].clear();
        }
    }
}

impl Scene for Playfield {
    fn prepare(&mut self) {
        let Self { regs, ram, maps, .. } = self;
        for chip in 0..2 {
            let map = &mut maps[chip];
            map.set_scroll(regs[chip].scroll_x() as i32, regs[chip].scroll_y() as i32);
            map.set_flip(regs[chip].control & 0x08 != 0);
            let bank = regs[chip].bank();
            let ram = &ram[chip];
            map.update(|index| tile_info(ram, bank, index));
        }
    }

    fn mark_colors(&self, palette: &mut Palette) {
        for chip in 0..2 {
            self.maps[chip].mark_colors(&self.chars[chip], palette);
            for sprite in &self.sprites[chip] {
                sprite.mark_colors(&self.sprite_gfx[chip], palette);
            }
        }
    }

    fn draw_layer(&self, layer: usize, opaque: bool, surface: &mut dyn DrawSurface) {
        if opaque {
            self.maps[layer].draw_opaque(&self.chars[layer], surface);
        } else {
            self.maps[layer].draw(&self.chars[layer], surface);
        }
    }

    fn draw_sprites(&self, bank: usize, surface: &mut dyn DrawSurface) {
        for sprite in &self.sprites[bank] {
            sprite.draw(&self.sprite_gfx[bank], surface, 0);
        }
    }
}

/// Video hardware: palette RAM, the two chips and the output stage.
#[derive(Debug, Clone)]
pub struct Video {
    pub palette: Palette,
    pub playfield: Playfield,
    compositor: Compositor,
    bitmap: Bitmap,
    screen: Screen,
}

impl Video {
    pub fn new(gfx1: &[u8], gfx2: &[u8], prom: &[u8]) -> Result<Self, ConfigError> {
        Ok(Self {
            palette: Palette::new(PaletteFormat::Xbgr555Swapped, PALETTE_ENTRIES)
                .with_indirection(color_table(prom)),
            playfield: Playfield::new(gfx1, gfx2)?,
            compositor: Compositor::new(vec![
                DrawStep::Layer(BG),
                DrawStep::Sprites(FG),
                DrawStep::Sprites(BG),
                DrawStep::Layer(FG),
            ]),
            bitmap: Bitmap::new(SCREEN_WIDTH, SCREEN_HEIGHT),
            screen: Screen::new("ddribble", Rect::new(0, 255, 16, 239)),
        })
    }

    pub fn load_chars(&mut self, gfx1: &[u8]) -> Result<(), ConfigError> {
        self.playfield.chars = decode_chars(gfx1)?;
        Ok(())
    }

    pub fn load_sprites(&mut self, gfx2: &[u8]) -> Result<(), ConfigError> {
        self.playfield.sprite_gfx = decode_sprites(gfx2)?;
        Ok(())
    }

    pub fn load_color_prom(&mut self, prom: &[u8]) {
        self.palette.set_indirection(color_table(prom));
    }

    /// Compose a frame from the current video state
    pub fn render(&mut self, sprite_ram: [&[u8]; 2]) -> &Frame {
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
