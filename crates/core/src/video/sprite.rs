//! Multi-cell sprites built from 16x16 elements.
//!
//! A sprite's size class picks how many 16x16 cells it is made of. The
//! cell codes come from the base code: one cell to the right adds 1, one
//! cell down adds 2 (or 1 for single-column "tall" sprites), with the low
//! base bits masked off so every cell stays inside its group. Flipping a
//! sprite mirrors the order of the cells as well as each cell's pixels.

use super::gfx::GfxSet;
use super::palette::Palette;
use super::surface::{Blit, DrawSurface};

pub const CELL: i32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteSize {
    S16x16,
    S16x32,
    S32x16,
    S32x32,
    /// One column of `n` cells, `n` a power of two
    Tall(u8),
}

/// One 16x16 cell of a sprite, relative to the sprite's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubTile {
    pub code: u32,
    pub dx: i32,
    pub dy: i32,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl SpriteSize {
    /// Width and height in cells
    pub fn cells(self) -> (u32, u32) {
        match self {
            SpriteSize::S16x16 => (1, 1),
            SpriteSize::S16x32 => (1, 2),
            SpriteSize::S32x16 => (2, 1),
            SpriteSize::S32x32 => (2, 2),
            SpriteSize::Tall(n) => (1, n.max(1) as u32),
        }
    }

    /// Width and height in pixels
    pub fn pixels(self) -> (i32, i32) {
        let (w, h) = self.cells();
        (w as i32 * CELL, h as i32 * CELL)
    }

    /// Code bits owned by the cell arrangement
    fn group_mask(self) -> u32 {
        match self {
            SpriteSize::S16x16 => 0,
            SpriteSize::S16x32 => 2,
            SpriteSize::S32x16 => 1,
            SpriteSize::S32x32 => 3,
            SpriteSize::Tall(n) => (n.max(1) as u32).next_power_of_two() - 1,
        }
    }

    fn row_stride(self) -> u32 {
        match self {
            SpriteSize::Tall(_) => 1,
            _ => 2,
        }
    }

    /// Cells in raster order (top row first, left to right)
    pub fn layout(self, code: u32, flip_x: bool, flip_y: bool) -> Vec<SubTile> {
        let base = code & !self.group_mask();
        let (width, height) = self.cells();
        let mut cells = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            let ey = if flip_y { height - 1 - y } else { y };
            for x in 0..width {
                let ex = if flip_x { width - 1 - x } else { x };
                cells.push(SubTile {
                    code: base + ex + ey * self.row_stride(),
                    dx: x as i32 * CELL,
                    dy: y as i32 * CELL,
                    flip_x,
                    flip_y,
                });
            }
        }
        cells
    }
}

/// One decoded sprite RAM record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteEntry {
    pub code: u32,
    /// Top-left corner in screen pixels
    pub x: i32,
    pub y: i32,
    pub color: u32,
    pub flip_x: bool,
    pub flip_y: bool,
    pub size: SpriteSize,
}

impl SpriteEntry {
    pub fn new(code: u32, x: i32, y: i32, color: u32) -> Self {
        Self {
            code,
            x,
            y,
            color,
            flip_x: false,
            flip_y: false,
            size: SpriteSize::S16x16,
        }
    }

    pub fn flipped(mut self, flip_x: bool, flip_y: bool) -> Self {
        self.flip_x = flip_x;
        self.flip_y = flip_y;
        self
    }

    pub fn sized(mut self, size: SpriteSize) -> Self {
        self.size = size;
        self
    }

    pub fn cells(&self) -> Vec<SubTile> {
        self.size.layout(self.code, self.flip_x, self.flip_y)
    }

    pub fn draw(&self, gfx: &GfxSet, surface: &mut dyn DrawSurface, transparent_pen: u8) {
        for cell in self.cells() {
            let blit = Blit::new(cell.code, self.color, self.x + cell.dx, self.y + cell.dy)
                .flipped(cell.flip_x, cell.flip_y)
                .transparent(transparent_pen);
            surface.draw_sprite(gfx, &blit);
        }
    }

    pub fn mark_colors(&self, gfx: &GfxSet, palette: &mut Palette) {
        let offset = gfx.color_offset(self.color);
        for cell in self.cells() {
            palette.mark_pens(offset, gfx.pen_usage(cell.code));
        }
    }
}

/// Whole-screen flip as sprite hardware applies it: both flip bits invert
/// and positions mirror as `max - pos`. Some boards also shift particular
/// size classes by a fixed amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenFlip {
    pub enabled: bool,
    pub max_x: i32,
    pub max_y: i32,
    corrections: Vec<(SpriteSize, i32, i32)>,
}

impl ScreenFlip {
    pub fn new(max_x: i32, max_y: i32) -> Self {
        Self {
            enabled: false,
            max_x,
            max_y,
            corrections: Vec::new(),
        }
    }

    /// Extra (`dx`, `dy`) applied to sprites of `size` while flipped
    pub fn with_correction(mut self, size: SpriteSize, dx: i32, dy: i32) -> Self {
        self.corrections.push((size, dx, dy));
        self
    }

    pub fn apply(&self, mut sprite: SpriteEntry) -> SpriteEntry {
        if !self.enabled {
            return sprite;
        }
        sprite.flip_x = !sprite.flip_x;
        sprite.flip_y = !sprite.flip_y;
        sprite.x = self.max_x - sprite.x;
        sprite.y = self.max_y - sprite.y;
        for &(size, dx, dy) in &self.corrections {
            if size == sprite.size {
                sprite.x += dx;
                sprite.y += dy;
            }
        }
        sprite
    }
}
