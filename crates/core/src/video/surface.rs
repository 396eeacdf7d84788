//! Pen-indexed drawing surface.

use super::gfx::GfxSet;

/// Inclusive clip rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Rect {
    pub fn new(min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub fn width(&self) -> u32 {
        (self.max_x - self.min_x + 1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.max_y - self.min_y + 1).max(0) as u32
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    fn intersect(&self, other: &Rect) -> Rect {
        Rect {
            min_x: self.min_x.max(other.min_x),
            max_x: self.max_x.min(other.max_x),
            min_y: self.min_y.max(other.min_y),
            max_y: self.max_y.min(other.max_y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transparency {
    /// Every pixel is drawn
    Opaque,
    /// Pixels of this pen are skipped
    Pen(u8),
}

/// One element blit: which element, where, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blit {
    pub code: u32,
    pub color: u32,
    pub flip_x: bool,
    pub flip_y: bool,
    pub x: i32,
    pub y: i32,
    pub transparency: Transparency,
}

impl Blit {
    pub fn new(code: u32, color: u32, x: i32, y: i32) -> Self {
        Self {
            code,
            color,
            flip_x: false,
            flip_y: false,
            x,
            y,
            transparency: Transparency::Opaque,
        }
    }

    pub fn flipped(mut self, flip_x: bool, flip_y: bool) -> Self {
        self.flip_x = flip_x;
        self.flip_y = flip_y;
        self
    }

    pub fn transparent(mut self, pen: u8) -> Self {
        self.transparency = Transparency::Pen(pen);
        self
    }
}

/// What the compositor draws onto.
pub trait DrawSurface {
    fn fill(&mut self, pen: u16);

    fn set_pixel(&mut self, x: i32, y: i32, pen: u16);

    /// Draw one tilemap cell
    fn draw_tile(&mut self, gfx: &GfxSet, blit: &Blit);

    /// Draw one sprite cell. Same blit as a tile unless a board needs
    /// sprite-only treatment.
    fn draw_sprite(&mut self, gfx: &GfxSet, blit: &Blit) {
        self.draw_tile(gfx, blit);
    }
}

/// Pen-indexed bitmap. Pens are palette entries, not colors; the palette
/// lookup happens when the frame is handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u16>,
    clip: Rect,
}

impl Bitmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width * height) as usize],
            clip: Rect::new(0, width as i32 - 1, 0, height as i32 - 1),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clip(&self) -> Rect {
        self.clip
    }

    /// Restrict drawing to `clip` (intersected with the bitmap bounds)
    pub fn set_clip(&mut self, clip: Rect) {
        let bounds = Rect::new(0, self.width as i32 - 1, 0, self.height as i32 - 1);
        self.clip = clip.intersect(&bounds);
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<u16> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }

    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    fn blit(&mut self, gfx: &GfxSet, blit: &Blit) {
        if gfx.is_empty() {
            return;
        }
        let code = gfx.clamp_code(blit.code);
        if let Transparency::Pen(pen) = blit.transparency {
            // Nothing but the transparent pen: skip the element entirely
            if gfx.pen_usage(code) & !1u32.checked_shl(pen as u32).unwrap_or(0) == 0 {
                return;
            }
        }

        let (w, h) = (gfx.width() as i32, gfx.height() as i32);
        let clip = self.clip;
        if blit.x > clip.max_x || blit.y > clip.max_y || blit.x + w <= clip.min_x || blit.y + h <= clip.min_y {
            return;
        }

        let element = gfx.element(code);
        let color_offset = gfx.color_offset(blit.color);
        for dy in 0..h {
            let sy = blit.y + dy;
            if sy < clip.min_y || sy > clip.max_y {
                continue;
            }
            let src_y = if blit.flip_y { h - 1 - dy } else { dy };
            let row = (sy as u32 * self.width) as usize;
            for dx in 0..w {
                let sx = blit.x + dx;
                if sx < clip.min_x || sx > clip.max_x {
                    continue;
                }
                let src_x = if blit.flip_x { w - 1 - dx } else { dx };
                let pen = element[(src_y * w + src_x) as usize];
                if blit.transparency == Transparency::Pen(pen) {
                    continue;
                }
                self.pixels[row + sx as usize] = (color_offset + pen as u32) as u16;
            }
        }
    }
}

impl DrawSurface for Bitmap {
    /// Fills the clip rectangle only
    fn fill(&mut self, pen: u16) {
        let clip = self.clip;
        if clip.width() == 0 {
            return;
        }
        for y in clip.min_y..=clip.max_y {
            let row = (y as u32 * self.width) as usize;
            self.pixels[row + clip.min_x as usize..=row + clip.max_x as usize].fill(pen);
        }
    }

    fn set_pixel(&mut self, x: i32, y: i32, pen: u16) {
        if self.clip.contains(x, y) {
            let idx = (y as u32 * self.width) as usize + x as usize;
            self.pixels[idx] = pen;
        }
    }

    fn draw_tile(&mut self, gfx: &GfxSet, blit: &Blit) {
        self.blit(gfx, blit);
    }
}
