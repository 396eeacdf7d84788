//! Final ARGB output of a board.

use super::palette::{IndexedPalette, Palette};
use super::surface::{Bitmap, Rect};
use crate::renderer::Renderer;
use crate::types::Frame;

/// Converts the visible area of a pen bitmap into an ARGB [`Frame`].
#[derive(Debug, Clone)]
pub struct Screen {
    name: String,
    visible: Rect,
    frame: Frame,
}

impl Screen {
    pub fn new(name: &str, visible: Rect) -> Self {
        Self {
            name: name.to_string(),
            visible,
            frame: Frame::new(visible.width(), visible.height()),
        }
    }

    pub fn visible(&self) -> Rect {
        self.visible
    }

    /// Look every visible pen up in `palette`
    pub fn resolve(&mut self, bitmap: &Bitmap, palette: &Palette) -> &Frame {
        let width = self.visible.width() as usize;
        for (row, y) in (self.visible.min_y..=self.visible.max_y).enumerate() {
            for (col, x) in (self.visible.min_x..=self.visible.max_x).enumerate() {
                let color = bitmap
                    .pixel(x, y)
                    .map_or(0xFF000000, |pen| palette.get_color(pen as usize));
                self.frame.pixels[row * width + col] = color;
            }
        }
        &self.frame
    }
}

impl Renderer for Screen {
    fn get_frame(&self) -> &Frame {
        &self.frame
    }

    fn get_frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }

    fn clear(&mut self, color: u32) {
        self.frame.pixels.fill(color);
    }

    fn reset(&mut self) {
        self.clear(0xFF000000);
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.visible = Rect::new(
            self.visible.min_x,
            self.visible.min_x + width as i32 - 1,
            self.visible.min_y,
            self.visible.min_y + height as i32 - 1,
        );
        self.frame = Frame::new(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::surface::DrawSurface;

    #[test]
    fn test_resolve_visible_area() {
        let palette = Palette::from_colors(vec![0xFF000000, 0xFF00FF00]);
        let mut bitmap = Bitmap::new(4, 4);
        bitmap.set_pixel(1, 2, 1);

        let mut screen = Screen::new("test", Rect::new(1, 2, 2, 3));
        let frame = screen.resolve(&bitmap, &palette);
        assert_eq!((frame.width, frame.height), (2, 2));
        assert_eq!(frame.pixels, vec![0xFF00FF00, 0xFF000000, 0xFF000000, 0xFF000000]);
    }

    #[test]
    fn test_renderer_impl() {
        let mut screen = Screen::new("board", Rect::new(0, 255, 16, 239));
        assert_eq!(screen.get_frame().height, 224);
        screen.clear(0xFFFFFFFF);
        screen.reset();
        assert!(screen.get_frame().pixels.iter().all(|&p| p == 0xFF000000));
        screen.resize(128, 64);
        assert_eq!(screen.visible().max_y, 16 + 63);
        assert_eq!(screen.name(), "board");
    }
}
