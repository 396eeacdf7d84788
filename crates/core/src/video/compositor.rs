//! Frame composition in a fixed layer order.

use super::palette::Palette;
use super::surface::{Bitmap, DrawSurface};

/// One step of a board's draw order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawStep {
    /// Fill the clip area with a pen
    Fill(u16),
    /// Draw tile layer `n`
    Layer(usize),
    /// Draw the sprites of priority bank `n`
    Sprites(usize),
}

/// The board's video state, as the compositor drives it.
pub trait Scene {
    /// Bring cached state (tilemaps) up to date with video RAM
    fn prepare(&mut self);

    /// Mark every palette entry this frame will reference
    fn mark_colors(&self, palette: &mut Palette);

    /// `opaque` is set when the layer is the first thing drawn
    fn draw_layer(&self, layer: usize, opaque: bool, surface: &mut dyn DrawSurface);

    fn draw_sprites(&self, bank: usize, surface: &mut dyn DrawSurface);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compositor {
    steps: Vec<DrawStep>,
    used_colors_pass: bool,
}

impl Compositor {
    pub fn new(steps: Vec<DrawStep>) -> Self {
        Self {
            steps,
            used_colors_pass: true,
        }
    }

    /// Skip the used-colors pass and convert every dirty palette entry
    pub fn without_used_colors_pass(mut self) -> Self {
        self.used_colors_pass = false;
        self
    }

    pub fn steps(&self) -> &[DrawStep] {
        &self.steps
    }

    /// Update the palette for this frame: mark the used entries, then
    /// convert the dirty ones among them.
    pub fn update_palette<S: Scene + ?Sized>(&self, scene: &S, palette: &mut Palette) {
        if self.used_colors_pass {
            palette.clear_used();
            scene.mark_colors(palette);
            for step in &self.steps {
                if let DrawStep::Fill(pen) = *step {
                    palette.mark_used(pen as usize);
                }
            }
        } else {
            palette.mark_all_used();
        }
        palette.recalc();
    }

    /// Compose one frame into `bitmap`. Later steps cover earlier ones
    /// wherever they are opaque.
    pub fn render<S: Scene + ?Sized>(&self, scene: &mut S, palette: &mut Palette, bitmap: &mut Bitmap) {
        scene.prepare();
        self.update_palette(scene, palette);
        for (i, step) in self.steps.iter().enumerate() {
            match *step {
                DrawStep::Fill(pen) => bitmap.fill(pen),
                DrawStep::Layer(layer) => scene.draw_layer(layer, i == 0, bitmap),
                DrawStep::Sprites(bank) => scene.draw_sprites(bank, bitmap),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::gfx::GfxSet;
    use crate::video::palette::{IndexedPalette, PaletteFormat};
    use crate::video::sprite::SpriteEntry;
    use crate::video::surface::Blit;

    /// Layer 0 paints pen 1 everywhere, layer 1 paints pen 2 on column 0
    /// only, sprite bank 0 puts pen 3 at (1, 0).
    struct TestScene {
        gfx: GfxSet,
        prepared: u32,
        log: std::cell::RefCell<Vec<DrawStep>>,
    }

    impl Scene for TestScene {
        fn prepare(&mut self) {
            self.prepared += 1;
        }

        fn mark_colors(&self, palette: &mut Palette) {
            palette.mark_used(1);
        }

        fn draw_layer(&self, layer: usize, opaque: bool, surface: &mut dyn DrawSurface) {
            self.log.borrow_mut().push(DrawStep::Layer(layer));
            match layer {
                0 => {
                    assert!(opaque);
                    surface.fill(1);
                }
                _ => surface.draw_tile(&self.gfx, &Blit::new(2, 0, 0, 0)),
            }
        }

        fn draw_sprites(&self, bank: usize, surface: &mut dyn DrawSurface) {
            self.log.borrow_mut().push(DrawStep::Sprites(bank));
            SpriteEntry::new(3, 1, 0, 0).draw(&self.gfx, surface, 0);
        }
    }

    fn scene() -> TestScene {
        // 16x16 elements, element n = solid pen n
        let pens = (0..4u8).flat_map(|n| std::iter::repeat(n).take(256)).collect();
        TestScene {
            gfx: GfxSet::from_pens(16, 16, 16, pens),
            prepared: 0,
            log: Default::default(),
        }
    }

    #[test]
    fn test_steps_run_in_order_and_occlude() {
        let compositor = Compositor::new(vec![
            DrawStep::Layer(0),
            DrawStep::Layer(1),
            DrawStep::Sprites(0),
        ]);
        let mut scene = scene();
        let mut palette = Palette::new(PaletteFormat::Xbgr444, 16);
        let mut bitmap = Bitmap::new(20, 1);
        compositor.render(&mut scene, &mut palette, &mut bitmap);

        assert_eq!(scene.prepared, 1);
        assert_eq!(*scene.log.borrow(), compositor.steps().to_vec());
        assert_eq!(bitmap.pixel(0, 0), Some(2));
        assert_eq!(bitmap.pixel(1, 0), Some(3));
        assert_eq!(bitmap.pixel(17, 0), Some(1));
    }

    #[test]
    fn test_used_colors_pass_limits_recalc() {
        let compositor = Compositor::new(vec![DrawStep::Fill(0)]);
        let mut palette = Palette::new(PaletteFormat::Xbgr444, 4);
        palette.write(3, 0x0F);
        palette.write(5, 0x0F);
        compositor.update_palette(&scene(), &mut palette);
        assert_eq!(palette.get_color(1), 0xFFFF0000);
        assert!(palette.is_dirty(2));

        let all = Compositor::new(vec![]).without_used_colors_pass();
        all.update_palette(&scene(), &mut palette);
        assert!(!palette.is_dirty(2));
        assert_eq!(palette.get_color(2), 0xFFFF0000);
    }

    #[test]
    fn test_fill_pen_counts_as_used() {
        let compositor = Compositor::new(vec![DrawStep::Fill(2), DrawStep::Layer(0)]);
        let mut palette = Palette::new(PaletteFormat::Xbgr444, 4);
        palette.write(5, 0x0F);
        compositor.update_palette(&scene(), &mut palette);
        assert!(!palette.is_dirty(2));
        assert_eq!(palette.get_color(2), 0xFFFF0000);
    }
}
