//! Reusable video components for tile and sprite boards.
//!
//! Each board wires these together in its own video module: graphics sets
//! decoded from ROM, tilemaps over video RAM, sprite lists decoded from
//! sprite RAM, a palette, and a [`Compositor`] with the board's draw order.

pub mod compositor;
pub mod gfx;
pub mod palette;
pub mod registers;
pub mod screen;
pub mod sprite;
pub mod surface;
pub mod tilemap;

pub use compositor::{Compositor, DrawStep, Scene};
pub use gfx::{GfxLayout, GfxSet};
pub use palette::{decode_rgb_proms, IndexedPalette, Palette, PaletteFormat};
pub use registers::{read_word, LayerRegisters, WordRegisters};
pub use screen::Screen;
pub use sprite::{ScreenFlip, SpriteEntry, SpriteSize, SubTile};
pub use surface::{Bitmap, Blit, DrawSurface, Rect, Transparency};
pub use tilemap::{ScanOrder, TileInfo, Tilemap};
