//! Scrollable tile layers with a per-cell cache.
//!
//! Cells are resolved from tile RAM by a board-supplied resolver and cached.
//! Tile RAM writes invalidate single cells through [`Tilemap::mark_dirty`];
//! a bank register change invalidates the whole layer, because the same
//! raw tile byte now selects different graphics.

use super::gfx::GfxSet;
use super::palette::Palette;
use super::surface::{Blit, DrawSurface, Transparency};
use crate::logging::{log, LogCategory, LogLevel};

/// Resolved contents of one cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileInfo {
    pub code: u32,
    pub color: u32,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl TileInfo {
    pub fn new(code: u32, color: u32) -> Self {
        Self {
            code,
            color,
            flip_x: false,
            flip_y: false,
        }
    }

    pub fn flipped(mut self, flip_x: bool, flip_y: bool) -> Self {
        self.flip_x = flip_x;
        self.flip_y = flip_y;
        self
    }
}

/// Maps a cell (`col`, `row`) of a `cols` x `rows` map to its tile index
/// (the index a tile RAM write reports).
pub type ScanFn = fn(col: u32, row: u32, cols: u32, rows: u32) -> usize;

#[derive(Debug, Clone, Copy)]
pub enum ScanOrder {
    RowMajor,
    ColumnMajor,
    Custom(ScanFn),
}

impl ScanOrder {
    fn index(self, col: u32, row: u32, cols: u32, rows: u32) -> usize {
        match self {
            ScanOrder::RowMajor => (row * cols + col) as usize,
            ScanOrder::ColumnMajor => (col * rows + row) as usize,
            ScanOrder::Custom(scan) => scan(col, row, cols, rows),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tilemap {
    name: &'static str,
    cols: u32,
    rows: u32,
    tile_width: u32,
    tile_height: u32,
    /// Cell position -> tile index
    cell_index: Vec<usize>,
    /// Tile index -> cell position
    index_cell: Vec<Option<usize>>,
    cells: Vec<TileInfo>,
    dirty: Vec<bool>,
    all_dirty: bool,
    scroll_x: i32,
    scroll_y: i32,
    transparency: Transparency,
    flipped: bool,
    /// Area the layer mirrors within when flipped
    flip_extent: (i32, i32),
    pub enabled: bool,
}

impl Tilemap {
    pub fn new(
        name: &'static str,
        scan: ScanOrder,
        tile_width: u32,
        tile_height: u32,
        cols: u32,
        rows: u32,
    ) -> Self {
        let count = (cols * rows) as usize;
        let mut cell_index = Vec::with_capacity(count);
        for row in 0..rows {
            for col in 0..cols {
                cell_index.push(scan.index(col, row, cols, rows));
            }
        }
        let span = cell_index.iter().copied().max().map_or(0, |m| m + 1);
        let mut index_cell = vec![None; span];
        for (cell, &index) in cell_index.iter().enumerate() {
            index_cell[index] = Some(cell);
        }

        Self {
            name,
            cols,
            rows,
            tile_width,
            tile_height,
            cell_index,
            index_cell,
            cells: vec![TileInfo::default(); count],
            dirty: vec![true; count],
            all_dirty: true,
            scroll_x: 0,
            scroll_y: 0,
            transparency: Transparency::Opaque,
            flipped: false,
            flip_extent: ((cols * tile_width) as i32, (rows * tile_height) as i32),
            enabled: true,
        }
    }

    /// Screen size the layer mirrors within under screen flip
    pub fn with_flip_extent(mut self, width: u32, height: u32) -> Self {
        self.flip_extent = (width as i32, height as i32);
        self
    }

    /// Whole-layer flip on both axes
    pub fn set_flip(&mut self, flipped: bool) {
        self.flipped = flipped;
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn with_transparent_pen(mut self, pen: u8) -> Self {
        self.transparency = Transparency::Pen(pen);
        self
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn pixel_width(&self) -> u32 {
        self.cols * self.tile_width
    }

    pub fn pixel_height(&self) -> u32 {
        self.rows * self.tile_height
    }

    /// Invalidate the cell whose tile index is `index`. Indices outside the
    /// map (e.g. attribute bytes in a separate half of tile RAM) map back
    /// through the caller, so unknown indices are ignored.
    pub fn mark_dirty(&mut self, index: usize) {
        if let Some(Some(cell)) = self.index_cell.get(index) {
            self.dirty[*cell] = true;
        }
    }

    /// Invalidate every cell
    pub fn mark_all_dirty(&mut self) {
        if !self.all_dirty {
            log(LogCategory::Video, LogLevel::Debug, || {
                format!("{}: full invalidation", self.name)
            });
        }
        self.all_dirty = true;
    }

    pub fn is_dirty(&self, index: usize) -> bool {
        match self.index_cell.get(index) {
            Some(Some(cell)) => self.all_dirty || self.dirty[*cell],
            _ => false,
        }
    }

    /// Re-resolve invalidated cells. `resolve` gets the tile index.
    /// Returns how many cells were resolved.
    pub fn update<F>(&mut self, mut resolve: F) -> usize
    where
        F: FnMut(usize) -> TileInfo,
    {
        let mut resolved = 0;
        for (cell, &index) in self.cell_index.iter().enumerate() {
            if self.all_dirty || self.dirty[cell] {
                self.cells[cell] = resolve(index);
                self.dirty[cell] = false;
                resolved += 1;
            }
        }
        self.all_dirty = false;
        resolved
    }

    /// Cached contents of the cell at `index`
    pub fn tile(&self, index: usize) -> Option<TileInfo> {
        match self.index_cell.get(index) {
            Some(Some(cell)) => Some(self.cells[*cell]),
            _ => None,
        }
    }

    /// Pixels the map is shifted left and up by, wrapping around
    pub fn set_scroll(&mut self, x: i32, y: i32) {
        self.scroll_x = x;
        self.scroll_y = y;
    }

    pub fn scroll(&self) -> (i32, i32) {
        (self.scroll_x, self.scroll_y)
    }

    /// Mark the palette entries the cached cells reference
    pub fn mark_colors(&self, gfx: &GfxSet, palette: &mut Palette) {
        if !self.enabled {
            return;
        }
        for tile in &self.cells {
            palette.mark_pens(gfx.color_offset(tile.color), gfx.pen_usage(tile.code));
        }
    }

    /// Draw with the layer's own transparency
    pub fn draw(&self, gfx: &GfxSet, surface: &mut dyn DrawSurface) {
        self.draw_with(gfx, surface, self.transparency);
    }

    /// Draw every pixel, e.g. as the backmost layer
    pub fn draw_opaque(&self, gfx: &GfxSet, surface: &mut dyn DrawSurface) {
        self.draw_with(gfx, surface, Transparency::Opaque);
    }

    fn draw_with(&self, gfx: &GfxSet, surface: &mut dyn DrawSurface, transparency: Transparency) {
        if !self.enabled {
            return;
        }
        let (map_w, map_h) = (self.pixel_width() as i32, self.pixel_height() as i32);
        if map_w == 0 || map_h == 0 {
            return;
        }
        for row in 0..self.rows {
            for col in 0..self.cols {
                let tile = self.cells[(row * self.cols + col) as usize];
                let x = (col as i32 * self.tile_width as i32 - self.scroll_x).rem_euclid(map_w);
                let y = (row as i32 * self.tile_height as i32 - self.scroll_y).rem_euclid(map_h);
                let blit = Blit {
                    code: tile.code,
                    color: tile.color,
                    flip_x: tile.flip_x != self.flipped,
                    flip_y: tile.flip_y != self.flipped,
                    x,
                    y,
                    transparency,
                };
                // The cell and its wrapped copies; the surface clips
                for (dx, dy) in [(0, 0), (-map_w, 0), (0, -map_h), (-map_w, -map_h)] {
                    let (mut x, mut y) = (blit.x + dx, blit.y + dy);
                    if self.flipped {
                        x = self.flip_extent.0 - self.tile_width as i32 - x;
                        y = self.flip_extent.1 - self.tile_height as i32 - y;
                    }
                    surface.draw_tile(gfx, &Blit { x, y, ..blit });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::surface::Bitmap;

    fn one_pixel_gfx() -> GfxSet {
        // element n is a single pixel of pen n
        GfxSet::from_pens(1, 1, 16, (0..16).collect())
    }

    #[test]
    fn test_custom_scan_round_trip() {
        fn split_halves(col: u32, row: u32, _cols: u32, _rows: u32) -> usize {
            ((col & 0x1f) + ((row & 0x1f) << 5) + ((col & 0x20) << 6)) as usize
        }
        let map = Tilemap::new("fg", ScanOrder::Custom(split_halves), 8, 8, 64, 32);
        assert!(map.is_dirty(0x000));
        assert!(map.is_dirty(0x800));
        // Between the two halves: attribute space, not a cell
        assert!(!map.is_dirty(0x400));
        assert_eq!(map.tile(0x800 + 1), Some(TileInfo::default()));
    }

    #[test]
    fn test_update_only_dirty_cells() {
        let mut map = Tilemap::new("bg", ScanOrder::RowMajor, 8, 8, 4, 4);
        assert_eq!(map.update(|i| TileInfo::new(i as u32, 0)), 16);
        assert_eq!(map.update(|_| unreachable!()), 0);

        map.mark_dirty(5);
        map.mark_dirty(5);
        let mut seen = Vec::new();
        assert_eq!(map.update(|i| {
            seen.push(i);
            TileInfo::new(99, 0)
        }), 1);
        assert_eq!(seen, vec![5]);
        assert_eq!(map.tile(5).map(|t| t.code), Some(99));
        assert_eq!(map.tile(6).map(|t| t.code), Some(6));
    }

    #[test]
    fn test_bank_change_invalidation_recomputes_everything() {
        let mut bank = 0u32;
        let ram = [3u8; 16];
        let mut map = Tilemap::new("bg", ScanOrder::ColumnMajor, 8, 8, 4, 4);
        map.update(|i| TileInfo::new(ram[i] as u32 + 256 * bank, 0));
        assert_eq!(map.tile(0).map(|t| t.code), Some(3));

        bank = 1;
        map.mark_all_dirty();
        assert_eq!(map.update(|i| TileInfo::new(ram[i] as u32 + 256 * bank, 0)), 16);
        assert!((0..16).all(|i| map.tile(i).map(|t| t.code) == Some(259)));
    }

    #[test]
    fn test_scroll_wraps() {
        let mut map = Tilemap::new("bg", ScanOrder::RowMajor, 1, 1, 4, 1);
        map.update(|i| TileInfo::new(i as u32 + 1, 0));
        map.set_scroll(1, 0);

        let mut bmp = Bitmap::new(4, 1);
        map.draw_opaque(&one_pixel_gfx(), &mut bmp);
        assert_eq!(bmp.pixels(), &[2, 3, 4, 1]);

        map.set_scroll(-1, 0);
        map.draw_opaque(&one_pixel_gfx(), &mut bmp);
        assert_eq!(bmp.pixels(), &[4, 1, 2, 3]);
    }

    #[test]
    fn test_flipped_layer_mirrors_within_extent() {
        let mut map = Tilemap::new("bg", ScanOrder::RowMajor, 1, 1, 4, 1).with_flip_extent(3, 1);
        map.update(|i| TileInfo::new(i as u32 + 1, 0));
        map.set_flip(true);
        let mut bmp = Bitmap::new(3, 1);
        map.draw_opaque(&one_pixel_gfx(), &mut bmp);
        assert_eq!(bmp.pixels(), &[3, 2, 1]);
        assert!(map.is_flipped());
    }

    #[test]
    fn test_transparent_layer() {
        let mut map = Tilemap::new("fg", ScanOrder::RowMajor, 1, 1, 2, 1).with_transparent_pen(0);
        map.update(|i| TileInfo::new(i as u32, 0));
        let mut bmp = Bitmap::new(2, 1);
        bmp.fill(9);
        map.draw(&one_pixel_gfx(), &mut bmp);
        assert_eq!(bmp.pixels(), &[9, 1]);
    }

    #[test]
    fn test_mark_colors() {
        let mut map = Tilemap::new("fg", ScanOrder::RowMajor, 1, 1, 1, 1);
        map.update(|_| TileInfo::new(3, 2));
        let mut palette = Palette::new(crate::video::palette::PaletteFormat::Xbgr444, 64);
        palette.clear_used();
        map.mark_colors(&one_pixel_gfx(), &mut palette);
        assert!(palette.is_used(32 + 3));
        assert!(!palette.is_used(32));
    }
}
