//! Tile grid
//!
//! Row-major `width * height` tile codes plus a per-cell brightness byte.
//! Row 0 is the bottom of the world. Any mutation raises the dirty flag so
//! the renderer re-encodes the world-state texture before its next draw.

use serde::{Deserialize, Serialize};

use crate::atlas::{TileCode, Tileset};
use crate::consts::AIR;

/// Brightness of a fully lit cell
pub const FULL_BRIGHT: u8 = 255;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tiles: Vec<TileCode>,
    light: Vec<u8>,
    #[serde(skip, default = "dirty_on_load")]
    dirty: bool,
}

fn dirty_on_load() -> bool {
    true
}

impl TileGrid {
    /// All-air grid, fully lit
    pub fn new(width: u32, height: u32) -> Self {
        let cells = width as usize * height as usize;
        Self {
            width,
            height,
            tiles: vec![AIR; cells],
            light: vec![FULL_BRIGHT; cells],
            dirty: true,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        self.in_bounds(x, y)
            .then(|| y as usize * self.width as usize + x as usize)
    }

    /// Code at a cell; out-of-bounds cells read as air
    pub fn tile_at(&self, x: i32, y: i32) -> TileCode {
        self.index(x, y).map_or(AIR, |i| self.tiles[i])
    }

    pub fn is_solid(&self, x: i32, y: i32) -> bool {
        self.tile_at(x, y) != AIR
    }

    /// Write a code. Returns false (and changes nothing) outside the grid.
    pub fn set_tile_at(&mut self, x: i32, y: i32, code: TileCode) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        self.tiles[i] = code;
        self.dirty = true;
        true
    }

    pub fn light_at(&self, x: i32, y: i32) -> u8 {
        self.index(x, y).map_or(FULL_BRIGHT, |i| self.light[i])
    }

    pub fn set_light_at(&mut self, x: i32, y: i32, brightness: u8) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        self.light[i] = brightness;
        self.dirty = true;
        true
    }

    /// Fill the rectangle `[x1, x2) x [y1, y2)`, clipped to the grid
    pub fn fill(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, code: TileCode) {
        for y in y1.max(0)..y2.min(self.height as i32) {
            for x in x1.max(0)..x2.min(self.width as i32) {
                self.set_tile_at(x, y, code);
            }
        }
    }

    /// Force a re-upload on the next draw
    pub fn mark_update(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read and clear the dirty flag
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    /// Encode the world-state texture: one RGBA texel per cell holding
    /// `[atlas column, atlas row, brightness, 255]`, rows bottom-up.
    /// Codes the tileset does not know are drawn as air.
    pub fn encode_world_state(&self, tileset: &Tileset) -> Vec<u8> {
        let count = tileset.tile_count();
        let mut texels = Vec::with_capacity(self.tiles.len() * 4);
        for (&code, &light) in self.tiles.iter().zip(&self.light) {
            let code = if (code as usize) < count { code } else { AIR };
            let cell = tileset.tile_cell(code);
            texels.extend_from_slice(&[cell.x as u8, cell.y as u8, light, 255]);
        }
        texels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{TilesetBuilder, solid_image};

    fn tileset(names: &[&str]) -> Tileset {
        let mut builder = TilesetBuilder::new(2);
        for name in names {
            let h = builder.register(name);
            builder.deliver(h, solid_image(2, 2, [1, 1, 1, 255])).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_new_grid_is_air_and_dirty() {
        let grid = TileGrid::new(4, 3);
        assert!(grid.is_dirty());
        for y in 0..3 {
            for x in 0..4 {
                assert_eq!(grid.tile_at(x, y), AIR);
                assert_eq!(grid.light_at(x, y), FULL_BRIGHT);
            }
        }
    }

    #[test]
    fn test_dirty_state_machine() {
        let mut grid = TileGrid::new(2, 2);
        assert!(grid.take_dirty());
        assert!(!grid.is_dirty());

        grid.set_tile_at(1, 1, 3);
        assert!(grid.take_dirty());
        assert!(!grid.take_dirty());

        grid.mark_update();
        assert!(grid.take_dirty());

        grid.set_light_at(0, 0, 10);
        assert!(grid.take_dirty());
    }

    #[test]
    fn test_out_of_bounds_is_ignored() {
        let mut grid = TileGrid::new(2, 2);
        grid.take_dirty();
        assert!(!grid.set_tile_at(-1, 0, 1));
        assert!(!grid.set_tile_at(0, 2, 1));
        assert!(!grid.is_dirty());
        assert_eq!(grid.tile_at(5, 5), AIR);
        assert!(!grid.is_solid(-1, -1));
    }

    #[test]
    fn test_row_major_layout() {
        let mut grid = TileGrid::new(3, 2);
        grid.set_tile_at(2, 1, 1);
        assert_eq!(grid.tiles[5], 1);
        grid.fill(0, 0, 10, 1, 2);
        assert_eq!(&grid.tiles[..3], &[2, 2, 2]);
    }

    #[test]
    fn test_encode_world_state() {
        // 5 tiles + air = 6 cells -> 4x2 atlas grid
        let ts = tileset(&["a", "b", "c", "d", "e"]);
        let mut grid = TileGrid::new(2, 1);
        grid.set_tile_at(0, 0, ts.to_code("e").unwrap());
        grid.set_light_at(1, 0, 40);

        let texels = grid.encode_world_state(&ts);
        // "e" is code 5 -> column 1, row 1
        assert_eq!(&texels[0..4], &[1, 1, FULL_BRIGHT, 255]);
        // air at the origin cell with custom light
        assert_eq!(&texels[4..8], &[0, 0, 40, 255]);
    }

    #[test]
    fn test_unknown_code_encodes_as_air() {
        let ts = tileset(&["a"]);
        let mut grid = TileGrid::new(1, 1);
        grid.set_tile_at(0, 0, 99);
        assert_eq!(grid.encode_world_state(&ts), vec![0, 0, FULL_BRIGHT, 255]);
    }
}
