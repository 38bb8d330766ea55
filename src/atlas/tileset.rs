//! Fixed-grid tileset
//!
//! Every tile image occupies one `tile_size` square cell. Cells are laid out
//! in raster order by tile code; code 0 is air and its cell stays empty.
//! The grid is the smallest power-of-two cell count that fits every code,
//! split as squarely as possible (width gets the odd exponent).

use std::collections::HashMap;

use glam::UVec2;
use image::RgbaImage;

use super::Registry;
use crate::assets::LoadHandle;
use crate::consts::{AIR, AIR_NAME};
use crate::error::AtlasError;
use crate::work::{Job, Pending, Progress, run_to_end};

pub type TileCode = u16;

/// Highest code a registered tile can take; air holds code 0
const MAX_TILES: usize = TileCode::MAX as usize;

/// Anything that identifies a tile: its name or its code.
/// Resolving a key of the target kind passes it through after a range check.
pub trait TileKey {
    fn resolve_code(&self, tileset: &Tileset) -> Option<TileCode>;
}

impl TileKey for TileCode {
    fn resolve_code(&self, tileset: &Tileset) -> Option<TileCode> {
        ((*self as usize) < tileset.tile_count()).then_some(*self)
    }
}

impl TileKey for &str {
    fn resolve_code(&self, tileset: &Tileset) -> Option<TileCode> {
        tileset.codes.get(*self).copied()
    }
}

impl TileKey for String {
    fn resolve_code(&self, tileset: &Tileset) -> Option<TileCode> {
        self.as_str().resolve_code(tileset)
    }
}

impl TileKey for &String {
    fn resolve_code(&self, tileset: &Tileset) -> Option<TileCode> {
        self.as_str().resolve_code(tileset)
    }
}

/// A built tileset atlas
#[derive(Debug, Clone)]
pub struct Tileset {
    tile_size: u32,
    width_in_tiles: u32,
    height_in_tiles: u32,
    names: Vec<String>,
    codes: HashMap<String, TileCode>,
    image: RgbaImage,
}

impl Tileset {
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn width_in_tiles(&self) -> u32 {
        self.width_in_tiles
    }

    pub fn height_in_tiles(&self) -> u32 {
        self.height_in_tiles
    }

    /// Number of codes in use, air included
    pub fn tile_count(&self) -> usize {
        self.names.len()
    }

    pub fn to_code(&self, key: impl TileKey) -> Option<TileCode> {
        key.resolve_code(self)
    }

    pub fn to_tile(&self, key: impl TileKey) -> Option<&str> {
        let code = key.resolve_code(self)?;
        self.names.get(code as usize).map(String::as_str)
    }

    /// Grid cell `(column, row)` of a code in the atlas
    pub fn tile_cell(&self, code: TileCode) -> UVec2 {
        let code = code as u32;
        UVec2::new(code % self.width_in_tiles, code / self.width_in_tiles)
    }

    /// Pixel offset of a code's cell in the atlas image
    pub fn tile_corner(&self, code: TileCode) -> UVec2 {
        self.tile_cell(code) * self.tile_size
    }

    /// Atlas size in pixels
    pub fn atlas_size(&self) -> UVec2 {
        UVec2::new(self.image.width(), self.image.height())
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Grid dimensions in cells for `cells` slots
pub fn grid_dimensions(cells: usize) -> (u32, u32) {
    let cells = cells.max(1) as u32;
    let exponent = cells.next_power_of_two().trailing_zeros();
    let height_exp = exponent / 2;
    let width_exp = exponent - height_exp;
    (1 << width_exp, 1 << height_exp)
}

/// Collects tile images until every load has settled
#[derive(Debug)]
pub struct TilesetBuilder {
    tile_size: u32,
    registry: Registry,
}

impl TilesetBuilder {
    pub fn new(tile_size: u32) -> Self {
        Self {
            tile_size,
            registry: Registry::default(),
        }
    }

    /// Register a tile by name. Codes are assigned in registration order
    /// starting at 1; the returned handle settles the image load.
    pub fn register(&mut self, name: &str) -> LoadHandle {
        if name == AIR_NAME {
            log::warn!("'{AIR_NAME}' is reserved for code {AIR}");
        }
        let handle = self.registry.register(name);
        if self.registry.len() == MAX_TILES + 1 {
            log::error!("tile '{name}' is past the last tile code {MAX_TILES}; the tileset will not build");
        }
        handle
    }

    pub fn deliver(&mut self, handle: LoadHandle, image: RgbaImage) -> Result<(), AtlasError> {
        self.registry.deliver(handle, image)
    }

    pub fn fail(&mut self, handle: LoadHandle) -> Result<(), AtlasError> {
        self.registry.fail(handle)
    }

    pub fn pending(&self) -> usize {
        self.registry.pending()
    }

    pub fn is_ready(&self) -> bool {
        self.registry.is_ready()
    }

    /// Start rasterizing; fails while loads are still outstanding or when
    /// more tiles are registered than there are codes
    pub fn into_job(self) -> Result<(TilesetJob, Pending<Tileset>), AtlasError> {
        let (registered, images) = self.registry.into_parts()?;
        if registered.len() > MAX_TILES {
            return Err(AtlasError::TooManyTiles {
                count: registered.len(),
                max: MAX_TILES,
            });
        }

        let mut names = Vec::with_capacity(registered.len() + 1);
        names.push(AIR_NAME.to_string());
        names.extend(registered);

        let mut codes = HashMap::with_capacity(names.len());
        for (code, name) in names.iter().enumerate() {
            codes.entry(name.clone()).or_insert(code as TileCode);
        }

        let (width_in_tiles, height_in_tiles) = grid_dimensions(names.len());
        let image = RgbaImage::new(width_in_tiles * self.tile_size, height_in_tiles * self.tile_size);

        let output = Pending::new();
        let job = TilesetJob {
            tileset: Some(Tileset {
                tile_size: self.tile_size,
                width_in_tiles,
                height_in_tiles,
                names,
                codes,
                image,
            }),
            images,
            next: 0,
            output: output.clone(),
        };
        Ok((job, output))
    }

    /// Rasterize synchronously
    pub fn build(self) -> Result<Tileset, AtlasError> {
        let (mut job, output) = self.into_job()?;
        run_to_end(&mut job);
        output.take().ok_or(AtlasError::NotReady { pending: 0 })
    }
}

/// Rasterizes one tile image per work unit
pub struct TilesetJob {
    tileset: Option<Tileset>,
    /// Indexed by code - 1
    images: Vec<Option<RgbaImage>>,
    next: usize,
    output: Pending<Tileset>,
}

impl Job for TilesetJob {
    fn progress(&self) -> Progress {
        Progress {
            done: self.next,
            total: self.images.len(),
            finished: self.tileset.is_none(),
        }
    }

    fn step(&mut self, budget: usize) -> Progress {
        let total = self.images.len();
        let Some(tileset) = self.tileset.as_mut() else {
            return Progress {
                done: total,
                total,
                finished: true,
            };
        };

        let end = self.next.saturating_add(budget).min(total);
        for index in self.next..end {
            let code = (index + 1) as TileCode;
            let Some(img) = self.images[index].take() else {
                continue;
            };
            if img.width() > tileset.tile_size || img.height() > tileset.tile_size {
                log::warn!(
                    "tile '{}' is {}x{}, larger than the {}px tile size; skipped",
                    tileset.names[code as usize],
                    img.width(),
                    img.height(),
                    tileset.tile_size
                );
                continue;
            }
            let corner = tileset.tile_corner(code);
            image::imageops::replace(&mut tileset.image, &img, corner.x as i64, corner.y as i64);
        }
        self.next = end;

        let finished = self.next == total;
        if finished && let Some(done) = self.tileset.take() {
            log::info!(
                "tileset ready: {} tiles in a {}x{} grid",
                done.tile_count(),
                done.width_in_tiles,
                done.height_in_tiles
            );
            self.output.fulfill(done);
        }
        Progress {
            done: self.next,
            total,
            finished,
        }
    }

    fn label(&self) -> &str {
        "tileset"
    }
}
