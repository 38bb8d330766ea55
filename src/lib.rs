//! Tilefall - a scrolling tile world and platformer physics sandbox
//!
//! Core modules:
//! - `geom`: Bounding boxes, per-axis affine transforms, viewport math
//! - `atlas`: Rectangle packing, tileset and sprite atlas builders
//! - `sim`: Tile grid, entities, fixed-step ticker and collision
//! - `renderer`: WebGPU resource cache, tile world and sprite batch pipelines
//! - `platform`: Browser/native clock and input abstraction
//! - `settings`: Persisted configuration and physics tuning

pub mod assets;
pub mod atlas;
pub mod error;
pub mod geom;
pub mod platform;
pub mod renderer;
pub mod settings;
pub mod sim;
pub mod work;

pub use error::{AtlasError, GpuError};
pub use settings::{PhysicsTuning, Settings};

/// Engine constants that are not user-tunable
pub mod consts {
    /// Code reserved for empty space in every tileset
    pub const AIR: u16 = 0;
    /// Name registered for [`AIR`]
    pub const AIR_NAME: &str = "air";

    /// Ticker: maximum ticks run by one catch-up burst
    pub const MAX_CATCH_UP_TICKS: u32 = 10;
    /// Ticker: falling this many ticks behind triggers a hard reset
    pub const HARD_RESET_TICKS: f64 = 5.0;
    /// Ticker: tick durations kept for the average-tick-time query
    pub const TICK_HISTORY_LEN: usize = 5;

    /// Packer: target fraction of the starting shelf width that is filled
    pub const PACK_TARGET_FILL: f64 = 0.95;

    /// Work units (images) rasterized per rendered frame while loading
    pub const RASTER_UNITS_PER_FRAME: usize = 8;
}

/// Smallest power of two that is >= `n` (0 maps to 0)
#[inline]
pub fn next_pow2(n: u32) -> u32 {
    if n == 0 { 0 } else { n.next_power_of_two() }
}
