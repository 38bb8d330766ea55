//! Settings and physics tuning
//!
//! Persisted as JSON in LocalStorage. Missing fields fall back to defaults,
//! so settings saved by an older build still load.

use serde::{Deserialize, Serialize};

/// Physics constants in tiles and ticks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    /// Added to vertical velocity every tick (negative is down)
    pub gravity: f32,
    /// Horizontal velocity multiplier applied on a floor/ceiling contact
    pub ground_friction: f32,
    /// Upward velocity set by a jump
    pub jump_impulse: f32,
    pub ground_accel: f32,
    pub ground_max_speed: f32,
    pub air_accel: f32,
    pub air_max_speed: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            gravity: -0.07,
            ground_friction: 0.74,
            jump_impulse: 0.5,
            ground_accel: 0.04,
            ground_max_speed: 0.2,
            air_accel: 0.015,
            air_max_speed: 0.12,
        }
    }
}

/// User settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Simulation rate
    pub ticks_per_second: f64,
    /// Width / height the drawable area is locked to
    pub aspect_ratio: f32,

    // === View ===
    /// Tiles visible vertically at startup
    pub view_height_tiles: f32,
    /// Zoom factor per wheel notch
    pub zoom_step: f32,
    pub min_view_height: f32,
    pub max_view_height: f32,

    /// Tile edge in atlas pixels
    pub tile_size: u32,

    pub physics: PhysicsTuning,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ticks_per_second: 60.0,
            aspect_ratio: 16.0 / 9.0,

            view_height_tiles: 18.0,
            zoom_step: 1.1,
            min_view_height: 4.0,
            max_view_height: 64.0,

            tile_size: 16,

            physics: PhysicsTuning::default(),
        }
    }
}

impl Settings {
    /// Milliseconds per tick
    pub fn tick_ms(&self) -> f64 {
        1000.0 / self.ticks_per_second.max(1.0)
    }

    /// Clamp out-of-range values loaded from storage
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.ticks_per_second.is_finite() && self.ticks_per_second > 0.0) {
            self.ticks_per_second = defaults.ticks_per_second;
        }
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            self.aspect_ratio = defaults.aspect_ratio;
        }
        if !(self.zoom_step.is_finite() && self.zoom_step > 1.0) {
            self.zoom_step = defaults.zoom_step;
        }
        if !(self.min_view_height > 0.0 && self.min_view_height <= self.max_view_height) {
            self.min_view_height = defaults.min_view_height;
            self.max_view_height = defaults.max_view_height;
        }
        self.view_height_tiles = self
            .view_height_tiles
            .clamp(self.min_view_height, self.max_view_height);
        if self.tile_size == 0 {
            self.tile_size = defaults.tile_size;
        }
        self
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str::<Self>(json).ok().map(Self::sanitized)
    }

    /// LocalStorage key
    const STORAGE_KEY: &'static str = "tilefall_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage
            && let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY)
            && let Some(settings) = Self::from_json(&json)
        {
            log::info!("Loaded settings from LocalStorage");
            return settings;
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage
            && let Ok(json) = serde_json::to_string(self)
        {
            let _ = storage.set_item(Self::STORAGE_KEY, &json);
            log::info!("Settings saved");
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        log::debug!("native build, ignoring {}", Self::STORAGE_KEY);
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}
