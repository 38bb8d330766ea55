//! Asset load barrier
//!
//! Every image an atlas needs registers a handle here. The atlas is only
//! rasterized once every handle has settled (loaded or failed).

use image::RgbaImage;

use crate::error::AtlasError;

/// Ticket for one registered load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadHandle(usize);

impl LoadHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Pending,
    Loaded,
    Failed,
}

/// All-or-nothing completion counter
#[derive(Debug, Default)]
pub struct AssetTracker {
    slots: Vec<Slot>,
}

impl AssetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self) -> LoadHandle {
        self.slots.push(Slot::Pending);
        LoadHandle(self.slots.len() - 1)
    }

    /// Mark a load as finished. Settling a handle twice is ignored.
    pub fn complete(&mut self, handle: LoadHandle) -> Result<(), AtlasError> {
        self.settle(handle, Slot::Loaded)
    }

    pub fn fail(&mut self, handle: LoadHandle) -> Result<(), AtlasError> {
        self.settle(handle, Slot::Failed)
    }

    fn settle(&mut self, handle: LoadHandle, to: Slot) -> Result<(), AtlasError> {
        let slot = self
            .slots
            .get_mut(handle.0)
            .ok_or(AtlasError::UnknownHandle)?;
        if *slot == Slot::Pending {
            *slot = to;
        }
        Ok(())
    }

    pub fn registered(&self) -> usize {
        self.slots.len()
    }

    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|s| **s == Slot::Pending).count()
    }

    pub fn failed(&self) -> usize {
        self.slots.iter().filter(|s| **s == Slot::Failed).count()
    }

    pub fn is_done(&self) -> bool {
        self.pending() == 0
    }
}

/// Decode an encoded PNG/JPEG payload into RGBA8
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, AtlasError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| AtlasError::Decode(e.to_string()))
}

/// Relative URL of a tileset image
pub fn tile_path(name: &str) -> String {
    format!("./assets/tiles/{name}.png")
}

/// Relative URL of a sprite texture
pub fn texture_path(name: &str) -> String {
    format!("./assets/textures/{name}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barrier_waits_for_every_handle() {
        let mut tracker = AssetTracker::new();
        let a = tracker.register();
        let b = tracker.register();
        assert!(!tracker.is_done());

        tracker.complete(a).unwrap();
        assert_eq!(tracker.pending(), 1);
        assert!(!tracker.is_done());

        tracker.fail(b).unwrap();
        assert!(tracker.is_done());
        assert_eq!(tracker.failed(), 1);
    }

    #[test]
    fn test_settling_twice_is_ignored() {
        let mut tracker = AssetTracker::new();
        let a = tracker.register();
        tracker.complete(a).unwrap();
        tracker.fail(a).unwrap();
        assert_eq!(tracker.failed(), 0);
    }

    #[test]
    fn test_empty_tracker_is_done() {
        assert!(AssetTracker::new().is_done());
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let mut other = AssetTracker::new();
        other.register();
        let foreign = other.register();
        let mut tracker = AssetTracker::new();
        assert_eq!(tracker.complete(foreign), Err(AtlasError::UnknownHandle));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(decode_image(b"not an image"), Err(AtlasError::Decode(_))));
    }

    #[test]
    fn test_asset_paths() {
        assert_eq!(tile_path("dirt"), "./assets/tiles/dirt.png");
        assert_eq!(texture_path("player"), "./assets/textures/player.png");
    }
}
