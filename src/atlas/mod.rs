//! Texture atlases
//!
//! Two flavours share one load-then-freeze lifecycle:
//! - [`Tileset`]: uniform grid cells addressed by integer tile code
//! - [`TexturePack`]: irregular sprites packed with [`pack::pack`], addressed by name
//!
//! Builders collect decoded images behind an [`AssetTracker`] barrier and only
//! rasterize once every registered load has settled.

pub mod pack;
pub mod texture_pack;
pub mod tileset;

pub use pack::{PackRect, PackResult, pack};
pub use texture_pack::{AtlasRect, TexturePack, TexturePackBuilder, TexturePackJob};
pub use tileset::{TileCode, TileKey, Tileset, TilesetBuilder, TilesetJob};

use std::collections::HashMap;

use image::RgbaImage;

use crate::assets::{AssetTracker, LoadHandle};
use crate::error::AtlasError;

/// Named image slots waiting on their loads
#[derive(Debug, Default)]
pub(crate) struct Registry {
    names: Vec<String>,
    index: HashMap<String, LoadHandle>,
    images: Vec<Option<RgbaImage>>,
    tracker: AssetTracker,
}

impl Registry {
    /// Register `name`; registering a name twice returns the first handle
    pub fn register(&mut self, name: &str) -> LoadHandle {
        if let Some(handle) = self.index.get(name) {
            log::warn!("'{name}' registered twice, keeping the first load");
            return *handle;
        }
        let handle = self.tracker.register();
        debug_assert_eq!(handle.index(), self.names.len());
        self.names.push(name.to_string());
        self.images.push(None);
        self.index.insert(name.to_string(), handle);
        handle
    }

    pub fn deliver(&mut self, handle: LoadHandle, image: RgbaImage) -> Result<(), AtlasError> {
        self.tracker.complete(handle)?;
        let slot = self
            .images
            .get_mut(handle.index())
            .ok_or(AtlasError::UnknownHandle)?;
        if slot.is_none() {
            *slot = Some(image);
        }
        Ok(())
    }

    pub fn fail(&mut self, handle: LoadHandle) -> Result<(), AtlasError> {
        self.tracker.fail(handle)?;
        if let Some(name) = self.names.get(handle.index()) {
            log::warn!("image '{name}' failed to load, its atlas slot stays empty");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn pending(&self) -> usize {
        self.tracker.pending()
    }

    pub fn is_ready(&self) -> bool {
        self.tracker.is_done()
    }

    /// Hand over names and images once every load has settled
    pub fn into_parts(self) -> Result<(Vec<String>, Vec<Option<RgbaImage>>), AtlasError> {
        if !self.is_ready() {
            return Err(AtlasError::NotReady {
                pending: self.pending(),
            });
        }
        Ok((self.names, self.images))
    }
}

#[cfg(test)]
pub(crate) fn solid_image(w: u32, h: u32, rgba: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(w, h, image::Rgba(rgba))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_dedupes_names() {
        let mut reg = Registry::default();
        let a = reg.register("stone");
        let b = reg.register("stone");
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_registry_not_ready_until_settled() {
        let mut reg = Registry::default();
        let a = reg.register("stone");
        let b = reg.register("dirt");
        reg.deliver(a, solid_image(2, 2, [1, 2, 3, 255])).unwrap();
        assert!(!reg.is_ready());
        reg.fail(b).unwrap();

        let (names, images) = reg.into_parts().unwrap();
        assert_eq!(names, vec!["stone", "dirt"]);
        assert!(images[0].is_some());
        assert!(images[1].is_none());
    }

    #[test]
    fn test_into_parts_reports_pending() {
        let mut reg = Registry::default();
        reg.register("stone");
        assert_eq!(reg.into_parts().unwrap_err(), AtlasError::NotReady { pending: 1 });
    }
}
