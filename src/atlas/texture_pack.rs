//! Sprite atlas of irregular rectangles, addressed by name

use std::collections::HashMap;

use image::RgbaImage;

use super::Registry;
use super::pack::{PackRect, pack};
use crate::assets::LoadHandle;
use crate::error::AtlasError;
use crate::next_pow2;
use crate::work::{Job, Pending, Progress, run_to_end};

/// Pixel rectangle of a sprite inside the atlas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone)]
pub struct TexturePack {
    locations: HashMap<String, AtlasRect>,
    fill: f32,
    image: RgbaImage,
}

impl TexturePack {
    pub fn location(&self, name: &str) -> Option<AtlasRect> {
        self.locations.get(name).copied()
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Sprite area over atlas area
    pub fn fill(&self) -> f32 {
        self.fill
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct TexturePackBuilder {
    registry: Registry,
}

impl TexturePackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str) -> LoadHandle {
        self.registry.register(name)
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

    /// Pack every loaded image and start rasterizing.
    /// Failed loads get no location.
    pub fn into_job(self) -> Result<(TexturePackJob, Pending<TexturePack>), AtlasError> {
        let (names, images) = self.registry.into_parts()?;

        let mut rects: Vec<PackRect> = images
            .iter()
            .enumerate()
            .filter_map(|(id, img)| img.as_ref().map(|img| PackRect::new(id, img.width(), img.height())))
            .collect();
        let packed = pack(&mut rects);

        let width = next_pow2(packed.w);
        let height = next_pow2(packed.h);
        let covered: u64 = rects.iter().map(|r| r.w as u64 * r.h as u64).sum();
        let fill = if rects.is_empty() {
            0.0
        } else {
            (covered as f64 / (width as u64 * height as u64) as f64) as f32
        };
        log::debug!(
            "packed {} sprites into {}x{} (tight {}x{}, fill {:.3})",
            rects.len(),
            width,
            height,
            packed.w,
            packed.h,
            fill
        );

        let locations = rects
            .iter()
            .map(|r| {
                (
                    names[r.id].clone(),
                    AtlasRect {
                        x: r.x,
                        y: r.y,
                        w: r.w,
                        h: r.h,
                    },
                )
            })
            .collect();

        let output = Pending::new();
        let job = TexturePackJob {
            pack: Some(TexturePack {
                locations,
                fill,
                image: RgbaImage::new(width, height),
            }),
            rects,
            images,
            next: 0,
            output: output.clone(),
        };
        Ok((job, output))
    }

    pub fn build(self) -> Result<TexturePack, AtlasError> {
        let (mut job, output) = self.into_job()?;
        run_to_end(&mut job);
        output.take().ok_or(AtlasError::NotReady { pending: 0 })
    }
}

/// Blits one packed sprite per work unit
pub struct TexturePackJob {
    pack: Option<TexturePack>,
    rects: Vec<PackRect>,
    images: Vec<Option<RgbaImage>>,
    next: usize,
    output: Pending<TexturePack>,
}

impl Job for TexturePackJob {
    fn progress(&self) -> Progress {
        Progress {
            done: self.next,
            total: self.rects.len(),
            finished: self.pack.is_none(),
        }
    }

    fn step(&mut self, budget: usize) -> Progress {
        let total = self.rects.len();
        let Some(pack) = self.pack.as_mut() else {
            return Progress {
                done: total,
                total,
                finished: true,
            };
        };

        let end = self.next.saturating_add(budget).min(total);
        for rect in &self.rects[self.next..end] {
            if let Some(img) = self.images[rect.id].take() {
                image::imageops::replace(&mut pack.image, &img, rect.x as i64, rect.y as i64);
            }
        }
        self.next = end;

        let finished = self.next == total;
        if finished && let Some(done) = self.pack.take() {
            log::info!("texture pack ready: {} sprites", done.len());
            self.output.fulfill(done);
        }
        Progress {
            done: self.next,
            total,
            finished,
        }
    }

    fn label(&self) -> &str {
        "texture pack"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::solid_image;

    #[test]
    fn test_three_squares_atlas() {
        let mut builder = TexturePackBuilder::new();
        for (name, size, shade) in [("big", 16, 1u8), ("mid", 8, 2), ("small", 4, 3)] {
            let h = builder.register(name);
            builder.deliver(h, solid_image(size, size, [shade, 0, 0, 255])).unwrap();
        }
        let tp = builder.build().unwrap();

        assert!(tp.width().is_power_of_two() && tp.height().is_power_of_two());
        assert_eq!((tp.width(), tp.height()), (16, 32));
        let expected = (256.0 + 64.0 + 16.0) / (16.0 * 32.0);
        assert!((tp.fill() - expected).abs() < 1e-6);

        assert_eq!(tp.location("big"), Some(AtlasRect { x: 0, y: 0, w: 16, h: 16 }));
        assert_eq!(tp.location("mid"), Some(AtlasRect { x: 0, y: 16, w: 8, h: 8 }));
        assert_eq!(tp.location("small"), Some(AtlasRect { x: 8, y: 16, w: 4, h: 4 }));

        assert_eq!(tp.image().get_pixel(15, 15).0, [1, 0, 0, 255]);
        assert_eq!(tp.image().get_pixel(8, 16).0, [3, 0, 0, 255]);
        // padding from rounding stays clear
        assert_eq!(tp.image().get_pixel(0, 31).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_failed_load_has_no_location() {
        let mut builder = TexturePackBuilder::new();
        let a = builder.register("hero");
        let b = builder.register("missing");
        builder.deliver(a, solid_image(5, 7, [9, 9, 9, 255])).unwrap();
        builder.fail(b).unwrap();
        let tp = builder.build().unwrap();

        assert_eq!(tp.len(), 1);
        assert_eq!(tp.location("missing"), None);
        assert_eq!((tp.width(), tp.height()), (8, 8));
    }

    #[test]
    fn test_empty_pack() {
        let tp = TexturePackBuilder::new().build().unwrap();
        assert!(tp.is_empty());
        assert_eq!(tp.fill(), 0.0);
    }

    #[test]
    fn test_blocks_until_loaded() {
        let mut builder = TexturePackBuilder::new();
        builder.register("hero");
        assert_eq!(builder.pending(), 1);
        assert!(builder.into_job().is_err());
    }
}
