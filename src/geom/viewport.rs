//! Camera view over the tile world
//!
//! Three spaces are involved:
//! - tile space: one unit per tile, Y up
//! - clip space: [-1, 1] on both axes, Y up
//! - canvas space: drawable pixels, origin top-left, Y down
//!
//! The visible region of tile space is always `aspect_ratio` wide; the
//! canvas is letterboxed to match.

use glam::Vec2;

use super::bbox::BoundingBox;
use super::transform::ReducedTransform;

pub const CLIP_BOX: BoundingBox = BoundingBox::new(-1.0, -1.0, 2.0, 2.0);

#[derive(Debug, Clone)]
pub struct Viewport {
    view: BoundingBox,
    canvas: BoundingBox,
    drawable: BoundingBox,
    aspect_ratio: f32,
    min_view_height: f32,
    max_view_height: f32,
}

impl Viewport {
    pub fn new(aspect_ratio: f32, view_height: f32, min_view_height: f32, max_view_height: f32) -> Self {
        let view_height = view_height.clamp(min_view_height, max_view_height);
        let view = BoundingBox::new(0.0, 0.0, view_height * aspect_ratio, view_height);
        let canvas = BoundingBox::new(0.0, 0.0, aspect_ratio, 1.0);
        Self {
            view,
            canvas,
            drawable: canvas,
            aspect_ratio,
            min_view_height,
            max_view_height,
        }
    }

    /// Host surface changed size (pixels)
    pub fn resize(&mut self, width: u32, height: u32) {
        self.canvas = BoundingBox::new(0.0, 0.0, width as f32, height as f32);
        self.drawable = self.canvas.resized_to_aspect_ratio(self.aspect_ratio);
    }

    pub fn view(&self) -> &BoundingBox {
        &self.view
    }

    pub fn canvas(&self) -> &BoundingBox {
        &self.canvas
    }

    /// Letterboxed region of the canvas the world is drawn into
    pub fn drawable(&self) -> &BoundingBox {
        &self.drawable
    }

    /// Center the view on a tile-space point
    pub fn follow(&mut self, point: Vec2) {
        self.view.set_center(point);
    }

    /// Zoom about the world point under `pointer` (canvas pixels).
    /// `factor` > 1 shows more of the world.
    pub fn zoom_at_canvas(&mut self, pointer: Vec2, factor: f32) {
        if factor <= 0.0 {
            return;
        }
        let target = (self.view.height * factor).clamp(self.min_view_height, self.max_view_height);
        let factor = target / self.view.height;
        let pivot = self.canvas_to_world().apply(pointer);
        self.view.zoom_on(pivot, factor);
    }

    pub fn world_to_clip(&self) -> ReducedTransform {
        BoundingBox::get_reduced_transform(&self.view, &CLIP_BOX, false, false)
    }

    pub fn clip_to_world(&self) -> ReducedTransform {
        BoundingBox::get_reduced_transform(&CLIP_BOX, &self.view, false, false)
    }

    pub fn world_to_canvas(&self) -> ReducedTransform {
        BoundingBox::get_reduced_transform(&self.view, &self.drawable, false, true)
    }

    pub fn canvas_to_world(&self) -> ReducedTransform {
        BoundingBox::get_reduced_transform(&self.drawable, &self.view, false, true)
    }

    /// Grid cell under a canvas pixel, if the pixel is inside the drawable area
    pub fn pick_tile(&self, pointer: Vec2) -> Option<(i32, i32)> {
        if !self.drawable.contains(pointer) {
            return None;
        }
        let p = self.canvas_to_world().apply(pointer).floor();
        Some((p.x as i32, p.y as i32))
    }

    /// Drawable region as an integer pixel rect `(x, y, w, h)`
    pub fn drawable_pixels(&self) -> (u32, u32, u32, u32) {
        let d = &self.drawable;
        (
            d.x1.max(0.0).round() as u32,
            d.y1.max(0.0).round() as u32,
            d.width.max(1.0).round() as u32,
            d.height.max(1.0).round() as u32,
        )
    }
}
