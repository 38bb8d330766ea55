//! Axis-aligned bounding box
//!
//! Stored as lower corner + size. `x2`/`y2`, center and bottom midpoint are
//! derived. A negative width or height is a flipped box: its `x1` is the
//! visual right edge. Only [`BoundingBox::flipped`] produces such boxes and
//! only the transform derivation consumes them.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::transform::ReducedTransform;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub const fn new(x1: f32, y1: f32, width: f32, height: f32) -> Self {
        Self {
            x1,
            y1,
            width,
            height,
        }
    }

    /// Box spanning two corners given in any order
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    /// Box whose bottom edge is centered on `feet`
    pub fn from_bottom_midpoint(feet: Vec2, size: Vec2) -> Self {
        Self::new(feet.x - size.x / 2.0, feet.y, size.x, size.y)
    }

    /// Unit box of the tile cell at integer grid coordinates
    pub fn tile(x: i32, y: i32) -> Self {
        Self::new(x as f32, y as f32, 1.0, 1.0)
    }

    #[inline]
    pub fn x2(&self) -> f32 {
        self.x1 + self.width
    }

    #[inline]
    pub fn y2(&self) -> f32 {
        self.y1 + self.height
    }

    #[inline]
    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x1, self.y1)
    }

    #[inline]
    pub fn max(&self) -> Vec2 {
        Vec2::new(self.x2(), self.y2())
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x1 + self.width / 2.0, self.y1 + self.height / 2.0)
    }

    pub fn bottom_midpoint(&self) -> Vec2 {
        Vec2::new(self.x1 + self.width / 2.0, self.y1)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width / self.height
    }

    pub fn set_center(&mut self, center: Vec2) {
        self.x1 = center.x - self.width / 2.0;
        self.y1 = center.y - self.height / 2.0;
    }

    pub fn set_bottom_midpoint(&mut self, feet: Vec2) {
        self.x1 = feet.x - self.width / 2.0;
        self.y1 = feet.y;
    }

    pub fn shift(&mut self, by: Vec2) {
        self.x1 += by.x;
        self.y1 += by.y;
    }

    pub fn shifted(mut self, by: Vec2) -> Self {
        self.shift(by);
        self
    }

    /// Scale about `pivot`, which stays at the same relative position.
    /// A factor > 1 grows the box (zooms out when the box is a camera view).
    pub fn zoom_on(&mut self, pivot: Vec2, factor: f32) {
        self.x1 = pivot.x + (self.x1 - pivot.x) * factor;
        self.y1 = pivot.y + (self.y1 - pivot.y) * factor;
        self.width *= factor;
        self.height *= factor;
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x1 && p.x <= self.x2() && p.y >= self.y1 && p.y <= self.y2()
    }

    /// Overlap of two boxes. Boxes that only share an edge or corner yield a
    /// zero-area box; disjoint boxes yield `None`.
    pub fn intersect_with(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());
        if x1 <= x2 && y1 <= y2 {
            Some(BoundingBox::new(x1, y1, x2 - x1, y2 - y1))
        } else {
            None
        }
    }

    /// Smallest box containing both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x1 = self.x1.min(other.x1);
        let y1 = self.y1.min(other.y1);
        let x2 = self.x2().max(other.x2());
        let y2 = self.y2().max(other.y2());
        BoundingBox::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Largest box of aspect `ratio` (width / height) sharing this center
    pub fn resize_to_aspect_ratio(&mut self, ratio: f32) {
        let center = self.center();
        if self.width > self.height * ratio {
            self.width = self.height * ratio;
        } else {
            self.height = self.width / ratio;
        }
        self.set_center(center);
    }

    pub fn resized_to_aspect_ratio(mut self, ratio: f32) -> Self {
        self.resize_to_aspect_ratio(ratio);
        self
    }

    /// Mirror the box's orientation along the chosen axes without moving it:
    /// the start edge becomes the far edge and the size becomes negative.
    pub fn flipped(&self, flip_x: bool, flip_y: bool) -> BoundingBox {
        let mut out = *self;
        if flip_x {
            out.x1 = self.x2();
            out.width = -self.width;
        }
        if flip_y {
            out.y1 = self.y2();
            out.height = -self.height;
        }
        out
    }

    /// Per-axis linear map taking `from` onto `to`, optionally reversing
    /// either axis of the destination.
    pub fn get_reduced_transform(
        from: &BoundingBox,
        to: &BoundingBox,
        flip_x: bool,
        flip_y: bool,
    ) -> ReducedTransform {
        let to = to.flipped(flip_x, flip_y);
        let (x_m, x_b) = axis_map(from.x1, from.width, to.x1, to.width);
        let (y_m, y_b) = axis_map(from.y1, from.height, to.y1, to.height);
        ReducedTransform { x_m, x_b, y_m, y_b }
    }
}

/// Slope and intercept mapping [start, start + len] onto [to_start, to_start + to_len].
/// A degenerate source collapses onto the destination start.
fn axis_map(start: f32, len: f32, to_start: f32, to_len: f32) -> (f32, f32) {
    if len == 0.0 {
        return (0.0, to_start);
    }
    let m = to_len / len;
    (m, to_start - m * start)
}
