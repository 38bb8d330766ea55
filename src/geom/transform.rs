//! Per-axis affine transform between two boxes

use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};

use super::bbox::BoundingBox;

/// `x' = x_m * x + x_b`, `y' = y_m * y + y_b`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReducedTransform {
    pub x_m: f32,
    pub x_b: f32,
    pub y_m: f32,
    pub y_b: f32,
}

impl Default for ReducedTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ReducedTransform {
    pub const IDENTITY: Self = Self {
        x_m: 1.0,
        x_b: 0.0,
        y_m: 1.0,
        y_b: 0.0,
    };

    #[inline]
    pub fn apply(&self, p: Vec2) -> Vec2 {
        Vec2::new(self.x_m * p.x + self.x_b, self.y_m * p.y + self.y_b)
    }

    /// Image of a box. Flipping axes yields a normalized (positive size) box.
    pub fn apply_box(&self, b: &BoundingBox) -> BoundingBox {
        BoundingBox::from_corners(self.apply(b.min()), self.apply(b.max()))
    }

    /// Packed as `(x_m, x_b, y_m, y_b)` for shader uniforms
    pub fn to_vec4(&self) -> Vec4 {
        Vec4::new(self.x_m, self.x_b, self.y_m, self.y_b)
    }

    pub fn to_array(&self) -> [f32; 4] {
        self.to_vec4().to_array()
    }
}
