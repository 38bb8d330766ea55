//! Swept AABB collision against the tile grid
//!
//! Per tick, per entity with physics:
//! 1. Apply gravity to the velocity
//! 2. Move the hitbox by the velocity and sweep it over the old hitbox
//! 3. For each solid tile under the swept box (scan order, rows then
//!    columns), intersect it with the moved hitbox and push the entity out
//!    along the axis of least penetration
//!
//! The swept box is computed once. Each tile is tested against the hitbox
//! at the position corrected so far, so a floor tile already resolved
//! vertically only touches the next one along a zero-height seam. A
//! horizontal push only happens against a tile face that is open, i.e.
//! whose neighbour on the approach side is air.

use glam::Vec2;

use super::entity::{Entity, Physics};
use super::grid::TileGrid;
use crate::geom::BoundingBox;
use crate::settings::PhysicsTuning;

/// Sign with zero mapping to zero
#[inline]
fn sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Inclusive tile range whose cell interiors overlap `[lo, hi]`,
/// clamped to `0..len`. `None` when nothing is left after clamping.
fn cell_span(lo: f32, hi: f32, len: u32) -> Option<(i32, i32)> {
    let first = (lo.floor() as i32).max(0);
    let last = ((hi.ceil() as i32) - 1)
        .max(lo.floor() as i32)
        .min(len as i32 - 1);
    (first <= last).then_some((first, last))
}

/// Tiles a swept box can touch, in scan order
pub fn tiles_under(swept: &BoundingBox, grid: &TileGrid) -> impl Iterator<Item = (i32, i32)> {
    let xs = cell_span(swept.x1, swept.x2(), grid.width());
    let ys = cell_span(swept.y1, swept.y2(), grid.height());
    let (x_range, y_range) = match (xs, ys) {
        (Some(xs), Some(ys)) => (xs.0..=xs.1, ys.0..=ys.1),
        #[allow(clippy::reversed_empty_ranges)]
        _ => (1..=0, 1..=0),
    };
    y_range.flat_map(move |y| x_range.clone().map(move |x| (x, y)))
}

/// Whether tile `(x, y)` can stop horizontal motion: the hitbox must come
/// in through the face toward which it is moving and that face must not be
/// buried against a solid neighbour
fn blocks_x(next: &BoundingBox, vx: f32, x: i32, y: i32, grid: &TileGrid) -> bool {
    if vx > 0.0 {
        next.x1 < x as f32 && !grid.is_solid(x - 1, y)
    } else if vx < 0.0 {
        next.x2() > (x + 1) as f32 && !grid.is_solid(x + 1, y)
    } else {
        true
    }
}

/// Advance one entity by one tick
pub fn step_entity(entity: &mut Entity, grid: &TileGrid, tuning: &PhysicsTuning) {
    let Some(mut physics) = entity.physics else {
        return;
    };
    physics.on_ground = false;

    let mut velocity = physics.velocity + Vec2::new(0.0, tuning.gravity);
    let current = entity.hitbox();
    let mut next_position = entity.position + velocity;
    let mut next_hitbox = current.shifted(velocity);
    let swept = current.union(&next_hitbox);
    let size = entity.hitbox_size();

    for (x, y) in tiles_under(&swept, grid) {
        if !grid.is_solid(x, y) {
            continue;
        }
        let Some(overlap) = next_hitbox.intersect_with(&BoundingBox::tile(x, y)) else {
            continue;
        };

        if overlap.width < overlap.height && blocks_x(&next_hitbox, velocity.x, x, y, grid) {
            next_position.x -= sign(velocity.x) * overlap.width;
            velocity.x = 0.0;
        } else {
            next_position.y -= sign(velocity.y) * overlap.height;
            velocity.y = 0.0;
            velocity.x *= tuning.ground_friction;
            physics.on_ground = true;
        }
        next_hitbox = BoundingBox::from_bottom_midpoint(next_position, size);
    }

    entity.position = next_position;
    entity.physics = Some(Physics {
        velocity,
        on_ground: physics.on_ground,
    });
}

/// Advance every movable entity by one tick
pub fn step_all(entities: &mut [Entity], grid: &TileGrid, tuning: &PhysicsTuning) {
    for entity in entities.iter_mut() {
        step_entity(entity, grid, tuning);
    }
}
