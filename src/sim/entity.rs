//! World entities
//!
//! One flat record per entity. Movable entities carry a [`Physics`]
//! component; static ones (decorations) leave it empty.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::geom::BoundingBox;
use crate::settings::PhysicsTuning;

/// Velocity state of a movable entity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Physics {
    /// Tiles per tick
    pub velocity: Vec2,
    /// Set by the last tick's collision pass
    pub on_ground: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Feet location in tile space
    pub position: Vec2,
    pub hitbox_width: f32,
    pub hitbox_height: f32,
    /// Sprite name in the texture pack
    pub sprite: String,
    pub physics: Option<Physics>,
}

impl Entity {
    pub fn new(position: Vec2, hitbox_width: f32, hitbox_height: f32, sprite: &str) -> Self {
        Self {
            position,
            hitbox_width,
            hitbox_height,
            sprite: sprite.to_string(),
            physics: None,
        }
    }

    /// Same entity with a resting physics component
    pub fn with_physics(mut self) -> Self {
        self.physics = Some(Physics::default());
        self
    }

    pub fn hitbox_size(&self) -> Vec2 {
        Vec2::new(self.hitbox_width, self.hitbox_height)
    }

    /// Hitbox centered horizontally on the feet, bottom edge at the feet
    pub fn hitbox(&self) -> BoundingBox {
        BoundingBox::from_bottom_midpoint(self.position, self.hitbox_size())
    }

    pub fn velocity(&self) -> Vec2 {
        self.physics.map_or(Vec2::ZERO, |p| p.velocity)
    }

    pub fn on_ground(&self) -> bool {
        self.physics.is_some_and(|p| p.on_ground)
    }

    /// Upward impulse, only from the ground. Returns whether it fired.
    pub fn jump(&mut self, tuning: &PhysicsTuning) -> bool {
        match self.physics.as_mut() {
            Some(p) if p.on_ground => {
                p.velocity.y += tuning.jump_impulse;
                p.on_ground = false;
                true
            }
            _ => false,
        }
    }

    pub fn move_left(&mut self, tuning: &PhysicsTuning) {
        self.nudge(-1.0, tuning);
    }

    pub fn move_right(&mut self, tuning: &PhysicsTuning) {
        self.nudge(1.0, tuning);
    }

    /// Accelerate toward `dir * max_speed` without overshooting it.
    /// Speed already past the cap in that direction is left alone.
    fn nudge(&mut self, dir: f32, tuning: &PhysicsTuning) {
        let Some(p) = self.physics.as_mut() else {
            return;
        };
        let (accel, cap) = if p.on_ground {
            (tuning.ground_accel, tuning.ground_max_speed)
        } else {
            (tuning.air_accel, tuning.air_max_speed)
        };
        let along = p.velocity.x * dir;
        if along < cap {
            p.velocity.x = (along + accel).min(cap) * dir;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Entity {
        Entity::new(Vec2::new(1.5, 4.0), 1.0, 2.0, "player").with_physics()
    }

    #[test]
    fn test_hitbox_from_feet() {
        let e = player();
        let hb = e.hitbox();
        assert_eq!((hb.x1, hb.y1, hb.x2(), hb.y2()), (1.0, 4.0, 2.0, 6.0));
        assert_eq!(hb.bottom_midpoint(), e.position);
    }

    #[test]
    fn test_jump_only_from_ground() {
        let tuning = PhysicsTuning::default();
        let mut e = player();
        assert!(!e.jump(&tuning));
        assert_eq!(e.velocity(), Vec2::ZERO);

        e.physics.as_mut().unwrap().on_ground = true;
        assert!(e.jump(&tuning));
        assert_eq!(e.velocity().y, tuning.jump_impulse);
        // no double jump
        assert!(!e.jump(&tuning));
    }

    #[test]
    fn test_move_is_capped() {
        let tuning = PhysicsTuning::default();
        let mut e = player();
        e.physics.as_mut().unwrap().on_ground = true;
        for _ in 0..100 {
            e.move_right(&tuning);
        }
        assert!((e.velocity().x - tuning.ground_max_speed).abs() < 1e-6);

        for _ in 0..100 {
            e.move_left(&tuning);
        }
        assert!((e.velocity().x + tuning.ground_max_speed).abs() < 1e-6);
    }

    #[test]
    fn test_air_control_is_weaker() {
        let tuning = PhysicsTuning::default();
        let mut ground = player();
        ground.physics.as_mut().unwrap().on_ground = true;
        let mut air = player();

        ground.move_right(&tuning);
        air.move_right(&tuning);
        assert!(air.velocity().x < ground.velocity().x);

        for _ in 0..100 {
            air.move_right(&tuning);
        }
        assert!((air.velocity().x - tuning.air_max_speed).abs() < 1e-6);
    }

    #[test]
    fn test_static_entity_ignores_controls() {
        let tuning = PhysicsTuning::default();
        let mut e = Entity::new(Vec2::ZERO, 1.0, 1.0, "sign");
        e.move_right(&tuning);
        assert!(!e.jump(&tuning));
        assert!(e.physics.is_none());
    }
}
