//! World state
//!
//! Everything the tick mutates: the tile grid, the entity list and the tick
//! counter. The renderer only ever reads it.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::entity::Entity;
use super::grid::TileGrid;
use crate::settings::PhysicsTuning;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldState {
    pub grid: TileGrid,
    /// Entities in spawn order; the tick visits them in this order
    pub entities: Vec<Entity>,
    pub tuning: PhysicsTuning,
    /// Simulation tick counter
    pub time_ticks: u64,
    /// Index into `entities` of the player-controlled entity
    player: Option<usize>,
}

impl WorldState {
    pub fn new(grid: TileGrid, tuning: PhysicsTuning) -> Self {
        Self {
            grid,
            entities: Vec::new(),
            tuning,
            time_ticks: 0,
            player: None,
        }
    }

    /// Add an entity and return its index
    pub fn spawn(&mut self, entity: Entity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Add the player entity. A second call replaces which entity is controlled.
    pub fn spawn_player(&mut self, feet: Vec2, hitbox: Vec2, sprite: &str) -> usize {
        let index = self.spawn(Entity::new(feet, hitbox.x, hitbox.y, sprite).with_physics());
        self.player = Some(index);
        index
    }

    pub fn player(&self) -> Option<&Entity> {
        self.player.and_then(|i| self.entities.get(i))
    }

    pub fn player_mut(&mut self) -> Option<&mut Entity> {
        self.player.and_then(|i| self.entities.get_mut(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_player() {
        let mut world = WorldState::new(TileGrid::new(4, 4), PhysicsTuning::default());
        assert!(world.player().is_none());

        world.spawn(Entity::new(Vec2::ZERO, 1.0, 1.0, "sign"));
        let index = world.spawn_player(Vec2::new(2.0, 3.0), Vec2::new(0.8, 1.8), "player");
        assert_eq!(index, 1);

        let player = world.player().unwrap();
        assert_eq!(player.position, Vec2::new(2.0, 3.0));
        assert!(player.physics.is_some());
    }
}
