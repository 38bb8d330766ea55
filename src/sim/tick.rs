//! Fixed timestep simulation tick
//!
//! Input is sampled once per tick into a [`TickInput`]; the tick itself is a
//! pure function of the world state and that input.

use super::physics::step_all;
use super::state::WorldState;
use crate::atlas::TileCode;
use crate::platform::KeyQuery;

const LEFT_KEYS: &[&str] = &["ArrowLeft", "KeyA"];
const RIGHT_KEYS: &[&str] = &["ArrowRight", "KeyD"];
const JUMP_KEYS: &[&str] = &["Space", "ArrowUp", "KeyW"];

/// One tile write requested by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileEdit {
    pub x: i32,
    pub y: i32,
    pub code: TileCode,
}

/// Input commands for a single tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickInput {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    /// Pending tile placement/removal from the pointer
    pub edit: Option<TileEdit>,
}

impl TickInput {
    /// Sample held movement keys
    pub fn from_keys(keys: &impl KeyQuery) -> Self {
        Self {
            left: keys.any_down(LEFT_KEYS),
            right: keys.any_down(RIGHT_KEYS),
            jump: keys.any_down(JUMP_KEYS),
            edit: None,
        }
    }
}

/// Advance the world by one fixed timestep
pub fn tick(state: &mut WorldState, input: &TickInput) {
    if let Some(edit) = input.edit
        && !state.grid.set_tile_at(edit.x, edit.y, edit.code)
    {
        log::debug!("ignored edit outside the grid at ({}, {})", edit.x, edit.y);
    }

    let tuning = state.tuning;
    if let Some(player) = state.player_mut() {
        if input.jump {
            player.jump(&tuning);
        }
        // opposing keys cancel
        match (input.left, input.right) {
            (true, false) => player.move_left(&tuning),
            (false, true) => player.move_right(&tuning),
            _ => {}
        }
    }

    step_all(&mut state.entities, &state.grid, &tuning);
    state.time_ticks += 1;
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::platform::KeyState;
    use crate::settings::PhysicsTuning;
    use crate::sim::TileGrid;

    /// 3x3 all-air grid with one solid tile at (1, 2), player above it
    fn pedestal_world() -> WorldState {
        let mut grid = TileGrid::new(3, 3);
        grid.set_tile_at(1, 2, 1);
        let mut world = WorldState::new(grid, PhysicsTuning::default());
        world.spawn_player(Vec2::new(1.5, 4.0), Vec2::new(1.0, 1.0), "player");
        world
    }

    fn player_y(world: &WorldState) -> f32 {
        world.player().map(|p| p.position.y).unwrap_or(f32::NAN)
    }

    #[test]
    fn test_player_settles_on_pedestal() {
        let mut world = pedestal_world();
        let idle = TickInput::default();
        for _ in 0..120 {
            tick(&mut world, &idle);
        }
        let player = world.player().unwrap();
        assert_eq!(player.position.y, 3.0);
        assert!(player.on_ground());
        assert_eq!(world.time_ticks, 120);
    }

    /// 20x5 grid with a solid floor row, player standing on it at x = 2.5
    fn floor_world() -> WorldState {
        let mut grid = TileGrid::new(20, 5);
        grid.fill(0, 0, 20, 1, 1);
        let mut world = WorldState::new(grid, PhysicsTuning::default());
        world.spawn_player(Vec2::new(2.5, 1.0), Vec2::new(0.75, 1.75), "player");
        world
    }

    fn player_x(world: &WorldState) -> f32 {
        world.player().map(|p| p.position.x).unwrap_or(f32::NAN)
    }

    #[test]
    fn test_walking_crosses_floor_seams() {
        let mut world = floor_world();
        let right = TickInput {
            right: true,
            ..Default::default()
        };
        let mut last = player_x(&world);
        for _ in 0..60 {
            tick(&mut world, &right);
            let x = player_x(&world);
            assert!(x > last, "stalled at x = {last}");
            assert_eq!(player_y(&world), 1.0);
            last = x;
        }
        assert!(last > 6.0);
        assert!(world.player().unwrap().on_ground());
    }

    #[test]
    fn test_walking_stops_at_wall() {
        let mut world = floor_world();
        world.grid.fill(8, 1, 9, 5, 1);
        let right = TickInput {
            right: true,
            ..Default::default()
        };
        for _ in 0..200 {
            tick(&mut world, &right);
        }
        let hitbox = world.player().unwrap().hitbox();
        assert!((hitbox.x2() - 8.0).abs() < 1e-4);
        assert_eq!(player_y(&world), 1.0);
    }

    #[test]
    fn test_jump_leaves_and_returns() {
        let mut world = pedestal_world();
        let idle = TickInput::default();
        for _ in 0..60 {
            tick(&mut world, &idle);
        }

        let jump = TickInput {
            jump: true,
            ..Default::default()
        };
        tick(&mut world, &jump);
        assert!(player_y(&world) > 3.0);
        assert!(!world.player().unwrap().on_ground());

        for _ in 0..120 {
            tick(&mut world, &idle);
        }
        assert_eq!(player_y(&world), 3.0);
    }

    #[test]
    fn test_edit_removes_support() {
        let mut world = pedestal_world();
        let idle = TickInput::default();
        for _ in 0..60 {
            tick(&mut world, &idle);
        }
        world.grid.take_dirty();

        let dig = TickInput {
            edit: Some(TileEdit { x: 1, y: 2, code: 0 }),
            ..Default::default()
        };
        tick(&mut world, &dig);
        assert!(world.grid.is_dirty());
        assert!(player_y(&world) < 3.0);
    }

    #[test]
    fn test_edit_outside_grid_is_ignored() {
        let mut world = pedestal_world();
        world.grid.take_dirty();
        let edit = TickInput {
            edit: Some(TileEdit { x: 9, y: 9, code: 1 }),
            ..Default::default()
        };
        tick(&mut world, &edit);
        assert!(!world.grid.is_dirty());
    }

    #[test]
    fn test_opposing_keys_cancel() {
        let mut world = pedestal_world();
        let both = TickInput {
            left: true,
            right: true,
            ..Default::default()
        };
        tick(&mut world, &both);
        assert_eq!(world.player().unwrap().velocity().x, 0.0);
    }

    #[test]
    fn test_input_from_keys() {
        let mut keys = KeyState::new();
        keys.press("KeyA");
        keys.press("Space");
        let input = TickInput::from_keys(&keys);
        assert!(input.left && input.jump && !input.right);
        assert_eq!(input.edit, None);
    }

    #[test]
    fn test_determinism() {
        let mut a = pedestal_world();
        let mut b = pedestal_world();
        let inputs = [
            TickInput {
                right: true,
                ..Default::default()
            },
            TickInput {
                jump: true,
                ..Default::default()
            },
            TickInput {
                left: true,
                ..Default::default()
            },
            TickInput::default(),
        ];
        for _ in 0..10 {
            for input in &inputs {
                tick(&mut a, input);
                tick(&mut b, input);
            }
        }
        assert_eq!(a.time_ticks, b.time_ticks);
        assert_eq!(a.entities, b.entities);
    }
}
