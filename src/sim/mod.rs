//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only, driven by [`Ticker`]
//! - Stable iteration order (entities in spawn order, tiles in scan order)
//! - No rendering or platform dependencies beyond the [`Clock`](crate::platform::Clock)
//!   and [`KeyQuery`](crate::platform::KeyQuery) traits

pub mod entity;
pub mod grid;
pub mod physics;
pub mod state;
pub mod tick;
pub mod ticker;

pub use entity::{Entity, Physics};
pub use grid::{FULL_BRIGHT, TileGrid};
pub use physics::{step_all, step_entity, tiles_under};
pub use state::WorldState;
pub use tick::{TickInput, TileEdit, tick};
pub use ticker::{TickOutcome, Ticker};
