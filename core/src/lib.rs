//! Ballast core: a 2D impulse-based rigid-body physics simulation.
//!
//! The [`world::World`] owns bodies and constraints and advances them with
//! [`world::World::tick`]. Rendering, input and persistence are external
//! collaborators built on top of the world API.

pub mod body;
pub mod broadphase;
pub mod constraints;
pub mod error;
pub mod events;
pub mod integrate;
pub mod math;
pub mod narrowphase;
pub mod resolve;
pub mod shape;
pub mod sleep;
pub mod world;
