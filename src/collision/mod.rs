//! Collision detection: uniform-grid broad phase, shape overlap tests and
//! soft-node contact generation.

pub mod broadphase;
pub mod contact;
pub mod narrowphase;

pub use broadphase::{BroadPhase, SpatialGrid};
pub use contact::SoftContact;
pub use narrowphase::NarrowPhase;
