//! Core types describing kinematic and engine-side entities.

pub mod articulations;
pub mod collider;
pub mod constraints;
pub mod rigidbody;
pub mod softbody;
pub mod types;

pub use articulations::{DofSnapshot, JointType, Link, LinkGeometry, Multibody};
pub use collider::{Collider, ColliderShape, CollisionFilter};
pub use constraints::{Anchor, GrabConstraint};
pub use rigidbody::{BodyKind, RigidBody};
pub use softbody::{SoftBody, SoftLink, SoftNode};
pub use types::{MassProperties, Transform, Velocity};
