//! Grasp Bridge – robot grasping of rigid and soft bodies.
//!
//! The crate keeps an articulated robot model and its dynamics-engine bodies
//! consistent step by step, decides from gripper geometry which points are
//! graspable, and executes the mechanical side of grasping: pose-following
//! grabs for rigid bodies and node anchors for soft bodies.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod manipulation;
pub mod simulation;
pub mod utils;
pub mod world;

pub use glam::{Mat3, Quat, Vec3};

pub use collision::{broadphase::BroadPhase, contact::SoftContact, narrowphase::NarrowPhase};
pub use config::{GripperLimits, LengthScale, SimulationConfig};
pub use core::{
    articulations::{DofSnapshot, JointType, Link, LinkGeometry, Multibody},
    collider::{Collider, ColliderShape, CollisionFilter},
    constraints::{Anchor, GrabConstraint},
    rigidbody::{BodyKind, RigidBody},
    softbody::{SoftBody, SoftLink, SoftNode},
    types::{MassProperties, Transform, Velocity},
};
pub use dynamics::{integrator::Integrator, soft_solver::SoftBodySolver};
pub use error::{GraspError, Result};
pub use manipulation::{
    in_grasp_region, AnchorAttacher, AttachReport, AttachStrategy, BodyMode,
    DampedLeastSquaresIk, GraspFrame, GraspRegionParams, GrabMonitor, GrabOutcome,
    GripperAction, GripperEvent, GripperGeometry, IkSolver, LinkMapping, Manipulator,
    ManipulatorSpec, MoveOutcome, PoseSource, RobotObject, Side,
};
pub use simulation::{GraspSimulation, GripperController};
pub use utils::allocator::{Arena, EntityId, GenerationalId};
pub use world::PhysicsWorld;
