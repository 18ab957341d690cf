use crate::utils::allocator::EntityId;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::types::Transform;

/// Pose-following constraint: keeps `body` at `target * relative`.
///
/// `relative` is the body pose expressed in the target frame at creation, so
/// the body keeps whatever offset from the gripper it had when grabbed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GrabConstraint {
    pub body: EntityId,
    pub target: Transform,
    pub relative: Transform,
}

impl GrabConstraint {
    pub fn new(body: EntityId, body_pose: &Transform, target: Transform) -> Self {
        Self {
            body,
            target,
            relative: target.inverse().combine(body_pose),
        }
    }

    /// Pose the constrained body must have for the current target.
    pub fn body_pose(&self) -> Transform {
        self.target.combine(&self.relative)
    }
}

/// Point constraint pinning one soft-body node to a rigid body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Anchor {
    pub soft_body: EntityId,
    pub node: usize,
    pub rigid_body: EntityId,
    /// Node position in the rigid body's frame at creation.
    pub local_offset: Vec3,
}

impl Anchor {
    pub fn world_point(&self, rigid_transform: &Transform) -> Vec3 {
        rigid_transform.transform_point(self.local_offset)
    }
}
