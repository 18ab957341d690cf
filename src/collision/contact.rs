use glam::Vec3;

use crate::utils::allocator::EntityId;

/// Contact between one soft-body node and a rigid collider, as produced by
/// the node-versus-shape narrow phase.
#[derive(Debug, Clone, Copy)]
pub struct SoftContact {
    pub soft_body: EntityId,
    pub node: usize,
    pub collider: EntityId,
    pub rigid_body: EntityId,
    /// Node position at query time.
    pub point: Vec3,
    /// Outward normal of the rigid shape.
    pub normal: Vec3,
    /// Signed distance from the rigid surface (negative when penetrating).
    pub distance: f32,
}
