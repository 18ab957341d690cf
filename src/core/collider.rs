use super::types::{InertiaTensorExt, Transform};
use crate::utils::allocator::EntityId;
use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

/// Collision geometry, in the owning body's frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
    /// Capsule along the local Z axis; `half_height` excludes the caps.
    Capsule { radius: f32, half_height: f32 },
}

impl ColliderShape {
    pub fn bounding_radius(&self) -> f32 {
        match self {
            ColliderShape::Sphere { radius } => *radius,
            ColliderShape::Box { half_extents } => half_extents.length(),
            ColliderShape::Capsule {
                radius,
                half_height,
            } => radius + half_height,
        }
    }

    /// Shape with every length multiplied by `factor`.
    pub fn scaled(&self, factor: f32) -> ColliderShape {
        match self {
            ColliderShape::Sphere { radius } => ColliderShape::Sphere {
                radius: radius * factor,
            },
            ColliderShape::Box { half_extents } => ColliderShape::Box {
                half_extents: *half_extents * factor,
            },
            ColliderShape::Capsule {
                radius,
                half_height,
            } => ColliderShape::Capsule {
                radius: radius * factor,
                half_height: half_height * factor,
            },
        }
    }

    pub fn inertia(&self, mass: f32) -> Mat3 {
        match self {
            ColliderShape::Sphere { radius } => Mat3::for_solid_sphere(*radius, mass),
            ColliderShape::Box { half_extents } => Mat3::for_solid_box(*half_extents, mass),
            ColliderShape::Capsule {
                radius,
                half_height,
            } => Mat3::for_solid_box(Vec3::new(*radius, *radius, half_height + radius), mass),
        }
    }
}

/// Simple collision filtering mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub layer: u32,
    pub mask: u32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            layer: 1,
            mask: u32::MAX,
        }
    }
}

impl CollisionFilter {
    pub fn matches(&self, other: &CollisionFilter) -> bool {
        (self.mask & other.layer) != 0 && (other.mask & self.layer) != 0
    }
}

/// Collider component referencing a rigid body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collider {
    pub id: EntityId,
    pub rigidbody_id: EntityId,
    pub shape: ColliderShape,
    pub offset: Transform,
    pub collision_filter: CollisionFilter,
}

impl Collider {
    pub fn new(rigidbody_id: EntityId, shape: ColliderShape) -> Self {
        Self::builder(shape).attach(rigidbody_id)
    }

    pub fn builder(shape: ColliderShape) -> ColliderBuilder {
        ColliderBuilder::new(shape)
    }

    pub fn world_transform(&self, rigidbody_transform: &Transform) -> Transform {
        rigidbody_transform.combine(&self.offset)
    }

    pub fn bounding_radius(&self) -> f32 {
        self.shape.bounding_radius()
    }
}

pub struct ColliderBuilder {
    shape: ColliderShape,
    offset: Transform,
    filter: CollisionFilter,
}

impl ColliderBuilder {
    pub fn new(shape: ColliderShape) -> Self {
        Self {
            shape,
            offset: Transform::default(),
            filter: CollisionFilter::default(),
        }
    }

    pub fn offset(mut self, offset: Transform) -> Self {
        self.offset = offset;
        self
    }

    pub fn filter(mut self, layer: u32, mask: u32) -> Self {
        self.filter = CollisionFilter { layer, mask };
        self
    }

    pub fn attach(self, rigidbody_id: EntityId) -> Collider {
        Collider {
            id: EntityId::default(),
            rigidbody_id,
            shape: self.shape,
            offset: self.offset,
            collision_filter: self.filter,
        }
    }
}
