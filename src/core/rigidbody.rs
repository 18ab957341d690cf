use crate::utils::allocator::EntityId;

use super::types::{MassProperties, Transform, Velocity};
use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

/// How the engine treats a body each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BodyKind {
    /// Never moves.
    Static,
    /// Pose is written from outside (bridge, grab target); not integrated.
    Kinematic,
    /// Integrated under gravity and constraints.
    #[default]
    Dynamic,
}

impl BodyKind {
    pub fn is_dynamic(self) -> bool {
        matches!(self, BodyKind::Dynamic)
    }

    /// True for bodies whose pose is driven externally.
    pub fn is_pose_driven(self) -> bool {
        matches!(self, BodyKind::Kinematic | BodyKind::Static)
    }
}

/// Engine-side rigid body.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub id: EntityId,
    pub kind: BodyKind,
    pub transform: Transform,
    pub velocity: Velocity,
    pub acceleration: Vec3,
    pub mass_properties: MassProperties,
    pub gravity_scale: f32,
    pub linear_velocity_damping: f32,
    pub angular_velocity_damping: f32,
    pub inverse_mass: f32,
    pub inverse_inertia: Mat3,
}

impl Default for RigidBody {
    fn default() -> Self {
        let mut body = Self {
            id: EntityId::default(),
            kind: BodyKind::Dynamic,
            transform: Transform::default(),
            velocity: Velocity::default(),
            acceleration: Vec3::ZERO,
            mass_properties: MassProperties::default(),
            gravity_scale: 1.0,
            linear_velocity_damping: crate::config::DEFAULT_LINEAR_DAMPING,
            angular_velocity_damping: crate::config::DEFAULT_ANGULAR_DAMPING,
            inverse_mass: 1.0,
            inverse_inertia: Mat3::IDENTITY,
        };
        body.recompute_inverses();
        body
    }
}

impl RigidBody {
    pub fn new(kind: BodyKind, transform: Transform) -> Self {
        let mut body = Self {
            kind,
            transform,
            ..Self::default()
        };
        body.recompute_inverses();
        body
    }

    pub fn dynamic(transform: Transform, mass: f32) -> Self {
        let mut body = Self::new(BodyKind::Dynamic, transform);
        body.set_mass_properties(MassProperties {
            mass,
            inertia: Mat3::IDENTITY * mass,
        });
        body
    }

    pub fn kinematic(transform: Transform) -> Self {
        Self::new(BodyKind::Kinematic, transform)
    }

    pub fn fixed(transform: Transform) -> Self {
        Self::new(BodyKind::Static, transform)
    }

    /// World-space center of mass. Bodies are authored with the frame origin
    /// at the center of mass.
    pub fn center_of_mass(&self) -> Vec3 {
        self.transform.position
    }

    pub fn set_mass_properties(&mut self, props: MassProperties) {
        self.mass_properties = props;
        self.recompute_inverses();
    }

    fn recompute_inverses(&mut self) {
        if !self.kind.is_dynamic() || self.mass_properties.mass.abs() < f32::EPSILON {
            self.inverse_mass = 0.0;
            self.inverse_inertia = Mat3::ZERO;
            return;
        }
        self.inverse_mass = 1.0 / self.mass_properties.mass;
        let inertia = self.mass_properties.inertia;
        self.inverse_inertia = if inertia.determinant().abs() < f32::EPSILON {
            Mat3::IDENTITY
        } else {
            inertia.inverse()
        };
    }
}
