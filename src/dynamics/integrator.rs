use glam::{Quat, Vec3};

use crate::{core::rigidbody::RigidBody, utils::allocator::Arena};

/// Semi-implicit Euler integrator for dynamic rigid bodies. Kinematic and
/// static bodies are left where the bridge or a grab put them.
#[derive(Debug, Clone)]
pub struct Integrator {
    pub dt: f32,
    pub substeps: u32,
}

impl Integrator {
    pub fn new(dt: f32, substeps: u32) -> Self {
        let substeps = substeps.max(1);
        Self {
            dt: dt / substeps as f32,
            substeps,
        }
    }

    pub fn integrate_velocity(&self, body: &mut RigidBody, dt: f32) {
        if !body.kind.is_dynamic() {
            return;
        }

        body.velocity.linear += body.acceleration * dt;
        body.velocity.linear *= (1.0 - body.linear_velocity_damping * dt).max(0.0);
        body.velocity.angular *= (1.0 - body.angular_velocity_damping * dt).max(0.0);
    }

    pub fn integrate_position(&self, body: &mut RigidBody, dt: f32) {
        if !body.kind.is_dynamic() {
            return;
        }

        body.transform.position += body.velocity.linear * dt;

        let omega_mag = body.velocity.angular.length();
        if omega_mag > 1e-6 {
            let axis = body.velocity.angular / omega_mag;
            let delta = Quat::from_axis_angle(axis, omega_mag * dt);
            body.transform.rotation = (delta * body.transform.rotation).normalize();
        }
    }

    pub fn step(&self, bodies: &mut Arena<RigidBody>) {
        for _ in 0..self.substeps {
            for (_, body) in bodies.iter_mut() {
                self.integrate_velocity(body, self.dt);
                self.integrate_position(body, self.dt);
            }
        }
        for (_, body) in bodies.iter_mut() {
            body.acceleration = Vec3::ZERO;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Transform;

    #[test]
    fn only_dynamic_bodies_move() {
        let mut bodies = Arena::new();
        let mut falling = RigidBody::dynamic(Transform::default(), 1.0);
        falling.acceleration = Vec3::new(0.0, 0.0, -10.0);
        let dynamic = bodies.insert(falling);
        let mut pinned = RigidBody::kinematic(Transform::default());
        pinned.acceleration = Vec3::new(0.0, 0.0, -10.0);
        let kinematic = bodies.insert(pinned);

        Integrator::new(0.1, 2).step(&mut bodies);

        assert!(bodies.get(dynamic).unwrap().transform.position.z < 0.0);
        assert_eq!(bodies.get(kinematic).unwrap().transform.position, Vec3::ZERO);
    }
}
