use std::collections::HashSet;

use glam::Vec3;
use log::{debug, trace};

use crate::{
    collision::{broadphase::BroadPhase, contact::SoftContact, narrowphase::NarrowPhase},
    config::{
        SimulationConfig, DEFAULT_BROADPHASE_CELL_SIZE, DEFAULT_GRAVITY,
        DEFAULT_SOFT_SOLVER_ITERATIONS, DEFAULT_TIME_STEP,
    },
    core::{
        collider::Collider,
        constraints::{Anchor, GrabConstraint},
        rigidbody::RigidBody,
        softbody::SoftBody,
        types::{Transform, Velocity},
    },
    dynamics::{integrator::Integrator, soft_solver::SoftBodySolver},
    error::{GraspError, Result},
    utils::{
        allocator::{Arena, EntityId},
        logging::ScopedTimer,
    },
};

/// Dynamics-engine side of the simulation: rigid bodies, colliders, soft
/// bodies, pose-following grab constraints and node anchors.
pub struct PhysicsWorld {
    pub bodies: Arena<RigidBody>,
    pub colliders: Arena<Collider>,
    pub soft_bodies: Arena<SoftBody>,
    pub integrator: Integrator,
    pub soft_solver: SoftBodySolver,
    pub gravity: Vec3,
    pub time_accumulated: f32,
    pub time_step: f32,
    grabs: Arena<GrabConstraint>,
    anchors: Arena<Anchor>,
    broadphase: BroadPhase,
}

impl PhysicsWorld {
    pub fn new(time_step: f32) -> Self {
        let ts = if time_step <= 0.0 {
            DEFAULT_TIME_STEP
        } else {
            time_step
        };

        Self {
            bodies: Arena::new(),
            colliders: Arena::new(),
            soft_bodies: Arena::new(),
            integrator: Integrator::new(ts, 2),
            soft_solver: SoftBodySolver::new(DEFAULT_SOFT_SOLVER_ITERATIONS),
            gravity: Vec3::from_array(DEFAULT_GRAVITY),
            time_accumulated: 0.0,
            time_step: ts,
            grabs: Arena::new(),
            anchors: Arena::new(),
            broadphase: BroadPhase::new(DEFAULT_BROADPHASE_CELL_SIZE),
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        let mut world = Self::new(config.time_step);
        world.gravity = config.gravity;
        world.soft_solver = SoftBodySolver::new(config.soft_solver_iterations);
        world.broadphase = BroadPhase::new(config.scale.length(DEFAULT_BROADPHASE_CELL_SIZE));
        world
    }

    // --- rigid bodies -------------------------------------------------------

    pub fn add_rigidbody(&mut self, body: RigidBody) -> EntityId {
        self.bodies.insert_with(|id| RigidBody { id, ..body })
    }

    /// Removes a body together with its colliders, grab constraints and the
    /// anchors that reference it.
    pub fn remove_rigidbody(&mut self, id: EntityId) -> Option<RigidBody> {
        let body = self.bodies.remove(id)?;
        for collider in self.colliders_of(id) {
            self.colliders.remove(collider);
        }
        let grabs: Vec<EntityId> = self
            .grabs
            .iter()
            .filter(|(_, grab)| grab.body == id)
            .map(|(grab_id, _)| grab_id)
            .collect();
        for grab in grabs {
            self.grabs.remove(grab);
        }
        let anchors: Vec<EntityId> = self
            .anchors
            .iter()
            .filter(|(_, anchor)| anchor.rigid_body == id)
            .map(|(anchor_id, _)| anchor_id)
            .collect();
        for anchor in anchors {
            self.remove_anchor(anchor);
        }
        Some(body)
    }

    pub fn body(&self, id: EntityId) -> Option<&RigidBody> {
        self.bodies.get(id)
    }

    pub fn body_mut(&mut self, id: EntityId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(id)
    }

    pub fn body_transform(&self, id: EntityId) -> Option<Transform> {
        self.bodies.get(id).map(|body| body.transform)
    }

    pub fn set_body_transform(&mut self, id: EntityId, transform: Transform) -> Result<()> {
        let body = self
            .bodies
            .get_mut(id)
            .ok_or_else(|| GraspError::unknown_body(id))?;
        body.transform = transform;
        Ok(())
    }

    pub fn add_collider(&mut self, collider: Collider) -> Result<EntityId> {
        if !self.bodies.contains(collider.rigidbody_id) {
            return Err(GraspError::unknown_body(collider.rigidbody_id));
        }
        Ok(self.colliders.insert_with(|id| Collider { id, ..collider }))
    }

    pub fn collider(&self, id: EntityId) -> Option<&Collider> {
        self.colliders.get(id)
    }

    pub fn colliders_of(&self, body: EntityId) -> Vec<EntityId> {
        self.colliders
            .iter()
            .filter(|(_, collider)| collider.rigidbody_id == body)
            .map(|(id, _)| id)
            .collect()
    }

    // --- soft bodies --------------------------------------------------------

    /// Rejects bodies whose links or faces point past their node list.
    pub fn add_soft_body(&mut self, body: SoftBody) -> Result<EntityId> {
        body.validate()?;
        Ok(self.soft_bodies.insert(body))
    }

    pub fn remove_soft_body(&mut self, id: EntityId) -> Option<SoftBody> {
        let anchors: Vec<EntityId> = self
            .anchors
            .iter()
            .filter(|(_, anchor)| anchor.soft_body == id)
            .map(|(anchor_id, _)| anchor_id)
            .collect();
        for anchor in anchors {
            self.anchors.remove(anchor);
        }
        let mut body = self.soft_bodies.remove(id)?;
        for node in &mut body.nodes {
            node.anchor = None;
        }
        Some(body)
    }

    pub fn soft_body(&self, id: EntityId) -> Option<&SoftBody> {
        self.soft_bodies.get(id)
    }

    pub fn soft_body_mut(&mut self, id: EntityId) -> Option<&mut SoftBody> {
        self.soft_bodies.get_mut(id)
    }

    pub fn soft_body_ids(&self) -> Vec<EntityId> {
        self.soft_bodies.ids().collect()
    }

    // --- grab constraints ---------------------------------------------------

    /// Ties `body` to `target`, keeping its current offset from the target.
    pub fn add_grab_constraint(&mut self, body: EntityId, target: Transform) -> Result<EntityId> {
        let rigid = self
            .bodies
            .get_mut(body)
            .ok_or_else(|| GraspError::unknown_body(body))?;
        rigid.velocity = Velocity::ZERO;
        let constraint = GrabConstraint::new(body, &rigid.transform, target);
        Ok(self.grabs.insert(constraint))
    }

    /// Moves the grab target and snaps the held body onto it.
    pub fn set_grab_target(&mut self, grab: EntityId, target: Transform) -> Result<()> {
        let constraint = self
            .grabs
            .get_mut(grab)
            .ok_or_else(|| GraspError::unknown_body(grab))?;
        constraint.target = target;
        let constraint = *constraint;
        Self::enforce_grab(&mut self.bodies, &constraint);
        Ok(())
    }

    pub fn remove_grab_constraint(&mut self, grab: EntityId) -> Option<GrabConstraint> {
        self.grabs.remove(grab)
    }

    pub fn grab_constraint(&self, grab: EntityId) -> Option<&GrabConstraint> {
        self.grabs.get(grab)
    }

    pub fn grab_count(&self) -> usize {
        self.grabs.len()
    }

    fn enforce_grab(bodies: &mut Arena<RigidBody>, constraint: &GrabConstraint) {
        if let Some(body) = bodies.get_mut(constraint.body) {
            body.transform = constraint.body_pose();
            body.velocity = Velocity::ZERO;
            body.acceleration = Vec3::ZERO;
        }
    }

    // --- anchors ------------------------------------------------------------

    /// Pins `node` of `soft_body` to `rigid_body` at the node's current
    /// position.
    pub fn add_anchor(
        &mut self,
        soft_body: EntityId,
        node: usize,
        rigid_body: EntityId,
    ) -> Result<EntityId> {
        let rigid_transform = self
            .body_transform(rigid_body)
            .ok_or_else(|| GraspError::unknown_body(rigid_body))?;
        let soft = self
            .soft_bodies
            .get_mut(soft_body)
            .ok_or_else(|| GraspError::unknown_soft_body(soft_body))?;
        let len = soft.nodes.len();
        let target = soft
            .nodes
            .get_mut(node)
            .ok_or(GraspError::NodeOutOfRange { node, len })?;
        if target.is_anchored() {
            return Err(GraspError::NodeAlreadyAnchored(node));
        }

        let anchor = Anchor {
            soft_body,
            node,
            rigid_body,
            local_offset: rigid_transform.inverse_transform_point(target.position),
        };
        let id = self.anchors.insert(anchor);
        target.anchor = Some(id);
        trace!("anchor {id:?}: node {node} -> body {rigid_body:?}");
        Ok(id)
    }

    /// Removes an anchor and frees its node. `None` when already gone.
    pub fn remove_anchor(&mut self, id: EntityId) -> Option<Anchor> {
        let anchor = self.anchors.remove(id)?;
        if let Some(node) = self
            .soft_bodies
            .get_mut(anchor.soft_body)
            .and_then(|soft| soft.nodes.get_mut(anchor.node))
        {
            if node.anchor == Some(id) {
                node.anchor = None;
            }
        }
        Some(anchor)
    }

    pub fn anchor(&self, id: EntityId) -> Option<&Anchor> {
        self.anchors.get(id)
    }

    pub fn has_anchor(&self, soft_body: EntityId, node: usize) -> bool {
        self.soft_bodies
            .get(soft_body)
            .is_some_and(|soft| soft.has_anchor(node))
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    // --- collision queries --------------------------------------------------

    /// Node-versus-shape contacts between a soft body and one collider.
    /// Anchored nodes and pairs with no movable mass are skipped.
    pub fn soft_contacts(
        &self,
        soft_body: EntityId,
        collider: EntityId,
    ) -> Result<Vec<SoftContact>> {
        let soft = self
            .soft_bodies
            .get(soft_body)
            .ok_or_else(|| GraspError::unknown_soft_body(soft_body))?;
        let shape = self
            .colliders
            .get(collider)
            .ok_or_else(|| GraspError::unknown_body(collider))?;
        let rigid = self
            .bodies
            .get(shape.rigidbody_id)
            .ok_or_else(|| GraspError::unknown_body(shape.rigidbody_id))?;

        let pose = shape.world_transform(&rigid.transform);
        let reach = shape.bounding_radius() + soft.margin;
        let contacts = soft
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| !node.is_anchored())
            .filter(|(_, node)| node.inverse_mass + rigid.inverse_mass > 0.0)
            .filter(|(_, node)| node.position.distance(pose.position) <= reach)
            .filter_map(|(index, node)| {
                let distance = NarrowPhase::signed_distance(&shape.shape, &pose, node.position);
                (distance < soft.margin).then(|| SoftContact {
                    soft_body,
                    node: index,
                    collider,
                    rigid_body: rigid.id,
                    point: node.position,
                    normal: NarrowPhase::surface_normal(&shape.shape, &pose, node.position),
                    distance,
                })
            })
            .collect();
        Ok(contacts)
    }

    /// Recomputes broad-phase bounds from current body poses.
    pub fn refresh_broadphase(&mut self) {
        self.broadphase.refresh(&self.colliders, &self.bodies);
    }

    /// True when any collider in `colliders` overlaps a collider outside the
    /// set whose body is not in `ignore`. Uses the bounds of the last
    /// [`PhysicsWorld::refresh_broadphase`].
    pub fn any_overlap(&self, colliders: &[EntityId], ignore: &HashSet<EntityId>) -> bool {
        let own: HashSet<EntityId> = colliders.iter().copied().collect();
        colliders.iter().any(|&id| {
            let Some(collider) = self.colliders.get(id) else {
                return false;
            };
            let Some(body) = self.bodies.get(collider.rigidbody_id) else {
                return false;
            };
            let pose = collider.world_transform(&body.transform);
            self.broadphase.candidates(id).into_iter().any(|other_id| {
                if own.contains(&other_id) {
                    return false;
                }
                let Some(other) = self.colliders.get(other_id) else {
                    return false;
                };
                if ignore.contains(&other.rigidbody_id)
                    || !collider.collision_filter.matches(&other.collision_filter)
                {
                    return false;
                }
                let Some(other_body) = self.bodies.get(other.rigidbody_id) else {
                    return false;
                };
                let hit = NarrowPhase::overlaps(
                    &collider.shape,
                    &pose,
                    &other.shape,
                    &other.world_transform(&other_body.transform),
                );
                if hit {
                    debug!("collider {id:?} overlaps {other_id:?}");
                }
                hit
            })
        })
    }

    // --- stepping -----------------------------------------------------------

    /// Advances the simulation using a fixed timestep accumulator.
    pub fn step(&mut self, dt: f32) {
        self.time_accumulated += dt;

        while self.time_accumulated >= self.time_step {
            self.time_accumulated -= self.time_step;
            let _timer = ScopedTimer::new("world::step");

            self.apply_gravity();
            self.integrator.step(&mut self.bodies);
            for (_, constraint) in self.grabs.iter() {
                Self::enforce_grab(&mut self.bodies, constraint);
            }

            let bodies = &self.bodies;
            let anchors = &self.anchors;
            for (_, soft) in self.soft_bodies.iter_mut() {
                self.soft_solver
                    .step(soft, self.gravity, self.time_step, |anchor_id| {
                        let anchor = anchors.get(anchor_id)?;
                        let rigid = bodies.get(anchor.rigid_body)?;
                        Some(anchor.world_point(&rigid.transform))
                    });
            }
        }
    }

    fn apply_gravity(&mut self) {
        for (_, body) in self.bodies.iter_mut() {
            if body.kind.is_dynamic() {
                body.acceleration += self.gravity * body.gravity_scale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{collider::ColliderShape, rigidbody::BodyKind};

    #[test]
    fn soft_body_with_dangling_face_is_rejected() {
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let mut body = SoftBody::new("tri", &[Vec3::ZERO, Vec3::X], 1.0);
        body.faces.push([0, 1, 2]);
        assert_eq!(
            world.add_soft_body(body),
            Err(GraspError::NodeOutOfRange { node: 2, len: 2 })
        );
        assert!(world.soft_body_ids().is_empty());
    }

    #[test]
    fn anchors_are_exclusive_per_node() {
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let palm = world.add_rigidbody(RigidBody::kinematic(Transform::default()));
        let rope = world
            .add_soft_body(SoftBody::rope("rope", Vec3::ZERO, Vec3::X, 2, 1.0))
            .unwrap();

        let first = world.add_anchor(rope, 1, palm).unwrap();
        assert!(world.has_anchor(rope, 1));
        assert_eq!(
            world.add_anchor(rope, 1, palm),
            Err(GraspError::NodeAlreadyAnchored(1))
        );
        assert!(matches!(
            world.add_anchor(rope, 9, palm),
            Err(GraspError::NodeOutOfRange { node: 9, len: 3 })
        ));

        assert!(world.remove_anchor(first).is_some());
        assert!(world.remove_anchor(first).is_none());
        assert!(!world.has_anchor(rope, 1));
    }

    #[test]
    fn anchored_node_follows_rigid_body() {
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let palm = world.add_rigidbody(RigidBody::kinematic(Transform::default()));
        let rope = world
            .add_soft_body(SoftBody::rope("rope", Vec3::ZERO, Vec3::X, 2, 1.0))
            .unwrap();
        world.add_anchor(rope, 0, palm).unwrap();

        world
            .set_body_transform(palm, Transform::from_position(Vec3::new(0.0, 0.0, 0.5)))
            .unwrap();
        world.step(1.0 / 60.0);

        let node = world.soft_body(rope).unwrap().nodes[0].position;
        assert!((node - Vec3::new(0.0, 0.0, 0.5)).length() < 1e-5);
    }

    #[test]
    fn grabbed_body_ignores_gravity() {
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let start = Transform::from_position(Vec3::new(0.0, 0.0, 1.0));
        let cube = world.add_rigidbody(RigidBody::dynamic(start, 1.0));
        world.add_grab_constraint(cube, Transform::default()).unwrap();

        for _ in 0..10 {
            world.step(1.0 / 60.0);
        }
        assert!(world.body_transform(cube).unwrap().abs_diff_eq(&start, 1e-6));
        assert_eq!(world.body(cube).unwrap().kind, BodyKind::Dynamic);
    }

    #[test]
    fn contacts_only_report_nodes_within_margin() {
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let finger = world.add_rigidbody(RigidBody::kinematic(Transform::default()));
        let shape = world
            .add_collider(Collider::new(
                finger,
                ColliderShape::Box {
                    half_extents: Vec3::splat(0.1),
                },
            ))
            .unwrap();
        let rope = SoftBody::rope(
            "rope",
            Vec3::new(0.105, -0.2, 0.0),
            Vec3::new(0.105, 0.2, 0.0),
            4,
            1.0,
        )
        .with_margin(0.01);
        let rope = world.add_soft_body(rope).unwrap();

        let contacts = world.soft_contacts(rope, shape).unwrap();
        let nodes: Vec<usize> = contacts.iter().map(|c| c.node).collect();
        assert_eq!(nodes, vec![1, 2, 3]);
        assert!(contacts.iter().all(|c| c.normal.x > 0.9));
    }

    #[test]
    fn removing_either_side_drops_anchors() {
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let palm = world.add_rigidbody(RigidBody::kinematic(Transform::default()));
        let finger = world.add_rigidbody(RigidBody::kinematic(Transform::default()));
        let rope = world
            .add_soft_body(SoftBody::rope("rope", Vec3::ZERO, Vec3::X, 3, 1.0))
            .unwrap();
        let cloth = world
            .add_soft_body(SoftBody::rope("cloth", Vec3::ZERO, Vec3::Y, 1, 1.0))
            .unwrap();
        world.add_anchor(rope, 0, palm).unwrap();
        world.add_anchor(rope, 1, finger).unwrap();
        world.add_anchor(cloth, 0, palm).unwrap();

        world.remove_rigidbody(finger);
        assert_eq!(world.anchor_count(), 2);
        assert!(!world.has_anchor(rope, 1));

        let removed = world.remove_soft_body(rope).unwrap();
        assert_eq!(removed.anchored_count(), 0);
        assert_eq!(world.anchor_count(), 1);
        assert!(world.has_anchor(cloth, 0));
    }
}
