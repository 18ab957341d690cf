//! Kinematic-dynamic bridge.
//!
//! A [`RobotObject`] owns an articulated [`Multibody`] (model units) and the
//! engine bodies created for its links (engine units). Poses flow
//! model -> engine through [`RobotObject::sync_to_engine`] and, for bodies the
//! engine is allowed to displace, back through
//! [`RobotObject::sync_from_engine`]. The two sides only refer to each other
//! through the [`LinkMapping`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{
    ik::IkSolver,
    link_mapping::LinkMapping,
    manipulator::{Manipulator, ManipulatorSpec},
};
use crate::{
    config::LengthScale,
    core::{
        articulations::{DofSnapshot, Multibody},
        collider::Collider,
        rigidbody::RigidBody,
        types::{MassProperties, Transform, Velocity},
    },
    error::{GraspError, Result},
    utils::{allocator::EntityId, logging::ScopedTimer},
    world::PhysicsWorld,
};

/// How the engine treats a robot's link bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyMode {
    /// Link poses are written from the model every step.
    #[default]
    Kinematic,
    /// Links are simulated; the model reads their poses back.
    Dynamic,
}

/// An articulated model loaded into the engine.
pub struct RobotObject {
    pub model: Multibody,
    mapping: LinkMapping,
    mode: BodyMode,
    scale: LengthScale,
    colliders: Vec<EntityId>,
    ignored: HashSet<EntityId>,
    manipulators: Vec<Manipulator>,
    /// Held body -> link holding it.
    grabbed: HashMap<EntityId, usize>,
}

impl RobotObject {
    /// Creates one engine body (plus collider) per link with geometry, posed
    /// by forward kinematics and converted with `scale`.
    pub fn load(
        world: &mut PhysicsWorld,
        mut model: Multibody,
        mode: BodyMode,
        scale: LengthScale,
    ) -> Result<Self> {
        model.forward_kinematics();

        let mut pairs = Vec::new();
        let mut colliders = Vec::new();
        for (index, link) in model.links.iter().enumerate() {
            let Some(geometry) = &link.geometry else {
                continue;
            };
            let Some(model_pose) = model.link_transform(index) else {
                continue;
            };
            let pose = scale.to_engine(&model_pose);
            let shape = geometry.shape.scaled(scale.factor());
            let body = match mode {
                BodyMode::Kinematic => RigidBody::kinematic(pose),
                BodyMode::Dynamic => {
                    let mut body = RigidBody::dynamic(pose, geometry.mass);
                    body.set_mass_properties(MassProperties {
                        mass: geometry.mass,
                        inertia: shape.inertia(geometry.mass),
                    });
                    body
                }
            };
            let body_id = world.add_rigidbody(body);
            let collider = Collider::builder(shape)
                .offset(scale.to_engine(&geometry.offset))
                .attach(body_id);
            colliders.push(world.add_collider(collider)?);
            pairs.push((index, body_id));
        }

        let mapping = LinkMapping::from_pairs(pairs)?;
        info!(
            "loaded `{}`: {} links, {} engine bodies, scale {}",
            model.name,
            model.links.len(),
            mapping.len(),
            scale.factor()
        );

        Ok(Self {
            model,
            mapping,
            mode,
            scale,
            colliders,
            ignored: HashSet::new(),
            manipulators: Vec::new(),
            grabbed: HashMap::new(),
        })
    }

    /// Removes every engine body of this robot and hands the model back.
    pub fn unload(self, world: &mut PhysicsWorld) -> Multibody {
        for (_, body) in self.mapping.pairs() {
            world.remove_rigidbody(body);
        }
        info!("unloaded `{}`", self.model.name);
        self.model
    }

    pub fn mode(&self) -> BodyMode {
        self.mode
    }

    pub fn scale(&self) -> LengthScale {
        self.scale
    }

    pub fn mapping(&self) -> &LinkMapping {
        &self.mapping
    }

    pub fn colliders(&self) -> &[EntityId] {
        &self.colliders
    }

    /// Writes forward-kinematics poses into the pose-driven link bodies.
    /// Simulated bodies are left alone.
    pub fn sync_to_engine(&self, world: &mut PhysicsWorld) -> Result<()> {
        let _timer = ScopedTimer::new("bridge::sync_to_engine");
        self.write_poses(world, false)
    }

    /// Writes forward-kinematics poses into every link body, simulated ones
    /// included, and clears their velocities.
    pub fn reset_engine_poses(&self, world: &mut PhysicsWorld) -> Result<()> {
        self.write_poses(world, true)
    }

    /// Writes forward-kinematics poses into the bodies of `links` whatever
    /// their kind. Used for links driven by a command in a simulated robot.
    pub fn write_link_poses(&self, world: &mut PhysicsWorld, links: &[usize]) -> Result<()> {
        for &index in links {
            let Some(body_id) = self.mapping.body(index) else {
                continue;
            };
            let Some(pose) = self.link_transform_engine(index) else {
                continue;
            };
            let body = world
                .body_mut(body_id)
                .ok_or_else(|| GraspError::unknown_body(body_id))?;
            body.transform = pose;
            body.velocity = Velocity::ZERO;
        }
        Ok(())
    }

    fn write_poses(&self, world: &mut PhysicsWorld, include_dynamic: bool) -> Result<()> {
        for (index, link) in self.model.links.iter().enumerate() {
            let body_id = match self.mapping.body(index) {
                Some(body) => body,
                None if link.has_geometry() => {
                    return Err(GraspError::MissingLinkMapping(link.name.clone()))
                }
                None => continue,
            };
            let Some(pose) = self.link_transform_engine(index) else {
                continue;
            };
            let body = world
                .body_mut(body_id)
                .ok_or_else(|| GraspError::unknown_body(body_id))?;
            if include_dynamic || body.kind.is_pose_driven() {
                body.transform = pose;
                body.velocity = Velocity::ZERO;
            }
        }
        Ok(())
    }

    /// Reads simulated link bodies back into joint coordinates. Pose-driven
    /// bodies are not read.
    pub fn sync_from_engine(&mut self, world: &PhysicsWorld) -> Result<()> {
        let mapping = &self.mapping;
        let scale = self.scale;
        let mut stale = None;
        self.model.update_from_link_poses(|link| {
            let body_id = mapping.body(link)?;
            match world.body(body_id) {
                Some(body) if body.kind.is_dynamic() => Some(scale.to_model(&body.transform)),
                Some(_) => None,
                None => {
                    stale.get_or_insert(body_id);
                    None
                }
            }
        });
        match stale {
            Some(body_id) => Err(GraspError::unknown_body(body_id)),
            None => Ok(()),
        }
    }

    /// True when any link collider overlaps an engine collider that does not
    /// belong to this robot, is not ignored and is not held by it.
    pub fn detect_collisions(&self, world: &mut PhysicsWorld) -> bool {
        world.refresh_broadphase();
        let mut ignore: HashSet<EntityId> = self.mapping.bodies().collect();
        ignore.extend(self.ignored.iter().copied());
        ignore.extend(self.grabbed.keys().copied());
        let hit = world.any_overlap(&self.colliders, &ignore);
        if hit {
            debug!("`{}` is in collision", self.model.name);
        }
        hit
    }

    pub fn ignore_collision_with(&mut self, body: EntityId) {
        self.ignored.insert(body);
    }

    pub fn stop_ignoring(&mut self, body: EntityId) -> bool {
        self.ignored.remove(&body)
    }

    pub fn link_index(&self, name: &str) -> Result<usize> {
        self.model
            .link_index(name)
            .ok_or_else(|| GraspError::UnknownLink(name.to_string()))
    }

    /// Engine body of the named link.
    pub fn link_body(&self, name: &str) -> Result<EntityId> {
        let index = self.link_index(name)?;
        self.mapping
            .body(index)
            .ok_or_else(|| GraspError::MissingLinkMapping(name.to_string()))
    }

    /// World pose of link `index` in engine units.
    pub fn link_transform_engine(&self, index: usize) -> Option<Transform> {
        self.model
            .link_transform(index)
            .map(|pose| self.scale.to_engine(&pose))
    }

    /// Resolves `spec` against the model and registers the manipulator under
    /// its name, replacing one with the same name.
    pub fn create_manipulator(
        &mut self,
        spec: &ManipulatorSpec,
        ik: Arc<dyn IkSolver>,
    ) -> Result<Manipulator> {
        let manipulator = Manipulator::resolve(&self.model, spec, ik)?;
        self.manipulators.retain(|m| m.name != manipulator.name);
        self.manipulators.push(manipulator.clone());
        Ok(manipulator)
    }

    pub fn manipulator(&self, name: &str) -> Option<&Manipulator> {
        self.manipulators.iter().find(|m| m.name == name)
    }

    pub fn manipulators(&self) -> &[Manipulator] {
        &self.manipulators
    }

    pub fn record_grab(&mut self, link: usize, body: EntityId) {
        self.grabbed.insert(body, link);
    }

    pub fn clear_grab(&mut self, body: EntityId) -> Option<usize> {
        self.grabbed.remove(&body)
    }

    /// Link currently holding `body`.
    pub fn grabber_of(&self, body: EntityId) -> Option<usize> {
        self.grabbed.get(&body).copied()
    }

    pub fn held_by(&self, link: usize) -> Vec<EntityId> {
        let mut held: Vec<EntityId> = self
            .grabbed
            .iter()
            .filter(|(_, &holder)| holder == link)
            .map(|(&body, _)| body)
            .collect();
        held.sort_unstable();
        held
    }

    /// Snapshots joint values and root pose. Unless disarmed, the returned
    /// guard restores them when dropped and, given a world, writes the
    /// restored pose into every link body.
    pub fn scoped_save<'a>(&'a mut self, world: Option<&'a mut PhysicsWorld>) -> ScopedSave<'a> {
        let snapshot = self.model.snapshot();
        ScopedSave {
            robot: self,
            world,
            snapshot,
            armed: true,
        }
    }
}

/// Restore-on-drop guard returned by [`RobotObject::scoped_save`].
pub struct ScopedSave<'a> {
    robot: &'a mut RobotObject,
    world: Option<&'a mut PhysicsWorld>,
    snapshot: DofSnapshot,
    armed: bool,
}

impl ScopedSave<'_> {
    pub fn robot(&mut self) -> &mut RobotObject {
        &mut *self.robot
    }

    pub fn parts(&mut self) -> (&mut RobotObject, Option<&mut PhysicsWorld>) {
        (&mut *self.robot, self.world.as_deref_mut())
    }

    pub fn snapshot(&self) -> &DofSnapshot {
        &self.snapshot
    }

    /// Keeps the current state when the guard drops.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

impl Drop for ScopedSave<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.robot.model.restore(&self.snapshot);
        if let Some(world) = self.world.as_deref_mut() {
            if let Err(err) = self.robot.reset_engine_poses(world) {
                warn!("restore of `{}` failed to sync: {err}", self.robot.model.name);
            }
        }
    }
}
