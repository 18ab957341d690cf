use glam::Vec3;
use log::{debug, trace};

use super::{
    bridge::RobotObject,
    grasp_region::{in_grasp_region, GraspFrame, GraspRegionParams, GripperGeometry},
    manipulator::Manipulator,
};
use crate::{
    config::SimulationConfig,
    core::types::Transform,
    error::Result,
    utils::{allocator::EntityId, math::argmin_by},
    world::PhysicsWorld,
};

/// Where the held body's target pose comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoseSource {
    Manipulator,
    /// Teleoperated gripper pose, engine units.
    Teleoperated(Transform),
}

/// Result of a [`GrabMonitor::grab`] attempt. Only `Grabbed` changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabOutcome {
    Grabbed(EntityId),
    /// No live candidate (or none within the distance cutoff).
    NoCandidate,
    /// The nearest candidate is outside the grasp region.
    OutOfRegion(EntityId),
    /// Already holding this body; release first.
    AlreadyHolding(EntityId),
}

/// An active grab: the held body and its engine constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grab {
    pub body: EntityId,
    pub constraint: EntityId,
}

/// Grab controller for rigid bodies: idle until a grab succeeds, then holds
/// one body until released.
#[derive(Debug, Clone)]
pub struct GrabMonitor {
    manipulator: Manipulator,
    geometry: GripperGeometry,
    params: GraspRegionParams,
    max_distance: Option<f32>,
    candidates: Vec<EntityId>,
    source: PoseSource,
    held: Option<Grab>,
}

impl GrabMonitor {
    pub fn new(
        manipulator: Manipulator,
        geometry: GripperGeometry,
        config: &SimulationConfig,
    ) -> Self {
        Self {
            manipulator,
            geometry,
            params: config.rigid_grasp,
            max_distance: config.max_grab_distance,
            candidates: Vec::new(),
            source: PoseSource::Manipulator,
            held: None,
        }
    }

    /// Bodies considered by [`GrabMonitor::grab`], scanned in this order.
    pub fn set_grab_bodies(&mut self, bodies: Vec<EntityId>) {
        self.candidates = bodies;
    }

    pub fn grab_bodies(&self) -> &[EntityId] {
        &self.candidates
    }

    pub fn set_tele_pose(&mut self, pose: Transform) {
        self.source = PoseSource::Teleoperated(pose);
    }

    pub fn use_manipulator_pose(&mut self) {
        self.source = PoseSource::Manipulator;
    }

    pub fn pose_source(&self) -> PoseSource {
        self.source
    }

    pub fn held(&self) -> Option<Grab> {
        self.held
    }

    pub fn is_holding(&self) -> bool {
        self.held.is_some()
    }

    pub fn manipulator(&self) -> &Manipulator {
        &self.manipulator
    }

    /// Target pose for the held body, engine units.
    pub fn current_pose(&self, robot: &RobotObject) -> Transform {
        match self.source {
            PoseSource::Manipulator => self.manipulator.transform(robot),
            PoseSource::Teleoperated(pose) => pose,
        }
    }

    /// Gripper frame at the current pose source.
    pub fn grasp_frame(&self, robot: &RobotObject) -> GraspFrame {
        let frame = self.geometry.frame(robot, &self.manipulator);
        match self.source {
            PoseSource::Manipulator => frame,
            PoseSource::Teleoperated(pose) => frame.moved_to(&pose),
        }
    }

    /// Grabs the candidate nearest (by center of mass) to the current pose
    /// if it lies in the grasp region.
    pub fn grab(
        &mut self,
        robot: &mut RobotObject,
        world: &mut PhysicsWorld,
    ) -> Result<GrabOutcome> {
        if let Some(grab) = self.held {
            debug!("{}: grab ignored, holding {:?}", self.manipulator.name, grab.body);
            return Ok(GrabOutcome::AlreadyHolding(grab.body));
        }

        let pose = self.current_pose(robot);
        let live: Vec<(EntityId, Vec3)> = self
            .candidates
            .iter()
            .filter_map(|&id| world.body(id).map(|body| (id, body.center_of_mass())))
            .collect();
        let Some(nearest) = argmin_by(&live, |(_, com)| com.distance(pose.position)) else {
            return Ok(GrabOutcome::NoCandidate);
        };
        let (body, com) = live[nearest];

        if let Some(limit) = self.max_distance {
            if com.distance(pose.position) > limit {
                debug!("{}: nearest body {body:?} beyond {limit}", self.manipulator.name);
                return Ok(GrabOutcome::NoCandidate);
            }
        }
        if !in_grasp_region(&self.grasp_frame(robot), com, &self.params, robot.scale()) {
            debug!("{}: {body:?} not in grasp region", self.manipulator.name);
            return Ok(GrabOutcome::OutOfRegion(body));
        }

        let constraint = world.add_grab_constraint(body, pose)?;
        robot.record_grab(self.manipulator.tool.link, body);
        self.held = Some(Grab { body, constraint });
        debug!("{}: grabbed {body:?}", self.manipulator.name);
        Ok(GrabOutcome::Grabbed(body))
    }

    /// Pushes the current pose source into the grab constraint. No-op when
    /// idle.
    pub fn update_grab_pose(&self, robot: &RobotObject, world: &mut PhysicsWorld) -> Result<()> {
        let Some(grab) = self.held else {
            return Ok(());
        };
        let pose = self.current_pose(robot);
        trace!("{}: grab target {:?}", self.manipulator.name, pose.position);
        world.set_grab_target(grab.constraint, pose)
    }

    /// Drops the held body, which returns to free dynamics at once.
    pub fn release(
        &mut self,
        robot: &mut RobotObject,
        world: &mut PhysicsWorld,
    ) -> Option<EntityId> {
        let grab = self.held.take()?;
        world.remove_grab_constraint(grab.constraint);
        robot.clear_grab(grab.body);
        debug!("{}: released {:?}", self.manipulator.name, grab.body);
        Some(grab.body)
    }
}
