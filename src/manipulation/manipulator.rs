use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use log::debug;
use serde::{Deserialize, Serialize};

use super::{
    bridge::RobotObject,
    grasp_region::Side,
    ik::{IkSolver, ToolFrame},
};
use crate::{
    core::{articulations::Multibody, types::Transform},
    error::{GraspError, Result},
    utils::math::{argmin_by, joint_space_distance},
    world::PhysicsWorld,
};

/// Names identifying a manipulator inside an articulated model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManipulatorSpec {
    pub name: String,
    /// Joints solved by IK, base to tip.
    pub arm_joints: Vec<String>,
    pub left_finger_joint: String,
    pub right_finger_joint: String,
    pub tool_link: String,
    /// Tool frame in the tool link's frame.
    pub tool_offset: Transform,
    /// Approach axis in the tool frame.
    pub tool_direction: Vec3,
}

impl ManipulatorSpec {
    pub fn new(name: &str, tool_link: &str) -> Self {
        Self {
            name: name.into(),
            arm_joints: Vec::new(),
            left_finger_joint: String::new(),
            right_finger_joint: String::new(),
            tool_link: tool_link.into(),
            tool_offset: Transform::default(),
            tool_direction: Vec3::Z,
        }
    }

    pub fn with_arm_joints(mut self, joints: &[&str]) -> Self {
        self.arm_joints = joints.iter().map(|j| (*j).to_string()).collect();
        self
    }

    pub fn with_fingers(mut self, left: &str, right: &str) -> Self {
        self.left_finger_joint = left.into();
        self.right_finger_joint = right.into();
        self
    }

    pub fn with_tool_offset(mut self, offset: Transform) -> Self {
        self.tool_offset = offset;
        self
    }
}

/// Result of [`Manipulator::move_by_ik`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    NoSolution,
    /// The new pose collided; `reverted` tells whether the previous pose was
    /// restored.
    CollisionRejected { reverted: bool },
}

impl MoveOutcome {
    pub fn succeeded(self) -> bool {
        matches!(self, MoveOutcome::Moved)
    }
}

/// A named sub-chain of a robot's model. Holds DOF and link indices only;
/// the model itself stays with the [`RobotObject`].
#[derive(Clone)]
pub struct Manipulator {
    pub name: String,
    pub arm_dofs: Vec<usize>,
    /// Finger DOFs, indexed by [`Side::index`].
    pub finger_dofs: [usize; 2],
    pub finger_links: [usize; 2],
    pub tool: ToolFrame,
    pub tool_direction: Vec3,
    ik: Arc<dyn IkSolver>,
}

impl fmt::Debug for Manipulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manipulator")
            .field("name", &self.name)
            .field("arm_dofs", &self.arm_dofs)
            .field("finger_dofs", &self.finger_dofs)
            .field("tool", &self.tool)
            .finish_non_exhaustive()
    }
}

impl Manipulator {
    pub(crate) fn resolve(
        model: &Multibody,
        spec: &ManipulatorSpec,
        ik: Arc<dyn IkSolver>,
    ) -> Result<Self> {
        let arm: Vec<&str> = spec.arm_joints.iter().map(String::as_str).collect();
        let arm_dofs = model.dof_indices(&arm)?;
        let fingers = model.dof_indices(&[
            spec.left_finger_joint.as_str(),
            spec.right_finger_joint.as_str(),
        ])?;
        let finger_dofs = [fingers[0], fingers[1]];
        let finger_link = |dof: usize, joint: &str| {
            model
                .dof_link(dof)
                .ok_or_else(|| GraspError::UnknownJoint(joint.to_string()))
        };
        let finger_links = [
            finger_link(finger_dofs[0], &spec.left_finger_joint)?,
            finger_link(finger_dofs[1], &spec.right_finger_joint)?,
        ];
        let tool_link = model
            .link_index(&spec.tool_link)
            .ok_or_else(|| GraspError::UnknownLink(spec.tool_link.clone()))?;

        Ok(Self {
            name: spec.name.clone(),
            arm_dofs,
            finger_dofs,
            finger_links,
            tool: ToolFrame {
                link: tool_link,
                offset: spec.tool_offset,
            },
            tool_direction: spec.tool_direction.normalize_or(Vec3::Z),
            ik,
        })
    }

    /// Tool pose in engine units.
    pub fn transform(&self, robot: &RobotObject) -> Transform {
        robot.scale().to_engine(&self.tool.pose(&robot.model))
    }

    pub fn dof_values(&self, robot: &RobotObject) -> Vec<f32> {
        robot.model.dof_values(&self.arm_dofs)
    }

    pub fn set_dof_values(&self, robot: &mut RobotObject, values: &[f32]) {
        robot.model.set_dof_values(&self.arm_dofs, values);
    }

    /// Every IK solution for an engine-frame `target`, in solver order.
    pub fn solve_all_ik(
        &self,
        robot: &RobotObject,
        target: &Transform,
    ) -> std::vec::IntoIter<Vec<f32>> {
        let model_target = robot.scale().to_model(target);
        self.ik
            .solve_all(&robot.model, &self.arm_dofs, &self.tool, &model_target)
            .into_iter()
    }

    /// The IK solution closest in joint space to the current configuration.
    pub fn solve_ik(&self, robot: &RobotObject, target: &Transform) -> Result<Vec<f32>> {
        let current = self.dof_values(robot);
        let mut solutions: Vec<Vec<f32>> = self.solve_all_ik(robot, target).collect();
        let best = argmin_by(&solutions, |q| joint_space_distance(q, &current))
            .ok_or(GraspError::NoSolution)?;
        Ok(solutions.swap_remove(best))
    }

    /// Solves IK for `target`, applies it and re-syncs the engine. The
    /// tentative pose is written into every link body, simulated ones
    /// included, so the collision test sees the moved robot in either mode.
    ///
    /// With `check_collisions`, a pose that collides is rejected; with
    /// `revert_on_collision` the previous joint values and root pose are
    /// restored (and re-synced) before returning.
    pub fn move_by_ik(
        &self,
        robot: &mut RobotObject,
        world: &mut PhysicsWorld,
        target: &Transform,
        check_collisions: bool,
        revert_on_collision: bool,
    ) -> Result<MoveOutcome> {
        let solution = match self.solve_ik(robot, target) {
            Ok(solution) => solution,
            Err(GraspError::NoSolution) => {
                debug!("{}: no IK solution", self.name);
                return Ok(MoveOutcome::NoSolution);
            }
            Err(err) => return Err(err),
        };

        let mut guard = robot.scoped_save(Some(world));
        if !revert_on_collision {
            guard.disarm();
        }
        let (robot, world) = guard.parts();
        let Some(world) = world else {
            return Err(GraspError::invalid_config("scoped save lost its world"));
        };

        self.set_dof_values(robot, &solution);
        robot.reset_engine_poses(world)?;

        if check_collisions && robot.detect_collisions(world) {
            debug!(
                "{}: move rejected by collision (revert: {revert_on_collision})",
                self.name
            );
            return Ok(MoveOutcome::CollisionRejected {
                reverted: revert_on_collision,
            });
        }

        guard.disarm();
        Ok(MoveOutcome::Moved)
    }

    /// Opening of the gripper, read from the left finger.
    pub fn gripper_angle(&self, robot: &RobotObject) -> f32 {
        let dof = self.finger_dofs[Side::Left.index()];
        robot.model.dof_values(&[dof])[0] * Side::Left.sign()
    }

    /// Sets both fingers to `angle`, mirrored by side.
    pub fn set_gripper_angle(&self, robot: &mut RobotObject, angle: f32) {
        let values = Side::BOTH.map(|side| angle * side.sign());
        robot.model.set_dof_values(&self.finger_dofs, &values);
    }

    pub fn finger_values(&self, robot: &RobotObject) -> [f32; 2] {
        let values = robot.model.dof_values(&self.finger_dofs);
        [values[0], values[1]]
    }

    pub fn set_finger_values(&self, robot: &mut RobotObject, values: [f32; 2]) {
        robot.model.set_dof_values(&self.finger_dofs, &values);
    }

    pub fn finger_link(&self, side: Side) -> usize {
        self.finger_links[side.index()]
    }
}
