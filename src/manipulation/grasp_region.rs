//! Grasp-region geometry.
//!
//! Everything here works in engine units and in the manipulator frame:
//!
//! ```text
//!            x (finger width)
//!            ^
//!   left  |  |  |  right       z: approach / depth axis (tool direction)
//!  finger |  o--+--> y         y: closing axis; the left finger closes
//!         |     |  |           toward -y, the right one toward +y
//! ```
//!
//! A point is in the grasp region when its depth along z lies inside the jaw
//! window, its lateral offset along x is within the finger half-width, and it
//! lies on the inner side of both fingers.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{bridge::RobotObject, manipulator::Manipulator};
use crate::{
    config::LengthScale,
    core::types::Transform,
    error::{GraspError, Result},
};

/// Which finger of a two-finger gripper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    /// Mirror sign shared by finger DOF values and closing directions.
    pub fn sign(self) -> f32 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

/// Thresholds of the region test, in model units (multiplied by the length
/// scale at evaluation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraspRegionParams {
    /// Largest depth in front of the tool origin along the approach axis.
    pub depth_near: f32,
    /// Largest depth behind the tool origin; `None` leaves it open.
    pub depth_far: Option<f32>,
    /// Half extent of the fingers across the closing axis.
    pub half_width: f32,
    /// Padding added to the depth and width bounds.
    pub tolerance: f32,
    /// How far outside a finger's inner plane a point may sit.
    pub inner_slack: f32,
}

impl GraspRegionParams {
    /// Window for grabbing rigid bodies by their center of mass.
    ///
    /// Only the tip side of the jaw bounds the depth: a center of mass
    /// behind the tool origin (toward the palm) is accepted at any depth.
    pub fn rigid() -> Self {
        Self {
            depth_near: 0.02,
            depth_far: None,
            half_width: 0.01,
            tolerance: 0.02,
            inner_slack: 0.0,
        }
    }

    /// Tighter jaw window with lateral slack, for soft-body nodes.
    pub fn soft() -> Self {
        Self {
            depth_near: 0.0075,
            depth_far: Some(0.01),
            half_width: 0.003,
            tolerance: 0.0,
            inner_slack: 0.005,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let lengths = [
            self.depth_near,
            self.depth_far.unwrap_or(0.0),
            self.half_width,
            self.tolerance,
            self.inner_slack,
        ];
        if lengths.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(GraspError::invalid_config(
                "grasp region lengths must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

impl Default for GraspRegionParams {
    fn default() -> Self {
        Self::rigid()
    }
}

/// Inner reference point and closing direction of one finger, world frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerFrame {
    pub side: Side,
    pub inner_point: Vec3,
    pub closing_direction: Vec3,
}

/// Snapshot of the gripper used by the region test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraspFrame {
    /// Manipulator pose, engine units.
    pub pose: Transform,
    pub fingers: [FingerFrame; 2],
}

impl GraspFrame {
    pub fn finger(&self, side: Side) -> &FingerFrame {
        &self.fingers[side.index()]
    }

    /// `point` in manipulator coordinates.
    pub fn local(&self, point: Vec3) -> Vec3 {
        self.pose.inverse_transform_point(point)
    }

    /// The frame carried rigidly by `motion` (applied in world space).
    pub fn transformed(&self, motion: &Transform) -> GraspFrame {
        GraspFrame {
            pose: motion.combine(&self.pose),
            fingers: self.fingers.map(|finger| FingerFrame {
                side: finger.side,
                inner_point: motion.transform_point(finger.inner_point),
                closing_direction: motion.transform_vector(finger.closing_direction),
            }),
        }
    }

    /// The same frame re-posed so its manipulator pose is `pose`.
    pub fn moved_to(&self, pose: &Transform) -> GraspFrame {
        self.transformed(&pose.combine(&self.pose.inverse()))
    }

    /// Projects `point` onto the plane between the fingers (local y = 0).
    pub fn snap_to_mid_plane(&self, point: Vec3) -> Vec3 {
        let mut local = self.local(point);
        local.y = 0.0;
        self.pose.transform_point(local)
    }
}

/// True when `point` lies on the closing side of `finger`'s inner plane, or
/// at most `slack` (engine units) outside it.
pub fn on_inner_side(finger: &FingerFrame, point: Vec3, slack: f32) -> bool {
    finger.closing_direction.dot(point - finger.inner_point) > -slack
}

/// Four-part region test: depth window, width window, inner side of both
/// fingers. Total over any input.
pub fn in_grasp_region(
    frame: &GraspFrame,
    point: Vec3,
    params: &GraspRegionParams,
    scale: LengthScale,
) -> bool {
    let local = frame.local(point);
    let tolerance = params.tolerance;

    if local.z > scale.length(params.depth_near + tolerance) {
        return false;
    }
    if let Some(far) = params.depth_far {
        if local.z < -scale.length(far + tolerance) {
            return false;
        }
    }
    if local.x.abs() > scale.length(params.half_width + tolerance) {
        return false;
    }

    let slack = scale.length(params.inner_slack);
    frame
        .fingers
        .iter()
        .all(|finger| on_inner_side(finger, point, slack))
}

/// Finger geometry captured once per gripper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GripperGeometry {
    /// Per finger (by [`Side::index`]): the closed-gripper center point in
    /// that finger's link frame, model units.
    pub inner_offsets: [Vec3; 2],
    /// Fixed gripper normal; the closing axis is
    /// `tool_direction x closing_normal`.
    pub closing_normal: Vec3,
}

impl GripperGeometry {
    /// Closes the gripper under a scoped save, records where the tool origin
    /// sits in each finger's frame, then restores the model.
    pub fn capture(robot: &mut RobotObject, manipulator: &Manipulator) -> Result<Self> {
        Self::capture_with_normal(robot, manipulator, -Vec3::X)
    }

    pub fn capture_with_normal(
        robot: &mut RobotObject,
        manipulator: &Manipulator,
        closing_normal: Vec3,
    ) -> Result<Self> {
        let mut save = robot.scoped_save(None);
        let robot = save.robot();
        manipulator.set_gripper_angle(robot, 0.0);

        let center = manipulator.tool.pose(&robot.model).position;
        let mut inner_offsets = [Vec3::ZERO; 2];
        for side in Side::BOTH {
            let link = manipulator.finger_link(side);
            let finger = robot
                .model
                .link_transform(link)
                .ok_or_else(|| GraspError::UnknownLink(format!("finger link {link}")))?;
            inner_offsets[side.index()] = finger.inverse_transform_point(center);
        }

        Ok(Self {
            inner_offsets,
            closing_normal,
        })
    }

    /// Current grasp frame of `manipulator`, engine units.
    pub fn frame(&self, robot: &RobotObject, manipulator: &Manipulator) -> GraspFrame {
        let scale = robot.scale();
        let pose = manipulator.transform(robot);
        let axis = manipulator.tool_direction.cross(self.closing_normal);
        let fingers = Side::BOTH.map(|side| {
            let finger = robot
                .link_transform_engine(manipulator.finger_link(side))
                .unwrap_or_default();
            FingerFrame {
                side,
                inner_point: finger
                    .transform_point(scale.point_to_engine(self.inner_offsets[side.index()])),
                closing_direction: pose.rotation * (axis * side.sign()),
            }
        });
        GraspFrame { pose, fingers }
    }
}
