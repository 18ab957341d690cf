//! Simulation-wide configuration.
//!
//! The length scale is carried as an explicit value: the bridge stores the
//! one it was loaded with and every geometric predicate takes it as an
//! argument. Nothing here is global state.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{
    core::types::Transform,
    error::{GraspError, Result},
    manipulation::grasp_region::GraspRegionParams,
};

/// Default gravity vector applied in the engine (Z-up, engine units at scale 1).
pub const DEFAULT_GRAVITY: [f32; 3] = [0.0, 0.0, -9.81];

/// Default integration timestep (in seconds).
pub const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;

/// Position-based iterations per soft-body solve.
pub const DEFAULT_SOFT_SOLVER_ITERATIONS: u32 = 8;

/// Default damping applied to linear velocity.
pub const DEFAULT_LINEAR_DAMPING: f32 = 0.02;

/// Default damping applied to angular velocity.
pub const DEFAULT_ANGULAR_DAMPING: f32 = 0.02;

/// Default cell size for the broad-phase uniform grid (engine units).
pub const DEFAULT_BROADPHASE_CELL_SIZE: f32 = 0.5;

/// Finger DOF value of a fully open gripper.
pub const GRIPPER_OPEN_VALUE: f32 = 0.25;

/// Finger DOF value of a fully closed gripper.
pub const GRIPPER_CLOSED_VALUE: f32 = 0.0;

/// Seconds a full open/close gripper action takes.
pub const DEFAULT_GRIPPER_ACTION_DURATION: f32 = 1.0;

/// Inner-side slack used by contact-based attachment (model units).
pub const DEFAULT_CONTACT_INNER_SLACK: f32 = 0.005;

/// Factor converting kinematic-model lengths (meters) into engine units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LengthScale(pub f32);

impl Default for LengthScale {
    fn default() -> Self {
        Self(1.0)
    }
}

impl LengthScale {
    pub fn new(factor: f32) -> Self {
        Self(factor)
    }

    pub fn factor(self) -> f32 {
        self.0
    }

    /// Model length -> engine length.
    pub fn length(self, model_length: f32) -> f32 {
        model_length * self.0
    }

    pub fn point_to_engine(self, point: Vec3) -> Vec3 {
        point * self.0
    }

    pub fn point_to_model(self, point: Vec3) -> Vec3 {
        point / self.0
    }

    /// Scales the translation of a model-frame pose; rotation is unit-free.
    pub fn to_engine(self, transform: &Transform) -> Transform {
        Transform::from_position_rotation(transform.position * self.0, transform.rotation)
    }

    pub fn to_model(self, transform: &Transform) -> Transform {
        Transform::from_position_rotation(transform.position / self.0, transform.rotation)
    }
}

/// Finger DOF values for the fully open and fully closed gripper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GripperLimits {
    pub open: f32,
    pub closed: f32,
}

impl Default for GripperLimits {
    fn default() -> Self {
        Self {
            open: GRIPPER_OPEN_VALUE,
            closed: GRIPPER_CLOSED_VALUE,
        }
    }
}

/// Tunables for one simulation instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub scale: LengthScale,
    pub time_step: f32,
    pub gravity: Vec3,
    pub soft_solver_iterations: u32,
    pub rigid_grasp: GraspRegionParams,
    pub soft_grasp: GraspRegionParams,
    /// Inner-side slack applied to contact-based attachment (model units).
    pub contact_inner_slack: f32,
    /// Extra anchors region-based attachment may add to neighbours.
    pub max_extra_anchors: usize,
    /// Optional cutoff for the nearest-body grab candidate (engine units).
    pub max_grab_distance: Option<f32>,
    pub gripper: GripperLimits,
    pub gripper_action_duration: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            scale: LengthScale::default(),
            time_step: DEFAULT_TIME_STEP,
            gravity: Vec3::from_array(DEFAULT_GRAVITY),
            soft_solver_iterations: DEFAULT_SOFT_SOLVER_ITERATIONS,
            rigid_grasp: GraspRegionParams::rigid(),
            soft_grasp: GraspRegionParams::soft(),
            contact_inner_slack: DEFAULT_CONTACT_INNER_SLACK,
            max_extra_anchors: 0,
            max_grab_distance: None,
            gripper: GripperLimits::default(),
            gripper_action_duration: DEFAULT_GRIPPER_ACTION_DURATION,
        }
    }
}

impl SimulationConfig {
    pub fn with_scale(mut self, factor: f32) -> Self {
        self.scale = LengthScale::new(factor);
        self.gravity = Vec3::from_array(DEFAULT_GRAVITY) * factor;
        self
    }

    pub fn with_time_step(mut self, time_step: f32) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_max_extra_anchors(mut self, budget: usize) -> Self {
        self.max_extra_anchors = budget;
        self
    }

    pub fn with_max_grab_distance(mut self, distance: Option<f32>) -> Self {
        self.max_grab_distance = distance;
        self
    }

    pub fn with_gripper_action_duration(mut self, seconds: f32) -> Self {
        self.gripper_action_duration = seconds;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.scale.factor() > 0.0 && self.scale.factor().is_finite()) {
            return Err(GraspError::invalid_config("scale must be positive and finite"));
        }
        if self.time_step <= 0.0 {
            return Err(GraspError::invalid_config("time_step must be positive"));
        }
        if self.gripper_action_duration < 0.0 {
            return Err(GraspError::invalid_config(
                "gripper_action_duration must not be negative",
            ));
        }
        if matches!(self.max_grab_distance, Some(d) if d < 0.0) {
            return Err(GraspError::invalid_config(
                "max_grab_distance must not be negative",
            ));
        }
        self.rigid_grasp.validate()?;
        self.soft_grasp.validate()?;
        Ok(())
    }
}
