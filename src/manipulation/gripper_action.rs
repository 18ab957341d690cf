use log::debug;

use super::{bridge::RobotObject, grasp_region::Side, manipulator::Manipulator};
use crate::config::{GripperLimits, SimulationConfig};

/// What a gripper action step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GripperEvent {
    Idle,
    Moving,
    /// A close action started this step; the fingers are still open.
    Closing,
    /// Both fingers reached the closed value. Emitted once per close action.
    Closed,
    /// An open action started this step.
    Opening,
}

/// Timed open/close of a two-finger gripper, interpolating the finger DOFs
/// linearly from where they were when the action was set.
#[derive(Debug, Clone)]
pub struct GripperAction {
    manipulator: Manipulator,
    limits: GripperLimits,
    duration: f32,
    elapsed: f32,
    start: [f32; 2],
    end: f32,
    running: bool,
    closed_reported: bool,
    pending: Option<GripperEvent>,
}

const CLOSED_EPSILON: f32 = 1e-6;

impl GripperAction {
    /// Idle action; call [`GripperAction::set_close_action`] or
    /// [`GripperAction::set_open_action`] to start one.
    pub fn new(manipulator: Manipulator, robot: &RobotObject, config: &SimulationConfig) -> Self {
        let start = manipulator.finger_values(robot);
        Self {
            manipulator,
            limits: config.gripper,
            duration: config.gripper_action_duration,
            elapsed: 0.0,
            start,
            end: config.gripper.closed,
            running: false,
            closed_reported: true,
            pending: None,
        }
    }

    pub fn manipulator(&self) -> &Manipulator {
        &self.manipulator
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_closing(&self) -> bool {
        self.end == self.limits.closed
    }

    /// Fraction of the current action already played, in [0, 1].
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).min(1.0)
        }
    }

    fn set_endpoints(&mut self, robot: &RobotObject, end: f32) {
        self.start = self.manipulator.finger_values(robot);
        self.end = end;
        self.elapsed = 0.0;
        self.running = true;
    }

    pub fn set_close_action(&mut self, robot: &RobotObject) {
        self.set_endpoints(robot, self.limits.closed);
        self.closed_reported = false;
        self.pending = Some(GripperEvent::Closing);
    }

    pub fn set_open_action(&mut self, robot: &RobotObject) {
        self.set_endpoints(robot, self.limits.open);
        self.closed_reported = true;
        self.pending = Some(GripperEvent::Opening);
    }

    /// Reverses the current direction.
    pub fn toggle(&mut self, robot: &RobotObject) {
        if self.is_closing() {
            self.set_open_action(robot);
        } else {
            self.set_close_action(robot);
        }
    }

    /// Replays the current action from its start values.
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.running = true;
        if self.is_closing() {
            self.closed_reported = false;
            self.pending = Some(GripperEvent::Closing);
        } else {
            self.pending = Some(GripperEvent::Opening);
        }
    }

    fn fingers_closed(&self, robot: &RobotObject) -> bool {
        let values = self.manipulator.finger_values(robot);
        Side::BOTH.iter().all(|side| {
            (values[side.index()] * side.sign() - self.limits.closed).abs() <= CLOSED_EPSILON
        })
    }

    /// Advances the action by `dt` and writes the finger DOFs. Start events
    /// come first; `Closed` follows on the step the fingers arrive (or the
    /// next one when both happen at once).
    pub fn step(&mut self, robot: &mut RobotObject, dt: f32) -> GripperEvent {
        let moved = self.running;
        if self.running {
            self.elapsed += dt;
            let frac = self.progress();
            let values = Side::BOTH.map(|side| {
                let start = self.start[side.index()];
                (1.0 - frac) * start + frac * self.end * side.sign()
            });
            self.manipulator.set_finger_values(robot, values);
            if frac >= 1.0 {
                self.running = false;
            }
        }

        if let Some(event) = self.pending.take() {
            debug!("{}: gripper {event:?}", self.manipulator.name);
            return event;
        }
        if self.is_closing() && !self.closed_reported && self.fingers_closed(robot) {
            self.closed_reported = true;
            debug!("{}: gripper closed", self.manipulator.name);
            return GripperEvent::Closed;
        }
        if moved {
            GripperEvent::Moving
        } else {
            GripperEvent::Idle
        }
    }
}
