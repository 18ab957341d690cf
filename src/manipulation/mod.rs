//! Grasping core: bridge between the articulated model and the engine,
//! manipulator control, grasp-region geometry, rigid grabs and soft-body
//! anchoring.

pub mod anchor;
pub mod bridge;
pub mod grab;
pub mod grasp_region;
pub mod gripper_action;
pub mod ik;
pub mod link_mapping;
pub mod manipulator;

pub use anchor::{AnchorAttacher, AttachReport, AttachStrategy};
pub use bridge::{BodyMode, RobotObject, ScopedSave};
pub use grab::{Grab, GrabMonitor, GrabOutcome, PoseSource};
pub use grasp_region::{
    in_grasp_region, on_inner_side, FingerFrame, GraspFrame, GraspRegionParams, GripperGeometry,
    Side,
};
pub use gripper_action::{GripperAction, GripperEvent};
pub use ik::{DampedLeastSquaresIk, IkSolver, ToolFrame};
pub use link_mapping::LinkMapping;
pub use manipulator::{Manipulator, ManipulatorSpec, MoveOutcome};
