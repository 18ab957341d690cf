mod common;

use common::{config, rig_with};
use grasp_bridge::{BodyMode, GripperAction, GripperEvent};

/// Exact in binary, so progress lands on 1.0 without rounding.
const STEP: f32 = 0.25;

fn events(action: &mut GripperAction, rig: &mut common::Rig, steps: usize) -> Vec<GripperEvent> {
    (0..steps)
        .map(|_| action.step(&mut rig.robot, STEP))
        .collect()
}

#[test]
fn new_action_is_idle() {
    let mut rig = rig_with(config(), BodyMode::Kinematic);
    let mut action = GripperAction::new(rig.arm.clone(), &rig.robot, &rig.config);
    assert!(!action.is_running());
    assert_eq!(events(&mut action, &mut rig, 3), vec![GripperEvent::Idle; 3]);
}

#[test]
fn close_reports_start_then_closed_once() {
    let mut rig = rig_with(config().with_gripper_action_duration(1.0), BodyMode::Kinematic);
    rig.open_to(0.25);
    let mut action = GripperAction::new(rig.arm.clone(), &rig.robot, &rig.config);
    action.set_close_action(&rig.robot);
    assert!(action.is_closing());

    use GripperEvent::*;
    assert_eq!(
        events(&mut action, &mut rig, 6),
        vec![Closing, Moving, Moving, Closed, Idle, Idle]
    );
    assert_eq!(rig.arm.finger_values(&rig.robot), [0.0, 0.0]);
}

#[test]
fn fingers_interpolate_linearly_and_mirrored() {
    let mut rig = rig_with(config().with_gripper_action_duration(1.0), BodyMode::Kinematic);
    rig.open_to(0.2);
    let mut action = GripperAction::new(rig.arm.clone(), &rig.robot, &rig.config);
    action.set_close_action(&rig.robot);

    action.step(&mut rig.robot, 2.0 * STEP);
    assert!((action.progress() - 0.5).abs() < 1e-6);
    let [left, right] = rig.arm.finger_values(&rig.robot);
    assert!((left - 0.1).abs() < 1e-6);
    assert!((right + 0.1).abs() < 1e-6);
}

#[test]
fn zero_duration_closes_in_one_step() {
    let mut rig = rig_with(config().with_gripper_action_duration(0.0), BodyMode::Kinematic);
    rig.open_to(0.25);
    let mut action = GripperAction::new(rig.arm.clone(), &rig.robot, &rig.config);
    action.set_close_action(&rig.robot);

    use GripperEvent::*;
    assert_eq!(events(&mut action, &mut rig, 3), vec![Closing, Closed, Idle]);
}

#[test]
fn open_and_toggle_swap_direction() {
    let mut rig = rig_with(config().with_gripper_action_duration(2.0 * STEP), BodyMode::Kinematic);
    let mut action = GripperAction::new(rig.arm.clone(), &rig.robot, &rig.config);

    action.set_open_action(&rig.robot);
    assert!(!action.is_closing());
    use GripperEvent::*;
    assert_eq!(events(&mut action, &mut rig, 3), vec![Opening, Moving, Idle]);
    assert_eq!(rig.arm.finger_values(&rig.robot), [0.25, -0.25]);

    action.toggle(&rig.robot);
    assert!(action.is_closing());
    assert_eq!(events(&mut action, &mut rig, 3), vec![Closing, Closed, Idle]);

    // Replaying a finished close starts from the recorded open values.
    action.reset();
    assert_eq!(action.step(&mut rig.robot, STEP), Closing);
    assert!((rig.arm.gripper_angle(&rig.robot) - 0.125).abs() < 1e-6);
}
