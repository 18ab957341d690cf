mod common;

use std::sync::Arc;

use common::{arm_spec, config, gantry_model};
use grasp_bridge::{
    AnchorAttacher, AttachStrategy, BodyMode, DampedLeastSquaresIk, EntityId, GrabMonitor,
    GraspError, GraspSimulation, GripperAction, GripperController, GripperGeometry, RigidBody,
    SoftBody, Transform, Vec3,
};

const DT: f32 = 1.0 / 60.0;

struct Scene {
    sim: GraspSimulation,
    gripper: usize,
    block: EntityId,
    rope: EntityId,
}

/// Open gripper at the origin with a block between the fingers and a rope
/// running through the jaw.
fn scene() -> Scene {
    let config = config().with_gripper_action_duration(0.1);
    let mut sim = GraspSimulation::new(config, gantry_model(), BodyMode::Kinematic).unwrap();
    let arm = sim
        .robot
        .create_manipulator(&arm_spec(), Arc::new(DampedLeastSquaresIk::default()))
        .unwrap();
    arm.set_gripper_angle(&mut sim.robot, 0.25);
    sim.robot.sync_to_engine(&mut sim.world).unwrap();

    let geometry = GripperGeometry::capture(&mut sim.robot, &arm).unwrap();
    let block = sim.world.add_rigidbody(RigidBody::dynamic(
        Transform::from_position(Vec3::new(0.0, 0.0, -1.0)),
        0.2,
    ));
    let soft = SoftBody::rope(
        "rope",
        Vec3::new(-1.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        20,
        1.0,
    );
    let rope = sim.world.add_soft_body(soft).unwrap();

    let mut grab = GrabMonitor::new(arm.clone(), geometry, &sim.config);
    grab.set_grab_bodies(vec![block]);
    let attacher = AnchorAttacher::new(arm.clone(), geometry, &sim.robot, "palm", &sim.config)
        .unwrap();
    let action = GripperAction::new(arm, &sim.robot, &sim.config);
    let controller = GripperController::new(action)
        .with_grab(grab)
        .with_attacher(attacher, AttachStrategy::Region);
    let gripper = sim.add_gripper(controller);

    Scene {
        sim,
        gripper,
        block,
        rope,
    }
}

fn step_until_idle(sim: &mut GraspSimulation, gripper: usize) {
    for _ in 0..30 {
        sim.step(DT).unwrap();
        if !sim.gripper(gripper).unwrap().action.is_running() {
            break;
        }
    }
}

#[test]
fn invalid_config_is_rejected() {
    let config = config().with_time_step(0.0);
    let result = GraspSimulation::new(config, gantry_model(), BodyMode::Kinematic);
    assert!(matches!(result, Err(GraspError::InvalidConfig(_))));
}

#[test]
fn idle_gripper_changes_nothing() {
    let mut scene = scene();
    for _ in 0..10 {
        scene.sim.step(DT).unwrap();
    }
    let gripper = scene.sim.gripper(scene.gripper).unwrap();
    assert!(!gripper.action.is_running());
    assert!(!gripper.grab.as_ref().unwrap().is_holding());
    assert_eq!(scene.sim.world.anchor_count(), 0);
    assert_eq!(scene.sim.world.grab_count(), 0);
}

#[test]
fn closing_grabs_then_anchors_and_opening_releases() {
    let mut scene = scene();
    assert!(scene.sim.close_gripper(scene.gripper));
    assert!(!scene.sim.close_gripper(7));

    // First step: the close action starts and the block is grabbed.
    scene.sim.step(DT).unwrap();
    let gripper = scene.sim.gripper(scene.gripper).unwrap();
    assert_eq!(
        gripper.grab.as_ref().unwrap().held().map(|g| g.body),
        Some(scene.block)
    );
    assert_eq!(scene.sim.world.anchor_count(), 0);

    step_until_idle(&mut scene.sim, scene.gripper);

    let gripper = scene.sim.gripper(scene.gripper).unwrap();
    let arm = gripper.action.manipulator();
    assert_eq!(arm.finger_values(&scene.sim.robot), [0.0, 0.0]);
    assert_eq!(gripper.attacher.as_ref().unwrap().anchor_count(), 1);
    let rope = scene.sim.world.soft_body(scene.rope).unwrap();
    assert!(rope.has_anchor(10));

    assert!(scene.sim.open_gripper(scene.gripper));
    scene.sim.step(DT).unwrap();
    assert_eq!(scene.sim.world.grab_count(), 0);
    assert_eq!(scene.sim.world.anchor_count(), 0);
    assert_eq!(scene.sim.robot.grabber_of(scene.block), None);
}

#[test]
fn reset_grippers_releases_everything() {
    let mut scene = scene();
    let controller = scene.sim.gripper_mut(scene.gripper).unwrap();
    controller.attacher.as_mut().unwrap().set_max_extra_anchors(2);
    scene.sim.close_gripper(scene.gripper);
    for _ in 0..20 {
        scene.sim.step(DT).unwrap();
    }
    assert_eq!(scene.sim.world.grab_count(), 1);
    assert_eq!(scene.sim.world.anchor_count(), 3);

    scene.sim.reset_grippers();
    assert_eq!(scene.sim.world.grab_count(), 0);
    assert_eq!(scene.sim.world.anchor_count(), 0);
}

#[test]
fn held_block_rides_along_with_the_arm() {
    let mut scene = scene();
    scene.sim.close_gripper(scene.gripper);
    scene.sim.step(DT).unwrap();

    let arm = scene.sim.robot.manipulator("arm").unwrap().clone();
    arm.set_dof_values(&mut scene.sim.robot, &[0.0, 0.0, 0.2, 0.0]);
    scene.sim.step(DT).unwrap();

    let block = scene.sim.world.body_transform(scene.block).unwrap();
    assert!((block.position - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-4);
}

#[test]
fn simulated_fingers_follow_the_close_command() {
    let config = config().with_gripper_action_duration(0.1);
    let mut sim = GraspSimulation::new(config, gantry_model(), BodyMode::Dynamic).unwrap();
    let arm = sim
        .robot
        .create_manipulator(&arm_spec(), Arc::new(DampedLeastSquaresIk::default()))
        .unwrap();
    arm.set_gripper_angle(&mut sim.robot, 0.25);
    sim.robot.reset_engine_poses(&mut sim.world).unwrap();

    let left = sim.robot.link_body("left_finger").unwrap();
    assert!((sim.world.body_transform(left).unwrap().position.y - 0.25).abs() < 1e-5);

    let action = GripperAction::new(arm.clone(), &sim.robot, &sim.config);
    let gripper = sim.add_gripper(GripperController::new(action));
    assert!(sim.close_gripper(gripper));
    step_until_idle(&mut sim, gripper);

    let [l, r] = arm.finger_values(&sim.robot);
    assert!(l.abs() < 1e-4 && r.abs() < 1e-4, "fingers at {l}, {r}");
    assert!(sim.world.body_transform(left).unwrap().position.y.abs() < 1e-4);
}
