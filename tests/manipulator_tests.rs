mod common;

use std::sync::Arc;

use approx::assert_relative_eq;
use common::{arm_spec, rig, SCALE};
use grasp_bridge::{
    manipulation::ToolFrame, BodyMode, Collider, ColliderShape, GraspError, IkSolver,
    ManipulatorSpec, MoveOutcome, Multibody, Quat, RigidBody, Side, Transform, Vec3,
};

/// Returns a fixed list of configurations regardless of the target.
struct CannedIk(Vec<Vec<f32>>);

impl IkSolver for CannedIk {
    fn solve_all(&self, _: &Multibody, _: &[usize], _: &ToolFrame, _: &Transform) -> Vec<Vec<f32>> {
        self.0.clone()
    }
}

fn engine_target(x: f32, y: f32, z: f32, yaw: f32) -> Transform {
    Transform::from_position_rotation(Vec3::new(x, y, z), Quat::from_rotation_z(yaw))
}

#[test]
fn unknown_joint_names_fail_resolution() {
    let mut rig = rig(BodyMode::Kinematic);
    let spec = ManipulatorSpec::new("bad", "palm")
        .with_arm_joints(&["slide_x_joint", "elbow_joint"])
        .with_fingers("left_finger_joint", "right_finger_joint");
    let result = rig.robot.create_manipulator(&spec, Arc::new(CannedIk(Vec::new())));
    assert!(result.is_err());
    assert!(rig.robot.manipulator("bad").is_none());
    assert!(rig.robot.manipulator("arm").is_some());
}

#[test]
fn tool_offset_shifts_the_manipulator_frame() {
    let mut rig = rig(BodyMode::Kinematic);
    let spec = arm_spec().with_tool_offset(Transform::from_position(Vec3::new(0.0, 0.0, 0.05)));
    let tipped = rig
        .robot
        .create_manipulator(&spec, Arc::new(CannedIk(Vec::new())))
        .unwrap();
    rig.place(0.1, 0.0, 0.0, 0.0);
    assert_relative_eq!(
        tipped.transform(&rig.robot).position,
        Vec3::new(1.0, 0.0, 0.5),
        epsilon = 1e-5
    );
    // Same name: the registered manipulator was replaced.
    assert_eq!(rig.robot.manipulators().len(), 1);
}

#[test]
fn solve_ik_prefers_solution_nearest_current_configuration() {
    let mut rig = rig(BodyMode::Kinematic);
    let canned = vec![
        vec![0.9, 0.0, 0.0, 0.0],
        vec![0.25, 0.1, 0.0, 0.0],
        vec![-0.5, 0.0, 0.0, 0.0],
    ];
    let arm = rig
        .robot
        .create_manipulator(&arm_spec(), Arc::new(CannedIk(canned.clone())))
        .unwrap();
    arm.set_dof_values(&mut rig.robot, &[0.2, 0.1, 0.0, 0.0]);

    let target = Transform::default();
    assert_eq!(arm.solve_all_ik(&rig.robot, &target).collect::<Vec<_>>(), canned);
    assert_eq!(arm.solve_ik(&rig.robot, &target).unwrap(), canned[1]);
}

#[test]
fn reachable_target_moves_tool_onto_it() {
    let mut rig = rig(BodyMode::Kinematic);
    let target = engine_target(1.5, -2.0, 3.0, 0.6);

    let outcome = rig
        .arm
        .move_by_ik(&mut rig.robot, &mut rig.world, &target, true, true)
        .unwrap();
    assert_eq!(outcome, MoveOutcome::Moved);

    let tool = rig.arm.transform(&rig.robot);
    assert_relative_eq!(tool.position, target.position, epsilon = 2e-3);
    assert!(tool.rotation.abs_diff_eq(target.rotation, 2e-3));

    let palm = rig.robot.link_body("palm").unwrap();
    assert_relative_eq!(
        rig.world.body_transform(palm).unwrap().position,
        rig.robot.model.link_transform(rig.robot.link_index("palm").unwrap()).unwrap().position
            * SCALE,
        epsilon = 1e-4
    );
}

#[test]
fn unreachable_target_changes_nothing() {
    let mut rig = rig(BodyMode::Kinematic);
    rig.place(0.1, 0.2, 0.3, 0.0);
    let before = rig.arm.dof_values(&rig.robot);

    // x = 5 model units, past the slide limit.
    let target = engine_target(50.0, 0.0, 0.0, 0.0);
    assert_eq!(rig.arm.solve_ik(&rig.robot, &target), Err(GraspError::NoSolution));
    let outcome = rig
        .arm
        .move_by_ik(&mut rig.robot, &mut rig.world, &target, true, true)
        .unwrap();
    assert_eq!(outcome, MoveOutcome::NoSolution);
    assert_eq!(rig.arm.dof_values(&rig.robot), before);
}

fn add_obstacle(rig: &mut common::Rig, at: Vec3) {
    let body = rig
        .world
        .add_rigidbody(RigidBody::fixed(Transform::from_position(at)));
    rig.world
        .add_collider(Collider::new(body, ColliderShape::Sphere { radius: 0.05 }))
        .unwrap();
}

#[test]
fn colliding_move_is_reverted_when_asked() {
    let mut rig = rig(BodyMode::Kinematic);
    // Palm box sits 0.3 engine units behind the tool.
    add_obstacle(&mut rig, Vec3::new(2.0, 0.0, -0.3));
    let palm = rig.robot.link_body("palm").unwrap();
    let target = engine_target(2.0, 0.0, 0.0, 0.0);

    let outcome = rig
        .arm
        .move_by_ik(&mut rig.robot, &mut rig.world, &target, true, true)
        .unwrap();
    assert_eq!(outcome, MoveOutcome::CollisionRejected { reverted: true });
    assert!(!outcome.succeeded());
    assert_eq!(rig.arm.dof_values(&rig.robot), vec![0.0; 4]);
    assert_relative_eq!(
        rig.world.body_transform(palm).unwrap().position,
        Vec3::ZERO,
        epsilon = 1e-6
    );
}

#[test]
fn colliding_move_is_kept_without_revert() {
    let mut rig = rig(BodyMode::Kinematic);
    add_obstacle(&mut rig, Vec3::new(2.0, 0.0, -0.3));
    let target = engine_target(2.0, 0.0, 0.0, 0.0);

    let outcome = rig
        .arm
        .move_by_ik(&mut rig.robot, &mut rig.world, &target, true, false)
        .unwrap();
    assert_eq!(outcome, MoveOutcome::CollisionRejected { reverted: false });
    assert_relative_eq!(rig.arm.dof_values(&rig.robot)[0], 0.2, epsilon = 1e-3);
    assert!(rig.robot.detect_collisions(&mut rig.world));
}

#[test]
fn dynamic_robot_is_moved_before_the_collision_test() {
    let mut rig = rig(BodyMode::Dynamic);
    add_obstacle(&mut rig, Vec3::new(2.0, 0.0, -0.3));
    let palm = rig.robot.link_body("palm").unwrap();
    let target = engine_target(2.0, 0.0, 0.0, 0.0);

    let outcome = rig
        .arm
        .move_by_ik(&mut rig.robot, &mut rig.world, &target, true, true)
        .unwrap();
    assert_eq!(outcome, MoveOutcome::CollisionRejected { reverted: true });
    assert_eq!(rig.arm.dof_values(&rig.robot), vec![0.0; 4]);
    assert_relative_eq!(
        rig.world.body_transform(palm).unwrap().position,
        Vec3::ZERO,
        epsilon = 1e-6
    );
}

#[test]
fn dynamic_robot_bodies_follow_a_free_move() {
    let mut rig = rig(BodyMode::Dynamic);
    let palm = rig.robot.link_body("palm").unwrap();
    let target = engine_target(1.0, 0.5, 0.0, 0.0);

    let outcome = rig
        .arm
        .move_by_ik(&mut rig.robot, &mut rig.world, &target, true, true)
        .unwrap();
    assert_eq!(outcome, MoveOutcome::Moved);
    assert_relative_eq!(
        rig.world.body_transform(palm).unwrap().position,
        target.position,
        epsilon = 2e-3
    );
}

#[test]
fn unchecked_move_ignores_obstacles() {
    let mut rig = rig(BodyMode::Kinematic);
    add_obstacle(&mut rig, Vec3::new(2.0, 0.0, -0.3));
    let target = engine_target(2.0, 0.0, 0.0, 0.0);

    let outcome = rig
        .arm
        .move_by_ik(&mut rig.robot, &mut rig.world, &target, false, true)
        .unwrap();
    assert_eq!(outcome, MoveOutcome::Moved);
}

#[test]
fn gripper_angle_mirrors_fingers() {
    let mut rig = rig(BodyMode::Kinematic);
    rig.open_to(0.2);

    assert_eq!(rig.arm.finger_values(&rig.robot), [0.2, -0.2]);
    assert_relative_eq!(rig.arm.gripper_angle(&rig.robot), 0.2);

    let left = rig.robot.link_body("left_finger").unwrap();
    let right = rig.robot.link_body("right_finger").unwrap();
    assert_relative_eq!(rig.world.body_transform(left).unwrap().position.y, 0.2, epsilon = 1e-5);
    assert_relative_eq!(rig.world.body_transform(right).unwrap().position.y, -0.2, epsilon = 1e-5);
    assert_eq!(
        rig.arm.finger_link(Side::Left),
        rig.robot.link_index("left_finger").unwrap()
    );

    // Values past the joint limits are clamped.
    rig.open_to(1.0);
    assert_eq!(rig.arm.finger_values(&rig.robot), [0.3, -0.3]);
}
