mod common;

use approx::assert_relative_eq;
use common::{rig, Rig, SCALE};
use grasp_bridge::{
    in_grasp_region, BodyMode, GraspRegionParams, GripperGeometry, Quat, Side, Transform, Vec3,
};

fn open_rig(angle: f32) -> (Rig, GripperGeometry) {
    let mut rig = rig(BodyMode::Kinematic);
    rig.open_to(angle);
    let geometry = GripperGeometry::capture(&mut rig.robot, &rig.arm).unwrap();
    (rig, geometry)
}

#[test]
fn capture_restores_fingers_and_records_closed_center() {
    let (rig, geometry) = open_rig(0.25);
    assert_eq!(rig.arm.finger_values(&rig.robot), [0.25, -0.25]);
    for offset in geometry.inner_offsets {
        assert_relative_eq!(offset, Vec3::ZERO, epsilon = 1e-6);
    }
}

#[test]
fn frame_tracks_open_fingers() {
    let (mut rig, geometry) = open_rig(0.25);
    rig.place(0.1, 0.0, 0.0, std::f32::consts::FRAC_PI_2);
    let frame = geometry.frame(&rig.robot, &rig.arm);

    // Yawed by 90 degrees: local +y is world -x.
    let left = frame.finger(Side::Left);
    assert_relative_eq!(left.inner_point, Vec3::new(1.0 - 0.25, 0.0, 0.0), epsilon = 1e-5);
    assert_relative_eq!(left.closing_direction, Vec3::X, epsilon = 1e-5);
    let right = frame.finger(Side::Right);
    assert_relative_eq!(right.inner_point, Vec3::new(1.0 + 0.25, 0.0, 0.0), epsilon = 1e-5);
    assert_relative_eq!(right.closing_direction, -Vec3::X, epsilon = 1e-5);
}

#[test]
fn region_moves_with_the_gripper() {
    let (mut rig, geometry) = open_rig(0.25);
    let params = GraspRegionParams::rigid();
    let scale = rig.robot.scale();

    let inside_local = Vec3::new(0.01, 0.02, -0.2);
    let outside_local = Vec3::new(0.0, 0.04, -0.2);

    let frame = geometry.frame(&rig.robot, &rig.arm);
    let inside = rig.tool_point(inside_local);
    let outside = rig.tool_point(outside_local);
    assert!(in_grasp_region(&frame, inside, &params, scale));
    assert!(!in_grasp_region(&frame, outside, &params, scale));

    rig.place(0.4, -0.3, 0.2, 1.1);
    let moved = geometry.frame(&rig.robot, &rig.arm);
    assert!(in_grasp_region(&moved, rig.tool_point(inside_local), &params, scale));
    assert!(!in_grasp_region(&moved, rig.tool_point(outside_local), &params, scale));
    // The old world point is no longer between the fingers.
    assert!(!in_grasp_region(&moved, inside, &params, scale));

    let motion = Transform::from_position_rotation(
        Vec3::new(-2.0, 5.0, 1.0),
        Quat::from_rotation_y(0.4),
    );
    let carried = frame.transformed(&motion);
    assert!(in_grasp_region(&carried, motion.transform_point(inside), &params, scale));
    assert!(!in_grasp_region(&carried, motion.transform_point(outside), &params, scale));
}

#[test]
fn inner_slack_is_the_boundary() {
    let (rig, geometry) = open_rig(0.25);
    let frame = geometry.frame(&rig.robot, &rig.arm);
    let params = GraspRegionParams::soft();
    let scale = rig.robot.scale();

    let finger_y = 0.25 * common::FINGER_TRAVEL;
    let slack = params.inner_slack;
    for side in [1.0, -1.0] {
        let just_in = rig.tool_point(Vec3::new(0.0, side * (finger_y + 0.9 * slack), 0.0));
        let just_out = rig.tool_point(Vec3::new(0.0, side * (finger_y + 1.1 * slack), 0.0));
        assert!(in_grasp_region(&frame, just_in, &params, scale));
        assert!(!in_grasp_region(&frame, just_out, &params, scale));
    }
}

#[test]
fn width_and_depth_windows_scale_with_the_model() {
    let (rig, geometry) = open_rig(0.25);
    let frame = geometry.frame(&rig.robot, &rig.arm);
    let params = GraspRegionParams::soft();
    let inside = |local: Vec3| {
        in_grasp_region(&frame, rig.tool_point(local), &params, rig.robot.scale())
    };

    let width = params.half_width;
    assert!(inside(Vec3::new(width / 2.0, 0.0, 0.0)));
    assert!(!inside(Vec3::new(2.0 * width, 0.0, 0.0)));

    let near = params.depth_near;
    assert!(inside(Vec3::new(0.0, 0.0, 0.9 * near)));
    assert!(!inside(Vec3::new(0.0, 0.0, 1.1 * near)));

    let far = params.depth_far.unwrap();
    assert!(inside(Vec3::new(0.0, 0.0, -0.9 * far)));
    assert!(!inside(Vec3::new(0.0, 0.0, -1.1 * far)));

    // Thresholds are model units; the test points above are engine points.
    let engine_half_width = rig.tool_point(Vec3::new(width, 0.0, 0.0)).x;
    assert_relative_eq!(engine_half_width, width * SCALE, epsilon = 1e-6);
}

#[test]
fn closed_gripper_has_no_rigid_region() {
    let (rig, geometry) = open_rig(0.0);
    let frame = geometry.frame(&rig.robot, &rig.arm);
    let params = GraspRegionParams::rigid();
    for local in [Vec3::ZERO, Vec3::new(0.0, 0.001, -0.1), Vec3::new(0.0, -0.001, -0.1)] {
        assert!(!in_grasp_region(&frame, rig.tool_point(local), &params, rig.robot.scale()));
    }
}
