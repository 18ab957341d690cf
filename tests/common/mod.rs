#![allow(dead_code)]

use std::f32::consts::PI;
use std::sync::Arc;

use grasp_bridge::{
    BodyMode, ColliderShape, DampedLeastSquaresIk, JointType, Link, LinkGeometry, Manipulator,
    ManipulatorSpec, Multibody, PhysicsWorld, RobotObject, SimulationConfig, Transform, Vec3,
};

/// Model-to-engine factor used by the fixtures.
pub const SCALE: f32 = 10.0;

/// Finger prismatic axis: a finger DOF value of `v` moves the finger by
/// `v * FINGER_TRAVEL` model units along y.
pub const FINGER_TRAVEL: f32 = 0.1;

pub const ARM_JOINTS: [&str; 4] = [
    "slide_x_joint",
    "slide_y_joint",
    "slide_z_joint",
    "wrist_yaw",
];

fn slide(name: &str, parent: usize, axis: Vec3) -> Link {
    Link::new(name, Some(parent), JointType::Prismatic { axis }).with_limits(-1.0, 1.0)
}

fn finger(name: &str, parent: usize, side_offset: f32) -> Link {
    let mut geometry = LinkGeometry::new(ColliderShape::Box {
        half_extents: Vec3::new(0.002, 0.002, 0.01),
    });
    geometry.offset = Transform::from_position(Vec3::new(0.0, side_offset, 0.0));
    geometry.mass = 0.1;
    Link::new(
        name,
        Some(parent),
        JointType::Prismatic {
            axis: Vec3::Y * FINGER_TRAVEL,
        },
    )
    .with_limits(-0.3, 0.3)
    .with_geometry(geometry)
}

/// Gantry with three slides, a yaw wrist, a palm and two parallel fingers.
/// Only the palm and the fingers carry geometry; the tool frame sits at the
/// palm origin with the approach axis along +z.
pub fn gantry_model() -> Multibody {
    let mut model = Multibody::new("gantry");
    let base = model
        .add_link(Link::new("base", None, JointType::Fixed))
        .unwrap();
    let x = model.add_link(slide("slide_x", base, Vec3::X)).unwrap();
    let y = model.add_link(slide("slide_y", x, Vec3::Y)).unwrap();
    let z = model.add_link(slide("slide_z", y, Vec3::Z)).unwrap();
    let wrist = model
        .add_link(
            Link::new("wrist", Some(z), JointType::Revolute { axis: Vec3::Z })
                .with_joint_name("wrist_yaw")
                .with_limits(-PI, PI),
        )
        .unwrap();

    let mut palm_geometry = LinkGeometry::new(ColliderShape::Box {
        half_extents: Vec3::splat(0.01),
    });
    palm_geometry.offset = Transform::from_position(Vec3::new(0.0, 0.0, -0.03));
    let palm = model
        .add_link(Link::new("palm", Some(wrist), JointType::Fixed).with_geometry(palm_geometry))
        .unwrap();

    model.add_link(finger("left_finger", palm, 0.002)).unwrap();
    model.add_link(finger("right_finger", palm, -0.002)).unwrap();
    model
}

pub fn arm_spec() -> ManipulatorSpec {
    ManipulatorSpec::new("arm", "palm")
        .with_arm_joints(&ARM_JOINTS)
        .with_fingers("left_finger_joint", "right_finger_joint")
}

/// Fixture config: engine units are [`SCALE`] times model units, no gravity.
pub fn config() -> SimulationConfig {
    SimulationConfig::default()
        .with_scale(SCALE)
        .with_gravity(Vec3::ZERO)
}

pub struct Rig {
    pub config: SimulationConfig,
    pub world: PhysicsWorld,
    pub robot: RobotObject,
    pub arm: Manipulator,
}

pub fn rig(mode: BodyMode) -> Rig {
    rig_with(config(), mode)
}

pub fn rig_with(config: SimulationConfig, mode: BodyMode) -> Rig {
    let mut world = PhysicsWorld::from_config(&config);
    let mut robot = RobotObject::load(&mut world, gantry_model(), mode, config.scale).unwrap();
    let arm = robot
        .create_manipulator(&arm_spec(), Arc::new(DampedLeastSquaresIk::default()))
        .unwrap();
    Rig {
        config,
        world,
        robot,
        arm,
    }
}

impl Rig {
    /// Moves the arm joints directly and syncs the engine.
    pub fn place(&mut self, x: f32, y: f32, z: f32, yaw: f32) {
        self.arm.set_dof_values(&mut self.robot, &[x, y, z, yaw]);
        self.robot.sync_to_engine(&mut self.world).unwrap();
    }

    /// Sets the gripper opening and syncs the engine.
    pub fn open_to(&mut self, angle: f32) {
        self.arm.set_gripper_angle(&mut self.robot, angle);
        self.robot.sync_to_engine(&mut self.world).unwrap();
    }

    /// Engine point at `local` (model units) in the tool frame.
    pub fn tool_point(&self, local: Vec3) -> Vec3 {
        self.arm
            .transform(&self.robot)
            .transform_point(local * self.config.scale.factor())
    }
}
