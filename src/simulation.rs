//! Per-step host hook tying the grasping components to the engine.

use log::{debug, info};

use crate::{
    config::SimulationConfig,
    core::articulations::Multibody,
    error::Result,
    manipulation::{
        anchor::{AnchorAttacher, AttachStrategy},
        bridge::{BodyMode, RobotObject},
        grab::GrabMonitor,
        grasp_region::Side,
        gripper_action::{GripperAction, GripperEvent},
    },
    utils::logging::ScopedTimer,
    world::PhysicsWorld,
};

/// One gripper's controllers. The action drives the fingers; a starting
/// close tries a rigid grab, a completed close attaches soft bodies and an
/// opening releases both.
#[derive(Debug, Clone)]
pub struct GripperController {
    pub action: GripperAction,
    pub grab: Option<GrabMonitor>,
    pub attacher: Option<AnchorAttacher>,
    pub strategy: AttachStrategy,
}

impl GripperController {
    pub fn new(action: GripperAction) -> Self {
        Self {
            action,
            grab: None,
            attacher: None,
            strategy: AttachStrategy::default(),
        }
    }

    pub fn with_grab(mut self, grab: GrabMonitor) -> Self {
        self.grab = Some(grab);
        self
    }

    pub fn with_attacher(mut self, attacher: AnchorAttacher, strategy: AttachStrategy) -> Self {
        self.attacher = Some(attacher);
        self.strategy = strategy;
        self
    }

    fn on_event(
        &mut self,
        event: GripperEvent,
        robot: &mut RobotObject,
        world: &mut PhysicsWorld,
    ) -> Result<()> {
        match event {
            GripperEvent::Closing => {
                if let Some(grab) = &mut self.grab {
                    let outcome = grab.grab(robot, world)?;
                    debug!("grab on close: {outcome:?}");
                }
            }
            GripperEvent::Closed => {
                if let Some(attacher) = &mut self.attacher {
                    attacher.attach(self.strategy, robot, world)?;
                }
            }
            GripperEvent::Opening => self.release(robot, world),
            GripperEvent::Idle | GripperEvent::Moving => {}
        }
        Ok(())
    }

    /// Drops the held body and every anchor.
    pub fn release(&mut self, robot: &mut RobotObject, world: &mut PhysicsWorld) {
        if let Some(grab) = &mut self.grab {
            grab.release(robot, world);
        }
        if let Some(attacher) = &mut self.attacher {
            attacher.release_all_anchors(world);
        }
    }
}

/// Engine world plus one loaded robot and its grippers.
pub struct GraspSimulation {
    pub config: SimulationConfig,
    pub world: PhysicsWorld,
    pub robot: RobotObject,
    grippers: Vec<GripperController>,
}

impl GraspSimulation {
    pub fn new(config: SimulationConfig, model: Multibody, mode: BodyMode) -> Result<Self> {
        config.validate()?;
        let mut world = PhysicsWorld::from_config(&config);
        let robot = RobotObject::load(&mut world, model, mode, config.scale)?;
        info!("simulation ready, dt {}", config.time_step);
        Ok(Self {
            config,
            world,
            robot,
            grippers: Vec::new(),
        })
    }

    pub fn add_gripper(&mut self, controller: GripperController) -> usize {
        self.grippers.push(controller);
        self.grippers.len() - 1
    }

    pub fn gripper(&self, index: usize) -> Option<&GripperController> {
        self.grippers.get(index)
    }

    pub fn gripper_mut(&mut self, index: usize) -> Option<&mut GripperController> {
        self.grippers.get_mut(index)
    }

    /// Starts closing gripper `index`. False when there is no such gripper.
    pub fn close_gripper(&mut self, index: usize) -> bool {
        let Some(gripper) = self.grippers.get_mut(index) else {
            return false;
        };
        gripper.action.set_close_action(&self.robot);
        true
    }

    pub fn open_gripper(&mut self, index: usize) -> bool {
        let Some(gripper) = self.grippers.get_mut(index) else {
            return false;
        };
        gripper.action.set_open_action(&self.robot);
        true
    }

    /// Releases every grab and anchor.
    pub fn reset_grippers(&mut self) {
        for gripper in &mut self.grippers {
            gripper.release(&mut self.robot, &mut self.world);
        }
    }

    /// One simulation step: gripper actions, model -> engine sync, grab and
    /// anchor updates, integration, then engine -> model readback for
    /// simulated robots. In a simulated robot the finger bodies of a moving
    /// gripper are posed from the commanded values before integration.
    pub fn step(&mut self, dt: f32) -> Result<()> {
        let _timer = ScopedTimer::new("simulation::step");

        let events: Vec<GripperEvent> = self
            .grippers
            .iter_mut()
            .map(|gripper| gripper.action.step(&mut self.robot, dt))
            .collect();

        self.robot.sync_to_engine(&mut self.world)?;
        if self.robot.mode() == BodyMode::Dynamic {
            // Simulated fingers would otherwise be read back over the command.
            for (gripper, event) in self.grippers.iter().zip(&events) {
                if *event != GripperEvent::Idle {
                    let arm = gripper.action.manipulator();
                    let fingers = Side::BOTH.map(|side| arm.finger_link(side));
                    self.robot.write_link_poses(&mut self.world, &fingers)?;
                }
            }
        }

        for (gripper, event) in self.grippers.iter_mut().zip(events) {
            gripper.on_event(event, &mut self.robot, &mut self.world)?;
            if let Some(grab) = &gripper.grab {
                grab.update_grab_pose(&self.robot, &mut self.world)?;
            }
        }

        self.world.step(dt);

        if self.robot.mode() == BodyMode::Dynamic {
            self.robot.sync_from_engine(&self.world)?;
        }
        Ok(())
    }
}
