//! Anchor attachment for soft bodies held by a two-finger gripper.
//!
//! Two strategies share the same anchor bookkeeping:
//! - region based ([`AnchorAttacher::attach_region`]): every node in the soft
//!   grasp region, and every in-region vertex of a face whose centroid lies in
//!   it, is snapped onto the gripper mid-plane and anchored to the palm;
//!   anchors then spread along the link graph up to `max_extra_anchors`;
//! - contact based ([`AnchorAttacher::attach_contacts`]): nodes touching a
//!   finger and lying between both fingers are anchored to that finger.

use std::collections::{HashSet, VecDeque};

use log::{debug, warn};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    bridge::RobotObject,
    grasp_region::{
        in_grasp_region, on_inner_side, GraspFrame, GraspRegionParams, GripperGeometry, Side,
    },
    manipulator::Manipulator,
};
use crate::{
    config::{LengthScale, SimulationConfig},
    core::softbody::SoftBody,
    error::{GraspError, Result},
    utils::{allocator::EntityId, logging::ScopedTimer},
    world::PhysicsWorld,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AttachStrategy {
    #[default]
    Region,
    Contact,
}

/// Anchors created by one attach call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttachReport {
    pub direct: usize,
    pub propagated: usize,
    /// Propagation stopped with unanchored neighbours left.
    pub budget_exhausted: bool,
}

impl AttachReport {
    pub fn total(&self) -> usize {
        self.direct + self.propagated
    }
}

/// Creates and tracks the anchors binding soft bodies to one gripper.
#[derive(Debug, Clone)]
pub struct AnchorAttacher {
    manipulator: Manipulator,
    geometry: GripperGeometry,
    palm_body: EntityId,
    region: GraspRegionParams,
    contact_slack: f32,
    max_extra_anchors: usize,
    targets: Vec<EntityId>,
    anchors: Vec<EntityId>,
}

impl AnchorAttacher {
    pub fn new(
        manipulator: Manipulator,
        geometry: GripperGeometry,
        robot: &RobotObject,
        palm_link: &str,
        config: &SimulationConfig,
    ) -> Result<Self> {
        Ok(Self {
            manipulator,
            geometry,
            palm_body: robot.link_body(palm_link)?,
            region: config.soft_grasp,
            contact_slack: config.contact_inner_slack,
            max_extra_anchors: config.max_extra_anchors,
            targets: Vec::new(),
            anchors: Vec::new(),
        })
    }

    /// Soft bodies checked by the contact strategy. Empty means all.
    pub fn set_targets(&mut self, targets: Vec<EntityId>) {
        self.targets = targets;
    }

    pub fn set_max_extra_anchors(&mut self, budget: usize) {
        self.max_extra_anchors = budget;
    }

    pub fn anchors(&self) -> &[EntityId] {
        &self.anchors
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    pub fn attach(
        &mut self,
        strategy: AttachStrategy,
        robot: &RobotObject,
        world: &mut PhysicsWorld,
    ) -> Result<AttachReport> {
        match strategy {
            AttachStrategy::Region => self.attach_region(robot, world),
            AttachStrategy::Contact => self.attach_contacts(robot, world),
        }
    }

    /// Anchors finger-contact nodes that sit between both fingers to the
    /// finger they touch.
    pub fn attach_contacts(
        &mut self,
        robot: &RobotObject,
        world: &mut PhysicsWorld,
    ) -> Result<AttachReport> {
        let frame = self.geometry.frame(robot, &self.manipulator);
        let slack = robot.scale().length(self.contact_slack);
        let targets = if self.targets.is_empty() {
            world.soft_body_ids()
        } else {
            self.targets.clone()
        };

        let mut report = AttachReport::default();
        for side in Side::BOTH {
            let link = self.manipulator.finger_link(side);
            let finger = robot.mapping().body(link).ok_or_else(|| {
                GraspError::MissingLinkMapping(robot.model.links[link].name.clone())
            })?;

            for &soft in &targets {
                for collider in world.colliders_of(finger) {
                    for contact in world.soft_contacts(soft, collider)? {
                        if !robot.mapping().contains_body(contact.rigid_body)
                            || world.has_anchor(soft, contact.node)
                        {
                            continue;
                        }
                        if frame
                            .fingers
                            .iter()
                            .all(|f| on_inner_side(f, contact.point, slack))
                        {
                            self.anchors.push(world.add_anchor(soft, contact.node, finger)?);
                            report.direct += 1;
                        }
                    }
                }
            }
        }
        debug!("{}: contact attach {} anchors", self.manipulator.name, report.direct);
        Ok(report)
    }

    /// Anchors every node in the soft grasp region to the palm, snapping
    /// it onto the gripper mid-plane first, then propagates along links.
    pub fn attach_region(
        &mut self,
        robot: &RobotObject,
        world: &mut PhysicsWorld,
    ) -> Result<AttachReport> {
        let _timer = ScopedTimer::new("anchor::attach_region");
        let frame = self.geometry.frame(robot, &self.manipulator);
        let scale = robot.scale();

        let mut report = AttachReport::default();
        for soft_id in world.soft_body_ids() {
            let Some(soft) = world.soft_body(soft_id) else {
                continue;
            };
            let candidates = region_candidates(soft, &frame, &self.region, scale);
            let adjacency = adjacency(soft);

            let mut attached = Vec::new();
            for node in candidates {
                if world.has_anchor(soft_id, node) {
                    continue;
                }
                self.anchor_to_palm(world, &frame, soft_id, node)?;
                attached.push(node);
            }
            report.direct += attached.len();

            let mut extra = 0;
            let mut frontier: VecDeque<usize> = attached.into_iter().collect();
            'spread: while let Some(node) = frontier.pop_front() {
                for &next in &adjacency[node] {
                    if world.has_anchor(soft_id, next) {
                        continue;
                    }
                    if extra >= self.max_extra_anchors {
                        report.budget_exhausted = true;
                        break 'spread;
                    }
                    self.anchor_to_palm(world, &frame, soft_id, next)?;
                    extra += 1;
                    frontier.push_back(next);
                }
            }
            report.propagated += extra;
        }

        debug!(
            "{}: region attach {} direct, {} propagated{}",
            self.manipulator.name,
            report.direct,
            report.propagated,
            if report.budget_exhausted { " (budget reached)" } else { "" }
        );
        Ok(report)
    }

    fn anchor_to_palm(
        &mut self,
        world: &mut PhysicsWorld,
        frame: &GraspFrame,
        soft_id: EntityId,
        node: usize,
    ) -> Result<()> {
        let soft = world
            .soft_body_mut(soft_id)
            .ok_or_else(|| GraspError::unknown_soft_body(soft_id))?;
        let len = soft.nodes.len();
        let target = soft
            .nodes
            .get_mut(node)
            .ok_or(GraspError::NodeOutOfRange { node, len })?;
        target.position = frame.snap_to_mid_plane(target.position);
        self.anchors.push(world.add_anchor(soft_id, node, self.palm_body)?);
        Ok(())
    }

    /// Removes every anchor this attacher created. Returns how many were
    /// still live; calling it again returns 0.
    pub fn release_all_anchors(&mut self, world: &mut PhysicsWorld) -> usize {
        let mut removed = 0;
        for anchor in self.anchors.drain(..) {
            if world.remove_anchor(anchor).is_some() {
                removed += 1;
            } else {
                warn!("anchor {anchor:?} was already removed");
            }
        }
        if removed > 0 {
            debug!("{}: released {removed} anchors", self.manipulator.name);
        }
        removed
    }
}

/// Nodes in the region, then the in-region vertices of faces whose centroid
/// is in the region, without repeats and skipping anchored nodes.
fn region_candidates(
    soft: &SoftBody,
    frame: &GraspFrame,
    params: &GraspRegionParams,
    scale: LengthScale,
) -> Vec<usize> {
    let inside = |i: usize| in_grasp_region(frame, soft.nodes[i].position, params, scale);
    let node_hit = |i: usize| !soft.nodes[i].is_anchored() && inside(i);
    let face_hit = |f: usize| in_grasp_region(frame, soft.face_centroid(f), params, scale);

    let nodes = select(soft.nodes.len(), node_hit);
    let faces = select(soft.faces.len(), face_hit);

    let mut seen = HashSet::new();
    nodes
        .into_iter()
        .chain(
            faces
                .into_iter()
                .flat_map(|f| soft.faces[f])
                .filter(|&vertex| inside(vertex)),
        )
        .filter(|&node| !soft.nodes[node].is_anchored() && seen.insert(node))
        .collect()
}

#[cfg(feature = "parallel")]
fn select(len: usize, keep: impl Fn(usize) -> bool + Sync + Send) -> Vec<usize> {
    (0..len).into_par_iter().filter(|&i| keep(i)).collect()
}

#[cfg(not(feature = "parallel"))]
fn select(len: usize, keep: impl Fn(usize) -> bool) -> Vec<usize> {
    (0..len).filter(|&i| keep(i)).collect()
}

fn adjacency(soft: &SoftBody) -> Vec<Vec<usize>> {
    let mut neighbours = vec![Vec::new(); soft.nodes.len()];
    for link in &soft.links {
        let [a, b] = link.nodes;
        neighbours[a].push(b);
        neighbours[b].push(a);
    }
    neighbours
}
