//! Deformable bodies: particle nodes joined by distance links, with an
//! optional triangle surface.
//!
//! ```text
//! rope:   ●───●───●───●
//!
//! patch:  ●───●───●
//!         |\  |\  |
//!         | \ | \ |
//!         ●───●───●
//! ```

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{
    error::{GraspError, Result},
    utils::allocator::EntityId,
};

/// One simulated particle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftNode {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Zero for nodes pinned to the world.
    pub inverse_mass: f32,
    /// Anchor currently binding this node to a rigid body, if any.
    pub anchor: Option<EntityId>,
}

impl SoftNode {
    pub fn new(position: Vec3, mass: f32) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            inverse_mass: if mass > 0.0 { 1.0 / mass } else { 0.0 },
            anchor: None,
        }
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }
}

/// Distance constraint between two nodes; also the body's edge graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoftLink {
    pub nodes: [usize; 2],
    pub rest_length: f32,
}

/// Deformable body in engine units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftBody {
    pub name: String,
    pub nodes: Vec<SoftNode>,
    pub links: Vec<SoftLink>,
    pub faces: Vec<[usize; 3]>,
    /// Collision margin used by the node contact query.
    pub margin: f32,
    /// XPBD compliance of the links (0 = rigid links).
    pub compliance: f32,
    pub damping: f32,
}

impl SoftBody {
    pub fn new(name: &str, positions: &[Vec3], node_mass: f32) -> Self {
        Self {
            name: name.into(),
            nodes: positions
                .iter()
                .map(|&p| SoftNode::new(p, node_mass))
                .collect(),
            links: Vec::new(),
            faces: Vec::new(),
            margin: 0.01,
            compliance: 0.0,
            damping: 0.01,
        }
    }

    /// Straight rope of `segments` links from `start` to `end`.
    pub fn rope(name: &str, start: Vec3, end: Vec3, segments: usize, total_mass: f32) -> Self {
        let segments = segments.max(1);
        let positions: Vec<Vec3> = (0..=segments)
            .map(|i| start.lerp(end, i as f32 / segments as f32))
            .collect();
        let mut body = Self::new(name, &positions, total_mass / positions.len() as f32);
        for i in 0..segments {
            body.push_link(i, i + 1);
        }
        body
    }

    /// Rectangular cloth patch spanning `origin + s * u + t * v` for s, t in
    /// [0, 1], with `res_u` by `res_v` cells split into triangles.
    pub fn patch(
        name: &str,
        origin: Vec3,
        u: Vec3,
        v: Vec3,
        res_u: usize,
        res_v: usize,
        total_mass: f32,
    ) -> Self {
        let (res_u, res_v) = (res_u.max(1), res_v.max(1));
        let width = res_u + 1;
        let mut positions = Vec::with_capacity(width * (res_v + 1));
        for j in 0..=res_v {
            for i in 0..=res_u {
                positions.push(
                    origin + u * (i as f32 / res_u as f32) + v * (j as f32 / res_v as f32),
                );
            }
        }
        let mut body = Self::new(name, &positions, total_mass / positions.len() as f32);
        for j in 0..res_v {
            for i in 0..res_u {
                let a = j * width + i;
                let b = a + 1;
                let c = a + width;
                let d = c + 1;
                body.faces.push([a, b, c]);
                body.faces.push([b, d, c]);
            }
        }
        for j in 0..=res_v {
            for i in 0..=res_u {
                let a = j * width + i;
                if i < res_u {
                    body.push_link(a, a + 1);
                }
                if j < res_v {
                    body.push_link(a, a + width);
                }
                if i < res_u && j < res_v {
                    body.push_link(a + 1, a + width);
                }
            }
        }
        body
    }

    /// Adds a link at the current node distance.
    pub fn add_link(&mut self, a: usize, b: usize) -> Result<()> {
        self.check_node(a)?;
        self.check_node(b)?;
        self.push_link(a, b);
        Ok(())
    }

    fn push_link(&mut self, a: usize, b: usize) {
        let rest_length = self.nodes[a].position.distance(self.nodes[b].position);
        self.links.push(SoftLink {
            nodes: [a, b],
            rest_length,
        });
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn face_centroid(&self, face: usize) -> Vec3 {
        let [a, b, c] = self.faces[face];
        (self.nodes[a].position + self.nodes[b].position + self.nodes[c].position) / 3.0
    }

    pub fn has_anchor(&self, node: usize) -> bool {
        self.nodes.get(node).is_some_and(SoftNode::is_anchored)
    }

    pub fn anchored_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_anchored()).count()
    }

    /// Pins a node to its current world position.
    pub fn pin_node(&mut self, node: usize) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.inverse_mass = 0.0;
            n.velocity = Vec3::ZERO;
        }
    }

    /// Checks that every link and face refers to an existing node.
    pub fn validate(&self) -> Result<()> {
        let indices = self
            .links
            .iter()
            .flat_map(|link| link.nodes)
            .chain(self.faces.iter().flatten().copied());
        for node in indices {
            self.check_node(node)?;
        }
        Ok(())
    }

    fn check_node(&self, node: usize) -> Result<()> {
        if node < self.nodes.len() {
            Ok(())
        } else {
            Err(GraspError::NodeOutOfRange {
                node,
                len: self.nodes.len(),
            })
        }
    }
}
