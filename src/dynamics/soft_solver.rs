use glam::Vec3;

use crate::{core::softbody::SoftBody, utils::allocator::EntityId};

/// Position-based solver for [`SoftBody`] links.
///
/// Anchored nodes are driven to their anchor target every iteration and
/// carry zero weight in the link projection, so the rest of the body hangs
/// from them.
#[derive(Debug, Clone)]
pub struct SoftBodySolver {
    pub iterations: u32,
}

impl SoftBodySolver {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    /// Advances `body` by `dt`. `anchor_target(anchor)` returns the world
    /// point the node held by `anchor` must sit on.
    pub fn step(
        &self,
        body: &mut SoftBody,
        gravity: Vec3,
        dt: f32,
        anchor_target: impl Fn(EntityId) -> Option<Vec3>,
    ) {
        if dt <= 0.0 || body.nodes.is_empty() {
            return;
        }

        let targets: Vec<Option<Vec3>> = body
            .nodes
            .iter()
            .map(|node| node.anchor.and_then(&anchor_target))
            .collect();

        let weights: Vec<f32> = body
            .nodes
            .iter()
            .zip(&targets)
            .map(|(node, target)| if target.is_some() { 0.0 } else { node.inverse_mass })
            .collect();

        let mut predicted: Vec<Vec3> = body
            .nodes
            .iter()
            .zip(&targets)
            .zip(&weights)
            .map(|((node, target), &w)| match target {
                Some(point) => *point,
                None if w > 0.0 => node.position + (node.velocity + gravity * dt) * dt,
                None => node.position,
            })
            .collect();

        let alpha = body.compliance / (dt * dt);
        for _ in 0..self.iterations {
            for link in &body.links {
                let [a, b] = link.nodes;
                let (wa, wb) = (weights[a], weights[b]);
                let w = wa + wb;
                if w <= 0.0 {
                    continue;
                }
                let delta = predicted[a] - predicted[b];
                let length = delta.length();
                if length <= f32::EPSILON {
                    continue;
                }
                let c = length - link.rest_length;
                let correction = delta / length * (c / (w + alpha));
                predicted[a] -= correction * wa;
                predicted[b] += correction * wb;
            }
        }

        let keep = (1.0 - body.damping).clamp(0.0, 1.0);
        for (node, next) in body.nodes.iter_mut().zip(predicted) {
            node.velocity = (next - node.position) / dt * keep;
            node.position = next;
        }
    }
}
