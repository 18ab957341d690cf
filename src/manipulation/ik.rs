//! Inverse kinematics for manipulator chains.

use glam::Vec3;

use crate::{
    core::{articulations::Multibody, types::Transform},
    utils::math::{joint_space_distance, rotation_error},
};

/// Tool frame of a manipulator: a link plus a fixed offset from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolFrame {
    pub link: usize,
    pub offset: Transform,
}

impl ToolFrame {
    /// Model-frame tool pose for the model's current configuration.
    pub fn pose(&self, model: &Multibody) -> Transform {
        model
            .link_transform(self.link)
            .unwrap_or_default()
            .combine(&self.offset)
    }
}

/// Seam to an inverse-kinematics backend.
///
/// `target` is a model-frame pose (model units). Implementations return every
/// configuration of `chain` (DOF indices into `model.q`) they find that puts
/// `tool` on `target`, or an empty vector.
pub trait IkSolver: Send + Sync {
    fn solve_all(
        &self,
        model: &Multibody,
        chain: &[usize],
        tool: &ToolFrame,
        target: &Transform,
    ) -> Vec<Vec<f32>>;
}

/// Damped least squares on a finite-difference Jacobian, restarted from the
/// current configuration and from a fixed set of seeds spread over the joint
/// limits.
#[derive(Debug, Clone)]
pub struct DampedLeastSquaresIk {
    pub max_iterations: usize,
    pub damping: f32,
    pub position_tolerance: f32,
    pub rotation_tolerance: f32,
    /// Restarts in addition to the current configuration.
    pub seeds: usize,
    /// Solutions closer than this in joint space count as one.
    pub merge_distance: f32,
}

impl Default for DampedLeastSquaresIk {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            damping: 1e-2,
            position_tolerance: 1e-4,
            rotation_tolerance: 1e-3,
            seeds: 8,
            merge_distance: 1e-3,
        }
    }
}

const JACOBIAN_STEP: f32 = 1e-3;

impl DampedLeastSquaresIk {
    fn seed(&self, model: &Multibody, chain: &[usize], k: usize) -> Vec<f32> {
        let current = model.dof_values(chain);
        if k == 0 {
            return current;
        }
        chain
            .iter()
            .zip(current)
            .enumerate()
            .map(|(i, (&dof, value))| {
                let frac = (k as f32 * 0.618_034 + i as f32 * 0.414_214).fract();
                match model.dof_limits(dof) {
                    Some((lo, hi)) => lo + (hi - lo) * frac,
                    None => value + (frac - 0.5) * std::f32::consts::TAU,
                }
            })
            .collect()
    }

    fn pose_error(pose: &Transform, target: &Transform) -> [f32; 6] {
        let dp = target.position - pose.position;
        let dr = rotation_error(pose.rotation, target.rotation);
        [dp.x, dp.y, dp.z, dr.x, dr.y, dr.z]
    }

    fn converged(&self, error: &[f32; 6]) -> bool {
        let position = Vec3::new(error[0], error[1], error[2]).length();
        let rotation = Vec3::new(error[3], error[4], error[5]).length();
        position <= self.position_tolerance && rotation <= self.rotation_tolerance
    }

    /// Iterates from `q` on `scratch`; returns the converged configuration.
    fn descend(
        &self,
        scratch: &mut Multibody,
        chain: &[usize],
        tool: &ToolFrame,
        target: &Transform,
        mut q: Vec<f32>,
    ) -> Option<Vec<f32>> {
        let n = chain.len();
        scratch.set_dof_values(chain, &q);
        q = scratch.dof_values(chain);

        for _ in 0..self.max_iterations {
            let pose = tool.pose(scratch);
            let error = Self::pose_error(&pose, target);
            if self.converged(&error) {
                return Some(q);
            }

            // Columns of the 6 x n Jacobian.
            let mut jacobian = Vec::with_capacity(n);
            for j in 0..n {
                let mut probe = q.clone();
                probe[j] += JACOBIAN_STEP;
                scratch.set_dof_values(chain, &probe);
                let moved = tool.pose(scratch);
                let dp = (moved.position - pose.position) / JACOBIAN_STEP;
                let dr = rotation_error(pose.rotation, moved.rotation) / JACOBIAN_STEP;
                jacobian.push([dp.x, dp.y, dp.z, dr.x, dr.y, dr.z]);
            }

            // (J^T J + lambda^2 I) dq = J^T e
            let lambda2 = self.damping * self.damping;
            let mut normal = vec![vec![0.0f32; n]; n];
            let mut rhs = vec![0.0f32; n];
            for a in 0..n {
                for b in 0..n {
                    normal[a][b] = (0..6).map(|r| jacobian[a][r] * jacobian[b][r]).sum();
                }
                normal[a][a] += lambda2;
                rhs[a] = (0..6).map(|r| jacobian[a][r] * error[r]).sum();
            }
            let step = solve_linear(normal, rhs)?;

            for (value, delta) in q.iter_mut().zip(step) {
                *value += delta;
            }
            scratch.set_dof_values(chain, &q);
            // Re-read: limits clamp.
            q = scratch.dof_values(chain);
        }

        let error = Self::pose_error(&tool.pose(scratch), target);
        self.converged(&error).then_some(q)
    }
}

impl IkSolver for DampedLeastSquaresIk {
    fn solve_all(
        &self,
        model: &Multibody,
        chain: &[usize],
        tool: &ToolFrame,
        target: &Transform,
    ) -> Vec<Vec<f32>> {
        let mut scratch = model.clone();
        let mut solutions: Vec<Vec<f32>> = Vec::new();
        for k in 0..=self.seeds {
            let start = self.seed(model, chain, k);
            let Some(solution) = self.descend(&mut scratch, chain, tool, target, start) else {
                continue;
            };
            let duplicate = solutions
                .iter()
                .any(|known| joint_space_distance(known, &solution) < self.merge_distance);
            if !duplicate {
                solutions.push(solution);
            }
        }
        solutions
    }
}

/// Gaussian elimination with partial pivoting. `None` for a singular system.
fn solve_linear(mut a: Vec<Vec<f32>>, mut b: Vec<f32>) -> Option<Vec<f32>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f32 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
