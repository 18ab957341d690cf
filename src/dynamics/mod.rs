//! Simulation dynamics: rigid-body integration and the soft-body solver.

pub mod integrator;
pub mod soft_solver;

pub use integrator::Integrator;
pub use soft_solver::SoftBodySolver;
