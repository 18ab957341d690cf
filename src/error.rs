//! Error types for the grasping core.

use thiserror::Error;

/// Failures surfaced by the bridge, manipulator and attachment layers.
///
/// Expected outcomes such as a missed grab or an IK target out of reach are
/// not errors; see `MoveOutcome` and `GrabOutcome`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraspError {
    /// A link that carries geometry has no engine body. Indicates a broken
    /// model or a bridge that was never loaded.
    #[error("link `{0}` has geometry but no engine body mapping")]
    MissingLinkMapping(String),

    /// Link name lookup failed.
    #[error("unknown link `{0}`")]
    UnknownLink(String),

    /// Joint name lookup failed.
    #[error("unknown joint `{0}`")]
    UnknownJoint(String),

    /// Rigid body handle is stale or was never issued.
    #[error("unknown rigid body {0}")]
    UnknownBody(String),

    /// Soft body handle is stale or was never issued.
    #[error("unknown soft body {0}")]
    UnknownSoftBody(String),

    /// Node index outside a soft body's node range.
    #[error("node {node} out of range for soft body with {len} nodes")]
    NodeOutOfRange { node: usize, len: usize },

    /// A node holds at most one anchor.
    #[error("node {0} already carries an anchor")]
    NodeAlreadyAnchored(usize),

    /// IK could not reach the target.
    #[error("no IK solution for target pose")]
    NoSolution,

    /// Configuration value rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Articulated model is malformed.
    #[error("invalid model: {0}")]
    InvalidModel(String),
}

impl GraspError {
    pub fn unknown_body(id: impl std::fmt::Debug) -> Self {
        Self::UnknownBody(format!("{id:?}"))
    }

    pub fn unknown_soft_body(id: impl std::fmt::Debug) -> Self {
        Self::UnknownSoftBody(format!("{id:?}"))
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn invalid_model(msg: impl Into<String>) -> Self {
        Self::InvalidModel(msg.into())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, GraspError>;
