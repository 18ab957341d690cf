use super::{collider::ColliderShape, types::Transform};
use crate::{
    error::{GraspError, Result},
    utils::math::twist_angle,
};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Type of joint connecting a link to its parent in reduced coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JointType {
    /// 1-DOF rotation about `axis` (joint frame).
    Revolute { axis: Vec3 },
    /// 1-DOF translation along `axis` (joint frame).
    Prismatic { axis: Vec3 },
    /// 0-DOF rigid connection.
    Fixed,
}

impl JointType {
    pub fn dofs(&self) -> usize {
        match self {
            JointType::Revolute { .. } | JointType::Prismatic { .. } => 1,
            JointType::Fixed => 0,
        }
    }

    /// Local transform across the joint for coordinate `q` (ignored for fixed joints).
    pub fn transform(&self, q: f32) -> Transform {
        match self {
            JointType::Revolute { axis } => {
                Transform::from_rotation(Quat::from_axis_angle(axis.normalize(), q))
            }
            JointType::Prismatic { axis } => Transform::from_position(*axis * q),
            JointType::Fixed => Transform::default(),
        }
    }

    /// Inverse of [`JointType::transform`]: the coordinate that best explains
    /// the observed local transform. `None` for fixed joints.
    pub fn coordinate(&self, local: &Transform) -> Option<f32> {
        match self {
            JointType::Revolute { axis } => Some(twist_angle(local.rotation, axis.normalize())),
            JointType::Prismatic { axis } => {
                let len2 = axis.length_squared();
                (len2 > f32::EPSILON).then(|| local.position.dot(*axis) / len2)
            }
            JointType::Fixed => None,
        }
    }
}

/// Collision geometry carried by a link, in model units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkGeometry {
    pub shape: ColliderShape,
    /// Shape pose in the link frame.
    pub offset: Transform,
    pub mass: f32,
}

impl LinkGeometry {
    pub fn new(shape: ColliderShape) -> Self {
        Self {
            shape,
            offset: Transform::default(),
            mass: 1.0,
        }
    }
}

/// A single node in the articulated body tree.
#[derive(Debug, Clone)]
pub struct Link {
    pub name: String,
    /// Index of the parent link. None if this is the root link.
    pub parent_idx: Option<usize>,
    /// The joint connecting this link to its parent.
    pub joint_type: JointType,
    pub joint_name: String,
    /// Lower/upper coordinate bounds; `None` means unbounded.
    pub limits: Option<(f32, f32)>,
    /// The offset of the joint coordinate in the DOF vector.
    pub q_offset: usize,
    /// Static transform from parent link frame to this link's joint frame (at q=0).
    pub parent_to_joint: Transform,
    /// Links without geometry (pure frames) get no engine body.
    pub geometry: Option<LinkGeometry>,
}

impl Link {
    pub fn new(name: &str, parent: Option<usize>, joint: JointType) -> Self {
        Self {
            name: name.into(),
            parent_idx: parent,
            joint_type: joint,
            joint_name: format!("{name}_joint"),
            limits: None,
            q_offset: 0,
            parent_to_joint: Transform::default(),
            geometry: None,
        }
    }

    pub fn with_joint_name(mut self, joint_name: &str) -> Self {
        self.joint_name = joint_name.into();
        self
    }

    pub fn with_offset(mut self, parent_to_joint: Transform) -> Self {
        self.parent_to_joint = parent_to_joint;
        self
    }

    pub fn with_limits(mut self, lower: f32, upper: f32) -> Self {
        self.limits = Some((lower.min(upper), lower.max(upper)));
        self
    }

    pub fn with_geometry(mut self, geometry: LinkGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }
}

/// Saved DOF vector and root pose of a [`Multibody`].
#[derive(Debug, Clone, PartialEq)]
pub struct DofSnapshot {
    pub q: Vec<f32>,
    pub root_transform: Transform,
}

/// Articulated body: a tree of links driven by a DOF vector, in model units.
#[derive(Debug, Clone)]
pub struct Multibody {
    pub name: String,
    /// Links ordered such that a parent always appears before its children.
    pub links: Vec<Link>,
    /// Total degrees of freedom across all joints.
    pub total_dofs: usize,
    /// Generalized positions (q).
    pub q: Vec<f32>,
    /// Pose of the root link's parent frame in the world.
    pub root_transform: Transform,
    world_transforms: Vec<Transform>,
    /// Owning link of each DOF.
    dof_links: Vec<usize>,
}

impl Multibody {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            links: Vec::new(),
            total_dofs: 0,
            q: Vec::new(),
            root_transform: Transform::default(),
            world_transforms: Vec::new(),
            dof_links: Vec::new(),
        }
    }

    /// Adds a link and allocates its DOFs. Parents must be added first and
    /// link names must be unique.
    pub fn add_link(&mut self, mut link: Link) -> Result<usize> {
        let idx = self.links.len();
        if let Some(parent) = link.parent_idx {
            if parent >= idx {
                return Err(GraspError::invalid_model(format!(
                    "link `{}` references parent {parent} that is not yet defined",
                    link.name
                )));
            }
        } else if idx != 0 {
            return Err(GraspError::invalid_model(format!(
                "link `{}` is a second root",
                link.name
            )));
        }
        if self.link_index(&link.name).is_some() {
            return Err(GraspError::invalid_model(format!(
                "duplicate link name `{}`",
                link.name
            )));
        }

        link.q_offset = self.total_dofs;
        let dofs = link.joint_type.dofs();
        self.total_dofs += dofs;
        self.q.resize(self.total_dofs, 0.0);
        self.dof_links.extend(std::iter::repeat(idx).take(dofs));
        self.links.push(link);
        self.world_transforms.push(Transform::default());
        self.forward_kinematics();
        Ok(idx)
    }

    pub fn link_index(&self, name: &str) -> Option<usize> {
        self.links.iter().position(|link| link.name == name)
    }

    pub fn dof_index(&self, joint_name: &str) -> Option<usize> {
        self.links
            .iter()
            .find(|link| link.joint_name == joint_name && link.joint_type.dofs() == 1)
            .map(|link| link.q_offset)
    }

    pub fn dof_indices(&self, joint_names: &[&str]) -> Result<Vec<usize>> {
        joint_names
            .iter()
            .map(|name| {
                self.dof_index(name)
                    .ok_or_else(|| GraspError::UnknownJoint((*name).to_string()))
            })
            .collect()
    }

    /// Link that owns DOF `dof`.
    pub fn dof_link(&self, dof: usize) -> Option<usize> {
        self.dof_links.get(dof).copied()
    }

    pub fn dof_limits(&self, dof: usize) -> Option<(f32, f32)> {
        self.dof_link(dof).and_then(|link| self.links[link].limits)
    }

    pub fn dof_values(&self, indices: &[usize]) -> Vec<f32> {
        indices
            .iter()
            .map(|&i| self.q.get(i).copied().unwrap_or(0.0))
            .collect()
    }

    /// Writes DOF values (clamped to joint limits) and refreshes link poses.
    /// Indices outside the DOF vector are ignored.
    pub fn set_dof_values(&mut self, indices: &[usize], values: &[f32]) {
        for (&dof, &value) in indices.iter().zip(values) {
            if dof >= self.total_dofs {
                continue;
            }
            let value = match self.dof_limits(dof) {
                Some((lo, hi)) => value.clamp(lo, hi),
                None => value,
            };
            self.q[dof] = value;
        }
        self.forward_kinematics();
    }

    pub fn set_root_transform(&mut self, transform: Transform) {
        self.root_transform = transform;
        self.forward_kinematics();
    }

    fn local_transform(&self, idx: usize) -> Transform {
        let link = &self.links[idx];
        let q = if link.joint_type.dofs() == 1 {
            self.q[link.q_offset]
        } else {
            0.0
        };
        link.parent_to_joint.combine(&link.joint_type.transform(q))
    }

    /// Recomputes every link's world pose from `q` and the root pose.
    pub fn forward_kinematics(&mut self) {
        for i in 0..self.links.len() {
            let local = self.local_transform(i);
            let parent = match self.links[i].parent_idx {
                Some(p) => self.world_transforms[p],
                None => self.root_transform,
            };
            self.world_transforms[i] = parent.combine(&local);
        }
    }

    /// Cached world pose of link `idx` (model units), valid after any DOF write.
    pub fn link_transform(&self, idx: usize) -> Option<Transform> {
        self.world_transforms.get(idx).copied()
    }

    pub fn link_transforms(&self) -> &[Transform] {
        &self.world_transforms
    }

    /// Rebuilds joint coordinates from observed world poses. Links for which
    /// `observed` returns `None` keep their current coordinates. An observed
    /// root link moves the root pose instead.
    pub fn update_from_link_poses(&mut self, mut observed: impl FnMut(usize) -> Option<Transform>) {
        for i in 0..self.links.len() {
            let seen = observed(i);
            match (self.links[i].parent_idx, seen) {
                (None, Some(world)) => {
                    self.root_transform = world.combine(&self.local_transform(i).inverse());
                }
                (Some(p), Some(world)) => {
                    let link = &self.links[i];
                    let relative = self.world_transforms[p].inverse().combine(&world);
                    let local = link.parent_to_joint.inverse().combine(&relative);
                    if let Some(mut value) = link.joint_type.coordinate(&local) {
                        if let Some((lo, hi)) = link.limits {
                            value = value.clamp(lo, hi);
                        }
                        self.q[link.q_offset] = value;
                    }
                }
                _ => {}
            }
            let parent = match self.links[i].parent_idx {
                Some(p) => self.world_transforms[p],
                None => self.root_transform,
            };
            self.world_transforms[i] = parent.combine(&self.local_transform(i));
        }
    }

    pub fn snapshot(&self) -> DofSnapshot {
        DofSnapshot {
            q: self.q.clone(),
            root_transform: self.root_transform,
        }
    }

    pub fn restore(&mut self, snapshot: &DofSnapshot) {
        self.q.clone_from(&snapshot.q);
        self.q.resize(self.total_dofs, 0.0);
        self.root_transform = snapshot.root_transform;
        self.forward_kinematics();
    }
}
