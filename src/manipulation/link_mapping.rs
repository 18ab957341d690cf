use std::collections::HashMap;

use crate::{
    error::{GraspError, Result},
    utils::allocator::EntityId,
};

/// Bidirectional map between articulated-model link indices and the engine
/// bodies that represent them.
///
/// Built in one go when a model is loaded and dropped on unload; entries are
/// never patched individually. Only links with geometry appear.
#[derive(Debug, Clone, Default)]
pub struct LinkMapping {
    link_to_body: HashMap<usize, EntityId>,
    body_to_link: HashMap<EntityId, usize>,
}

impl LinkMapping {
    /// Builds the mapping from `(link, body)` pairs. Either side appearing
    /// twice is a model error.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (usize, EntityId)>) -> Result<Self> {
        let mut mapping = Self::default();
        for (link, body) in pairs {
            if mapping.link_to_body.insert(link, body).is_some() {
                return Err(GraspError::invalid_model(format!(
                    "link {link} mapped to more than one body"
                )));
            }
            if mapping.body_to_link.insert(body, link).is_some() {
                return Err(GraspError::invalid_model(format!(
                    "body {body:?} mapped to more than one link"
                )));
            }
        }
        Ok(mapping)
    }

    pub fn body(&self, link: usize) -> Option<EntityId> {
        self.link_to_body.get(&link).copied()
    }

    pub fn link(&self, body: EntityId) -> Option<usize> {
        self.body_to_link.get(&body).copied()
    }

    pub fn contains_body(&self, body: EntityId) -> bool {
        self.body_to_link.contains_key(&body)
    }

    /// Mapped `(link, body)` pairs in link order.
    pub fn pairs(&self) -> Vec<(usize, EntityId)> {
        let mut pairs: Vec<_> = self
            .link_to_body
            .iter()
            .map(|(&link, &body)| (link, body))
            .collect();
        pairs.sort_unstable_by_key(|(link, _)| *link);
        pairs
    }

    pub fn bodies(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.body_to_link.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.link_to_body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.link_to_body.is_empty()
    }
}
