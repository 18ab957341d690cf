use std::collections::HashMap;

use glam::Vec3;

use crate::{
    core::{collider::Collider, rigidbody::RigidBody},
    utils::allocator::{Arena, EntityId},
};

/// Uniform grid spatial partitioning used by the broad-phase.
pub struct SpatialGrid {
    cell_size: f32,
    grid: HashMap<(i32, i32, i32), Vec<EntityId>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(f32::EPSILON),
            grid: HashMap::new(),
        }
    }

    fn world_to_grid(&self, pos: Vec3) -> (i32, i32, i32) {
        let cell = (pos / self.cell_size).floor();
        (cell.x as i32, cell.y as i32, cell.z as i32)
    }

    fn cells(&self, position: Vec3, radius: f32) -> impl Iterator<Item = (i32, i32, i32)> {
        let lo = self.world_to_grid(position - Vec3::splat(radius));
        let hi = self.world_to_grid(position + Vec3::splat(radius));
        (lo.0..=hi.0).flat_map(move |x| {
            (lo.1..=hi.1).flat_map(move |y| (lo.2..=hi.2).map(move |z| (x, y, z)))
        })
    }

    pub fn clear(&mut self) {
        self.grid.clear();
    }

    pub fn insert(&mut self, entity_id: EntityId, position: Vec3, radius: f32) {
        let cells: Vec<_> = self.cells(position, radius).collect();
        for cell in cells {
            self.grid.entry(cell).or_default().push(entity_id);
        }
    }

    /// Ids whose cells intersect the sphere's cell range, sorted and unique.
    pub fn query(&self, position: Vec3, radius: f32) -> Vec<EntityId> {
        let mut results: Vec<EntityId> = self
            .cells(position, radius)
            .filter_map(|cell| self.grid.get(&cell))
            .flatten()
            .copied()
            .collect();
        results.sort();
        results.dedup();
        results
    }
}

/// World-space bounding sphere of a collider, cached per refresh.
#[derive(Debug, Clone, Copy)]
pub struct ColliderBounds {
    pub center: Vec3,
    pub radius: f32,
}

/// Broad phase over engine colliders. Bounds are only as fresh as the last
/// [`BroadPhase::refresh`].
pub struct BroadPhase {
    grid: SpatialGrid,
    bounds: HashMap<EntityId, ColliderBounds>,
}

impl BroadPhase {
    pub fn new(cell_size: f32) -> Self {
        Self {
            grid: SpatialGrid::new(cell_size),
            bounds: HashMap::new(),
        }
    }

    pub fn refresh(&mut self, colliders: &Arena<Collider>, bodies: &Arena<RigidBody>) {
        self.grid.clear();
        self.bounds.clear();
        for (collider_id, collider) in colliders.iter() {
            let Some(body) = bodies.get(collider.rigidbody_id) else {
                continue;
            };
            let center = collider.world_transform(&body.transform).position;
            let radius = collider.bounding_radius();
            self.grid.insert(collider_id, center, radius);
            self.bounds
                .insert(collider_id, ColliderBounds { center, radius });
        }
    }

    pub fn bounds(&self, collider: EntityId) -> Option<ColliderBounds> {
        self.bounds.get(&collider).copied()
    }

    /// Colliders whose bounding spheres overlap `collider`'s, excluding itself.
    pub fn candidates(&self, collider: EntityId) -> Vec<EntityId> {
        let Some(own) = self.bounds(collider) else {
            return Vec::new();
        };
        self.grid
            .query(own.center, own.radius)
            .into_iter()
            .filter(|&other| other != collider)
            .filter(|other| {
                self.bounds(*other).is_some_and(|b| {
                    b.center.distance(own.center) <= b.radius + own.radius
                })
            })
            .collect()
    }
}
