//! Small numeric helpers layered on top of `glam`.

use glam::{Quat, Vec3};

/// Euclidean distance between two joint-space configurations.
///
/// Vectors of different length are compared over their common prefix.
pub fn joint_space_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Index of the element with the smallest key. Ties keep the earliest element.
pub fn argmin_by<T>(items: &[T], mut key: impl FnMut(&T) -> f32) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, item) in items.iter().enumerate() {
        let value = key(item);
        match best {
            Some((_, current)) if value >= current => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

/// Signed rotation angle of `rotation` about the unit `axis` (swing-twist
/// decomposition, twist part only).
pub fn twist_angle(rotation: Quat, axis: Vec3) -> f32 {
    let projected = Vec3::new(rotation.x, rotation.y, rotation.z).dot(axis);
    2.0 * projected.atan2(rotation.w)
}

/// Rotation vector (axis * angle) taking `from` onto `to`, shortest path.
/// Stays accurate for small angles, where `acos`-based extraction does not.
pub fn rotation_error(from: Quat, to: Quat) -> Vec3 {
    let mut delta = to * from.conjugate();
    if delta.w < 0.0 {
        delta = -delta;
    }
    let v = Vec3::new(delta.x, delta.y, delta.z);
    let sin_half = v.length();
    if sin_half < 1e-9 {
        return v * 2.0;
    }
    v * (2.0 * sin_half.atan2(delta.w) / sin_half)
}
