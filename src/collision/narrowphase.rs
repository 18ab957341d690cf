use glam::{Mat3, Vec3};

use crate::core::{collider::ColliderShape, types::Transform};

/// Exact shape-pair overlap tests and point queries.
pub struct NarrowPhase;

const CLOSEST_POINT_ITERATIONS: usize = 6;

impl NarrowPhase {
    /// Signed distance from `point` to the surface of `shape` posed at
    /// `transform` (negative inside).
    pub fn signed_distance(shape: &ColliderShape, transform: &Transform, point: Vec3) -> f32 {
        let local = transform.inverse_transform_point(point);
        match shape {
            ColliderShape::Sphere { radius } => local.length() - radius,
            ColliderShape::Box { half_extents } => {
                let q = local.abs() - *half_extents;
                q.max(Vec3::ZERO).length() + q.max_element().min(0.0)
            }
            ColliderShape::Capsule {
                radius,
                half_height,
            } => {
                let axis_point = Vec3::new(0.0, 0.0, local.z.clamp(-half_height, *half_height));
                local.distance(axis_point) - radius
            }
        }
    }

    /// Outward surface normal at the point closest to `point`.
    pub fn surface_normal(shape: &ColliderShape, transform: &Transform, point: Vec3) -> Vec3 {
        const H: f32 = 1e-4;
        let d = |offset: Vec3| Self::signed_distance(shape, transform, point + offset);
        let gradient = Vec3::new(
            d(Vec3::X * H) - d(-Vec3::X * H),
            d(Vec3::Y * H) - d(-Vec3::Y * H),
            d(Vec3::Z * H) - d(-Vec3::Z * H),
        );
        gradient.normalize_or(transform.rotation * Vec3::Z)
    }

    /// Closest point of the (solid) shape to `point`.
    pub fn closest_point(shape: &ColliderShape, transform: &Transform, point: Vec3) -> Vec3 {
        let local = transform.inverse_transform_point(point);
        let closest = match shape {
            ColliderShape::Sphere { radius } => {
                if local.length() <= *radius {
                    local
                } else {
                    local.normalize() * *radius
                }
            }
            ColliderShape::Box { half_extents } => local.clamp(-*half_extents, *half_extents),
            ColliderShape::Capsule {
                radius,
                half_height,
            } => {
                let axis_point = Vec3::new(0.0, 0.0, local.z.clamp(-half_height, *half_height));
                let offset = local - axis_point;
                if offset.length() <= *radius {
                    local
                } else {
                    axis_point + offset.normalize() * *radius
                }
            }
        };
        transform.transform_point(closest)
    }

    /// True when the two posed shapes touch or interpenetrate.
    pub fn overlaps(
        shape_a: &ColliderShape,
        transform_a: &Transform,
        shape_b: &ColliderShape,
        transform_b: &Transform,
    ) -> bool {
        use ColliderShape::*;
        match (shape_a, shape_b) {
            (Sphere { radius }, other) => {
                Self::signed_distance(other, transform_b, transform_a.position) <= *radius
            }
            (other, Sphere { radius }) => {
                Self::signed_distance(other, transform_a, transform_b.position) <= *radius
            }
            (Box { half_extents: ha }, Box { half_extents: hb }) => {
                Self::box_box(*ha, transform_a, *hb, transform_b)
            }
            (
                Capsule {
                    radius: ra,
                    half_height: la,
                },
                Capsule {
                    radius: rb,
                    half_height: lb,
                },
            ) => {
                let (a0, a1) = Self::capsule_segment(*la, transform_a);
                let (b0, b1) = Self::capsule_segment(*lb, transform_b);
                let (p, q) = Self::closest_points_segments(a0, a1, b0, b1);
                p.distance(q) <= ra + rb
            }
            (
                Capsule {
                    radius,
                    half_height,
                },
                other @ Box { .. },
            ) => Self::capsule_shape(*radius, *half_height, transform_a, other, transform_b),
            (
                other @ Box { .. },
                Capsule {
                    radius,
                    half_height,
                },
            ) => Self::capsule_shape(*radius, *half_height, transform_b, other, transform_a),
        }
    }

    fn capsule_segment(half_height: f32, transform: &Transform) -> (Vec3, Vec3) {
        (
            transform.transform_point(Vec3::new(0.0, 0.0, -half_height)),
            transform.transform_point(Vec3::new(0.0, 0.0, half_height)),
        )
    }

    /// Alternating projection between the capsule axis and the convex shape.
    fn capsule_shape(
        radius: f32,
        half_height: f32,
        capsule: &Transform,
        shape: &ColliderShape,
        transform: &Transform,
    ) -> bool {
        let (a, b) = Self::capsule_segment(half_height, capsule);
        let mut on_axis = Self::closest_point_on_segment(a, b, transform.position);
        for _ in 0..CLOSEST_POINT_ITERATIONS {
            let on_shape = Self::closest_point(shape, transform, on_axis);
            on_axis = Self::closest_point_on_segment(a, b, on_shape);
        }
        Self::signed_distance(shape, transform, on_axis) <= radius
    }

    pub fn closest_point_on_segment(a: Vec3, b: Vec3, p: Vec3) -> Vec3 {
        let ab = b - a;
        let len2 = ab.length_squared();
        if len2 <= f32::EPSILON {
            return a;
        }
        a + ab * ((p - a).dot(ab) / len2).clamp(0.0, 1.0)
    }

    /// Closest points between segments `p0p1` and `q0q1`.
    pub fn closest_points_segments(p0: Vec3, p1: Vec3, q0: Vec3, q1: Vec3) -> (Vec3, Vec3) {
        let d1 = p1 - p0;
        let d2 = q1 - q0;
        let r = p0 - q0;
        let a = d1.length_squared();
        let e = d2.length_squared();
        let f = d2.dot(r);

        if a <= f32::EPSILON && e <= f32::EPSILON {
            return (p0, q0);
        }
        let (s, t) = if a <= f32::EPSILON {
            (0.0, (f / e).clamp(0.0, 1.0))
        } else {
            let c = d1.dot(r);
            if e <= f32::EPSILON {
                ((-c / a).clamp(0.0, 1.0), 0.0)
            } else {
                let b = d1.dot(d2);
                let denom = a * e - b * b;
                let mut s = if denom > f32::EPSILON {
                    ((b * f - c * e) / denom).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let mut t = (b * s + f) / e;
                if t < 0.0 {
                    t = 0.0;
                    s = (-c / a).clamp(0.0, 1.0);
                } else if t > 1.0 {
                    t = 1.0;
                    s = ((b - c) / a).clamp(0.0, 1.0);
                }
                (s, t)
            }
        };
        (p0 + d1 * s, q0 + d2 * t)
    }

    /// Separating-axis test for two oriented boxes.
    fn box_box(ha: Vec3, ta: &Transform, hb: Vec3, tb: &Transform) -> bool {
        let axes_a = Mat3::from_quat(ta.rotation);
        let axes_b = Mat3::from_quat(tb.rotation);
        let between = tb.position - ta.position;

        let project = |axes: &Mat3, half: Vec3, axis: Vec3| -> f32 {
            half.x * axes.x_axis.dot(axis).abs()
                + half.y * axes.y_axis.dot(axis).abs()
                + half.z * axes.z_axis.dot(axis).abs()
        };

        let mut axes = Vec::with_capacity(15);
        for i in 0..3 {
            axes.push(axes_a.col(i));
            axes.push(axes_b.col(i));
        }
        for i in 0..3 {
            for j in 0..3 {
                let cross = axes_a.col(i).cross(axes_b.col(j));
                if cross.length_squared() > 1e-8 {
                    axes.push(cross.normalize());
                }
            }
        }

        axes.into_iter().all(|axis| {
            let distance = between.dot(axis).abs();
            distance <= project(&axes_a, ha, axis) + project(&axes_b, hb, axis)
        })
    }
}
