use nalgebra::{Vector3, Vector4};

use crate::utils::safe_sqrt;

pub type Fp = f32;
pub type Vec3f = Vector3<Fp>;
pub type Vec4f = Vector4<Fp>;

/// Offset used as `t_min` of secondary rays and as the near-zero threshold.
pub const EPSILON: Fp = 0.001;
pub const FP_INF: Fp = Fp::INFINITY;
pub const FP_NEG_INF: Fp = Fp::NEG_INFINITY;

/// A ray. The direction is not required to be normalized, so `t` is measured
/// in multiples of `direction`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3f,
    pub direction: Vec3f,
}

impl Ray {
    pub fn new(origin: Vec3f, direction: Vec3f) -> Self {
        Ray { origin, direction }
    }

    pub fn at(&self, t: Fp) -> Vec3f {
        self.origin + self.direction * t
    }
}

/// Barycentric result of a ray/triangle test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriangleHit {
    pub t: Fp,
    pub u: Fp,
    pub v: Fp,
}

/// Möller–Trumbore ray/triangle test in the closed interval `[t_min, t_max]`.
///
/// Zero-area triangles and rays parallel to the triangle plane never hit.
pub fn intersect_triangle(
    ray: &Ray,
    vertices: &[Vec3f; 3],
    t_min: Fp,
    t_max: Fp,
) -> Option<TriangleHit> {
    let [a, b, c] = vertices;
    let edge1 = b - a;
    let edge2 = c - a;
    let area2 = edge1.cross(&edge2).norm_squared();
    if area2 <= Fp::MIN_POSITIVE {
        return None;
    }

    let p = ray.direction.cross(&edge2);
    let det = edge1.dot(&p);
    let scale = edge1.norm() * edge2.norm() * ray.direction.norm();
    if det.abs() <= Fp::EPSILON * scale {
        return None;
    }
    let inv_det = 1.0 / det;

    let s = ray.origin - a;
    let u = s.dot(&p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&edge1);
    let v = ray.direction.dot(&q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(&q) * inv_det;
    if (t_min..=t_max).contains(&t) {
        Some(TriangleHit { t, u, v })
    } else {
        None
    }
}

pub fn reflect(v: &Vec3f, normal: &Vec3f) -> Vec3f {
    let projection = -v.dot(normal);
    v + normal * projection * 2.0
}

/// Snell refraction of the unit vector `uv` through a surface with unit
/// normal `normal` facing the incoming side.
pub fn refract(uv: &Vec3f, normal: &Vec3f, eta_ratio: Fp) -> Vec3f {
    let cos_theta = (-uv).dot(normal).min(1.0);
    let r_out_perp = (uv + normal * cos_theta) * eta_ratio;
    let r_out_parallel = normal * -safe_sqrt(1.0 - r_out_perp.norm_squared());
    r_out_perp + r_out_parallel
}
