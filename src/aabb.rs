use crate::geometry::{Fp, Ray, Vec3f, FP_INF, FP_NEG_INF};

/// Direction components below this magnitude are treated as parallel to the slab.
const PARALLEL_EPS: Fp = 1e-8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3f,
    pub max: Vec3f,
}

impl Default for Aabb {
    fn default() -> Self {
        Aabb {
            min: Vec3f::new(FP_INF, FP_INF, FP_INF),
            max: Vec3f::new(FP_NEG_INF, FP_NEG_INF, FP_NEG_INF),
        }
    }
}

impl Aabb {
    pub fn new(min: Vec3f, max: Vec3f) -> Aabb {
        Aabb { min, max }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3f>) -> Aabb {
        points
            .into_iter()
            .fold(Aabb::default(), |aabb, p| aabb.extend_point(p))
    }

    pub fn extend_point(&self, point: &Vec3f) -> Aabb {
        Aabb {
            min: self.min.inf(point),
            max: self.max.sup(point),
        }
    }

    pub fn extend_aabb(&self, aabb: &Aabb) -> Aabb {
        Aabb {
            min: self.min.inf(&aabb.min),
            max: self.max.sup(&aabb.max),
        }
    }

    /// True for the default (inverted) box that contains nothing.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }

    pub fn centroid(&self) -> Vec3f {
        (self.min + self.max) * 0.5
    }

    pub fn longest_axis(&self) -> usize {
        let diff = self.max - self.min;
        if diff.x >= diff.y && diff.x >= diff.z {
            0
        } else if diff.y >= diff.z {
            1
        } else {
            2
        }
    }

    pub fn contains(&self, aabb: &Aabb) -> bool {
        for coord in 0..3 {
            if aabb.min[coord] < self.min[coord] {
                return false;
            }
            if aabb.max[coord] > self.max[coord] {
                return false;
            }
        }
        true
    }

    /// Slab test against `[t_min, t_max]`, returning the entry distance.
    ///
    /// Axes the ray runs parallel to are decided by the origin alone, so no
    /// division by a vanishing direction component happens. Zero-extent
    /// boxes are still hit when the ray crosses them.
    pub fn hit(&self, ray: &Ray, t_min: Fp, t_max: Fp) -> Option<Fp> {
        if self.is_empty() {
            return None;
        }
        let mut t_enter = t_min;
        let mut t_exit = t_max;
        for axis in 0..3 {
            let origin = ray.origin[axis];
            let direction = ray.direction[axis];
            if direction.abs() < PARALLEL_EPS {
                if origin < self.min[axis] || origin > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / direction;
            let mut near = (self.min[axis] - origin) * inv;
            let mut far = (self.max[axis] - origin) * inv;
            if near > far {
                std::mem::swap(&mut near, &mut far);
            }
            t_enter = t_enter.max(near);
            t_exit = t_exit.min(far);
            if t_exit < t_enter {
                return None;
            }
        }
        Some(t_enter)
    }

    pub fn corners(&self) -> [Vec3f; 8] {
        let mut result = [Vec3f::zeros(); 8];
        for (i, corner) in result.iter_mut().enumerate() {
            *corner = Vec3f::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
        }
        result
    }

    /// The 12 box edges as line segments, for wireframe overlays.
    pub fn edges(&self) -> [[Vec3f; 2]; 12] {
        const EDGES: [(usize, usize); 12] = [
            (0, 1),
            (2, 3),
            (4, 5),
            (6, 7),
            (0, 2),
            (1, 3),
            (4, 6),
            (5, 7),
            (0, 4),
            (1, 5),
            (2, 6),
            (3, 7),
        ];
        let corners = self.corners();
        EDGES.map(|(a, b)| [corners[a], corners[b]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::new(Vec3f::new(-1.0, -1.0, -1.0), Vec3f::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn slab_hit_reports_entry_distance() {
        let ray = Ray::new(Vec3f::new(0.0, 0.0, 5.0), Vec3f::new(0.0, 0.0, -1.0));
        let t = unit_box().hit(&ray, 0.0, FP_INF).unwrap();
        assert!((t - 4.0).abs() < 1e-6);
    }

    #[test]
    fn parallel_rays_do_not_divide_by_zero() {
        let inside_slab = Ray::new(Vec3f::new(0.5, 0.5, 5.0), Vec3f::new(0.0, 0.0, -1.0));
        assert!(unit_box().hit(&inside_slab, 0.0, FP_INF).is_some());
        let outside_slab = Ray::new(Vec3f::new(1.5, 0.5, 5.0), Vec3f::new(0.0, 0.0, -1.0));
        assert!(unit_box().hit(&outside_slab, 0.0, FP_INF).is_none());
    }

    #[test]
    fn ray_pointing_away_misses() {
        let ray = Ray::new(Vec3f::new(0.0, 0.0, 5.0), Vec3f::new(0.0, 0.0, 1.0));
        assert!(unit_box().hit(&ray, 0.0, FP_INF).is_none());
    }

    #[test]
    fn flat_box_is_hit_and_empty_box_is_not() {
        let flat = Aabb::new(Vec3f::new(-1.0, 0.0, -1.0), Vec3f::new(1.0, 0.0, 1.0));
        let ray = Ray::new(Vec3f::new(0.0, 3.0, 0.0), Vec3f::new(0.0, -1.0, 0.0));
        assert!(flat.hit(&ray, 0.0, FP_INF).is_some());
        assert!(Aabb::default().hit(&ray, 0.0, FP_INF).is_none());
    }

    #[test]
    fn extend_and_contains() {
        let a = Aabb::from_points(&[Vec3f::new(0.0, 0.0, 0.0), Vec3f::new(1.0, 2.0, 3.0)]);
        let b = a.extend_point(&Vec3f::new(-1.0, 0.0, 0.0));
        assert!(b.contains(&a));
        assert!(!a.contains(&b));
        assert_eq!(b.longest_axis(), 2);
        assert_eq!(unit_box().edges().len(), 12);
    }
}
