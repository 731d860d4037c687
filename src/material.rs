use rand::Rng;

use crate::distributions::{random_unit_vector, CosineWeightedDistribution, SampleDistribution};
use crate::geometry::{reflect, refract, Fp, Ray, Vec3f, EPSILON};
use crate::scene::{HitRecord, Material, MaterialKind};

#[derive(Clone, Copy, Debug)]
pub struct Scatter {
    pub attenuation: Vec3f,
    pub ray: Ray,
}

/// Samples the continuation of `ray_in` at `hit`, or `None` when the path is
/// absorbed. `normal` is the shading normal chosen by the caller and faces
/// the incoming ray.
pub fn scatter<R: Rng + ?Sized>(
    material: &Material,
    ray_in: &Ray,
    hit: &HitRecord,
    normal: &Vec3f,
    rng: &mut R,
) -> Option<Scatter> {
    let origin = hit.point;
    match material.kind {
        MaterialKind::Diffuse => {
            let direction = CosineWeightedDistribution.sample(normal, rng);
            Some(Scatter {
                attenuation: material.albedo,
                ray: Ray::new(origin, direction),
            })
        }
        MaterialKind::Metal { fuzz } => {
            let reflected = reflect(&ray_in.direction.normalize(), normal);
            let direction = reflected + random_unit_vector(rng) * fuzz;
            if direction.dot(&hit.normal) <= 0.0 {
                return None;
            }
            Some(Scatter {
                attenuation: material.albedo,
                ray: Ray::new(origin, direction),
            })
        }
        MaterialKind::Dielectric { ior } => {
            let eta_ratio = if hit.front_face { 1.0 / ior } else { ior };
            let unit_direction = ray_in.direction.normalize();
            let cos_theta = (-unit_direction).dot(normal).min(1.0);
            let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
            let cannot_refract = eta_ratio * sin_theta > 1.0;
            let direction = if cannot_refract || reflectance(cos_theta, eta_ratio) > rng.gen::<Fp>() {
                reflect(&unit_direction, normal)
            } else {
                refract(&unit_direction, normal, eta_ratio)
            };
            // Refracted paths leave from the far side of the surface.
            let origin = if direction.dot(&hit.normal) < 0.0 {
                hit.point - hit.normal * EPSILON
            } else {
                hit.point
            };
            Some(Scatter {
                attenuation: material.albedo,
                ray: Ray::new(origin, direction),
            })
        }
    }
}

/// Schlick's approximation of the Fresnel reflectance.
pub fn reflectance(cosine: Fp, eta_ratio: Fp) -> Fp {
    let r0 = (1.0 - eta_ratio) / (1.0 + eta_ratio);
    let r0 = r0 * r0;
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}
