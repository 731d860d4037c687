//! Path-tracing kernel: one stochastic radiance sample per pixel per frame.

use rand::Rng;

use crate::accumulation::PixelRng;
use crate::camera::{Camera, CameraBasis};
use crate::distributions::{pixel_jitter, random_in_unit_disk};
use crate::geometry::{Fp, Ray, Vec3f, Vec4f, EPSILON, FP_INF};
use crate::material::scatter;
use crate::scene::Scene;

/// Per-frame parameters shared by every pixel lane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameUniforms {
    pub seed: [Fp; 3],
    /// Samples already accumulated before this frame.
    pub frame_counter: u32,
    pub max_bounces: u32,
    pub flat_shading: bool,
    pub debug_normals: bool,
}

impl FrameUniforms {
    /// 1-based index of the sample this frame contributes.
    pub fn sample_count(&self) -> u32 {
        self.frame_counter + 1
    }
}

/// Work executed once per pixel by the device.
pub trait PixelKernel: Sync {
    fn shade(&self, x: u32, y: u32, rng: &mut PixelRng) -> Vec4f;
}

pub struct PathTracer<'a> {
    scene: &'a Scene,
    basis: CameraBasis,
    uniforms: FrameUniforms,
}

impl<'a> PathTracer<'a> {
    pub fn new(scene: &'a Scene, camera: &Camera, width: u32, height: u32, uniforms: FrameUniforms) -> Self {
        PathTracer {
            scene,
            basis: CameraBasis::new(camera, width, height),
            uniforms,
        }
    }

    pub fn trace<R: Rng + ?Sized>(&self, x: u32, y: u32, rng: &mut R) -> Vec3f {
        let seed = self.uniforms.seed;
        let jitter = pixel_jitter(rng, (seed[0], seed[1]));
        let disk = random_in_unit_disk(rng);
        let ray = self.basis.get_ray(x, y, jitter, disk);
        if self.uniforms.debug_normals {
            self.normal_color(&ray)
        } else {
            self.ray_color(ray, rng)
        }
    }

    fn normal_color(&self, ray: &Ray) -> Vec3f {
        match self.scene.intersect(ray, EPSILON, FP_INF) {
            Some(hit) => {
                let normal = hit.surface_normal(self.uniforms.flat_shading);
                (normal + Vec3f::new(1.0, 1.0, 1.0)) * 0.5
            }
            None => sky_color(&ray.direction),
        }
    }

    // The bounce cap ends the path without further radiance.
    fn ray_color<R: Rng + ?Sized>(&self, mut ray: Ray, rng: &mut R) -> Vec3f {
        let mut radiance = Vec3f::zeros();
        let mut throughput = Vec3f::new(1.0, 1.0, 1.0);
        for _ in 0..self.uniforms.max_bounces {
            let Some(hit) = self.scene.intersect(&ray, EPSILON, FP_INF) else {
                radiance += throughput.component_mul(&sky_color(&ray.direction));
                break;
            };
            let material = self.scene.material(hit.material);
            radiance += throughput.component_mul(&material.emission);
            let normal = hit.surface_normal(self.uniforms.flat_shading);
            match scatter(material, &ray, &hit, &normal, rng) {
                Some(scattered) => {
                    throughput = throughput.component_mul(&scattered.attenuation);
                    ray = scattered.ray;
                }
                None => break,
            }
        }
        radiance
    }
}

impl PixelKernel for PathTracer<'_> {
    fn shade(&self, x: u32, y: u32, rng: &mut PixelRng) -> Vec4f {
        let color = self.trace(x, y, rng);
        Vec4f::new(color.x, color.y, color.z, 1.0)
    }
}

/// Environment radiance: a vertical white-to-blue gradient.
pub fn sky_color(direction: &Vec3f) -> Vec3f {
    let unit = direction.try_normalize(Fp::EPSILON).unwrap_or_else(Vec3f::zeros);
    let a = 0.5 * (unit.y + 1.0);
    Vec3f::new(1.0, 1.0, 1.0) * (1.0 - a) + Vec3f::new(0.5, 0.7, 1.0) * a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Material, SceneBuilder, Triangle};
    use rand::SeedableRng;

    fn single_quad_scene(material: Material) -> Scene {
        let mut builder = SceneBuilder::new();
        let m = builder.add_material(material);
        let a = Vec3f::new(-1.0, -1.0, 0.0);
        let b = Vec3f::new(1.0, -1.0, 0.0);
        let c = Vec3f::new(1.0, 1.0, 0.0);
        let d = Vec3f::new(-1.0, 1.0, 0.0);
        builder.add_mesh("quad", vec![Triangle::new([a, b, c], m), Triangle::new([a, c, d], m)]);
        builder.build().unwrap()
    }

    fn uniforms(max_bounces: u32, debug_normals: bool) -> FrameUniforms {
        FrameUniforms {
            seed: [0.25, 0.5, 0.75],
            frame_counter: 0,
            max_bounces,
            flat_shading: false,
            debug_normals,
        }
    }

    #[test]
    fn debug_normals_visualise_facing_normal() {
        let scene = single_quad_scene(Material::diffuse(Vec3f::new(0.5, 0.5, 0.5)));
        let camera = Camera::new(Vec3f::new(0.0, 0.0, 3.0), Vec3f::zeros(), 20.0, 1.0);
        let tracer = PathTracer::new(&scene, &camera, 8, 8, uniforms(4, true));
        let mut rng = PixelRng::seed_from_u64(1);
        let color = tracer.trace(4, 4, &mut rng);
        assert!((color - Vec3f::new(0.5, 0.5, 1.0)).norm() < 1e-4);
    }

    #[test]
    fn emissive_surface_is_seen_directly() {
        let scene = single_quad_scene(Material::emissive(Vec3f::new(2.0, 3.0, 4.0)));
        let camera = Camera::new(Vec3f::new(0.0, 0.0, 3.0), Vec3f::zeros(), 20.0, 1.0);
        let tracer = PathTracer::new(&scene, &camera, 8, 8, uniforms(1, false));
        let mut rng = PixelRng::seed_from_u64(2);
        let color = tracer.trace(4, 4, &mut rng);
        assert!((color - Vec3f::new(2.0, 3.0, 4.0)).norm() < 1e-5);
    }

    #[test]
    fn zero_bounces_gather_nothing() {
        let scene = single_quad_scene(Material::diffuse(Vec3f::new(0.5, 0.5, 0.5)));
        let camera = Camera::new(Vec3f::new(0.0, 0.0, 3.0), Vec3f::zeros(), 20.0, 1.0);
        let tracer = PathTracer::new(&scene, &camera, 8, 8, uniforms(0, false));
        let mut rng = PixelRng::seed_from_u64(3);
        assert_eq!(tracer.trace(4, 4, &mut rng), Vec3f::zeros());
    }

    #[test]
    fn missed_rays_return_sky() {
        let scene = single_quad_scene(Material::diffuse(Vec3f::new(0.5, 0.5, 0.5)));
        let camera = Camera::new(Vec3f::new(0.0, 0.0, 3.0), Vec3f::new(0.0, 0.0, 6.0), 20.0, 1.0);
        let tracer = PathTracer::new(&scene, &camera, 8, 8, uniforms(8, false));
        let mut rng = PixelRng::seed_from_u64(4);
        let color = tracer.trace(4, 4, &mut rng);
        assert!((color - sky_color(&Vec3f::new(0.0, 0.0, 1.0))).norm() < 0.05);
    }
}
