use rand::Rng;
use rand_distr::{Distribution, UnitDisc, UnitSphere};

use crate::geometry::{Fp, Vec3f};
use crate::utils::wrap_unit;

pub trait SampleDistribution {
    fn sample<R: Rng + ?Sized>(&self, normal: &Vec3f, rng: &mut R) -> Vec3f;
    fn pdf(&self, normal: &Vec3f, direction: &Vec3f) -> Fp;
}

pub struct CosineWeightedDistribution;

impl SampleDistribution for CosineWeightedDistribution {
    fn sample<R: Rng + ?Sized>(&self, normal: &Vec3f, rng: &mut R) -> Vec3f {
        let direction = normal + random_unit_vector(rng);
        // Unit vector almost opposite to the normal.
        if direction.norm_squared() < 1e-8 {
            *normal
        } else {
            direction.normalize()
        }
    }

    fn pdf(&self, normal: &Vec3f, direction: &Vec3f) -> Fp {
        Fp::max(0.0, direction.normalize().dot(normal)) / std::f32::consts::PI
    }
}

pub fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> Vec3f {
    let [x, y, z]: [Fp; 3] = UnitSphere.sample(rng);
    Vec3f::new(x, y, z)
}

pub fn random_in_unit_disk<R: Rng + ?Sized>(rng: &mut R) -> (Fp, Fp) {
    let [x, y]: [Fp; 2] = UnitDisc.sample(rng);
    (x, y)
}

/// Sub-pixel offset in `[-0.5, 0.5)`. The per-pixel generator supplies the
/// randomness; the frame seed only shifts the pattern.
pub fn pixel_jitter<R: Rng + ?Sized>(rng: &mut R, seed: (Fp, Fp)) -> (Fp, Fp) {
    let x = wrap_unit(rng.gen::<Fp>() + seed.0) - 0.5;
    let y = wrap_unit(rng.gen::<Fp>() + seed.1) - 0.5;
    (x, y)
}
