use rand::SeedableRng;
use rand_xoshiro::Xoshiro128PlusPlus;

use crate::geometry::{Fp, Vec4f};

pub type PixelRng = Xoshiro128PlusPlus;

/// Per-pixel running radiance means (linear RGBA, unclamped) and the
/// generator state each pixel lane draws from. Generators are seeded from
/// the pixel index once, when the buffer is allocated, and advance in place
/// across frames.
#[derive(Clone, Debug)]
pub struct AccumulationBuffer {
    width: u32,
    height: u32,
    image: Vec<Vec4f>,
    rng_states: Vec<PixelRng>,
}

impl AccumulationBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        AccumulationBuffer {
            width,
            height,
            image: vec![Vec4f::zeros(); len],
            rng_states: (0..len as u64).map(PixelRng::seed_from_u64).collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.image.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }

    /// Read-only view handed to the display stage.
    pub fn image(&self) -> &[Vec4f] {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Vec4f {
        self.image[y as usize * self.width as usize + x as usize]
    }

    /// Zeroes every running mean. Generator states are kept so the next
    /// series does not replay the previous noise.
    pub fn clear(&mut self) {
        self.image.fill(Vec4f::zeros());
    }

    pub fn lanes_mut(&mut self) -> (&mut [Vec4f], &mut [PixelRng]) {
        (&mut self.image, &mut self.rng_states)
    }
}

/// Running-mean update for the sample with 1-based index `sample_count`:
/// `avg + (sample - avg) / sample_count`.
pub fn blend_running_mean(average: &Vec4f, sample: &Vec4f, sample_count: u32) -> Vec4f {
    if sample_count == 0 {
        return *average;
    }
    average + (sample - average) / sample_count as Fp
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn running_mean_matches_arithmetic_mean() {
        let samples = [1.0, 3.0, 8.0, -2.0, 5.0];
        let mut avg = Vec4f::zeros();
        for (i, s) in samples.iter().enumerate() {
            avg = blend_running_mean(&avg, &Vec4f::new(*s, 0.0, 0.0, 1.0), i as u32 + 1);
        }
        let expected = samples.iter().sum::<Fp>() / samples.len() as Fp;
        assert!((avg.x - expected).abs() < 1e-5);
        assert!((avg.w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn first_sample_overwrites_stale_average() {
        let stale = Vec4f::new(9.0, 9.0, 9.0, 1.0);
        let sample = Vec4f::new(0.5, 0.25, 0.0, 1.0);
        assert_eq!(blend_running_mean(&stale, &sample, 1), sample);
    }

    #[test]
    fn zero_samples_leave_average_unchanged() {
        let avg = Vec4f::new(0.3, 0.2, 0.1, 1.0);
        assert_eq!(blend_running_mean(&avg, &Vec4f::new(5.0, 5.0, 5.0, 1.0), 0), avg);
    }

    #[test]
    fn clear_keeps_generators_advancing() {
        let mut buffer = AccumulationBuffer::new(4, 2);
        let first = {
            let (_, rngs) = buffer.lanes_mut();
            rngs[3].gen::<u32>()
        };
        let (image, _) = buffer.lanes_mut();
        image[3] = Vec4f::new(1.0, 1.0, 1.0, 1.0);
        buffer.clear();
        assert!(buffer.image().iter().all(|p| *p == Vec4f::zeros()));
        let (_, rngs) = buffer.lanes_mut();
        let fresh = PixelRng::seed_from_u64(3).gen::<u32>();
        assert_eq!(first, fresh);
        assert_ne!(rngs[3].gen::<u32>(), first);
    }
}
