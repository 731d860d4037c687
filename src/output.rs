//! Display-side conversion of the accumulated radiance and image dumps.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::{ImageFormat, ImageResult, Rgb, RgbImage};
use log::info;

use crate::accumulation::AccumulationBuffer;
use crate::geometry::Fp;

/// sRGB transfer curve with the linear toe for dark values.
pub fn linear_to_srgb(linear: Fp) -> Fp {
    let linear = linear.clamp(0.0, 1.0);
    if linear <= 0.0031308 {
        12.92 * linear
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    }
}

fn to_u8(linear: Fp) -> u8 {
    (linear_to_srgb(linear) * 255.0).round() as u8
}

/// Clamps and gamma-encodes the running means into an 8-bit image.
pub fn tone_map(buffer: &AccumulationBuffer) -> RgbImage {
    RgbImage::from_fn(buffer.width(), buffer.height(), |x, y| {
        let p = buffer.pixel(x, y);
        Rgb([to_u8(p.x), to_u8(p.y), to_u8(p.z)])
    })
}

pub fn write_ppm<W: Write>(image: &RgbImage, out: &mut W) -> std::io::Result<()> {
    out.write_all(b"P6\n")?;
    out.write_all(format!("{} {}\n", image.width(), image.height()).as_bytes())?;
    out.write_all(b"255\n")?;
    out.write_all(image.as_raw())?;
    Ok(())
}

/// Writes `.ppm` by hand, anything else through `image` by extension.
pub fn save_image(buffer: &AccumulationBuffer, path: &Path) -> ImageResult<()> {
    let image = tone_map(buffer);
    match path.extension().and_then(|e| e.to_str()) {
        Some("ppm") => {
            let mut out = BufWriter::new(File::create(path)?);
            write_ppm(&image, &mut out)?;
            out.flush()?;
        }
        Some(_) => image.save(path)?,
        None => image.save_with_format(path, ImageFormat::Png)?,
    }
    info!("image saved as {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec4f;

    #[test]
    fn transfer_curve_endpoints() {
        assert_eq!(linear_to_srgb(0.0), 0.0);
        assert!((linear_to_srgb(1.0) - 1.0).abs() < 1e-6);
        assert!((linear_to_srgb(7.5) - 1.0).abs() < 1e-6);
        assert!(linear_to_srgb(0.2) > 0.2);
    }

    #[test]
    fn tone_map_clamps_unbounded_radiance() {
        let mut buffer = AccumulationBuffer::new(2, 1);
        let (image, _) = buffer.lanes_mut();
        image[0] = Vec4f::new(12.0, -1.0, 0.5, 1.0);
        let ldr = tone_map(&buffer);
        assert_eq!(ldr.get_pixel(0, 0).0[..2], [255, 0]);
        assert_eq!(ldr.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn ppm_header_and_payload() {
        let image = RgbImage::from_pixel(3, 2, Rgb([1, 2, 3]));
        let mut out = Vec::new();
        write_ppm(&image, &mut out).unwrap();
        let header = b"P6\n3 2\n255\n";
        assert_eq!(&out[..header.len()], header);
        assert_eq!(out.len(), header.len() + 3 * 2 * 3);
    }
}
