// src/panorama.rs
// Equirectangular HDR panorama: CPU-side storage, decoding, and the bilinear
// direction sampler the equirect projection kernel mirrors on the GPU.
// RELEVANT FILES: src/passes/equirect.rs, src/shaders/ibl_equirect.wgsl

use std::f32::consts::{PI, TAU};
use std::path::{Path, PathBuf};

use glam::Vec3;
use half::f16;

use crate::error::{PipelineError, PipelineResult};

/// Linear-radiance equirectangular image. Horizontal position maps to
/// azimuth, vertical position to elevation. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Panorama {
    width: u32,
    height: u32,
    texels: Vec<f32>,
    source: Option<PathBuf>,
}

impl Panorama {
    /// Decode an HDR file into linear RGB. Fails with
    /// [`PipelineError::Decode`] when the file is missing or corrupt.
    pub fn load<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let img = image::open(path)?;
        let rgb = img.to_rgb32f();
        let (width, height) = rgb.dimensions();
        let mut pano = Self::from_pixels(width, height, rgb.into_raw())?;
        pano.source = Some(path.to_path_buf());
        Ok(pano)
    }

    /// Wrap raw linear RGB samples (`width * height * 3` floats).
    pub fn from_pixels(width: u32, height: u32, texels: Vec<f32>) -> PipelineResult<Self> {
        if width == 0 || height == 0 {
            return Err(PipelineError::allocation(
                "panorama dimensions must be positive",
            ));
        }
        let expected = (width as usize) * (height as usize) * 3;
        if texels.len() != expected {
            return Err(PipelineError::allocation(format!(
                "panorama data length {} does not match {}x{}x3",
                texels.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            texels,
            source: None,
        })
    }

    /// Uniform-radiance panorama, the closed-form regression environment.
    pub fn constant(width: u32, height: u32, color: Vec3) -> Self {
        let mut texels = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            texels.extend_from_slice(&[color.x, color.y, color.z]);
        }
        Self {
            width,
            height,
            texels,
            source: None,
        }
    }

    /// Synthetic environment with a bright cap of angular radius
    /// `cap_radians` around `light_dir` over a dim constant background.
    pub fn directional_light(
        width: u32,
        height: u32,
        light_dir: Vec3,
        intensity: f32,
        cap_radians: f32,
    ) -> Self {
        let light = light_dir.normalize();
        let cos_cap = cap_radians.cos();
        let ambient = 0.1f32;
        let mut texels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            let theta = (y as f32 + 0.5) / height as f32 * PI;
            for x in 0..width {
                let phi = (x as f32 + 0.5) / width as f32 * TAU - PI;
                let dir = Vec3::new(
                    theta.sin() * phi.cos(),
                    theta.cos(),
                    theta.sin() * phi.sin(),
                );
                let radiance = if dir.dot(light) > cos_cap {
                    intensity
                } else {
                    ambient
                };
                texels.extend_from_slice(&[radiance, radiance, radiance]);
            }
        }
        Self {
            width,
            height,
            texels,
            source: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Vec3 {
        let idx = ((y * self.width + x) * 3) as usize;
        Vec3::new(self.texels[idx], self.texels[idx + 1], self.texels[idx + 2])
    }

    /// Bilinear radiance lookup for a direction, wrapping on the azimuthal
    /// axis and clamping at the poles. Matches the GPU sampler convention
    /// (texel centers at half-integer coordinates).
    pub fn sample_bilinear(&self, dir: Vec3) -> Vec3 {
        let d = dir.normalize();
        let theta = d.y.clamp(-1.0, 1.0).acos();
        let phi = d.z.atan2(d.x);
        let u = (phi + PI) / TAU;
        let v = theta / PI;

        let x = u * self.width as f32 - 0.5;
        let y = v * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let tx = x - x0;
        let ty = y - y0;

        let ix0 = (x0.rem_euclid(self.width as f32)) as u32 % self.width;
        let ix1 = ((x0 + 1.0).rem_euclid(self.width as f32)) as u32 % self.width;
        let iy0 = y0.clamp(0.0, (self.height - 1) as f32) as u32;
        let iy1 = (y0 + 1.0).clamp(0.0, (self.height - 1) as f32) as u32;

        let c00 = self.pixel(ix0, iy0);
        let c10 = self.pixel(ix1, iy0);
        let c01 = self.pixel(ix0, iy1);
        let c11 = self.pixel(ix1, iy1);

        let c0 = c00 * (1.0 - tx) + c10 * tx;
        let c1 = c01 * (1.0 - tx) + c11 * tx;
        c0 * (1.0 - ty) + c1 * ty
    }

    /// Widen linear RGB to RGBA16F bytes (alpha = 1) for texture upload.
    pub fn as_rgba_f16(&self) -> Vec<u8> {
        let pixel_count = (self.width * self.height) as usize;
        let mut out: Vec<u16> = Vec::with_capacity(pixel_count * 4);
        for idx in 0..pixel_count {
            let src = idx * 3;
            out.push(f16::from_f32(self.texels[src]).to_bits());
            out.push(f16::from_f32(self.texels[src + 1]).to_bits());
            out.push(f16::from_f32(self.texels[src + 2]).to_bits());
            out.push(f16::from_f32(1.0).to_bits());
        }
        bytemuck::cast_slice(&out).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_decode_error() {
        let err = Panorama::load("/nonexistent/environment.hdr").unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        assert!(Panorama::from_pixels(4, 4, vec![0.0; 10]).is_err());
        assert!(Panorama::from_pixels(0, 4, vec![]).is_err());
    }

    #[test]
    fn constant_panorama_samples_to_the_constant() {
        let env = Panorama::constant(16, 8, Vec3::new(1.0, 2.0, 3.0));
        for dir in [Vec3::X, Vec3::NEG_Y, Vec3::new(0.5, 0.5, -0.7).normalize()] {
            let c = env.sample_bilinear(dir);
            assert!((c - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
        }
    }

    #[test]
    fn spherical_round_trip_recovers_direction() {
        // direction -> (theta, phi) -> direction must be the identity up to
        // floating point, independent of the panorama contents.
        let dirs = [
            Vec3::new(0.8, 0.1, -0.5).normalize(),
            Vec3::new(-0.3, -0.9, 0.2).normalize(),
            Vec3::Z,
        ];
        for d in dirs {
            let theta = d.y.acos();
            let phi = d.z.atan2(d.x);
            let back = Vec3::new(
                theta.sin() * phi.cos(),
                theta.cos(),
                theta.sin() * phi.sin(),
            );
            assert!((back - d).length() < 1e-5);
        }
    }

    #[test]
    fn azimuth_wraps_and_poles_clamp() {
        let mut texels = vec![0.0f32; 4 * 2 * 3];
        // left column bright red, rest dark
        texels[0] = 8.0;
        texels[4 * 3] = 8.0;
        let env = Panorama::from_pixels(4, 2, texels).unwrap();
        // Sampling just across the seam must blend with the wrapped column,
        // not clamp to the right edge.
        let seam = env.sample_bilinear(Vec3::new(-1.0, 0.0, -1e-3).normalize());
        assert!(seam.x > 0.0);
        // Poles stay finite.
        let pole = env.sample_bilinear(Vec3::Y);
        assert!(pole.x.is_finite());
    }

    #[test]
    fn rgba_f16_widening_sets_alpha_one() {
        let env = Panorama::constant(2, 1, Vec3::splat(0.5));
        let bytes = env.as_rgba_f16();
        assert_eq!(bytes.len(), 2 * 1 * 4 * 2);
        let halves: &[u16] = bytemuck::cast_slice(&bytes);
        assert_eq!(f16::from_bits(halves[3]).to_f32(), 1.0);
        assert!((f16::from_bits(halves[0]).to_f32() - 0.5).abs() < 1e-3);
    }
}
