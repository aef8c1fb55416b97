// src/sampling.rs
// CPU reference for the integral approximations the compute kernels run on
// the GPU: Hammersley sequencing, GGX importance sampling, the Smith
// split-sum BRDF integral. The WGSL kernels mirror these functions texel for
// texel; the tests here pin the numerical properties both sides must satisfy.

use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};

use crate::panorama::Panorama;

/// Van der Corput radical inverse in base 2.
pub fn radical_inverse_vdc(bits: u32) -> f32 {
    let mut b = bits;
    b = (b << 16) | (b >> 16);
    b = ((b & 0x5555_5555) << 1) | ((b & 0xAAAA_AAAA) >> 1);
    b = ((b & 0x3333_3333) << 2) | ((b & 0xCCCC_CCCC) >> 2);
    b = ((b & 0x0F0F_0F0F) << 4) | ((b & 0xF0F0_F0F0) >> 4);
    b = ((b & 0x00FF_00FF) << 8) | ((b & 0xFF00_FF00) >> 8);
    (b as f32) * 2.328_306_4e-10
}

/// Low-discrepancy point `i` of an `n`-point Hammersley set.
pub fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, radical_inverse_vdc(i))
}

/// Orthonormal-frame rotation of a tangent-space vector around `normal`.
pub fn tangent_to_world(normal: Vec3, v: Vec3) -> Vec3 {
    let up = if normal.z.abs() < 0.999 {
        Vec3::Z
    } else {
        Vec3::X
    };
    let tangent = up.cross(normal).normalize();
    let bitangent = normal.cross(tangent);
    tangent * v.x + bitangent * v.y + normal * v.z
}

/// Cosine-weighted hemisphere sample around `normal`.
pub fn cosine_sample_hemisphere(normal: Vec3, xi: Vec2) -> Vec3 {
    let r = xi.x.sqrt();
    let phi = TAU * xi.y;
    let x = r * phi.cos();
    let y = r * phi.sin();
    let z = (1.0 - xi.x).max(0.0).sqrt();
    tangent_to_world(normal, Vec3::new(x, y, z))
}

/// GGX-distributed half vector around `normal` for the given roughness.
pub fn importance_sample_ggx(normal: Vec3, xi: Vec2, roughness: f32) -> Vec3 {
    let a = (roughness * roughness).max(1e-3);
    let phi = TAU * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let h = Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);
    tangent_to_world(normal, h)
}

/// Trowbridge-Reitz (GGX) normal distribution.
pub fn ndf_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (PI * d * d).max(1e-8)
}

fn geometry_schlick_ggx(n_dot_v: f32, roughness: f32) -> f32 {
    let r = roughness + 1.0;
    let k = (r * r) * 0.125;
    n_dot_v / (n_dot_v * (1.0 - k) + k)
}

pub fn geometry_smith(normal: Vec3, v: Vec3, l: Vec3, roughness: f32) -> f32 {
    let n_dot_v = normal.dot(v).max(0.0);
    let n_dot_l = normal.dot(l).max(0.0);
    geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness)
}

pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Split-sum BRDF integral: the `(scale, bias)` pair such that at shading
/// time `specular ~= F0 * scale + bias`.
pub fn integrate_brdf(n_dot_v: f32, roughness: f32, samples: u32) -> (f32, f32) {
    let normal = Vec3::Z;
    let n_dot_v = n_dot_v.max(1e-4);
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).max(0.0).sqrt(), 0.0, n_dot_v);

    let mut a = 0.0f32;
    let mut b = 0.0f32;
    for i in 0..samples {
        let xi = hammersley(i, samples);
        let h = importance_sample_ggx(normal, xi, roughness);
        let l = reflect(-v, h);
        let n_dot_l = l.z.max(0.0);
        if n_dot_l > 0.0 {
            let n_dot_h = h.z.max(0.0);
            let v_dot_h = v.dot(h).max(0.0);
            let g = geometry_smith(normal, v, l, roughness);
            let g_vis = (g * v_dot_h) / (n_dot_h * n_dot_v).max(1e-4);
            let fc = (1.0 - v_dot_h).powi(5);
            a += (1.0 - fc) * g_vis;
            b += fc * g_vis;
        }
    }
    let scale = 1.0 / samples as f32;
    (a * scale, b * scale)
}

/// Reference GGX prefilter of a panorama toward direction `n`: the NdotL
/// weighted average the specular prefilter kernel converges to.
pub fn prefilter_direction(env: &Panorama, n: Vec3, roughness: f32, samples: u32) -> Vec3 {
    let mut color = Vec3::ZERO;
    let mut weight = 0.0f32;
    for i in 0..samples {
        let xi = hammersley(i, samples);
        let h = importance_sample_ggx(n, xi, roughness);
        let l = reflect(-n, h).normalize();
        let n_dot_l = n.dot(l).max(0.0);
        if n_dot_l > 0.0 {
            color += env.sample_bilinear(l) * n_dot_l;
            weight += n_dot_l;
        }
    }
    if weight > 0.0 {
        color / weight
    } else {
        env.sample_bilinear(n)
    }
}

/// Reference cosine-weighted irradiance of a panorama around `n`,
/// already divided by pi (the convention the shading stage expects).
pub fn irradiance_direction(env: &Panorama, n: Vec3, samples: u32) -> Vec3 {
    let mut color = Vec3::ZERO;
    for i in 0..samples {
        let xi = hammersley(i, samples);
        let l = cosine_sample_hemisphere(n, xi);
        color += env.sample_bilinear(l);
    }
    color / samples as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hammersley_stays_in_unit_square() {
        for i in 0..256 {
            let p = hammersley(i, 256);
            assert!((0.0..1.0).contains(&p.x));
            assert!((0.0..1.0).contains(&p.y));
        }
    }

    #[test]
    fn cosine_samples_stay_in_hemisphere() {
        let n = Vec3::new(0.3, -0.8, 0.52).normalize();
        for i in 0..512 {
            let l = cosine_sample_hemisphere(n, hammersley(i, 512));
            assert!((l.length() - 1.0).abs() < 1e-4);
            assert!(n.dot(l) >= -1e-4);
        }
    }

    #[test]
    fn ggx_lobe_tightens_around_normal_at_low_roughness() {
        let n = Vec3::Y;
        for i in 0..128 {
            let h = importance_sample_ggx(n, hammersley(i, 128), 0.02);
            assert!(n.dot(h) > 0.99, "half vector strayed from a sharp lobe");
        }
    }

    #[test]
    fn brdf_integral_approaches_mirror_limit() {
        // Perfect mirror at grazing-free view: scale -> 1, bias -> 0.
        let (a, b) = integrate_brdf(1.0, 0.02, 2048);
        assert!(a > 0.95 && a <= 1.02, "scale {a} not near 1");
        assert!(b.abs() < 0.05, "bias {b} not near 0");
    }

    #[test]
    fn brdf_integral_channels_stay_normalized() {
        for &r in &[0.1, 0.4, 0.7, 1.0] {
            for &nv in &[0.05, 0.3, 0.7, 1.0] {
                let (a, b) = integrate_brdf(nv, r, 1024);
                assert!(a >= 0.0 && b >= 0.0);
                assert!(a + b <= 1.1, "energy blew up at r={r} nv={nv}: {a}+{b}");
            }
        }
    }

    #[test]
    fn constant_environment_prefilters_to_itself() {
        let env = Panorama::constant(16, 8, Vec3::splat(0.75));
        for &r in &[0.0, 0.5, 1.0] {
            let out = prefilter_direction(&env, Vec3::X, r, 64);
            assert!((out - Vec3::splat(0.75)).length() < 1e-3);
        }
    }

    #[test]
    fn constant_environment_irradiance_is_the_constant() {
        let env = Panorama::constant(16, 8, Vec3::new(0.2, 0.4, 0.8));
        let out = irradiance_direction(&env, Vec3::new(0.0, 1.0, 0.0), 256);
        assert!((out - Vec3::new(0.2, 0.4, 0.8)).length() < 1e-3);
    }

    #[test]
    fn prefilter_converges_with_sample_count() {
        // Synthetic environment with a bright cap around +Y; a truth run at
        // high sample count serves as the converged target.
        let env = Panorama::directional_light(64, 32, Vec3::Y, 40.0, 0.3);
        let n = Vec3::new(0.3, 0.9, 0.1).normalize();
        let truth = prefilter_direction(&env, n, 0.6, 16384);
        let coarse = (prefilter_direction(&env, n, 0.6, 64) - truth).length();
        let fine = (prefilter_direction(&env, n, 0.6, 4096) - truth).length();
        assert!(
            fine < coarse,
            "error did not shrink: coarse {coarse} fine {fine}"
        );
    }

    #[test]
    fn full_roughness_approaches_hemispherical_average() {
        let env = Panorama::directional_light(64, 32, Vec3::Y, 10.0, 0.5);
        let n = Vec3::Y;
        let rough = prefilter_direction(&env, n, 1.0, 8192);
        let cosine_avg = irradiance_direction(&env, n, 8192);
        // GGX at roughness 1 is not exactly a cosine lobe, but it must land in
        // the same low-frequency regime, far below the mirror response.
        let mirror = prefilter_direction(&env, n, 0.0, 64);
        assert!(rough.x < mirror.x * 0.5);
        let ratio = rough.x / cosine_avg.x.max(1e-6);
        assert!(
            (0.5..2.0).contains(&ratio),
            "rough response {rough:?} too far from cosine average {cosine_avg:?}"
        );
    }
}
