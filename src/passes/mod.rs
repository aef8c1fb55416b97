// src/passes/mod.rs
// One module per GPU compute pass. Each pass owns its pipeline and bind
// group layout; textures and encoders are handed in by the orchestrator.
// RELEVANT FILES: src/pipeline.rs, src/shaders/ibl_prefilter.wgsl

pub mod brdf;
pub mod downsample;
pub mod equirect;
pub mod irradiance;
pub mod prefilter;

use bytemuck::{Pod, Zeroable};

/// Uniform block shared by the specular prefilter and irradiance kernels.
/// Layout must match `ConvolveParams` in `ibl_prefilter.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct ConvolveParams {
    pub sample_count: u32,
    pub base_size: u32,
    pub roughness: f32,
    pub _pad: u32,
}

pub(crate) const WORKGROUP_SIZE: u32 = 8;

#[inline]
pub(crate) fn workgroups_for(size: u32) -> u32 {
    (size + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE
}
