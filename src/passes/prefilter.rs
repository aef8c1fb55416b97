// src/passes/prefilter.rs
// GGX specular prefilter. Copies the unfiltered mip 0 verbatim, then
// convolves each coarser level with a roughness that grows linearly in the
// mip index. Every level samples the pristine unfiltered chain, never its
// own partial output.
// RELEVANT FILES: src/shaders/ibl_prefilter.wgsl, src/config.rs

use wgpu::util::DeviceExt;

use crate::config::IblConfig;
use crate::cube::CUBE_FACE_COUNT;
use crate::error::PipelineResult;
use crate::passes::{workgroups_for, ConvolveParams};

pub struct PrefilterPass {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

/// Layout shared with the irradiance pass: uniforms, source cube, sampler,
/// destination face array.
pub(crate) fn convolve_bind_group_layout(
    device: &wgpu::Device,
    label: &str,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::Cube,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: wgpu::TextureFormat::Rgba16Float,
                    view_dimension: wgpu::TextureViewDimension::D2Array,
                },
                count: None,
            },
        ],
    })
}

impl PrefilterPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ibl.preview.shader.prefilter"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/ibl_prefilter.wgsl").into()),
        });

        let layout = convolve_bind_group_layout(device, "ibl.preview.bgl.prefilter");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ibl.preview.pl.prefilter"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("ibl.preview.pipeline.prefilter"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: "cs_specular_prefilter",
        });

        Self { pipeline, layout }
    }

    /// Produce the filtered environment cube from the unfiltered chain.
    pub fn run(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        unfiltered: &wgpu::Texture,
        sampler: &wgpu::Sampler,
        config: &IblConfig,
    ) -> PipelineResult<wgpu::Texture> {
        let size = config.environment_size;
        let mip_level_count = config.mip_level_count();
        log::debug!(
            "specular prefilter: {}x{} cube, {} mips, {} samples per texel",
            size,
            size,
            mip_level_count,
            config.prefilter_samples
        );

        let filtered = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("ibl.preview.tex.filtered_env"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: CUBE_FACE_COUNT,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ibl.preview.encoder.prefilter"),
        });

        // Level 0 is the untouched projection, bit-for-bit.
        encoder.copy_texture_to_texture(
            wgpu::ImageCopyTexture {
                texture: unfiltered,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyTexture {
                texture: &filtered,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: CUBE_FACE_COUNT,
            },
        );

        let src_view = unfiltered.create_view(&wgpu::TextureViewDescriptor {
            label: Some("ibl.preview.view.unfiltered_cube"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        for level in 1..mip_level_count {
            let roughness = config.roughness_for_level(level);
            // Per-level uniform buffer; a shared buffer rewritten before a
            // single submit would leave every dispatch seeing the last value.
            let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("ibl.preview.ubo.prefilter"),
                contents: bytemuck::bytes_of(&ConvolveParams {
                    sample_count: config.prefilter_samples,
                    base_size: size,
                    roughness,
                    _pad: 0,
                }),
                usage: wgpu::BufferUsages::UNIFORM,
            });

            let dst_view = filtered.create_view(&wgpu::TextureViewDescriptor {
                label: Some("ibl.preview.view.filtered_level"),
                dimension: Some(wgpu::TextureViewDimension::D2Array),
                base_mip_level: level,
                mip_level_count: Some(1),
                ..Default::default()
            });

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("ibl.preview.bg.prefilter"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&src_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&dst_view),
                    },
                ],
            });

            let mip_size = (size >> level).max(1);
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("ibl.preview.pass.prefilter"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                workgroups_for(mip_size),
                workgroups_for(mip_size),
                CUBE_FACE_COUNT,
            );
        }

        queue.submit(Some(encoder.finish()));
        Ok(filtered)
    }
}
