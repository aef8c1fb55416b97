// src/passes/irradiance.rs
// Diffuse irradiance convolution into a small cube (32x32 faces by
// default). Shares its kernel module and bind group layout shape with the
// specular prefilter.
// RELEVANT FILES: src/shaders/ibl_prefilter.wgsl, src/passes/prefilter.rs

use wgpu::util::DeviceExt;

use crate::config::IblConfig;
use crate::cube::CUBE_FACE_COUNT;
use crate::error::PipelineResult;
use crate::passes::prefilter::convolve_bind_group_layout;
use crate::passes::{workgroups_for, ConvolveParams};

pub struct IrradiancePass {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl IrradiancePass {
    pub fn new(device: &wgpu::Device) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ibl.preview.shader.irradiance"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/ibl_prefilter.wgsl").into()),
        });

        let layout = convolve_bind_group_layout(device, "ibl.preview.bgl.irradiance");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ibl.preview.pl.irradiance"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("ibl.preview.pipeline.irradiance"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: "cs_irradiance_convolution",
        });

        Self { pipeline, layout }
    }

    /// Convolve the unfiltered environment into the irradiance cube.
    pub fn run(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        unfiltered: &wgpu::Texture,
        sampler: &wgpu::Sampler,
        config: &IblConfig,
    ) -> PipelineResult<wgpu::Texture> {
        let size = config.irradiance_size;
        log::debug!(
            "irradiance convolution: {}x{} cube, {} samples per texel",
            size,
            size,
            config.irradiance_samples
        );

        let irradiance = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("ibl.preview.tex.irradiance"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: CUBE_FACE_COUNT,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ibl.preview.ubo.irradiance"),
            contents: bytemuck::bytes_of(&ConvolveParams {
                sample_count: config.irradiance_samples,
                base_size: config.environment_size,
                roughness: 1.0,
                _pad: 0,
            }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let src_view = unfiltered.create_view(&wgpu::TextureViewDescriptor {
            label: Some("ibl.preview.view.unfiltered_cube"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let dst_view = irradiance.create_view(&wgpu::TextureViewDescriptor {
            label: Some("ibl.preview.view.irradiance_faces"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ibl.preview.bg.irradiance"),
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

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ibl.preview.encoder.irradiance"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("ibl.preview.pass.irradiance"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(workgroups_for(size), workgroups_for(size), CUBE_FACE_COUNT);
        }
        queue.submit(Some(encoder.finish()));

        Ok(irradiance)
    }
}
