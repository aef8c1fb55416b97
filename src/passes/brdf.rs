// src/passes/brdf.rs
// Split-sum BRDF integration table. Environment-independent; the pipeline
// builds it once at startup and never again.
// RELEVANT FILES: src/shaders/ibl_brdf.wgsl, src/pipeline.rs

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::config::IblConfig;
use crate::error::PipelineResult;
use crate::passes::workgroups_for;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct BrdfParams {
    sample_count: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}

/// The integrated BRDF table. Red holds the Fresnel scale, green the bias;
/// the remaining channels are storage-format padding.
pub struct BrdfLut {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: u32,
}

pub struct BrdfPass {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl BrdfPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ibl.preview.shader.brdf"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/ibl_brdf.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ibl.preview.bgl.brdf"),
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
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba16Float,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ibl.preview.pl.brdf"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("ibl.preview.pipeline.brdf"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: "cs_brdf_integration",
        });

        Self { pipeline, layout }
    }

    pub fn generate(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &IblConfig,
    ) -> PipelineResult<BrdfLut> {
        let size = config.brdf_lut_size;
        log::debug!("BRDF LUT: {}x{}, {} samples", size, size, config.brdf_samples);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("ibl.preview.tex.brdf_lut"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ibl.preview.ubo.brdf"),
            contents: bytemuck::bytes_of(&BrdfParams {
                sample_count: config.brdf_samples,
                _pad0: 0,
                _pad1: 0,
                _pad2: 0,
            }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ibl.preview.bg.brdf"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ibl.preview.encoder.brdf"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("ibl.preview.pass.brdf"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(workgroups_for(size), workgroups_for(size), 1);
        }
        queue.submit(Some(encoder.finish()));

        Ok(BrdfLut {
            texture,
            view,
            size,
        })
    }
}
