// src/passes/downsample.rs
// Box-filter mip chain builder for the unfiltered environment cube.
// One compute pass per level; the pass boundary is the barrier that makes
// level N readable while level N+1 is written.
// RELEVANT FILES: src/shaders/ibl_downsample.wgsl, src/passes/equirect.rs

use crate::cube::CUBE_FACE_COUNT;
use crate::passes::workgroups_for;

pub struct DownsamplePass {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl DownsamplePass {
    pub fn new(device: &wgpu::Device) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ibl.preview.shader.downsample"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/ibl_downsample.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ibl.preview.bgl.downsample"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba16Float,
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ibl.preview.pl.downsample"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("ibl.preview.pipeline.downsample"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: "cs_downsample",
        });

        Self { pipeline, layout }
    }

    /// Fill mips `1..mip_level_count` of `cube` by repeated 2x2 reduction
    /// of the level above.
    pub fn build_chain(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        cube: &wgpu::Texture,
        size: u32,
        mip_level_count: u32,
    ) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ibl.preview.encoder.downsample"),
        });

        for mip in 1..mip_level_count {
            let src = cube.create_view(&wgpu::TextureViewDescriptor {
                label: Some("ibl.preview.view.downsample_src"),
                dimension: Some(wgpu::TextureViewDimension::D2Array),
                base_mip_level: mip - 1,
                mip_level_count: Some(1),
                ..Default::default()
            });
            let dst = cube.create_view(&wgpu::TextureViewDescriptor {
                label: Some("ibl.preview.view.downsample_dst"),
                dimension: Some(wgpu::TextureViewDimension::D2Array),
                base_mip_level: mip,
                mip_level_count: Some(1),
                ..Default::default()
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("ibl.preview.bg.downsample"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&src),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&dst),
                    },
                ],
            });

            let mip_size = (size >> mip).max(1);
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("ibl.preview.pass.downsample"),
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
    }
}
