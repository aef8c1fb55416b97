// src/passes/equirect.rs
// Equirectangular -> cubemap projection pass. Uploads the decoded panorama
// as an RGBA16F texture and writes mip 0 of a fresh cube array.
// RELEVANT FILES: src/shaders/ibl_equirect.wgsl, src/panorama.rs

use crate::cube::CUBE_FACE_COUNT;
use crate::error::PipelineResult;
use crate::panorama::Panorama;
use crate::passes::workgroups_for;

pub struct EquirectPass {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl EquirectPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ibl.preview.shader.equirect"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/ibl_equirect.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ibl.preview.bgl.equirect"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
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
            label: Some("ibl.preview.pl.equirect"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("ibl.preview.pipeline.equirect"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: "cs_equirect_to_cubemap",
        });

        // Azimuth wraps, elevation clamps. Matches the CPU bilinear sampler.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("ibl.preview.sampler.equirect"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            pipeline,
            layout,
            sampler,
        }
    }

    /// Project `panorama` onto mip 0 of a new cubemap with `mip_level_count`
    /// levels. Upper levels are left for the downsample pass to fill.
    pub fn project(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        panorama: &Panorama,
        size: u32,
        mip_level_count: u32,
    ) -> PipelineResult<wgpu::Texture> {
        log::debug!(
            "equirect projection: {}x{} panorama -> {}x{} cube ({} mips)",
            panorama.width(),
            panorama.height(),
            size,
            size,
            mip_level_count
        );

        let equirect = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("ibl.preview.tex.equirect_src"),
            size: wgpu::Extent3d {
                width: panorama.width(),
                height: panorama.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        // write_texture takes tight rows, no copy alignment needed here.
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &equirect,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &panorama.as_rgba_f16(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(panorama.width() * 8),
                rows_per_image: Some(panorama.height()),
            },
            wgpu::Extent3d {
                width: panorama.width(),
                height: panorama.height(),
                depth_or_array_layers: 1,
            },
        );

        let cube = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("ibl.preview.tex.unfiltered_env"),
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
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let src_view = equirect.create_view(&wgpu::TextureViewDescriptor::default());
        let dst_view = cube.create_view(&wgpu::TextureViewDescriptor {
            label: Some("ibl.preview.view.unfiltered_mip0"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            base_mip_level: 0,
            mip_level_count: Some(1),
            ..Default::default()
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ibl.preview.bg.equirect"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&src_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&dst_view),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ibl.preview.encoder.equirect"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("ibl.preview.pass.equirect"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(workgroups_for(size), workgroups_for(size), CUBE_FACE_COUNT);
        }
        queue.submit(Some(encoder.finish()));

        Ok(cube)
    }
}
