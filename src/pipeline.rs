// src/pipeline.rs
// Orchestrates the precompute passes and owns the published outputs.
// A reload builds a complete replacement set off to the side and swaps it
// in whole, so consumers never observe maps from two different panoramas.
// RELEVANT FILES: src/passes/mod.rs, src/cache.rs, src/config.rs

use std::path::Path;

use crate::cache::PrecomputeCache;
use crate::config::{IblConfig, Quality};
use crate::error::PipelineResult;
use crate::panorama::Panorama;
use crate::passes::brdf::{BrdfLut, BrdfPass};
use crate::passes::downsample::DownsamplePass;
use crate::passes::equirect::EquirectPass;
use crate::passes::irradiance::IrradiancePass;
use crate::passes::prefilter::PrefilterPass;

/// Where the pipeline is in its precompute sequence. `Ready` means a
/// complete, mutually consistent output set is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Projecting,
    Prefiltering,
    ConvolvingIrradiance,
    Ready,
}

/// One panorama's worth of precomputed environment maps. All three outputs
/// a consumer binds together always come from the same instance.
pub struct EnvironmentMaps {
    pub filtered: wgpu::Texture,
    pub filtered_view: wgpu::TextureView,
    pub irradiance: wgpu::Texture,
    pub irradiance_view: wgpu::TextureView,
    pub mip_level_count: u32,
}

impl EnvironmentMaps {
    fn new(filtered: wgpu::Texture, irradiance: wgpu::Texture, mip_level_count: u32) -> Self {
        let filtered_view = filtered.create_view(&wgpu::TextureViewDescriptor {
            label: Some("ibl.preview.view.filtered_cube"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let irradiance_view = irradiance.create_view(&wgpu::TextureViewDescriptor {
            label: Some("ibl.preview.view.irradiance_cube"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        Self {
            filtered,
            filtered_view,
            irradiance,
            irradiance_view,
            mip_level_count,
        }
    }
}

pub struct IblPipeline {
    config: IblConfig,
    equirect: EquirectPass,
    downsample: DownsamplePass,
    prefilter: PrefilterPass,
    irradiance: IrradiancePass,
    brdf_pass: BrdfPass,
    brdf: BrdfLut,
    env_sampler: wgpu::Sampler,
    binding_layout: wgpu::BindGroupLayout,
    binding: Option<wgpu::BindGroup>,
    maps: Option<EnvironmentMaps>,
    state: PipelineState,
    cache: Option<PrecomputeCache>,
}

impl IblPipeline {
    /// Build all compute pipelines and the environment-independent BRDF
    /// table. No environment is loaded yet; the pipeline starts `Idle`.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: IblConfig,
    ) -> PipelineResult<Self> {
        config.validate()?;

        let equirect = EquirectPass::new(device);
        let downsample = DownsamplePass::new(device);
        let prefilter = PrefilterPass::new(device);
        let irradiance = IrradiancePass::new(device);
        let brdf_pass = BrdfPass::new(device);
        let brdf = brdf_pass.generate(device, queue, &config)?;

        // Trilinear cube sampler shared by the convolution passes and the
        // published binding. Mip filtering is what makes the prefilter's
        // lod-selected source lookups cheap.
        let env_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("ibl.preview.sampler.environment"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let binding_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ibl.preview.bgl.environment"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT | wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT | wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT | wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT | wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        Ok(Self {
            config,
            equirect,
            downsample,
            prefilter,
            irradiance,
            brdf_pass,
            brdf,
            env_sampler,
            binding_layout,
            binding: None,
            maps: None,
            state: PipelineState::Idle,
            cache: None,
        })
    }

    pub fn with_quality(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        quality: Quality,
    ) -> PipelineResult<Self> {
        Self::new(device, queue, quality.config())
    }

    /// Persist precompute results under `dir` and reuse them on later
    /// reloads of the same panorama file.
    pub fn set_cache_dir<P: AsRef<Path>>(&mut self, dir: P) {
        self.cache = Some(PrecomputeCache::new(dir));
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &IblConfig {
        &self.config
    }

    /// The current environment maps, present once a load has succeeded.
    pub fn maps(&self) -> Option<&EnvironmentMaps> {
        self.maps.as_ref()
    }

    pub fn filtered_environment(&self) -> Option<&wgpu::TextureView> {
        self.maps.as_ref().map(|m| &m.filtered_view)
    }

    pub fn irradiance_environment(&self) -> Option<&wgpu::TextureView> {
        self.maps.as_ref().map(|m| &m.irradiance_view)
    }

    pub fn mip_level_count(&self) -> Option<u32> {
        self.maps.as_ref().map(|m| m.mip_level_count)
    }

    pub fn brdf_lut(&self) -> &BrdfLut {
        &self.brdf
    }

    pub fn environment_sampler(&self) -> &wgpu::Sampler {
        &self.env_sampler
    }

    pub fn binding_layout(&self) -> &wgpu::BindGroupLayout {
        &self.binding_layout
    }

    /// Ready-to-bind group over (filtered cube, irradiance cube, BRDF LUT,
    /// sampler). Replaced atomically with the maps on reload.
    pub fn environment_binding(&self) -> Option<&wgpu::BindGroup> {
        self.binding.as_ref()
    }

    /// Decode an HDR panorama from disk and run the full precompute.
    pub fn load_environment<P: AsRef<Path>>(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: P,
    ) -> PipelineResult<()> {
        let panorama = Panorama::load(path)?;
        self.reload(device, queue, &panorama)
    }

    /// Run the precompute for `panorama` and publish the results. On any
    /// failure the previously published maps stay untouched and the state
    /// returns to `Ready` (or `Idle` when nothing was loaded yet).
    pub fn reload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        panorama: &Panorama,
    ) -> PipelineResult<()> {
        match self.rebuild(device, queue, panorama) {
            Ok(maps) => {
                let binding = self.make_binding(device, &maps);
                // The old maps drop here; their GPU memory is reclaimed once
                // in-flight work referencing them completes.
                self.maps = Some(maps);
                self.binding = Some(binding);
                self.state = PipelineState::Ready;
                log::info!(
                    "environment ready: {}x{} filtered cube, {} mips",
                    self.config.environment_size,
                    self.config.environment_size,
                    self.config.mip_level_count()
                );
                Ok(())
            }
            Err(e) => {
                self.state = if self.maps.is_some() {
                    PipelineState::Ready
                } else {
                    PipelineState::Idle
                };
                log::error!("environment reload failed: {e}");
                Err(e)
            }
        }
    }

    fn rebuild(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        panorama: &Panorama,
    ) -> PipelineResult<EnvironmentMaps> {
        let mip_level_count = self.config.mip_level_count();

        let cache_key = self
            .cache
            .as_ref()
            .and_then(|_| PrecomputeCache::key(panorama, &self.config));
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            match cache.load(key, device, queue, &self.config) {
                Ok(Some(cached)) => {
                    return Ok(EnvironmentMaps::new(
                        cached.filtered,
                        cached.irradiance,
                        mip_level_count,
                    ));
                }
                Ok(None) => {}
                Err(e) => log::warn!("ignoring unusable cache entry: {e}"),
            }
        }

        self.state = PipelineState::Projecting;
        let unfiltered = self.equirect.project(
            device,
            queue,
            panorama,
            self.config.environment_size,
            mip_level_count,
        )?;
        self.downsample.build_chain(
            device,
            queue,
            &unfiltered,
            self.config.environment_size,
            mip_level_count,
        );

        self.state = PipelineState::Prefiltering;
        let filtered = self
            .prefilter
            .run(device, queue, &unfiltered, &self.env_sampler, &self.config)?;

        self.state = PipelineState::ConvolvingIrradiance;
        let irradiance = self
            .irradiance
            .run(device, queue, &unfiltered, &self.env_sampler, &self.config)?;

        if let (Some(cache), Some(key), Some(source)) =
            (&self.cache, &cache_key, panorama.source())
        {
            // A failed cache write degrades future startup time, nothing else.
            if let Err(e) = cache.store(
                key,
                device,
                queue,
                &self.config,
                source,
                &filtered,
                &irradiance,
            ) {
                log::warn!("cache write failed: {e}");
            }
        }

        Ok(EnvironmentMaps::new(filtered, irradiance, mip_level_count))
    }

    fn make_binding(&self, device: &wgpu::Device, maps: &EnvironmentMaps) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ibl.preview.bg.environment"),
            layout: &self.binding_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&maps.filtered_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&maps.irradiance_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&self.brdf.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.env_sampler),
                },
            ],
        })
    }

    /// Rebuild the BRDF table, e.g. after a sample-count change.
    pub fn regenerate_brdf_lut(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> PipelineResult<()> {
        self.brdf = self.brdf_pass.generate(device, queue, &self.config)?;
        self.binding = self
            .maps
            .as_ref()
            .map(|maps| self.make_binding(device, maps));
        Ok(())
    }
}
