//! GPU precompute core for an image-based-lighting preview tool.
//!
//! Turns an equirectangular HDR panorama into the three textures a PBR
//! shader consumes: a GGX-prefiltered environment cubemap whose mip index
//! encodes roughness, a small diffuse irradiance cubemap, and the split-sum
//! BRDF integration table. All heavy lifting runs as wgpu compute passes;
//! [`IblPipeline`] sequences them and publishes the outputs atomically.
//!
//! ```no_run
//! use ibl_preview::{GpuContext, IblPipeline, Quality};
//!
//! let gpu = GpuContext::new()?;
//! let mut pipeline = IblPipeline::with_quality(&gpu.device, &gpu.queue, Quality::Medium)?;
//! pipeline.load_environment(&gpu.device, &gpu.queue, "studio.hdr")?;
//! let _binding = pipeline.environment_binding().unwrap();
//! # Ok::<(), ibl_preview::PipelineError>(())
//! ```

pub mod cache;
pub mod config;
pub mod cube;
pub mod error;
pub mod gpu;
pub mod panorama;
pub mod passes;
pub mod pipeline;
pub mod readback;
pub mod sampling;

pub use cache::PrecomputeCache;
pub use config::{IblConfig, Quality};
pub use error::{PipelineError, PipelineResult};
pub use gpu::GpuContext;
pub use panorama::Panorama;
pub use passes::brdf::BrdfLut;
pub use pipeline::{EnvironmentMaps, IblPipeline, PipelineState};
