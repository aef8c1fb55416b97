use once_cell::sync::OnceCell;

use crate::error::{PipelineError, PipelineResult};

pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter: wgpu::Adapter,
}

impl GpuContext {
    /// Request a headless device suitable for compute precomputation.
    /// Returns an error when no adapter is available (e.g. bare CI runners).
    pub fn new() -> PipelineResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| PipelineError::allocation("no suitable GPU adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                label: Some("ibl-preview-device"),
            },
            None,
        ))
        .map_err(|e| PipelineError::allocation(format!("request_device failed: {e}")))?;

        Ok(GpuContext {
            device,
            queue,
            adapter,
        })
    }
}

static CTX: OnceCell<GpuContext> = OnceCell::new();

/// Process-wide context for tools that do not manage their own device.
/// Panics when no adapter exists; library code takes `&wgpu::Device` instead.
pub fn ctx() -> &'static GpuContext {
    CTX.get_or_init(|| GpuContext::new().expect("GPU context initialization failed"))
}

/// Align to WebGPU's required bytes-per-row for copies.
#[inline]
pub fn align_copy_bpr(unpadded: u32) -> u32 {
    let a = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    ((unpadded + a - 1) / a) * a
}
