// src/readback.rs
// GPU -> CPU texture readback with copy-alignment padding handled here so
// callers only ever see tight rows. Used by the cache writer and the tests.
// RELEVANT FILES: src/cache.rs, src/gpu.rs

use crate::error::{PipelineError, PipelineResult};
use crate::gpu::align_copy_bpr;

/// Bytes per RGBA16F texel, the only format the pipeline reads back.
pub const RGBA16F_BYTES_PER_TEXEL: u32 = 8;

/// Re-pack rows read at `padded_bpr` stride into tight `unpadded_bpr` rows.
pub(crate) fn strip_image_padding(
    data: &[u8],
    unpadded_bpr: u32,
    padded_bpr: u32,
    rows: u32,
) -> Vec<u8> {
    if unpadded_bpr == padded_bpr {
        return data.to_vec();
    }
    let mut out = Vec::with_capacity((unpadded_bpr * rows) as usize);
    for row in 0..rows {
        let start = (row * padded_bpr) as usize;
        out.extend_from_slice(&data[start..start + unpadded_bpr as usize]);
    }
    out
}

/// Copy one mip level of `texture` (all `layers` array layers) into a
/// mappable buffer and return the tight bytes, layer-major.
pub fn read_texture_level(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    mip_level: u32,
    width: u32,
    height: u32,
    layers: u32,
) -> PipelineResult<Vec<u8>> {
    let unpadded_bpr = width * RGBA16F_BYTES_PER_TEXEL;
    let padded_bpr = align_copy_bpr(unpadded_bpr);
    let buffer_size = (padded_bpr * height * layers) as wgpu::BufferAddress;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("ibl.preview.buf.readback"),
        size: buffer_size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("ibl.preview.encoder.readback"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_bpr),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: layers,
        },
    );
    queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|_| PipelineError::pass("readback map callback never fired"))?
        .map_err(|e| PipelineError::pass(format!("readback map failed: {e:?}")))?;

    let padded = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(strip_image_padding(
        &padded,
        unpadded_bpr,
        padded_bpr,
        height * layers,
    ))
}

/// Read all six faces of one cube mip level, tight rows, faces concatenated
/// in layer order.
pub fn read_cubemap_level(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    mip_level: u32,
    base_size: u32,
) -> PipelineResult<Vec<u8>> {
    let size = (base_size >> mip_level).max(1);
    read_texture_level(
        device,
        queue,
        texture,
        mip_level,
        size,
        size,
        crate::cube::CUBE_FACE_COUNT,
    )
}

/// Read the full mip chain of a cubemap, one tight blob per level.
pub fn read_cubemap(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    base_size: u32,
    mip_level_count: u32,
) -> PipelineResult<Vec<Vec<u8>>> {
    let mut levels = Vec::with_capacity(mip_level_count as usize);
    for mip in 0..mip_level_count {
        levels.push(read_cubemap_level(device, queue, texture, mip, base_size)?);
    }
    Ok(levels)
}

/// Read a single-layer 2D texture (the BRDF table).
pub fn read_texture_2d(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> PipelineResult<Vec<u8>> {
    read_texture_level(device, queue, texture, 0, width, height, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_recovers_tight_rows() {
        // 3 rows of 10 bytes at a 256-byte stride.
        let unpadded = 10u32;
        let padded = align_copy_bpr(unpadded);
        assert_eq!(padded, 256);
        let tight: Vec<u8> = (0..30).collect();
        let mut wide = vec![0u8; (padded * 3) as usize];
        for row in 0..3usize {
            wide[row * padded as usize..row * padded as usize + 10]
                .copy_from_slice(&tight[row * 10..row * 10 + 10]);
        }
        assert_eq!(strip_image_padding(&wide, unpadded, padded, 3), tight);
    }

    #[test]
    fn aligned_rows_pass_through() {
        let tight = vec![7u8; 512];
        assert_eq!(strip_image_padding(&tight, 256, 256, 2), tight);
    }
}
