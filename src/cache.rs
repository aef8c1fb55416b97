// src/cache.rs
// On-disk precompute cache. One file per (panorama, config) pair:
// magic, version, JSON metadata, then length-prefixed RGBA16F blobs for
// every filtered mip followed by the irradiance cube. A hit skips all
// convolution passes on reload.
// RELEVANT FILES: src/pipeline.rs, src/readback.rs

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::IblConfig;
use crate::cube::CUBE_FACE_COUNT;
use crate::error::{PipelineError, PipelineResult};
use crate::panorama::Panorama;
use crate::readback::{self, RGBA16F_BYTES_PER_TEXEL};

const CACHE_MAGIC: &[u8; 8] = b"IBLPREV1";
const CACHE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheMetadata {
    version: u32,
    source: String,
    environment_size: u32,
    irradiance_size: u32,
    mip_level_count: u32,
    prefilter_samples: u32,
    irradiance_samples: u32,
}

/// Textures restored from a cache hit.
pub(crate) struct CachedMaps {
    pub filtered: wgpu::Texture,
    pub irradiance: wgpu::Texture,
}

pub struct PrecomputeCache {
    dir: PathBuf,
}

impl PrecomputeCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache key for a panorama under a given configuration. `None` when the
    /// panorama has no backing file, since there is nothing stable to hash.
    pub fn key(panorama: &Panorama, config: &IblConfig) -> Option<String> {
        let source = panorama.source()?;
        let mut hasher = Sha256::new();
        hasher.update(source.to_string_lossy().as_bytes());
        hasher.update(panorama.width().to_le_bytes());
        hasher.update(panorama.height().to_le_bytes());
        hasher.update(config.environment_size.to_le_bytes());
        hasher.update(config.irradiance_size.to_le_bytes());
        hasher.update(config.mip_level_count().to_le_bytes());
        hasher.update(config.prefilter_samples.to_le_bytes());
        hasher.update(config.irradiance_samples.to_le_bytes());
        let digest = hasher.finalize();
        Some(
            digest
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<String>(),
        )
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.iblcache"))
    }

    /// Restore cached environment maps, or `Ok(None)` when no entry exists.
    /// A corrupt or mismatched entry is an error; the caller decides whether
    /// to fall back to recomputation.
    pub(crate) fn load(
        &self,
        key: &str,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &IblConfig,
    ) -> PipelineResult<Option<CachedMaps>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let mut file = fs::File::open(&path)?;

        let mut magic = [0u8; 8];
        file.read_exact(&mut magic)?;
        if &magic != CACHE_MAGIC {
            return Err(PipelineError::cache(format!(
                "bad magic in {}",
                path.display()
            )));
        }

        let meta_len = read_u32(&mut file)?;
        let mut meta_bytes = vec![0u8; meta_len as usize];
        file.read_exact(&mut meta_bytes)?;
        let meta: CacheMetadata = serde_json::from_slice(&meta_bytes)
            .map_err(|e| PipelineError::cache(format!("metadata parse failed: {e}")))?;

        if meta.version != CACHE_VERSION {
            return Err(PipelineError::cache(format!(
                "cache version {} != {}",
                meta.version, CACHE_VERSION
            )));
        }
        let mip_level_count = config.mip_level_count();
        if meta.environment_size != config.environment_size
            || meta.irradiance_size != config.irradiance_size
            || meta.mip_level_count != mip_level_count
        {
            return Err(PipelineError::cache("cache entry dimensions mismatch"));
        }

        let filtered = create_cube_texture(
            device,
            "ibl.preview.tex.filtered_env",
            config.environment_size,
            mip_level_count,
        );
        for mip in 0..mip_level_count {
            let blob = read_blob(&mut file)?;
            upload_cube_level(queue, &filtered, mip, config.environment_size, &blob)?;
        }

        let irradiance = create_cube_texture(
            device,
            "ibl.preview.tex.irradiance",
            config.irradiance_size,
            1,
        );
        let blob = read_blob(&mut file)?;
        upload_cube_level(queue, &irradiance, 0, config.irradiance_size, &blob)?;

        log::info!("restored environment maps from {}", path.display());
        Ok(Some(CachedMaps {
            filtered,
            irradiance,
        }))
    }

    /// Read back freshly computed maps and persist them under `key`.
    pub(crate) fn store(
        &self,
        key: &str,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &IblConfig,
        source: &Path,
        filtered: &wgpu::Texture,
        irradiance: &wgpu::Texture,
    ) -> PipelineResult<()> {
        fs::create_dir_all(&self.dir)?;
        let mip_level_count = config.mip_level_count();

        let meta = CacheMetadata {
            version: CACHE_VERSION,
            source: source.to_string_lossy().into_owned(),
            environment_size: config.environment_size,
            irradiance_size: config.irradiance_size,
            mip_level_count,
            prefilter_samples: config.prefilter_samples,
            irradiance_samples: config.irradiance_samples,
        };
        let meta_bytes = serde_json::to_vec(&meta)
            .map_err(|e| PipelineError::cache(format!("metadata encode failed: {e}")))?;

        let path = self.entry_path(key);
        let mut file = fs::File::create(&path)?;
        file.write_all(CACHE_MAGIC)?;
        file.write_all(&(meta_bytes.len() as u32).to_le_bytes())?;
        file.write_all(&meta_bytes)?;

        let levels = readback::read_cubemap(
            device,
            queue,
            filtered,
            config.environment_size,
            mip_level_count,
        )?;
        for blob in &levels {
            write_blob(&mut file, blob)?;
        }
        let irr = readback::read_cubemap_level(device, queue, irradiance, 0, config.irradiance_size)?;
        write_blob(&mut file, &irr)?;

        log::info!("cached environment maps at {}", path.display());
        Ok(())
    }
}

fn create_cube_texture(
    device: &wgpu::Device,
    label: &str,
    size: u32,
    mip_level_count: u32,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: CUBE_FACE_COUNT,
        },
        mip_level_count,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba16Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn upload_cube_level(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    mip_level: u32,
    base_size: u32,
    blob: &[u8],
) -> PipelineResult<()> {
    let size = (base_size >> mip_level).max(1);
    let expected = (size * size * CUBE_FACE_COUNT * RGBA16F_BYTES_PER_TEXEL) as usize;
    if blob.len() != expected {
        return Err(PipelineError::cache(format!(
            "cache blob for mip {mip_level} is {} bytes, expected {expected}",
            blob.len()
        )));
    }
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        blob,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(size * RGBA16F_BYTES_PER_TEXEL),
            rows_per_image: Some(size),
        },
        wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: CUBE_FACE_COUNT,
        },
    );
    Ok(())
}

fn read_u32<R: Read>(reader: &mut R) -> PipelineResult<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_blob<R: Read>(reader: &mut R) -> PipelineResult<Vec<u8>> {
    let mut len_bytes = [0u8; 8];
    reader.read_exact(&mut len_bytes)?;
    let len = u64::from_le_bytes(len_bytes) as usize;
    let mut blob = vec![0u8; len];
    reader.read_exact(&mut blob)?;
    Ok(blob)
}

fn write_blob<W: Write>(writer: &mut W, blob: &[u8]) -> PipelineResult<()> {
    writer.write_all(&(blob.len() as u64).to_le_bytes())?;
    writer.write_all(blob)?;
    Ok(())
}
