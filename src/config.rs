// src/config.rs
// Explicit pipeline configuration. All tunables travel through this struct;
// there is no process-wide mutable settings state.

use crate::error::{PipelineError, PipelineResult};

/// Quality presets mapping to concrete texture sizes and sample counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Low,
    Medium,
    High,
    Ultra,
}

impl Default for Quality {
    fn default() -> Self {
        Self::Medium
    }
}

impl Quality {
    pub fn config(self) -> IblConfig {
        match self {
            Self::Low => IblConfig {
                environment_size: 128,
                prefilter_samples: 256,
                irradiance_samples: 512,
                ..IblConfig::default()
            },
            Self::Medium => IblConfig::default(),
            Self::High => IblConfig {
                environment_size: 512,
                ..IblConfig::default()
            },
            Self::Ultra => IblConfig {
                environment_size: 1024,
                prefilter_samples: 2048,
                irradiance_samples: 4096,
                ..IblConfig::default()
            },
        }
    }
}

/// Configuration for one IBL pipeline instance.
///
/// Sample counts are quality/performance knobs, not fixed constants; the
/// convergence tests in `sampling` pin down the behavior they must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IblConfig {
    /// Per-face resolution of the environment cubemaps. Must be a power of two.
    pub environment_size: u32,
    /// Per-face resolution of the diffuse irradiance cubemap.
    pub irradiance_size: u32,
    /// Resolution of the BRDF integration lookup table.
    pub brdf_lut_size: u32,
    /// Optional cap on the filtered mip chain length.
    pub max_mip_levels: Option<u32>,
    /// GGX importance samples per prefiltered texel.
    pub prefilter_samples: u32,
    /// Cosine-weighted hemisphere samples per irradiance texel.
    pub irradiance_samples: u32,
    /// GGX samples per BRDF table texel.
    pub brdf_samples: u32,
}

impl Default for IblConfig {
    fn default() -> Self {
        Self {
            environment_size: 256,
            irradiance_size: 32,
            brdf_lut_size: 512,
            max_mip_levels: None,
            prefilter_samples: 1024,
            irradiance_samples: 2048,
            brdf_samples: 1024,
        }
    }
}

impl IblConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        if !self.environment_size.is_power_of_two() {
            return Err(PipelineError::allocation(format!(
                "environment size {} must be a power of two",
                self.environment_size
            )));
        }
        if !self.irradiance_size.is_power_of_two() {
            return Err(PipelineError::allocation(format!(
                "irradiance size {} must be a power of two",
                self.irradiance_size
            )));
        }
        if self.brdf_lut_size == 0 {
            return Err(PipelineError::allocation("BRDF LUT size must be positive"));
        }
        if self.prefilter_samples == 0 || self.irradiance_samples == 0 || self.brdf_samples == 0 {
            return Err(PipelineError::allocation("sample counts must be positive"));
        }
        if let Some(cap) = self.max_mip_levels {
            if cap == 0 {
                return Err(PipelineError::allocation("mip level cap must be positive"));
            }
        }
        Ok(())
    }

    /// Mip chain length of the environment cubemaps:
    /// `floor(log2(size)) + 1`, unless explicitly capped.
    pub fn mip_level_count(&self) -> u32 {
        let full = 32 - self.environment_size.leading_zeros();
        match self.max_mip_levels {
            Some(cap) => full.min(cap),
            None => full,
        }
    }

    /// Roughness associated with a filtered mip level. Level 0 is a mirror,
    /// the last level is fully rough.
    pub fn roughness_for_level(&self, level: u32) -> f32 {
        let max_level = self.mip_level_count().saturating_sub(1).max(1);
        level as f32 / max_level as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_count_matches_log2() {
        let cfg = IblConfig {
            environment_size: 256,
            ..IblConfig::default()
        };
        assert_eq!(cfg.mip_level_count(), 9);

        let capped = IblConfig {
            environment_size: 256,
            max_mip_levels: Some(6),
            ..IblConfig::default()
        };
        assert_eq!(capped.mip_level_count(), 6);
    }

    #[test]
    fn roughness_mapping_is_linear() {
        let cfg = IblConfig {
            environment_size: 128,
            ..IblConfig::default()
        };
        let levels = cfg.mip_level_count();
        assert_eq!(cfg.roughness_for_level(0), 0.0);
        assert_eq!(cfg.roughness_for_level(levels - 1), 1.0);
        let mid = cfg.roughness_for_level(levels / 2);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn non_power_of_two_is_rejected() {
        let cfg = IblConfig {
            environment_size: 100,
            ..IblConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn presets_validate() {
        for q in [Quality::Low, Quality::Medium, Quality::High, Quality::Ultra] {
            q.config().validate().unwrap();
        }
    }
}
