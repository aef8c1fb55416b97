// src/error.rs
// Central error handling for the IBL precompute pipeline.
// Every failure inside a pass surfaces as a typed PipelineError; nothing
// is swallowed. A failed reload leaves the previous environment intact.

/// Centralized error type for all pipeline operations.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// The source panorama could not be decoded (missing or corrupt file).
    #[error("decode error: {0}")]
    Decode(#[from] image::ImageError),

    /// GPU resource creation failed or was given invalid parameters.
    #[error("allocation error: {0}")]
    Allocation(String),

    /// A compute pass failed to run or read back.
    #[error("pass error: {0}")]
    Pass(String),

    /// The on-disk precompute cache is unreadable or inconsistent.
    #[error("cache error: {0}")]
    Cache(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn allocation<T: ToString>(msg: T) -> Self {
        PipelineError::Allocation(msg.to_string())
    }

    pub fn pass<T: ToString>(msg: T) -> Self {
        PipelineError::Pass(msg.to_string())
    }

    pub fn cache<T: ToString>(msg: T) -> Self {
        PipelineError::Cache(msg.to_string())
    }
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
