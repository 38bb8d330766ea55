//! Error types
//!
//! GPU setup failures are fatal for the renderer; atlas errors only mean
//! "not yet" or "bad input" and are recoverable by the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no compatible GPU adapter")]
    NoAdapter,
    #[error("failed to create surface: {0}")]
    CreateSurface(String),
    #[error("failed to request device: {0}")]
    RequestDevice(String),
    #[error("shader '{label}' failed to compile:\n{log}")]
    ShaderCompile { label: String, log: String },
    #[error("program '{label}' failed to link:\n{log}")]
    ShaderLink { label: String, log: String },
    #[error("GPU context lost")]
    ContextLost,
    #[error("surface unavailable: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AtlasError {
    #[error("{pending} image(s) still loading")]
    NotReady { pending: usize },
    #[error("load handle does not belong to this builder")]
    UnknownHandle,
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("{count} tiles registered, codes only reach {max}")]
    TooManyTiles { count: usize, max: usize },
}
