//! Error type for the tracer.

use thiserror::Error;

/// Everything that can stop the renderer.
///
/// Device and configuration errors are fatal at start-up. `BufferMap` and
/// `Poll` come from a single frame; the render loop logs them and moves on.
#[derive(Error, Debug)]
pub enum RenderError {
    /// No adapter matched the request
    #[error("No suitable GPU adapter: {0}")]
    NoAdapter(String),

    /// Adapter refused to hand out a device
    #[error("Failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    /// Readback of the color buffer failed
    #[error("Failed to map color buffer: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    /// Waiting on the queue failed
    #[error("Device poll failed: {0}")]
    Poll(String),

    /// Terminal or file I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Scene file could not be parsed
    #[error("Invalid scene file: {0}")]
    Config(#[from] serde_json::Error),

    /// Scene file parsed but holds unusable values
    #[error("Invalid scene: {0}")]
    InvalidConfig(String),
}

impl RenderError {
    /// Errors confined to one frame. The loop drops that frame and carries on.
    pub fn is_frame_error(&self) -> bool {
        matches!(self, RenderError::BufferMap(_) | RenderError::Poll(_))
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
