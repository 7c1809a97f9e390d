//! Error types shared across the compositor
//!
//! Two layers: [`HostError`] is what a window host reports about a single
//! native window or surface, [`ShatterError`] is everything the compositor and
//! the scene renderer can fail with. Initialization failures are fatal;
//! everything raised while a frame is running is recoverable and only costs
//! that frame.

use thiserror::Error;

use crate::window::{SurfaceId, WindowId};

/// Failures reported by a [`WindowHost`](crate::host::WindowHost)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The native window was destroyed behind the compositor's back
    #[error("window {0} is no longer available")]
    StaleWindow(WindowId),

    /// A surface handle the host never issued (or already released)
    #[error("surface {0} is not known to the host")]
    UnknownSurface(SurfaceId),

    /// The drawable surface refused a resize, map or present
    #[error("surface operation failed: {0}")]
    Surface(String),

    /// The platform cannot perform the request at all (e.g. absolute
    /// positioning on Wayland)
    #[error("unsupported by the window host: {0}")]
    Unsupported(&'static str),
}

/// Errors raised by the compositor core and the scene backend
#[derive(Debug, Error)]
pub enum ShatterError {
    #[error("no suitable GPU adapter found")]
    AdapterUnavailable,

    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("scene backend initialization failed: {0}")]
    BackendInit(String),

    #[error("failed to map staging buffer: {0}")]
    StagingMap(String),

    #[error("scene size mismatch: expected {expected:?}, got {actual:?}")]
    SceneSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("failed to decode scene image: {0}")]
    ImageDecode(#[from] png::DecodingError),

    #[error("unsupported scene image: {0}")]
    UnsupportedImage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("window {0} is already registered")]
    DuplicateWindow(WindowId),

    #[error(transparent)]
    Host(#[from] HostError),
}

impl ShatterError {
    /// Whether the failure only costs the current frame (or the optional
    /// scene image) rather than aborting startup.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ShatterError::AdapterUnavailable
            | ShatterError::Device(_)
            | ShatterError::BackendInit(_) => false,
            ShatterError::StagingMap(_)
            | ShatterError::SceneSize { .. }
            | ShatterError::ImageDecode(_)
            | ShatterError::UnsupportedImage(_)
            | ShatterError::Io(_)
            | ShatterError::DuplicateWindow(_)
            | ShatterError::Host(_) => true,
        }
    }
}

pub type Result<T, E = ShatterError> = std::result::Result<T, E>;
