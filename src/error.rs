//! Error types for pfxbatch.
//!
//! The simulation itself has no recoverable failure modes: broken invariants
//! are programming errors and are caught with debug assertions. Errors only
//! appear at the edges, when a configuration record is validated or when a
//! render backend is asked to create GPU-visible resources.

use thiserror::Error;

/// Errors produced while validating effect configurations or creating
/// render resources.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FxError {
    /// Particles-per-second must be a finite, non-negative number.
    #[error("invalid emission rate: {0} particles per second")]
    InvalidRate(f32),

    /// The lifetime range can produce particles that never live.
    #[error("invalid particle lifetime: average {avg}ms with variance {var}ms")]
    InvalidLifetime { avg: f32, var: f32 },

    /// The effect references a texture the backend does not know about.
    #[error("texture '{0}' is not registered with the render backend")]
    UnknownTexture(String),

    /// A vertex buffer would exceed the device's maximum buffer size.
    #[error("buffer of {size} bytes exceeds device limit of {limit} bytes")]
    BufferTooLarge { size: u64, limit: u64 },

    /// A frame slot index outside `0..frames_in_flight` was used.
    #[error("frame slot {frame} out of range (frames in flight: {frames})")]
    FrameOutOfRange { frame: usize, frames: usize },
}

/// Result type using [`FxError`].
pub type Result<T> = std::result::Result<T, FxError>;
