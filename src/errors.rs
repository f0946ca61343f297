//! Error Types
//!
//! The only runtime failures this crate surfaces are device-side: a
//! readback transfer that the hardware layer cannot answer. Admission
//! rejections (full frame, full in-flight queue, pipeline still compiling)
//! are not errors — they are silent, recoverable conditions reported
//! through return values and [`ProbeStats`](crate::ProbeStats).

use thiserror::Error;

/// The error type for probe readback operations.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Asynchronous mapping of a readback buffer failed on the device.
    #[error("Readback buffer mapping failed: {0}")]
    ReadbackMapFailed(String),

    /// Backend-specific failure outside the buffer-mapping path.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Alias for `Result<T, ProbeError>`.
pub type Result<T> = std::result::Result<T, ProbeError>;
