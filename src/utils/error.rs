//! Error types and handling
//!
//! Common error types used across the capture pipeline.

use thiserror::Error;

/// Pipeline-wide error type
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Rasterization error: {0}")]
    Rasterize(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Unsupported configuration: {0}")]
    Unsupported(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Platform error: {0}")]
    Platform(String),
}

impl CaptureError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::Io(_) => "IO_ERROR",
            CaptureError::Serialization(_) => "SERIALIZATION_ERROR",
            CaptureError::InvalidConfig(_) => "INVALID_CONFIG",
            CaptureError::PermissionDenied(_) => "PERMISSION_DENIED",
            CaptureError::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            CaptureError::Rasterize(_) => "RASTERIZE_ERROR",
            CaptureError::Encoding(_) => "ENCODING_ERROR",
            CaptureError::Unsupported(_) => "UNSUPPORTED",
            CaptureError::Stream(_) => "STREAM_ERROR",
            CaptureError::Platform(_) => "PLATFORM_ERROR",
        }
    }
}

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            CaptureError::PermissionDenied("mic".into()).code(),
            "PERMISSION_DENIED"
        );
        assert_eq!(CaptureError::Encoding("x".into()).code(), "ENCODING_ERROR");
    }

    #[test]
    fn test_io_conversion() {
        let err: CaptureError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "ffmpeg").into();
        assert_eq!(err.code(), "IO_ERROR");
        assert!(err.to_string().contains("ffmpeg"));
    }
}
