//! Error types for archetype_texture

use std::sync::Arc;
use thiserror::Error;

use crate::gpu::GpuError;

/// Main error type for texture loading operations
///
/// Cloneable so a single failed load can be handed to every caller that was
/// waiting on it.
#[derive(Error, Debug, Clone)]
pub enum TextureError {
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    #[error("Unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    #[error("Truncated data: expected {expected} bytes, found {actual}")]
    TruncatedData { expected: usize, actual: usize },

    #[error("Stream read failure: {0}")]
    StreamReadFailure(#[source] Arc<std::io::Error>),

    #[error("GPU resources exhausted: {0}")]
    GpuResourceExhausted(String),

    #[error("GPU rejected upload: {0}")]
    GpuUploadRejected(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    #[error("Image decoding error: {0}")]
    Decode(String),

    #[error("Load interrupted: {0}")]
    LoadInterrupted(String),

    #[error("Recursive load of '{0}' from its own loader")]
    RecursiveLoad(String),
}

impl From<std::io::Error> for TextureError {
    fn from(err: std::io::Error) -> Self {
        TextureError::StreamReadFailure(Arc::new(err))
    }
}

impl From<GpuError> for TextureError {
    fn from(err: GpuError) -> Self {
        match err {
            GpuError::AllocationFailed(msg) => TextureError::GpuResourceExhausted(msg),
            GpuError::OutOfMemory => TextureError::GpuResourceExhausted("out of memory".into()),
            GpuError::UnsupportedFormat(format) => {
                TextureError::UnsupportedPixelFormat(format!("{format:?}"))
            }
            other => TextureError::GpuUploadRejected(other.to_string()),
        }
    }
}

/// Result type alias for texture operations
pub type Result<T> = std::result::Result<T, TextureError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::GpuTextureFormat;

    #[test]
    fn test_gpu_error_mapping() {
        let err: TextureError = GpuError::OutOfMemory.into();
        assert!(matches!(err, TextureError::GpuResourceExhausted(_)));

        let err: TextureError = GpuError::UnsupportedFormat(GpuTextureFormat::Bc3).into();
        assert!(matches!(err, TextureError::UnsupportedPixelFormat(_)));

        let err: TextureError = GpuError::UploadFailed("bad level".into()).into();
        assert!(matches!(err, TextureError::GpuUploadRejected(_)));
    }

    #[test]
    fn test_io_error_is_stream_failure() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: TextureError = io.into();
        assert!(matches!(err, TextureError::StreamReadFailure(_)));
        assert!(err.to_string().contains("gone"));
    }
}
