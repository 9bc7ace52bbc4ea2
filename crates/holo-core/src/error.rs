/// Core error types for the Holo renderer.
use std::path::PathBuf;

/// A specialized Result type for Holo operations.
pub type HoloResult<T> = Result<T, HoloError>;

/// Top-level error type encompassing every fatal condition of a render.
///
/// None of these are retried internally: each one aborts the current
/// invocation and is reported to the caller as-is.
#[derive(Debug, thiserror::Error)]
pub enum HoloError {
    /// No usable GPU backend/driver could be acquired.
    #[error("failed to create offscreen graphics context: {0}")]
    ContextCreation(String),

    /// An operation was attempted on a graphics context after `release()`.
    #[error("graphics context used after release ({operation})")]
    UseAfterRelease { operation: &'static str },

    #[error("input not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("failed to decode image '{}': {message}", path.display())]
    ImageDecode { message: String, path: PathBuf },

    #[error("shader compile error in {stage}: {diagnostic}")]
    ShaderCompile { stage: String, diagnostic: String },

    #[error("invalid configuration: {0}")]
    ConfigValidation(String),

    #[error("failed to load config '{}': {message}", path.display())]
    ConfigLoad { message: String, path: PathBuf },

    #[error("failed to encode '{}': {message}", path.display())]
    Encode { message: String, path: PathBuf },

    #[error("gpu error: {0}")]
    Gpu(String),
}

impl HoloError {
    /// Create an image decode error.
    pub fn decode(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        HoloError::ImageDecode {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Create an encode error.
    pub fn encode(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        HoloError::Encode {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Create a shader compile error carrying the compiler diagnostic.
    pub fn shader(stage: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        HoloError::ShaderCompile {
            stage: stage.into(),
            diagnostic: diagnostic.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        HoloError::ConfigValidation(message.into())
    }
}
