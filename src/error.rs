//! Custom error types for dallify.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the dallify library.
#[derive(Error, Debug)]
pub enum Error {
    /// The input image does not exist.
    #[error("the image path '{}' does not exist", path.display())]
    ImageNotFound { path: PathBuf },

    /// Failed to load an image file.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to save an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A model file is missing from the models root.
    #[error("model file {name} is not available at {path}")]
    ModelUnavailable { name: String, path: PathBuf },

    /// Failed to load an ONNX model.
    #[error("failed to load ONNX model {name}: {source}")]
    ModelLoad {
        name: String,
        #[source]
        source: ort::Error,
    },

    /// Model inference failed.
    #[error("model inference failed: {source}")]
    Inference {
        #[source]
        source: ort::Error,
    },

    /// The tokenizer vocabulary could not be read.
    #[error("invalid vocabulary file {path}: {reason}")]
    Vocabulary { path: PathBuf, reason: String },

    /// The requested variant or precision cannot run on this runtime.
    #[error("invalid model configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Shape mismatch in tensor operations.
    #[error("tensor shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
}

impl Error {
    pub(crate) fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for dallify operations.
pub type Result<T> = std::result::Result<T, Error>;
