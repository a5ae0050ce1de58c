//! Error types for the NAIP land-cover pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for dataset construction and sample assembly.
#[derive(Error, Debug)]
pub enum Error {
    /// The manifest is missing, unreadable or lacks a required column
    #[error("Failed to load manifest '{path}': {reason}")]
    ManifestLoad { path: PathBuf, reason: String },

    /// A raster could not be read or has too few channels
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// An array has a dimensionality the operation cannot handle
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// A transform or configuration parameter is out of its domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Caller asked for a sample outside `[0, len)`
    #[error("Index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageLoad(PathBuf::new(), err.to_string())
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::InvalidShape(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl Error {
    /// Builds a [`Error::ManifestLoad`] from any displayable cause.
    pub fn manifest(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Error::ManifestLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Builds a [`Error::ImageLoad`] from any displayable cause.
    pub fn image(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Error::ImageLoad(path.into(), reason.to_string())
    }

    /// True for errors that only affect a single sample.
    pub fn is_per_sample(&self) -> bool {
        matches!(self, Error::ImageLoad(..) | Error::IndexOutOfRange { .. })
    }
}

/// Specialized Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidArgument("crop_size must be positive".to_string());
        assert_eq!(err.to_string(), "Invalid argument: crop_size must be positive");
    }

    #[test]
    fn test_index_out_of_range_display() {
        let err = Error::IndexOutOfRange { index: -1, len: 5 };
        assert_eq!(
            err.to_string(),
            "Index -1 out of range for dataset of length 5"
        );
    }

    #[test]
    fn test_manifest_error_names_path() {
        let err = Error::manifest("/data/train.csv", "missing column `Type`");
        let msg = err.to_string();
        assert!(msg.contains("train.csv"));
        assert!(msg.contains("missing column"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_image_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let err: Error = image::ImageError::IoError(io_err).into();
        assert!(matches!(err, Error::ImageLoad(..)));
        assert!(err.is_per_sample());
    }

    #[test]
    fn test_shape_error_conversion() {
        let shape_err = ndarray::Array2::<f32>::from_shape_vec((2, 2), vec![0.0; 3]).unwrap_err();
        let err: Error = shape_err.into();
        assert!(matches!(err, Error::InvalidShape(_)));
    }

    #[test]
    fn test_per_sample_classification() {
        assert!(Error::image("a.png", "truncated").is_per_sample());
        assert!(Error::IndexOutOfRange { index: 9, len: 3 }.is_per_sample());
        assert!(!Error::manifest("m.csv", "empty").is_per_sample());
    }
}
