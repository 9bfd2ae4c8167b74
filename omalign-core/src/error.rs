//! Error types shared by the alignment pipeline and the file readers.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by omalign-core.
///
/// An alignment that produces no peaks, no pairs or a score below the
/// minimum is not an error; the pipeline reports it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum AlignError {
    /// A resolution, blur or scoring constant outside its domain
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Headerless or unparseable tabular input
    #[error("Malformed input at line {line}: {message}")]
    MalformedInput { line: usize, message: String },

    /// A benchmark file that is neither XMAP- nor SDATA-shaped
    #[error("Unsupported format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AlignError {
    pub fn invalid_parameter<S: Into<String>>(message: S) -> Self {
        Self::InvalidParameter(message.into())
    }

    pub fn malformed<S: Into<String>>(line: usize, message: S) -> Self {
        Self::MalformedInput {
            line,
            message: message.into(),
        }
    }

    /// True for errors caused by the content of an input file.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::MalformedInput { .. } | Self::UnsupportedFormat { .. })
    }
}

pub type AlignResult<T> = Result<T, AlignError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AlignError::malformed(12, "missing Position column");
        assert_eq!(
            err.to_string(),
            "Malformed input at line 12: missing Position column"
        );
        assert!(err.is_input_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AlignError = io_err.into();
        assert!(matches!(err, AlignError::Io(_)));
        assert!(!err.is_input_error());
    }
}
