//! Error handling for the omalign CLI

use omalign_core::AlignError;
use std::path::PathBuf;
use thiserror::Error;

/// Process exit code for malformed or unreadable input.
pub const EXIT_INPUT_ERROR: i32 = 1;
/// Process exit code for rejected parameters.
pub const EXIT_INVALID_PARAMETER: i32 = 2;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Parsing error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported benchmark format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Output error for {path}: {message}")]
    Output { path: PathBuf, message: String },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn invalid_parameter<S: Into<String>>(message: S) -> Self {
        Self::InvalidParameter { message: message.into() }
    }

    /// Attach the file being read to a core error.
    pub fn reading(path: impl Into<PathBuf>, err: AlignError) -> Self {
        let path = path.into();
        match err {
            AlignError::InvalidParameter(message) => Self::InvalidParameter { message },
            AlignError::UnsupportedFormat { path } => Self::UnsupportedFormat { path },
            AlignError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => Self::FileNotFound { path },
            other => Self::Parse {
                path,
                message: other.to_string(),
            },
        }
    }

    pub fn writing(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Output {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::InvalidParameter { .. } => EXIT_INVALID_PARAMETER,
            Self::FileNotFound { .. }
            | Self::Parse { .. }
            | Self::UnsupportedFormat { .. }
            | Self::Output { .. } => EXIT_INPUT_ERROR,
        }
    }
}

/// Exit code for any error surfaced by `main`.
pub fn exit_code(error: &anyhow::Error) -> i32 {
    if let Some(cli) = error.downcast_ref::<CliError>() {
        return cli.exit_code();
    }
    match error.downcast_ref::<AlignError>() {
        Some(AlignError::InvalidParameter(_)) => EXIT_INVALID_PARAMETER,
        _ => EXIT_INPUT_ERROR,
    }
}

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Ensure you have read permissions for the file",
                path.display()
            ));
        }

        CliError::Parse { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check that the file is a CMAP with a #h header line\n\
                 • Ensure the CMapId, Position, LabelChannel and ContigLength columns are present\n\
                 • Ensure the file is not truncated",
            );
        }

        CliError::UnsupportedFormat { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Benchmark truth must be an XMAP or an SDATA table starting with 'Fragment ID'",
            );
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your omalign.toml configuration file\n\
                 • Use 'omalign --print-config' to print the effective configuration",
            );
        }

        _ => {}
    }

    message
}
