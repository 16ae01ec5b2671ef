//! Per-file extraction errors. Never fatal to a build.

use super::error_code::{self, ErrorCode};

/// Errors that can occur while normalizing one parsed file.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionError {
    #[error("Parsed file has an empty path")]
    EmptyPath,

    #[error("No parse result supplied for {file}")]
    MissingParseResult { file: String },

    #[error("Invalid line range for {function} in {file}: {start}..{end}")]
    InvalidRange {
        file: String,
        function: String,
        start: u32,
        end: u32,
    },

    #[error("Parse result for {file} reports {error_count} syntax errors")]
    TooManySyntaxErrors { file: String, error_count: u32 },
}

impl ExtractionError {
    /// File the error belongs to, when known.
    pub fn file(&self) -> Option<&str> {
        match self {
            Self::EmptyPath => None,
            Self::MissingParseResult { file }
            | Self::InvalidRange { file, .. }
            | Self::TooManySyntaxErrors { file, .. } => Some(file),
        }
    }
}

impl ErrorCode for ExtractionError {
    fn error_code(&self) -> &'static str {
        error_code::EXTRACTION_ERROR
    }
}
