//! Error types for Competitor Intel.
//!
//! Library crates use [`CompintelError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::Stage;

/// Top-level error type for all Competitor Intel operations.
#[derive(Debug, thiserror::Error)]
pub enum CompintelError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to a site or an external API.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Reasoning engine (LLM API) call failed.
    #[error("reasoning engine error: {0}")]
    Reasoning(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad URL, invalid input, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// HTML-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// The target site could not be fetched or returned no content.
    #[error("scrape failed: {0}")]
    Scrape(String),

    /// Company profile extraction failed.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Competitor ranking failed.
    #[error("ranking failed: {0}")]
    Ranking(String),

    /// Comparative analysis synthesis failed.
    #[error("analysis failed: {0}")]
    Analysis(String),

    /// A reasoning-engine response could not be parsed into the expected shape.
    #[error("malformed {stage} response: {message}")]
    MalformedResponse { stage: Stage, message: String },

    /// The report could not be stored.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// The report email could not be sent.
    #[error("notification failed: {0}")]
    Notify(String),

    /// A mandatory external call exceeded its time budget.
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: Stage, secs: u64 },

    /// The run was cancelled by the caller.
    #[error("cancelled during {stage}")]
    Cancelled { stage: Stage },

    /// A pipeline stage failed; wraps the underlying cause.
    #[error("pipeline failed at {stage}: {source}")]
    Pipeline {
        stage: Stage,
        #[source]
        source: Box<CompintelError>,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CompintelError>;

impl CompintelError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a stage-tagged malformed response error.
    pub fn malformed(stage: Stage, msg: impl Into<String>) -> Self {
        Self::MalformedResponse {
            stage,
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap an error with the pipeline stage it originated from.
    ///
    /// Errors that are already `Pipeline` errors are returned unchanged.
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            Self::Pipeline { .. } => self,
            other => Self::Pipeline {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The pipeline stage this error originated from, if known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Pipeline { stage, .. }
            | Self::MalformedResponse { stage, .. }
            | Self::Timeout { stage, .. }
            | Self::Cancelled { stage } => Some(*stage),
            _ => None,
        }
    }

    /// The innermost cause of a `Pipeline` error (or `self` otherwise).
    pub fn root(&self) -> &CompintelError {
        match self {
            Self::Pipeline { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CompintelError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = CompintelError::malformed(Stage::Rank, "expected array");
        assert_eq!(err.to_string(), "malformed rank response: expected array");
    }

    #[test]
    fn at_stage_wraps_once() {
        let err = CompintelError::Ranking("not json".into())
            .at_stage(Stage::Rank)
            .at_stage(Stage::Analyze);

        assert_eq!(err.stage(), Some(Stage::Rank));
        assert!(matches!(err.root(), CompintelError::Ranking(_)));
        assert_eq!(
            err.to_string(),
            "pipeline failed at rank: ranking failed: not json"
        );
    }
}
