//! Error types for bizproposal.
//!
//! Library crates use [`ProposalError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics, and renders
//! [`ErrorPayload`] when structured output is requested.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::taxonomy::Topic;

/// Top-level error type for all bizproposal operations.
#[derive(Debug, thiserror::Error)]
pub enum ProposalError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level HTTP failure talking to a collaborator.
    #[error("network error: {0}")]
    Network(String),

    /// The text-extraction service was unreachable or rejected the input.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Language detection failed.
    #[error("language detection error: {0}")]
    Detection(String),

    /// Translation failed.
    #[error("translation error: {0}")]
    Translation(String),

    /// Text generation failed for a single topic.
    #[error("generation error for '{}': {message}", topic.name())]
    Generation { topic: Topic, message: String },

    /// Text generation service error not yet attributed to a topic.
    #[error("generation error: {0}")]
    Generator(String),

    /// A collaborator call did not complete within its time budget.
    #[error("timed out after {elapsed:?}: {operation}")]
    Timeout { operation: String, elapsed: Duration },

    /// Template name is not registered.
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    /// Topic identifier is not part of the taxonomy.
    #[error("unknown topic '{0}'")]
    UnknownTopic(String),

    /// No instructions were supplied explicitly or stored for the session.
    #[error(
        "user instructions are missing; provide them or submit them with `instructions submit`"
    )]
    MissingInstructions,

    /// Document rendering failed.
    #[error("rendering error: {0}")]
    Rendering(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad input, malformed response, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ProposalError>;

impl ProposalError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Attach a topic to a generation failure.
    pub fn generation(topic: Topic, msg: impl Into<String>) -> Self {
        Self::Generation {
            topic,
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

    /// Stable machine-readable code for structured error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Network(_) => "network",
            Self::Extraction(_) => "extraction_failed",
            Self::Detection(_) => "detection_failed",
            Self::Translation(_) => "translation_failed",
            Self::Generation { .. } | Self::Generator(_) => "generation_failed",
            Self::Timeout { .. } => "timeout",
            Self::UnknownTemplate(_) => "unknown_template",
            Self::UnknownTopic(_) => "unknown_topic",
            Self::MissingInstructions => "missing_instructions",
            Self::Rendering(_) => "rendering_failed",
            Self::Io { .. } => "io",
            Self::Validation { .. } => "validation",
        }
    }

    /// Whether the error is a caller mistake detected before any service call.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownTemplate(_)
                | Self::UnknownTopic(_)
                | Self::MissingInstructions
                | Self::Validation { .. }
        )
    }

    /// Build the serializable payload for this error.
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            error: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Structured error object returned to callers instead of a raw failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Stable error code (see [`ProposalError::code`]).
    pub error: String,
    /// Human-readable description.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ProposalError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = ProposalError::generation(Topic::ExitStrategy, "HTTP 500");
        assert_eq!(
            err.to_string(),
            "generation error for 'Exit Strategy': HTTP 500"
        );
    }

    #[test]
    fn payload_carries_code() {
        let payload = ProposalError::UnknownTemplate("Template 9".into()).to_payload();
        assert_eq!(payload.error, "unknown_template");
        assert!(payload.message.contains("Template 9"));

        let json = serde_json::to_value(ProposalError::MissingInstructions.to_payload())
            .expect("serialize");
        assert_eq!(json["error"], "missing_instructions");
    }

    #[test]
    fn user_errors_are_classified() {
        assert!(ProposalError::MissingInstructions.is_user_error());
        assert!(ProposalError::UnknownTemplate("x".into()).is_user_error());
        assert!(!ProposalError::Extraction("down".into()).is_user_error());
    }
}
