//! Core domain types shared by the pipeline, providers and renderers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{ProposalError, Result};
use crate::taxonomy::Topic;

/// Placeholder used for a missing topic when no real detail was collected.
pub const DETAILS_NOT_PROVIDED: &str = "Details not provided";

/// Title given to generated documents unless overridden.
pub const DEFAULT_TITLE: &str = "Business Proposal";

/// MIME type of the word-processing artifact.
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// MIME type of the Markdown artifact.
pub const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 identifying one generation run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Request-side types
// ---------------------------------------------------------------------------

/// A source document as uploaded by the caller.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Caller-supplied facts about the business. Immutable for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessMetadata {
    pub name: String,
    pub domain: String,
    /// Whether the business already operates (as opposed to a new venture).
    pub is_existing: bool,
}

impl BusinessMetadata {
    /// The `Yes`/`No` form used in generation prompts.
    pub fn existing_label(&self) -> &'static str {
        if self.is_existing { "Yes" } else { "No" }
    }
}

/// Parse the boolean-like flag accepted from forms and config files.
pub fn parse_yes_no(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" | "existing" => Ok(true),
        "no" | "n" | "false" | "0" | "new" => Ok(false),
        other => Err(ProposalError::validation(format!(
            "expected yes/no for existing business, got '{other}'"
        ))),
    }
}

/// Language tag for submitted instructions: a concrete code or `auto`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageTag {
    Auto,
    Code(String),
}

impl std::str::FromStr for LanguageTag {
    type Err = ProposalError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "" => Err(ProposalError::validation("language tag must not be empty")),
            "auto" => Ok(Self::Auto),
            code if code.chars().all(|c| c.is_ascii_alphabetic() || c == '-') => {
                Ok(Self::Code(code.to_string()))
            }
            other => Err(ProposalError::validation(format!(
                "invalid language tag '{other}'"
            ))),
        }
    }
}

/// Instructions after language resolution (and translation, if any).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions {
    /// Language the caller wrote in, before translation.
    pub original_language: String,
    /// Text in the working language.
    pub text: String,
}

/// Resolved per-topic details, keyed in taxonomy order.
pub type TopicDetails = BTreeMap<Topic, String>;

/// How a failed per-topic generation call affects the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Replace the failed section with an error marker and continue.
    #[default]
    Mark,
    /// Fail the whole request.
    Abort,
}

impl std::str::FromStr for FailurePolicy {
    type Err = ProposalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mark" => Ok(Self::Mark),
            "abort" => Ok(Self::Abort),
            other => Err(ProposalError::validation(format!(
                "unknown failure policy '{other}' (expected 'mark' or 'abort')"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Generated content
// ---------------------------------------------------------------------------

/// Body of one generated section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum SectionBody {
    Generated(String),
    /// Generation failed; holds the reason.
    Failed(String),
}

impl SectionBody {
    /// Text placed in the document for this section.
    pub fn render_text(&self) -> String {
        match self {
            Self::Generated(text) => text.clone(),
            Self::Failed(reason) => format!("[Content generation failed: {reason}]"),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// One topic and its generated body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSection {
    pub topic: Topic,
    pub body: SectionBody,
}

/// Ordered topic → content mapping. Order is the template order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalContent {
    pub sections: Vec<ProposalSection>,
}

impl ProposalContent {
    pub fn topics(&self) -> Vec<Topic> {
        self.sections.iter().map(|s| s.topic).collect()
    }

    pub fn get(&self, topic: Topic) -> Option<&SectionBody> {
        self.sections
            .iter()
            .find(|s| s.topic == topic)
            .map(|s| &s.body)
    }

    pub fn failed_topics(&self) -> Vec<Topic> {
        self.sections
            .iter()
            .filter(|s| s.body.is_failed())
            .map(|s| s.topic)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A heading plus body, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSection {
    pub heading: String,
    pub body: String,
}

/// The assembled, renderer-independent document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalDocument {
    pub title: String,
    pub sections: Vec<DocumentSection>,
}

/// The rendered document returned to the caller.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    /// Hex SHA-256 of `bytes`.
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            sha256: format!("{:x}", hasher.finalize()),
            bytes,
            created_at: Utc::now(),
        }
    }
}
