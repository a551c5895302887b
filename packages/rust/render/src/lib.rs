//! Document renderers: turn an assembled [`ProposalDocument`] into a binary
//! [`Artifact`].
//!
//! - [`DocxRenderer`]: word-processing document (the default output)
//! - [`MarkdownRenderer`]: plain Markdown, handy for review and diffs

mod docx;
mod markdown;

use bizproposal_shared::{Artifact, ProposalDocument, ProposalError, Result};

pub use docx::DocxRenderer;
pub use markdown::MarkdownRenderer;

/// Renders a document into a deliverable artifact.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, document: &ProposalDocument) -> Result<Artifact>;

    /// File extension of produced artifacts, without the dot.
    fn extension(&self) -> &'static str;
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Docx,
    Markdown,
}

impl OutputFormat {
    pub fn renderer(&self) -> Box<dyn DocumentRenderer> {
        match self {
            Self::Docx => Box::new(DocxRenderer::default()),
            Self::Markdown => Box::new(MarkdownRenderer),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = ProposalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docx" | "word" => Ok(Self::Docx),
            "md" | "markdown" => Ok(Self::Markdown),
            other => Err(ProposalError::validation(format!(
                "unknown output format '{other}' (expected 'docx' or 'md')"
            ))),
        }
    }
}

/// File name for a document title, e.g. `Business Proposal` → `Business_Proposal.docx`.
pub(crate) fn file_name_for(title: &str, extension: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "proposal".to_string() } else { stem };
    format!("{stem}.{extension}")
}
