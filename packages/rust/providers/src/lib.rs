//! External collaborators consumed by the proposal pipeline.
//!
//! Each collaborator is a narrow async trait so the core never depends on a
//! concrete service. The concrete HTTP clients live in the submodules:
//!
//! - [`OcrSpaceExtractor`] / [`LocalTextExtractor`]: text extraction
//! - [`GoogleTranslateClient`]: language detection and translation
//! - [`GroqGenerator`]: chat-completion text generation
//! - [`HttpDetailCollector`] / [`FileDetailCollector`]: per-topic details

mod details;
mod extract;
mod generate;
mod http;
mod translate;

use async_trait::async_trait;
use bizproposal_shared::{Result, Topic};

pub use details::{FileDetailCollector, HttpDetailCollector};
pub use extract::{LocalTextExtractor, OcrSpaceExtractor, is_plain_text};
pub use generate::GroqGenerator;
pub use translate::GoogleTranslateClient;

/// Turns an uploaded document into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract the document's text. May legitimately return an empty string.
    async fn extract(&self, bytes: &[u8], file_name: &str) -> Result<String>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Identifies the language a text is written in.
#[async_trait]
pub trait LanguageDetector: Send + Sync {
    /// Returns a language code such as `en` or `si`.
    async fn detect(&self, text: &str) -> Result<String>;
}

/// Converts text between languages.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

/// Produces text for a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model identifier, for logs and reports.
    fn model(&self) -> &str;
}

/// Best-effort source of real details for a missing topic.
#[async_trait]
pub trait DetailCollector: Send + Sync {
    async fn collect_detail(&self, topic: Topic, hint: &str) -> Result<String>;
}
