//! Shared types, error model, taxonomy, and configuration for bizproposal.
//!
//! This crate is the foundation depended on by all other bizproposal crates.
//! It provides:
//! - [`ProposalError`]: the unified error type
//! - The topic taxonomy and template registry ([`Topic`], [`TemplateRegistry`])
//! - Domain types ([`BusinessMetadata`], [`ProposalContent`], [`Artifact`])
//! - Configuration ([`AppConfig`], [`PipelineSettings`], config loading)

pub mod config;
pub mod error;
pub mod taxonomy;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, DetailsConfig, ExtractionConfig, GenerationConfig,
    PipelineSettings, TemplateConfig, TranslationConfig, api_key, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_api_keys,
};
pub use error::{ErrorPayload, ProposalError, Result};
pub use taxonomy::{DEFAULT_TEMPLATE, TAXONOMY, Template, TemplateRegistry, Topic};
pub use types::{
    Artifact, BusinessMetadata, DETAILS_NOT_PROVIDED, DEFAULT_TITLE, DOCX_CONTENT_TYPE,
    DocumentSection, FailurePolicy, Instructions, LanguageTag, MARKDOWN_CONTENT_TYPE,
    ProposalContent, ProposalDocument, ProposalSection, RunId, SectionBody, SourceDocument,
    TopicDetails, parse_yes_no,
};
