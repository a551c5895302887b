//! Application configuration for bizproposal.
//!
//! User config lives at `~/.bizproposal/bizproposal.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ProposalError, Result};
use crate::taxonomy::DEFAULT_TEMPLATE;
use crate::types::{DEFAULT_TITLE, FailurePolicy};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "bizproposal.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".bizproposal";

// ---------------------------------------------------------------------------
// Config structs (matching bizproposal.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Text-generation service settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// OCR / text-extraction service settings.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Language detection and translation settings.
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Optional per-topic detail collection.
    #[serde(default)]
    pub details: DetailsConfig,

    /// User-defined templates, registered after the built-ins.
    #[serde(default)]
    pub templates: Vec<TemplateConfig>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Template used when none is selected.
    #[serde(default = "default_template")]
    pub template: String,

    /// Directory generated documents are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Output format: "docx" or "md".
    #[serde(default = "default_format")]
    pub format: String,

    /// What a failed topic does to the request.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Document title.
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
            output_dir: default_output_dir(),
            format: default_format(),
            failure_policy: FailurePolicy::default(),
            title: default_title(),
        }
    }
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.into()
}
fn default_output_dir() -> String {
    ".".into()
}
fn default_format() -> String {
    "docx".into()
}
fn default_title() -> String {
    DEFAULT_TITLE.into()
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_generation_key_env")]
    pub api_key_env: String,

    /// Chat model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible API root (the client appends `/chat/completions`).
    #[serde(default = "default_generation_url")]
    pub base_url: Url,

    /// Per-call time budget.
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Maximum in-flight generation calls per request.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Optional completion length cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_generation_key_env(),
            model: default_model(),
            base_url: default_generation_url(),
            timeout_secs: default_generation_timeout(),
            concurrency: default_concurrency(),
            max_tokens: None,
        }
    }
}

fn default_generation_key_env() -> String {
    "GROQ_API_KEY".into()
}
fn default_model() -> String {
    "llama-3.1-8b-instant".into()
}
fn default_generation_url() -> Url {
    Url::parse("https://api.groq.com/openai/v1").expect("valid default URL")
}
fn default_generation_timeout() -> u64 {
    60
}
fn default_concurrency() -> u32 {
    4
}

/// `[extraction]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Name of the env var holding the OCR API key.
    #[serde(default = "default_extraction_key_env")]
    pub api_key_env: String,

    /// OCR endpoint receiving the multipart upload.
    #[serde(default = "default_extraction_url")]
    pub endpoint: Url,

    /// OCR language hint.
    #[serde(default = "default_ocr_language")]
    pub language: String,

    #[serde(default = "default_extraction_timeout")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_extraction_key_env(),
            endpoint: default_extraction_url(),
            language: default_ocr_language(),
            timeout_secs: default_extraction_timeout(),
        }
    }
}

fn default_extraction_key_env() -> String {
    "OCR_SPACE_API_KEY".into()
}
fn default_extraction_url() -> Url {
    Url::parse("https://api.ocr.space/parse/image").expect("valid default URL")
}
fn default_ocr_language() -> String {
    "eng".into()
}
fn default_extraction_timeout() -> u64 {
    90
}

/// `[translation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Translate endpoint (Google `translate_a/single` compatible).
    #[serde(default = "default_translation_url")]
    pub endpoint: Url,

    #[serde(default = "default_translation_timeout")]
    pub timeout_secs: u64,

    /// Working language for prompts and stored instructions.
    #[serde(default = "default_primary_language")]
    pub primary_language: String,

    /// Language that is translated into the working language.
    #[serde(default = "default_secondary_language")]
    pub secondary_language: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_translation_url(),
            timeout_secs: default_translation_timeout(),
            primary_language: default_primary_language(),
            secondary_language: default_secondary_language(),
        }
    }
}

fn default_translation_url() -> Url {
    Url::parse("https://translate.googleapis.com/translate_a/single").expect("valid default URL")
}
fn default_translation_timeout() -> u64 {
    15
}
fn default_primary_language() -> String {
    "en".into()
}
fn default_secondary_language() -> String {
    "si".into()
}

/// `[details]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailsConfig {
    /// Base URL of a service exposing `POST /missing/{topic-slug}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collect_url: Option<Url>,

    #[serde(default = "default_details_timeout")]
    pub timeout_secs: u64,
}

fn default_details_timeout() -> u64 {
    10
}

impl Default for DetailsConfig {
    fn default() -> Self {
        Self {
            collect_url: None,
            timeout_secs: default_details_timeout(),
        }
    }
}

/// `[[templates]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Unique template name.
    pub name: String,
    /// Topic names or slugs, in section order.
    pub topics: Vec<String>,
}

// ---------------------------------------------------------------------------
// Runtime pipeline settings (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime settings for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Maximum in-flight generation calls.
    pub concurrency: u32,
    /// Per generation call time budget, in seconds.
    pub generation_timeout_secs: u64,
    pub failure_policy: FailurePolicy,
    pub title: String,
    pub primary_language: String,
    pub secondary_language: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.generation.concurrency.max(1),
            generation_timeout_secs: config.generation.timeout_secs,
            failure_policy: config.defaults.failure_policy,
            title: config.defaults.title.clone(),
            primary_language: config.translation.primary_language.clone(),
            secondary_language: config.translation.secondary_language.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.bizproposal/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| ProposalError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.bizproposal/bizproposal.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ProposalError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ProposalError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ProposalError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ProposalError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ProposalError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a service API key from the env var named in config.
pub fn api_key(var_name: &str, service: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(ProposalError::config(format!(
            "{service} API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that every API key the generate flow needs is present.
pub fn validate_api_keys(config: &AppConfig) -> Result<()> {
    api_key(&config.generation.api_key_env, "Text generation")?;
    api_key(&config.extraction.api_key_env, "OCR")?;
    Ok(())
}
