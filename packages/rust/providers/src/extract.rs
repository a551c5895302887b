//! Text extraction: OCR.space for scans/PDFs, direct decoding for text files.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use bizproposal_shared::{ExtractionConfig, ProposalError, Result, api_key};

use crate::TextExtractor;
use crate::http::{build_client, snippet, transport_error};

/// OCR.space response body (only the fields we use).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrResponse {
    #[serde(default)]
    parsed_results: Vec<ParsedResult>,
    #[serde(default)]
    is_errored_on_processing: bool,
    /// A string or a list of strings, depending on the failure.
    #[serde(default)]
    error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: String,
}

/// Extracts text through the OCR.space `parse/image` API.
pub struct OcrSpaceExtractor {
    client: Client,
    endpoint: Url,
    api_key: String,
    language: String,
    timeout_secs: u64,
}

impl OcrSpaceExtractor {
    pub fn new(config: &ExtractionConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            endpoint: config.endpoint.clone(),
            api_key: api_key.into(),
            language: config.language.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Build from config, reading the key from the configured env var.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        let key = api_key(&config.api_key_env, "OCR")?;
        Self::new(config, key)
    }

    /// Transport failures (timeouts included) surface as extraction errors.
    fn unreachable(&self, operation: &str, err: reqwest::Error) -> ProposalError {
        ProposalError::Extraction(transport_error(operation, self.timeout_secs, err).to_string())
    }
}

#[async_trait]
impl TextExtractor for OcrSpaceExtractor {
    #[instrument(skip_all, fields(file = %file_name, bytes = bytes.len()))]
    async fn extract(&self, bytes: &[u8], file_name: &str) -> Result<String> {
        if bytes.is_empty() {
            return Err(ProposalError::Extraction(format!(
                "{file_name}: document is empty"
            )));
        }

        let form = Form::new()
            .text("apikey", self.api_key.clone())
            .text("language", self.language.clone())
            .part(
                "file",
                Part::bytes(bytes.to_vec()).file_name(file_name.to_string()),
            );

        info!(endpoint = %self.endpoint, "sending document to OCR");

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.unreachable("OCR request", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.unreachable("OCR response", e))?;

        if !status.is_success() {
            return Err(ProposalError::Extraction(format!(
                "OCR service returned HTTP {status}: {}",
                snippet(&body)
            )));
        }

        let parsed: OcrResponse = serde_json::from_str(&body).map_err(|e| {
            ProposalError::Extraction(format!("malformed OCR response: {e} (got: {})", snippet(&body)))
        })?;

        if parsed.is_errored_on_processing {
            let message = match parsed.error_message {
                Some(serde_json::Value::String(s)) => s,
                Some(serde_json::Value::Array(items)) => items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
                _ => "unknown OCR error".to_string(),
            };
            return Err(ProposalError::Extraction(message));
        }

        if parsed.parsed_results.is_empty() {
            warn!("OCR response has no parsed results, treating document as empty");
        }

        let text = parsed
            .parsed_results
            .into_iter()
            .map(|r| r.parsed_text)
            .collect::<Vec<_>>()
            .join("\n");

        debug!(chars = text.len(), "OCR extraction complete");
        Ok(text)
    }

    fn name(&self) -> &str {
        "ocr.space"
    }
}

/// Whether a file can be read directly instead of going through OCR.
pub fn is_plain_text(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    [".txt", ".md", ".markdown"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}

/// Decodes UTF-8 text documents locally.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTextExtractor;

#[async_trait]
impl TextExtractor for LocalTextExtractor {
    async fn extract(&self, bytes: &[u8], file_name: &str) -> Result<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            ProposalError::Extraction(format!("{file_name}: not valid UTF-8 text: {e}"))
        })
    }

    fn name(&self) -> &str {
        "local-text"
    }
}
