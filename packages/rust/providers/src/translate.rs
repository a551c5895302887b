//! Language detection and translation over Google's `translate_a/single`
//! endpoint.
//!
//! The endpoint answers with a positional JSON array:
//! `[[["<translated>", "<source>", ...], ...], null, "<detected-lang>", ...]`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use bizproposal_shared::{ProposalError, Result, TranslationConfig};

use crate::http::{build_client, snippet, transport_error};
use crate::{LanguageDetector, Translator};

/// Client implementing both [`LanguageDetector`] and [`Translator`].
pub struct GoogleTranslateClient {
    client: Client,
    endpoint: Url,
    /// Target language used for detection-only requests.
    detect_target: String,
    timeout_secs: u64,
}

impl GoogleTranslateClient {
    pub fn new(config: &TranslationConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            endpoint: config.endpoint.clone(),
            detect_target: config.primary_language.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    async fn query(&self, text: &str, source: &str, target: &str) -> Result<Value> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| transport_error("translation request", self.timeout_secs, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error("translation response", self.timeout_secs, e))?;

        if !status.is_success() {
            return Err(ProposalError::Network(format!(
                "translation service returned HTTP {status}: {}",
                snippet(&body)
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProposalError::validation(format!("malformed translation response: {e}"))
        })
    }
}

/// Concatenate the translated segments of a response.
fn translated_text(value: &Value) -> Option<String> {
    let segments = value.get(0)?.as_array()?;
    let text: String = segments
        .iter()
        .filter_map(|seg| seg.get(0).and_then(Value::as_str))
        .collect();
    Some(text)
}

/// Source language echoed back by the service.
fn detected_language(value: &Value) -> Option<String> {
    value.get(2).and_then(Value::as_str).map(str::to_string)
}

#[async_trait]
impl LanguageDetector for GoogleTranslateClient {
    #[instrument(skip_all, fields(chars = text.len()))]
    async fn detect(&self, text: &str) -> Result<String> {
        let value = self
            .query(text, "auto", &self.detect_target)
            .await
            .map_err(|e| ProposalError::Detection(e.to_string()))?;

        let lang = detected_language(&value).ok_or_else(|| {
            ProposalError::Detection("response carries no detected language".into())
        })?;
        debug!(%lang, "language detected");
        Ok(lang)
    }
}

#[async_trait]
impl Translator for GoogleTranslateClient {
    #[instrument(skip_all, fields(source = %source, target = %target, chars = text.len()))]
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let value = self
            .query(text, source, target)
            .await
            .map_err(|e| ProposalError::Translation(e.to_string()))?;

        translated_text(&value)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProposalError::Translation("response carries no translation".into()))
    }
}
