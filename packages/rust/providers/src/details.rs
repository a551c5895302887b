//! Per-topic detail collection.
//!
//! Both collectors are best-effort: the resolver falls back to a placeholder
//! for any topic they fail on.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use bizproposal_shared::{DetailsConfig, ProposalError, Result, Topic};

use crate::DetailCollector;
use crate::http::{build_client, snippet, transport_error};

#[derive(Debug, Serialize)]
struct DetailRequest<'a> {
    details: &'a str,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    #[serde(default)]
    topic: Option<String>,
    details: String,
}

/// Asks a remote service for details via `POST {base}/missing/{slug}`.
pub struct HttpDetailCollector {
    client: Client,
    base_url: Url,
    timeout_secs: u64,
}

impl HttpDetailCollector {
    pub fn new(base_url: Url, config: &DetailsConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Collector for `[details] collect_url`, if one is configured.
    pub fn from_config(config: &DetailsConfig) -> Result<Option<Self>> {
        config
            .collect_url
            .clone()
            .map(|url| Self::new(url, config))
            .transpose()
    }

    fn endpoint(&self, topic: Topic) -> String {
        format!(
            "{}/missing/{}",
            self.base_url.as_str().trim_end_matches('/'),
            topic.slug()
        )
    }
}

#[async_trait]
impl DetailCollector for HttpDetailCollector {
    #[instrument(skip_all, fields(topic = %topic))]
    async fn collect_detail(&self, topic: Topic, hint: &str) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint(topic))
            .json(&DetailRequest { details: hint })
            .send()
            .await
            .map_err(|e| transport_error("detail collection", self.timeout_secs, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error("detail collection", self.timeout_secs, e))?;

        if !status.is_success() {
            return Err(ProposalError::Network(format!(
                "detail service returned HTTP {status} for '{topic}': {}",
                snippet(&body)
            )));
        }

        let parsed: DetailResponse = serde_json::from_str(&body).map_err(|e| {
            ProposalError::validation(format!("malformed detail response for '{topic}': {e}"))
        })?;

        if let Some(echoed) = parsed.topic.as_deref() {
            if Topic::parse(echoed).ok() != Some(topic) {
                return Err(ProposalError::validation(format!(
                    "detail service answered for '{echoed}' instead of '{topic}'"
                )));
            }
        }

        debug!(chars = parsed.details.len(), "detail collected");
        Ok(parsed.details)
    }
}

/// Details supplied up front in a TOML or JSON file.
///
/// Keys are topic names or slugs; unknown keys are rejected on load.
#[derive(Debug, Clone, Default)]
pub struct FileDetailCollector {
    details: BTreeMap<Topic, String>,
}

impl FileDetailCollector {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ProposalError::io(path, e))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let raw: BTreeMap<String, String> = if is_json {
            serde_json::from_str(&content).map_err(|e| {
                ProposalError::validation(format!("failed to parse {}: {e}", path.display()))
            })?
        } else {
            toml::from_str(&content).map_err(|e| {
                ProposalError::validation(format!("failed to parse {}: {e}", path.display()))
            })?
        };

        Self::from_pairs(raw)
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut details = BTreeMap::new();
        for (key, value) in pairs {
            let topic = Topic::parse(key.as_ref())?;
            details.insert(topic, value.into());
        }
        Ok(Self { details })
    }

    pub fn len(&self) -> usize {
        self.details.len()
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }
}

#[async_trait]
impl DetailCollector for FileDetailCollector {
    async fn collect_detail(&self, topic: Topic, _hint: &str) -> Result<String> {
        self.details
            .get(&topic)
            .cloned()
            .ok_or_else(|| ProposalError::validation(format!("no detail supplied for '{topic}'")))
    }
}
