//! Required-topic gap detection.

use serde::Serialize;
use tracing::{debug, instrument};

use bizproposal_shared::Topic;

/// Topics from `taxonomy` whose name does not occur in `text`.
///
/// Matching is a case-insensitive substring test on the literal topic name;
/// the result keeps taxonomy order.
#[instrument(skip_all, fields(chars = text.len()))]
pub fn detect_missing(text: &str, taxonomy: &[Topic]) -> Vec<Topic> {
    let haystack = text.to_lowercase();
    let missing: Vec<Topic> = taxonomy
        .iter()
        .copied()
        .filter(|topic| !haystack.contains(&topic.name().to_lowercase()))
        .collect();
    debug!(missing = missing.len(), total = taxonomy.len(), "gap detection done");
    missing
}

/// Present/missing split of the taxonomy for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GapReport {
    pub present: Vec<Topic>,
    pub missing: Vec<Topic>,
}

impl GapReport {
    pub fn from_text(text: &str, taxonomy: &[Topic]) -> Self {
        let missing = detect_missing(text, taxonomy);
        let present = taxonomy
            .iter()
            .copied()
            .filter(|t| !missing.contains(t))
            .collect();
        Self { present, missing }
    }

    /// Missing topics that the given template actually uses.
    pub fn missing_in(&self, order: &[Topic]) -> Vec<Topic> {
        order
            .iter()
            .copied()
            .filter(|t| self.missing.contains(t))
            .collect()
    }
}
