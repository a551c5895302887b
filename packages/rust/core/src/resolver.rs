//! Missing-topic detail resolution.

use tracing::{debug, instrument, warn};

use bizproposal_providers::DetailCollector;
use bizproposal_shared::{DETAILS_NOT_PROVIDED, Topic, TopicDetails};

/// Prompt shown to a detail collector for one topic.
pub fn detail_hint(topic: Topic) -> String {
    format!("Provide details for the '{}' section of the proposal.", topic.name())
}

/// Resolve a detail string for every missing topic.
///
/// A topic gets the collector's answer when it is non-blank, and the
/// `Details not provided` placeholder otherwise. Each topic is collected on
/// its own; a failure for one never affects the others.
#[instrument(skip_all, fields(missing = missing.len(), collector = collector.is_some()))]
pub async fn resolve_details(
    missing: &[Topic],
    collector: Option<&dyn DetailCollector>,
) -> TopicDetails {
    let mut details = TopicDetails::new();
    let mut collected = 0usize;

    for &topic in missing {
        let value = match collector {
            Some(collector) => match collector.collect_detail(topic, &detail_hint(topic)).await {
                Ok(text) if !text.trim().is_empty() => {
                    collected += 1;
                    text
                }
                Ok(_) => {
                    debug!(%topic, "collector returned no detail, using placeholder");
                    DETAILS_NOT_PROVIDED.to_string()
                }
                Err(e) => {
                    warn!(%topic, error = %e, "detail collection failed, using placeholder");
                    DETAILS_NOT_PROVIDED.to_string()
                }
            },
            None => DETAILS_NOT_PROVIDED.to_string(),
        };
        details.insert(topic, value);
    }

    debug!(collected, placeholders = missing.len() - collected, "details resolved");
    details
}
