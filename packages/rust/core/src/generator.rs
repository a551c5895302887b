//! Per-topic content generation.
//!
//! One independent generation call per topic, dispatched concurrently under a
//! semaphore and collected back in template order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use bizproposal_providers::TextGenerator;
use bizproposal_shared::{
    BusinessMetadata, FailurePolicy, PipelineSettings, ProposalContent, ProposalError,
    ProposalSection, Result, SectionBody, Topic, TopicDetails,
};

use crate::pipeline::ProgressReporter;

/// Build the generation prompt for one topic.
///
/// Deterministic in its inputs; `detail` is empty for topics the source
/// document already covers.
pub fn build_prompt(
    topic: Topic,
    metadata: &BusinessMetadata,
    instructions: &str,
    detail: &str,
) -> String {
    format!(
        "Create detailed content for the topic '{topic}'.\n\
         Business Name: {name}\n\
         Domain: {domain}\n\
         Existing Business: {existing}\n\
         Instructions: {instructions}\n\
         Details: {detail}\n",
        topic = topic.name(),
        name = metadata.name,
        domain = metadata.domain,
        existing = metadata.existing_label(),
    )
}

/// Fans generation out across topics and fans it back in, in order.
#[derive(Clone)]
pub struct ProposalGenerator {
    generator: Arc<dyn TextGenerator>,
    concurrency: usize,
    timeout: Duration,
    policy: FailurePolicy,
}

impl ProposalGenerator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        concurrency: usize,
        timeout: Duration,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            generator,
            concurrency: concurrency.max(1),
            timeout,
            policy,
        }
    }

    pub fn from_settings(generator: Arc<dyn TextGenerator>, settings: &PipelineSettings) -> Self {
        Self::new(
            generator,
            settings.concurrency as usize,
            Duration::from_secs(settings.generation_timeout_secs),
            settings.failure_policy,
        )
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Generate one section per topic in `order`.
    ///
    /// The result has exactly one entry per topic, in `order`, regardless of
    /// completion order. With [`FailurePolicy::Mark`] a failed or timed-out
    /// call becomes a [`SectionBody::Failed`] entry; with
    /// [`FailurePolicy::Abort`] the first failure in `order` fails the whole
    /// call and outstanding calls are cancelled.
    #[instrument(
        skip_all,
        fields(topics = order.len(), model = self.generator.model(), policy = ?self.policy)
    )]
    pub async fn generate(
        &self,
        metadata: &BusinessMetadata,
        instructions: &str,
        details: &TopicDetails,
        order: &[Topic],
        progress: &dyn ProgressReporter,
    ) -> Result<ProposalContent> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let total = order.len();

        info!(concurrency = self.concurrency, "dispatching generation calls");

        let mut handles = Vec::with_capacity(total);
        for &topic in order {
            let detail = details.get(&topic).map(String::as_str).unwrap_or("");
            let prompt = build_prompt(topic, metadata, instructions, detail);
            let generator = self.generator.clone();
            let sem = semaphore.clone();
            let timeout = self.timeout;

            handles.push(tokio::spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| ProposalError::Generator(format!("scheduler closed: {e}")))?;

                match tokio::time::timeout(timeout, generator.generate(&prompt)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProposalError::Timeout {
                        operation: format!("generation for '{}'", topic.name()),
                        elapsed: timeout,
                    }),
                }
            }));
        }

        // Collect in dispatch order, which is template order
        let mut sections = Vec::with_capacity(total);
        let mut pending = handles.into_iter();
        let mut index = 0usize;
        while let Some(handle) = pending.next() {
            let topic = order[index];
            index += 1;

            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => Err(ProposalError::Generator(format!("generation task failed: {e}"))),
            };

            let body = match outcome {
                Ok(text) => {
                    debug!(%topic, chars = text.len(), "section generated");
                    SectionBody::Generated(text)
                }
                Err(e) => match self.policy {
                    FailurePolicy::Mark => {
                        warn!(%topic, error = %e, "generation failed, marking section");
                        SectionBody::Failed(failure_reason(&e))
                    }
                    FailurePolicy::Abort => {
                        for rest in pending.by_ref() {
                            rest.abort();
                        }
                        warn!(%topic, error = %e, "generation failed, aborting proposal");
                        return Err(ProposalError::generation(topic, failure_reason(&e)));
                    }
                },
            };

            progress.section_generated(topic, index, total);
            sections.push(ProposalSection { topic, body });
        }

        let content = ProposalContent { sections };
        info!(
            generated = content.len() - content.failed_topics().len(),
            failed = content.failed_topics().len(),
            "generation complete"
        );
        Ok(content)
    }
}

/// Short reason text for a failed section.
fn failure_reason(error: &ProposalError) -> String {
    match error {
        ProposalError::Generator(message) | ProposalError::Network(message) => message.clone(),
        ProposalError::Generation { message, .. } => message.clone(),
        ProposalError::Timeout { elapsed, .. } => format!("timed out after {elapsed:?}"),
        other => other.to_string(),
    }
}
