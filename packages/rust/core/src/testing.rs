//! In-memory collaborators with call counters, for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use bizproposal_providers::{
    DetailCollector, LanguageDetector, TextExtractor, TextGenerator, Translator,
};
use bizproposal_shared::{ProposalError, Result, Topic};

use crate::pipeline::{PipelineStage, ProgressReporter};

pub(crate) struct FakeExtractor {
    pub text: String,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(&self, _bytes: &[u8], file_name: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProposalError::Extraction(format!("{file_name}: service down")));
        }
        Ok(self.text.clone())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Detects `si` for any non-ASCII text, `en` otherwise; or always fails.
pub(crate) struct FakeDetector {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeDetector {
    pub fn new() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LanguageDetector for FakeDetector {
    async fn detect(&self, text: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProposalError::Detection("detector offline".into()));
        }
        Ok(if text.is_ascii() { "en" } else { "si" }.to_string())
    }
}

/// Returns a fixed translation for any input.
pub(crate) struct FakeTranslator {
    pub output: String,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeTranslator {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, _text: &str, _source: &str, _target: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProposalError::Translation("translator offline".into()));
        }
        Ok(self.output.clone())
    }
}

/// Echoes the topic back; fails or stalls for selected topics.
pub(crate) struct FakeGenerator {
    pub fail_on: Vec<Topic>,
    pub stall_on: Vec<Topic>,
    /// Earlier topics in this list answer later, to shuffle completion order.
    pub delay_ms: u64,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self {
            fail_on: Vec::new(),
            stall_on: Vec::new(),
            delay_ms: 0,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(topics: &[Topic]) -> Self {
        Self {
            fail_on: topics.to_vec(),
            ..Self::new()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

fn topic_of(prompt: &str) -> Option<Topic> {
    let start = prompt.find('\'')? + 1;
    let end = start + prompt[start..].find('\'')?;
    Topic::parse(&prompt[start..end]).ok()
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let topic = topic_of(prompt).ok_or_else(|| ProposalError::Generator("no topic".into()))?;

        if self.delay_ms > 0 {
            let wait = self.delay_ms.saturating_sub(n as u64 * 5);
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }
        if self.stall_on.contains(&topic) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_on.contains(&topic) {
            return Err(ProposalError::Generator("HTTP 500".into()));
        }
        Ok(format!("Generated {}", topic.name()))
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

/// Fails for the listed topics, answers `detail for <topic>` otherwise.
pub(crate) struct FakeDetails {
    pub fail_on: Vec<Topic>,
    pub blank_on: Vec<Topic>,
    pub calls: AtomicUsize,
}

impl FakeDetails {
    pub fn new(fail_on: &[Topic]) -> Self {
        Self {
            fail_on: fail_on.to_vec(),
            blank_on: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DetailCollector for FakeDetails {
    async fn collect_detail(&self, topic: Topic, _hint: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.contains(&topic) {
            return Err(ProposalError::Network("detail service down".into()));
        }
        if self.blank_on.contains(&topic) {
            return Ok("   ".into());
        }
        Ok(format!("detail for {}", topic.name()))
    }
}

/// Records stages in the order they were reported.
#[derive(Default)]
pub(crate) struct RecordingProgress {
    pub stages: Mutex<Vec<PipelineStage>>,
    pub failed_at: Mutex<Option<PipelineStage>>,
    pub sections: AtomicUsize,
}

impl RecordingProgress {
    pub fn stages(&self) -> Vec<PipelineStage> {
        self.stages.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingProgress {
    fn stage(&self, stage: PipelineStage) {
        self.stages.lock().unwrap().push(stage);
    }

    fn section_generated(&self, _topic: Topic, _current: usize, _total: usize) {
        self.sections.fetch_add(1, Ordering::SeqCst);
    }

    fn failed(&self, stage: PipelineStage, _error: &ProposalError) {
        *self.failed_at.lock().unwrap() = Some(stage);
    }
}
