//! End-to-end proposal pipeline: document → text → gaps → details →
//! instructions → content → document → artifact.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use bizproposal_providers::{
    DetailCollector, LanguageDetector, TextExtractor, TextGenerator, Translator,
};
use bizproposal_render::DocumentRenderer;
use bizproposal_shared::{
    Artifact, BusinessMetadata, Instructions, LanguageTag, PipelineSettings, ProposalContent,
    ProposalError, Result, RunId, SourceDocument, TAXONOMY, TemplateRegistry, Topic,
};

use crate::assembler;
use crate::gaps::GapReport;
use crate::generator::ProposalGenerator;
use crate::instructions::{self, InstructionNormalizer, InstructionSource, InstructionStore};
use crate::resolver;

/// States a request moves through. Transitions are strictly sequential;
/// `Failed` is reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Extracted,
    GapDetected,
    DetailsResolved,
    InstructionsNormalized,
    ContentGenerated,
    Assembled,
    Delivered,
    Failed,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Received => "request received",
            Self::Extracted => "text extracted",
            Self::GapDetected => "gaps detected",
            Self::DetailsResolved => "details resolved",
            Self::InstructionsNormalized => "instructions normalized",
            Self::ContentGenerated => "content generated",
            Self::Assembled => "document assembled",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when the pipeline reaches a new state.
    fn stage(&self, stage: PipelineStage);
    /// Called as each section is collected, in template order.
    fn section_generated(&self, topic: Topic, current: usize, total: usize);
    /// Called once when the request fails; `stage` is the last state reached.
    fn failed(&self, stage: PipelineStage, error: &ProposalError);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: PipelineStage) {}
    fn section_generated(&self, _topic: Topic, _current: usize, _total: usize) {}
    fn failed(&self, _stage: PipelineStage, _error: &ProposalError) {}
}

/// External services the pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn TextExtractor>,
    pub detector: Arc<dyn LanguageDetector>,
    pub translator: Arc<dyn Translator>,
    pub generator: Arc<dyn TextGenerator>,
    /// Without a collector every missing topic gets the placeholder.
    pub details: Option<Arc<dyn DetailCollector>>,
    pub renderer: Arc<dyn DocumentRenderer>,
}

/// One generation request.
#[derive(Debug, Clone)]
pub struct ProposalRequest {
    pub document: SourceDocument,
    pub metadata: BusinessMetadata,
    pub instructions: InstructionSource,
    pub template: String,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct ProposalOutcome {
    pub run_id: RunId,
    pub artifact: Artifact,
    pub content: ProposalContent,
    /// Taxonomy topics absent from the source document.
    pub missing: Vec<Topic>,
    pub template: String,
    pub instructions: Instructions,
    pub elapsed: Duration,
}

/// Result of extraction plus gap detection, without generation.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentAnalysis {
    pub file_name: String,
    pub characters: usize,
    #[serde(flatten)]
    pub report: GapReport,
}

/// The proposal pipeline. Holds no per-request state; one instance can
/// serve many requests.
pub struct ProposalPipeline {
    collaborators: Collaborators,
    templates: TemplateRegistry,
    settings: PipelineSettings,
    store: Arc<dyn InstructionStore>,
    normalizer: InstructionNormalizer,
    generator: ProposalGenerator,
}

impl ProposalPipeline {
    pub fn new(
        collaborators: Collaborators,
        templates: TemplateRegistry,
        settings: PipelineSettings,
        store: Arc<dyn InstructionStore>,
    ) -> Self {
        let normalizer = InstructionNormalizer::new(
            collaborators.detector.clone(),
            collaborators.translator.clone(),
            &settings,
        );
        let generator = ProposalGenerator::from_settings(collaborators.generator.clone(), &settings);
        Self {
            collaborators,
            templates,
            settings,
            store,
            normalizer,
            generator,
        }
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Normalize and store instructions for a session.
    pub async fn submit_instructions(
        &self,
        session: &str,
        text: &str,
        language: &LanguageTag,
    ) -> Result<Instructions> {
        instructions::submit_instructions(
            &self.normalizer,
            self.store.as_ref(),
            session,
            text,
            language,
        )
        .await
    }

    /// Run a request through every stage and return the rendered artifact.
    ///
    /// Unknown templates, missing instructions and malformed metadata are
    /// rejected before any collaborator is called. Stored instructions are
    /// consumed only once the artifact is delivered.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty, template = %request.template))]
    pub async fn run(
        &self,
        request: &ProposalRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<ProposalOutcome> {
        let run_id = RunId::new();
        tracing::Span::current().record("run_id", tracing::field::display(&run_id));

        let mut reached = PipelineStage::Received;
        match self.run_stages(run_id, request, progress, &mut reached).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(stage = ?reached, error = %e, "proposal run failed");
                progress.failed(reached, &e);
                progress.stage(PipelineStage::Failed);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        run_id: RunId,
        request: &ProposalRequest,
        progress: &dyn ProgressReporter,
        reached: &mut PipelineStage,
    ) -> Result<ProposalOutcome> {
        let start = Instant::now();
        let mut advance = |stage: PipelineStage| {
            *reached = stage;
            progress.stage(stage);
        };

        advance(PipelineStage::Received);

        // --- Validation: no collaborator calls before this passes ---
        validate_metadata(&request.metadata)?;
        let template = self.templates.get(&request.template)?.clone();
        let raw_instructions = request.instructions.resolve(self.store.as_ref()).await?;

        info!(
            %run_id,
            template = %template.name,
            topics = template.topics.len(),
            "starting proposal run"
        );

        // --- Extraction ---
        let text = extract_text(self.collaborators.extractor.as_ref(), &request.document)
            .await?;
        advance(PipelineStage::Extracted);

        // --- Gap detection ---
        let report = GapReport::from_text(&text, &TAXONOMY);
        let to_resolve = report.missing_in(&template.topics);
        debug!(
            missing = report.missing.len(),
            in_template = to_resolve.len(),
            "gap detection complete"
        );
        advance(PipelineStage::GapDetected);

        // --- Detail resolution ---
        let details =
            resolver::resolve_details(&to_resolve, self.collaborators.details.as_deref()).await;
        advance(PipelineStage::DetailsResolved);

        // --- Instruction normalization ---
        let instructions = self
            .normalizer
            .normalize(&raw_instructions, &LanguageTag::Auto)
            .await;
        advance(PipelineStage::InstructionsNormalized);

        // --- Generation ---
        let content = self
            .generator
            .generate(
                &request.metadata,
                &instructions.text,
                &details,
                &template.topics,
                progress,
            )
            .await?;
        advance(PipelineStage::ContentGenerated);

        // --- Assembly ---
        let document = assembler::assemble(&self.settings.title, &content);
        let artifact = assembler::render(&document, self.collaborators.renderer.as_ref())?;
        advance(PipelineStage::Assembled);

        // --- Delivery ---
        if let Some(session) = request.instructions.session() {
            self.store.clear(session).await?;
            debug!(%session, "stored instructions consumed");
        }
        advance(PipelineStage::Delivered);

        let elapsed = start.elapsed();
        info!(
            %run_id,
            sections = content.len(),
            failed = content.failed_topics().len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "proposal delivered"
        );

        Ok(ProposalOutcome {
            run_id,
            artifact,
            content,
            missing: report.missing,
            template: template.name,
            instructions,
            elapsed,
        })
    }
}

/// Extract a document's text. An empty upload is rejected without calling
/// the extractor.
pub async fn extract_text(
    extractor: &dyn TextExtractor,
    document: &SourceDocument,
) -> Result<String> {
    if document.bytes.is_empty() {
        return Err(ProposalError::validation(format!(
            "document '{}' is empty",
            document.file_name
        )));
    }
    let text = extractor.extract(&document.bytes, &document.file_name).await?;
    debug!(extractor = extractor.name(), chars = text.len(), "text extracted");
    Ok(text)
}

/// Extract text and report which taxonomy topics are missing.
#[instrument(skip_all, fields(file = %document.file_name))]
pub async fn analyze_document(
    extractor: &dyn TextExtractor,
    document: &SourceDocument,
) -> Result<DocumentAnalysis> {
    let text = extract_text(extractor, document).await?;
    let report = GapReport::from_text(&text, &TAXONOMY);
    info!(
        present = report.present.len(),
        missing = report.missing.len(),
        "document analyzed"
    );
    Ok(DocumentAnalysis {
        file_name: document.file_name.clone(),
        characters: text.chars().count(),
        report,
    })
}

fn validate_metadata(metadata: &BusinessMetadata) -> Result<()> {
    if metadata.name.trim().is_empty() {
        return Err(ProposalError::validation("business name must not be empty"));
    }
    if metadata.domain.trim().is_empty() {
        return Err(ProposalError::validation("business domain must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::instructions::MemoryInstructionStore;
    use crate::testing::{
        FakeDetails, FakeDetector, FakeExtractor, FakeGenerator, FakeTranslator,
        RecordingProgress,
    };
    use bizproposal_providers::{FileDetailCollector, LocalTextExtractor};
    use bizproposal_render::MarkdownRenderer;
    use bizproposal_shared::{DETAILS_NOT_PROVIDED, FailurePolicy, SectionBody};

    struct Harness {
        extractor: Arc<FakeExtractor>,
        detector: Arc<FakeDetector>,
        translator: Arc<FakeTranslator>,
        generator: Arc<FakeGenerator>,
        details: Arc<FakeDetails>,
        store: Arc<MemoryInstructionStore>,
    }

    impl Harness {
        fn new(document_text: &str) -> Self {
            Self {
                extractor: Arc::new(FakeExtractor::new(document_text)),
                detector: Arc::new(FakeDetector::new()),
                translator: Arc::new(FakeTranslator::new("Hello world")),
                generator: Arc::new(FakeGenerator::new()),
                details: Arc::new(FakeDetails::new(&[])),
                store: Arc::new(MemoryInstructionStore::new()),
            }
        }

        fn pipeline(&self, policy: FailurePolicy) -> ProposalPipeline {
            let collaborators = Collaborators {
                extractor: self.extractor.clone(),
                detector: self.detector.clone(),
                translator: self.translator.clone(),
                generator: self.generator.clone(),
                details: Some(self.details.clone() as Arc<dyn DetailCollector>),
                renderer: Arc::new(MarkdownRenderer),
            };
            let settings = PipelineSettings {
                failure_policy: policy,
                ..PipelineSettings::default()
            };
            ProposalPipeline::new(
                collaborators,
                TemplateRegistry::default(),
                settings,
                self.store.clone(),
            )
        }

        fn total_calls(&self) -> usize {
            self.extractor.calls.load(Ordering::SeqCst)
                + self.detector.calls.load(Ordering::SeqCst)
                + self.translator.calls.load(Ordering::SeqCst)
                + self.generator.calls.load(Ordering::SeqCst)
                + self.details.calls.load(Ordering::SeqCst)
        }
    }

    fn request(template: &str, instructions: Option<&str>) -> ProposalRequest {
        request_for_session(template, instructions, "default")
    }

    fn request_for_session(
        template: &str,
        instructions: Option<&str>,
        session: &str,
    ) -> ProposalRequest {
        ProposalRequest {
            document: SourceDocument {
                file_name: "plan.png".into(),
                bytes: b"fake image".to_vec(),
            },
            metadata: BusinessMetadata {
                name: "Lanka Spice".into(),
                domain: "Food export".into(),
                is_existing: false,
            },
            instructions: InstructionSource::from_parts(instructions.map(String::from), session),
            template: template.into(),
        }
    }

    fn text_without(excluded: &[Topic]) -> String {
        TAXONOMY
            .iter()
            .filter(|t| !excluded.contains(t))
            .map(|t| format!("{}\nWe have this covered.\n", t.name()))
            .collect()
    }

    #[tokio::test]
    async fn unknown_template_makes_no_collaborator_calls() {
        let h = Harness::new("anything");
        let progress = RecordingProgress::default();

        let err = h
            .pipeline(FailurePolicy::Mark)
            .run(&request("Template 9", Some("Be brief")), &progress)
            .await
            .unwrap_err();

        assert!(matches!(err, ProposalError::UnknownTemplate(ref n) if n == "Template 9"));
        assert_eq!(err.code(), "unknown_template");
        assert_eq!(h.total_calls(), 0);
        assert_eq!(*progress.failed_at.lock().unwrap(), Some(PipelineStage::Received));
        assert_eq!(
            progress.stages(),
            vec![PipelineStage::Received, PipelineStage::Failed]
        );
    }

    #[tokio::test]
    async fn missing_instructions_makes_no_collaborator_calls() {
        let h = Harness::new("anything");
        let err = h
            .pipeline(FailurePolicy::Mark)
            .run(&request("Template 1", None), &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, ProposalError::MissingInstructions));
        assert!(err.is_user_error());
        assert_eq!(h.total_calls(), 0);
    }

    #[tokio::test]
    async fn blank_business_name_is_rejected_up_front() {
        let h = Harness::new("anything");
        let mut req = request("Template 1", Some("x"));
        req.metadata.name = "  ".into();

        let err = h
            .pipeline(FailurePolicy::Mark)
            .run(&req, &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation");
        assert_eq!(h.total_calls(), 0);
    }

    #[tokio::test]
    async fn extraction_failure_is_fatal() {
        let mut h = Harness::new("");
        h.extractor = Arc::new(FakeExtractor::failing());
        let progress = RecordingProgress::default();

        let err = h
            .pipeline(FailurePolicy::Mark)
            .run(&request("Template 1", Some("x")), &progress)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "extraction_failed");
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(*progress.failed_at.lock().unwrap(), Some(PipelineStage::Received));
    }

    #[tokio::test]
    async fn template_excluding_missing_topics_generates_no_placeholders() {
        let h = Harness::new(&text_without(&[Topic::ExitStrategy, Topic::StaffNames]));
        let progress = RecordingProgress::default();

        let outcome = h
            .pipeline(FailurePolicy::Mark)
            .run(&request("Template 1", Some("Be concise")), &progress)
            .await
            .unwrap();

        assert_eq!(outcome.missing, vec![Topic::StaffNames, Topic::ExitStrategy]);

        let template = TemplateRegistry::default().get("Template 1").unwrap().clone();
        assert_eq!(outcome.content.topics(), template.topics);
        assert!(outcome.content.get(Topic::ExitStrategy).is_none());
        assert!(outcome.content.get(Topic::StaffNames).is_none());

        // Nothing to resolve, so neither collector nor placeholder was used
        assert_eq!(h.details.calls.load(Ordering::SeqCst), 0);
        assert!(
            h.generator
                .prompts()
                .iter()
                .all(|p| p.ends_with("Details: \n") && !p.contains(DETAILS_NOT_PROVIDED))
        );
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 9);

        assert_eq!(
            progress.stages(),
            vec![
                PipelineStage::Received,
                PipelineStage::Extracted,
                PipelineStage::GapDetected,
                PipelineStage::DetailsResolved,
                PipelineStage::InstructionsNormalized,
                PipelineStage::ContentGenerated,
                PipelineStage::Assembled,
                PipelineStage::Delivered,
            ]
        );
        assert_eq!(progress.sections.load(Ordering::SeqCst), 9);

        let markdown = String::from_utf8(outcome.artifact.bytes).unwrap();
        let first = markdown.find("## Company Overview").unwrap();
        let last = markdown.find("## Conclusion").unwrap();
        assert!(first < last);
    }

    #[tokio::test]
    async fn missing_template_topics_get_collected_details() {
        let h = Harness::new(&text_without(&[Topic::MarketingPlan, Topic::ExitStrategy]));

        h.pipeline(FailurePolicy::Mark)
            .run(&request("Template 2", Some("x")), &SilentProgress)
            .await
            .unwrap();

        // Exit Strategy is missing too but Template 2 does not use it
        assert_eq!(h.details.calls.load(Ordering::SeqCst), 1);
        assert!(
            h.generator
                .prompts()
                .iter()
                .any(|p| p.contains("'Marketing Plan'")
                    && p.ends_with("Details: detail for Marketing Plan\n"))
        );
    }

    #[tokio::test]
    async fn stored_sinhala_instructions_reach_every_prompt() {
        let h = Harness::new(&text_without(&[]));
        let pipeline = h.pipeline(FailurePolicy::Mark);

        let stored = pipeline
            .submit_instructions("default", "ආයුබෝවන් ලෝකය", &LanguageTag::Code("si".into()))
            .await
            .unwrap();
        assert_eq!(stored.text, "Hello world");
        assert_eq!(
            h.store.get("default").await.unwrap().unwrap().text,
            "Hello world"
        );

        let outcome = pipeline
            .run(&request("Template 3", None), &SilentProgress)
            .await
            .unwrap();

        let prompts = h.generator.prompts();
        assert_eq!(prompts.len(), 9);
        assert!(
            prompts
                .iter()
                .all(|p| p.contains("\nInstructions: Hello world\n"))
        );
        assert_eq!(outcome.instructions.text, "Hello world");
        // Re-normalizing already-English text does not translate again
        assert_eq!(h.translator.calls.load(Ordering::SeqCst), 1);
        // Consumed on delivery
        assert!(h.store.get("default").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_run_keeps_stored_instructions() {
        let mut h = Harness::new(&text_without(&[]));
        h.generator = Arc::new(FakeGenerator::failing_on(&[Topic::Conclusion]));
        let pipeline = h.pipeline(FailurePolicy::Abort);

        pipeline
            .submit_instructions("s1", "Stay formal", &LanguageTag::Auto)
            .await
            .unwrap();

        let req = request_for_session("Template 1", None, "s1");
        let progress = RecordingProgress::default();
        let err = pipeline.run(&req, &progress).await.unwrap_err();

        assert!(matches!(
            err,
            ProposalError::Generation { topic: Topic::Conclusion, .. }
        ));
        assert_eq!(
            *progress.failed_at.lock().unwrap(),
            Some(PipelineStage::InstructionsNormalized)
        );
        assert_eq!(h.store.get("s1").await.unwrap().unwrap().text, "Stay formal");
    }

    #[tokio::test]
    async fn sessions_do_not_share_instructions() {
        let h = Harness::new(&text_without(&[]));
        let pipeline = h.pipeline(FailurePolicy::Mark);

        pipeline
            .submit_instructions("alice", "Alice wants charts", &LanguageTag::Auto)
            .await
            .unwrap();

        let req = request_for_session("Template 1", None, "bob");
        let err = pipeline.run(&req, &SilentProgress).await.unwrap_err();
        assert!(matches!(err, ProposalError::MissingInstructions));
        assert!(h.store.get("alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn marked_failure_still_delivers() {
        let mut h = Harness::new(&text_without(&[]));
        h.generator = Arc::new(FakeGenerator::failing_on(&[Topic::MarketAnalysis]));

        let outcome = h
            .pipeline(FailurePolicy::Mark)
            .run(&request("Template 1", Some("x")), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(
            outcome.content.get(Topic::MarketAnalysis),
            Some(&SectionBody::Failed("HTTP 500".into()))
        );
        let markdown = String::from_utf8(outcome.artifact.bytes).unwrap();
        assert!(markdown.contains("[Content generation failed: HTTP 500]"));
    }

    #[tokio::test]
    async fn analyze_reports_gaps_against_full_taxonomy() {
        let h = Harness::new("Executive Summary\nConclusion");
        let analysis = analyze_document(
            h.extractor.as_ref(),
            &SourceDocument {
                file_name: "plan.txt".into(),
                bytes: b"x".to_vec(),
            },
        )
        .await
        .unwrap();

        assert_eq!(
            analysis.report.present,
            vec![Topic::ExecutiveSummary, Topic::Conclusion]
        );
        assert_eq!(analysis.report.missing.len(), TAXONOMY.len() - 2);
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fixture_plan_with_details_file() {
        let fixtures =
            std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures");
        let bytes = std::fs::read(fixtures.join("sample_plan.txt")).unwrap();
        let document = SourceDocument {
            file_name: "sample_plan.txt".into(),
            bytes,
        };

        let analysis = analyze_document(&LocalTextExtractor, &document).await.unwrap();
        assert_eq!(analysis.report.missing, vec![Topic::StaffNames, Topic::ExitStrategy]);

        let collector = FileDetailCollector::load(&fixtures.join("details.toml")).unwrap();
        let details = resolver::resolve_details(
            &analysis.report.missing,
            Some(&collector as &dyn DetailCollector),
        )
        .await;
        assert!(details[&Topic::StaffNames].contains("Nimal Perera"));

        // A custom template that uses both missing topics
        let h = Harness::new("");
        let mut templates = TemplateRegistry::default();
        templates
            .register(
                bizproposal_shared::Template::new(
                    "Team and exit",
                    vec![Topic::StaffNames, Topic::Conclusion, Topic::ExitStrategy],
                )
                .unwrap(),
            )
            .unwrap();
        let pipeline = ProposalPipeline::new(
            Collaborators {
                extractor: Arc::new(LocalTextExtractor),
                detector: h.detector.clone(),
                translator: h.translator.clone(),
                generator: h.generator.clone(),
                details: Some(Arc::new(collector) as Arc<dyn DetailCollector>),
                renderer: Arc::new(MarkdownRenderer),
            },
            templates,
            PipelineSettings::default(),
            h.store.clone(),
        );

        let mut req = request("team and exit", Some("Keep it short"));
        req.document = document;
        let outcome = pipeline.run(&req, &SilentProgress).await.unwrap();

        assert_eq!(
            outcome.content.topics(),
            vec![Topic::StaffNames, Topic::Conclusion, Topic::ExitStrategy]
        );
        let prompts = h.generator.prompts();
        assert!(
            prompts
                .iter()
                .any(|p| p.contains("'Staff Names'") && p.contains("Nimal Perera"))
        );
        assert!(
            prompts
                .iter()
                .any(|p| p.contains("'Conclusion'") && p.ends_with("Details: \n"))
        );
    }

    #[tokio::test]
    async fn empty_upload_is_rejected_before_extraction() {
        let h = Harness::new("text");
        let mut req = request("Template 1", Some("x"));
        req.document.bytes.clear();

        let err = h
            .pipeline(FailurePolicy::Mark)
            .run(&req, &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation");
        assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 0);
    }
}
