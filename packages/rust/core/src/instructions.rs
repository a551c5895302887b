//! Instruction normalization and session-scoped instruction storage.
//!
//! Instructions reach generation either explicitly on the request or from
//! the [`InstructionStore`] slot of the request's session. There is no
//! process-wide slot: two sessions never see each other's instructions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use bizproposal_providers::{LanguageDetector, Translator};
use bizproposal_shared::{Instructions, LanguageTag, PipelineSettings, ProposalError, Result};

/// Session used when the caller does not name one.
pub const DEFAULT_SESSION: &str = "default";

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Brings instructions into the working language.
#[derive(Clone)]
pub struct InstructionNormalizer {
    detector: Arc<dyn LanguageDetector>,
    translator: Arc<dyn Translator>,
    primary: String,
    secondary: String,
}

impl InstructionNormalizer {
    pub fn new(
        detector: Arc<dyn LanguageDetector>,
        translator: Arc<dyn Translator>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            detector,
            translator,
            primary: settings.primary_language.to_ascii_lowercase(),
            secondary: settings.secondary_language.to_ascii_lowercase(),
        }
    }

    /// Resolve the language of `text` and translate it when it is the
    /// secondary language.
    ///
    /// Never fails: a detection error treats the text as the primary
    /// language, a translation error keeps the original text. The returned
    /// `original_language` is the resolved tag before translation.
    #[instrument(skip_all, fields(chars = text.len()))]
    pub async fn normalize(&self, text: &str, declared: &LanguageTag) -> Instructions {
        if text.trim().is_empty() {
            return Instructions {
                original_language: self.primary.clone(),
                text: text.to_string(),
            };
        }

        let language = match declared {
            LanguageTag::Code(code) => code.to_ascii_lowercase(),
            LanguageTag::Auto => match self.detector.detect(text).await {
                Ok(lang) => lang.to_ascii_lowercase(),
                Err(e) => {
                    warn!(error = %e, "language detection failed, assuming working language");
                    self.primary.clone()
                }
            },
        };

        if base_language(&language) != self.secondary {
            debug!(%language, "instructions already usable");
            return Instructions {
                original_language: language,
                text: text.to_string(),
            };
        }

        info!(from = %language, to = %self.primary, "translating instructions");
        let text = match self
            .translator
            .translate(text, &self.secondary, &self.primary)
            .await
        {
            Ok(translated) => translated,
            Err(e) => {
                warn!(error = %e, "translation failed, keeping original instructions");
                text.to_string()
            }
        };

        Instructions {
            original_language: language,
            text,
        }
    }
}

/// `si-LK` → `si`.
fn base_language(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Per-session slot for submitted instructions.
#[async_trait]
pub trait InstructionStore: Send + Sync {
    /// Store instructions for a session, replacing any previous value.
    async fn put(&self, session: &str, instructions: Instructions) -> Result<()>;

    /// Read without consuming.
    async fn get(&self, session: &str) -> Result<Option<Instructions>>;

    /// Drop the session's instructions, returning them if present.
    async fn clear(&self, session: &str) -> Result<Option<Instructions>>;
}

/// Session keys double as file names, so keep them to a safe alphabet.
pub fn validate_session(session: &str) -> Result<()> {
    let ok = !session.is_empty()
        && session.len() <= 64
        && session
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(ProposalError::validation(format!(
            "invalid session key '{session}' (use 1-64 letters, digits, '-' or '_')"
        )))
    }
}

/// In-process store.
#[derive(Default)]
pub struct MemoryInstructionStore {
    slots: Mutex<HashMap<String, Instructions>>,
}

impl MemoryInstructionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstructionStore for MemoryInstructionStore {
    async fn put(&self, session: &str, instructions: Instructions) -> Result<()> {
        validate_session(session)?;
        self.slots
            .lock()
            .await
            .insert(session.to_string(), instructions);
        Ok(())
    }

    async fn get(&self, session: &str) -> Result<Option<Instructions>> {
        validate_session(session)?;
        Ok(self.slots.lock().await.get(session).cloned())
    }

    async fn clear(&self, session: &str) -> Result<Option<Instructions>> {
        validate_session(session)?;
        Ok(self.slots.lock().await.remove(session))
    }
}

/// One JSON file per session under a directory; survives between CLI runs.
pub struct FileInstructionStore {
    dir: PathBuf,
}

impl FileInstructionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session: &str) -> Result<PathBuf> {
        validate_session(session)?;
        Ok(self.dir.join(format!("{session}.json")))
    }

    fn read(path: &Path) -> Result<Option<Instructions>> {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map(Some).map_err(|e| {
                ProposalError::validation(format!(
                    "corrupt instructions file {}: {e}",
                    path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ProposalError::io(path, e)),
        }
    }
}

#[async_trait]
impl InstructionStore for FileInstructionStore {
    async fn put(&self, session: &str, instructions: Instructions) -> Result<()> {
        let path = self.path_for(session)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| ProposalError::io(&self.dir, e))?;

        let json = serde_json::to_string_pretty(&instructions).map_err(|e| {
            ProposalError::validation(format!("JSON serialization failed: {e}"))
        })?;

        // Write to temp file first, then rename
        let temp = self.dir.join(format!(".{session}.json.tmp"));
        std::fs::write(&temp, json).map_err(|e| ProposalError::io(&temp, e))?;
        std::fs::rename(&temp, &path).map_err(|e| ProposalError::io(&path, e))?;

        debug!(path = %path.display(), "stored instructions");
        Ok(())
    }

    async fn get(&self, session: &str) -> Result<Option<Instructions>> {
        Self::read(&self.path_for(session)?)
    }

    async fn clear(&self, session: &str) -> Result<Option<Instructions>> {
        let path = self.path_for(session)?;
        let existing = Self::read(&path)?;
        if existing.is_some() {
            std::fs::remove_file(&path).map_err(|e| ProposalError::io(&path, e))?;
        }
        Ok(existing)
    }
}

// ---------------------------------------------------------------------------
// Submission and lookup
// ---------------------------------------------------------------------------

/// Normalize and store instructions for a session.
///
/// Backs both the typed and the voice-transcribed submission paths.
#[instrument(skip_all, fields(session = %session))]
pub async fn submit_instructions(
    normalizer: &InstructionNormalizer,
    store: &dyn InstructionStore,
    session: &str,
    text: &str,
    language: &LanguageTag,
) -> Result<Instructions> {
    validate_session(session)?;
    if text.trim().is_empty() {
        return Err(ProposalError::MissingInstructions);
    }

    let instructions = normalizer.normalize(text, language).await;
    store.put(session, instructions.clone()).await?;

    info!(
        original_language = %instructions.original_language,
        "instructions processed and stored"
    );
    Ok(instructions)
}

/// Where a generation request takes its instructions from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionSource {
    /// Passed directly with the request.
    Explicit(String),
    /// Whatever was last submitted for this session key.
    Session(String),
}

impl InstructionSource {
    /// Explicit text when given, else the named session.
    pub fn from_parts(explicit: Option<String>, session: &str) -> Self {
        match explicit {
            Some(text) => Self::Explicit(text),
            None => Self::Session(session.to_string()),
        }
    }

    /// The session slot to consume after delivery, if any.
    pub fn session(&self) -> Option<&str> {
        match self {
            Self::Explicit(_) => None,
            Self::Session(key) => Some(key),
        }
    }

    /// Resolve to non-blank instruction text without consuming anything.
    pub async fn resolve(&self, store: &dyn InstructionStore) -> Result<String> {
        let text = match self {
            Self::Explicit(text) => Some(text.clone()),
            Self::Session(key) => store.get(key).await?.map(|stored| {
                debug!(session = %key, "using stored instructions");
                stored.text
            }),
        };
        text.filter(|t| !t.trim().is_empty())
            .ok_or(ProposalError::MissingInstructions)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::{FakeDetector, FakeTranslator};

    fn normalizer(
        detector: Arc<FakeDetector>,
        translator: Arc<FakeTranslator>,
    ) -> InstructionNormalizer {
        InstructionNormalizer::new(detector, translator, &PipelineSettings::default())
    }

    #[tokio::test]
    async fn declared_sinhala_is_translated() {
        let detector = Arc::new(FakeDetector::new());
        let translator = Arc::new(FakeTranslator::new("Hello world"));
        let n = normalizer(detector.clone(), translator.clone());

        let out = n
            .normalize("ආයුබෝවන් ලෝකය", &LanguageTag::Code("si".into()))
            .await;

        assert_eq!(out.original_language, "si");
        assert_eq!(out.text, "Hello world");
        assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auto_detects_before_translating() {
        let detector = Arc::new(FakeDetector::new());
        let translator = Arc::new(FakeTranslator::new("Focus on exports"));
        let n = normalizer(detector.clone(), translator.clone());

        let out = n.normalize("අපනයන", &LanguageTag::Auto).await;
        assert_eq!(out.original_language, "si");
        assert_eq!(out.text, "Focus on exports");
        assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn english_passes_through() {
        let translator = Arc::new(FakeTranslator::new("unused"));
        let n = normalizer(Arc::new(FakeDetector::new()), translator.clone());

        let out = n.normalize("Keep it short.", &LanguageTag::Code("en".into())).await;
        assert_eq!(out.text, "Keep it short.");
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn normalization_is_idempotent() {
        let translator = Arc::new(FakeTranslator::new("Sell online"));
        let n = normalizer(Arc::new(FakeDetector::new()), translator.clone());

        let once = n.normalize("මාර්ගගතව විකුණන්න", &LanguageTag::Auto).await;
        let twice = n
            .normalize(&once.text, &LanguageTag::Code("en".into()))
            .await;
        let auto_again = n.normalize(&once.text, &LanguageTag::Auto).await;

        assert_eq!(twice.text, once.text);
        assert_eq!(auto_again.text, once.text);
        assert_eq!(auto_again.original_language, "en");
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn detection_failure_degrades_to_working_language() {
        let translator = Arc::new(FakeTranslator::new("unused"));
        let n = normalizer(Arc::new(FakeDetector::failing()), translator.clone());

        let out = n.normalize("අපනයන", &LanguageTag::Auto).await;
        assert_eq!(out.original_language, "en");
        assert_eq!(out.text, "අපනයන");
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn translation_failure_keeps_text() {
        let n = normalizer(
            Arc::new(FakeDetector::new()),
            Arc::new(FakeTranslator::failing()),
        );
        let out = n.normalize("අපනයන", &LanguageTag::Code("si".into())).await;
        assert_eq!(out.original_language, "si");
        assert_eq!(out.text, "අපනයන");
    }

    #[tokio::test]
    async fn regional_tags_match_secondary_language() {
        let n = normalizer(
            Arc::new(FakeDetector::new()),
            Arc::new(FakeTranslator::new("Hi")),
        );
        let out = n.normalize("ආයුබෝවන්", &LanguageTag::Code("si-LK".into())).await;
        assert_eq!(out.original_language, "si-lk");
        assert_eq!(out.text, "Hi");
    }

    #[tokio::test]
    async fn submission_stores_translated_text() {
        let store = MemoryInstructionStore::new();
        let n = normalizer(
            Arc::new(FakeDetector::new()),
            Arc::new(FakeTranslator::new("Hello world")),
        );

        let out = submit_instructions(&n, &store, "s1", "ආයුබෝවන්", &LanguageTag::Code("si".into()))
            .await
            .unwrap();
        assert_eq!(out.text, "Hello world");

        let stored = store.get("s1").await.unwrap().unwrap();
        assert_eq!(stored.text, "Hello world");
        assert!(store.get("s2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_submission_is_rejected() {
        let store = MemoryInstructionStore::new();
        let n = normalizer(
            Arc::new(FakeDetector::new()),
            Arc::new(FakeTranslator::new("x")),
        );
        let err = submit_instructions(&n, &store, DEFAULT_SESSION, "  ", &LanguageTag::Auto)
            .await
            .unwrap_err();
        assert!(matches!(err, ProposalError::MissingInstructions));
    }

    #[tokio::test]
    async fn source_resolution() {
        let store = MemoryInstructionStore::new();
        store
            .put(
                "s",
                Instructions {
                    original_language: "en".into(),
                    text: "stored".into(),
                },
            )
            .await
            .unwrap();

        let explicit = InstructionSource::from_parts(Some("explicit".into()), "s");
        assert_eq!(explicit.resolve(&store).await.unwrap(), "explicit");
        assert_eq!(explicit.session(), None);

        let session = InstructionSource::from_parts(None, "s");
        assert_eq!(session.resolve(&store).await.unwrap(), "stored");
        assert_eq!(session.session(), Some("s"));
        // Resolving does not consume
        assert!(store.get("s").await.unwrap().is_some());

        assert!(matches!(
            InstructionSource::Explicit("  ".into()).resolve(&store).await,
            Err(ProposalError::MissingInstructions)
        ));
        assert!(matches!(
            InstructionSource::Session("other".into()).resolve(&store).await,
            Err(ProposalError::MissingInstructions)
        ));
        assert!(
            InstructionSource::Session("../x".into())
                .resolve(&store)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn file_store_roundtrip_and_clear() {
        let dir = std::env::temp_dir().join(format!("bp-instr-{}", uuid::Uuid::now_v7()));
        let store = FileInstructionStore::new(&dir);
        let instructions = Instructions {
            original_language: "si".into(),
            text: "Hello world".into(),
        };

        store.put("team-a", instructions.clone()).await.unwrap();
        assert_eq!(store.get("team-a").await.unwrap(), Some(instructions.clone()));
        assert_eq!(store.clear("team-a").await.unwrap(), Some(instructions));
        assert!(store.get("team-a").await.unwrap().is_none());
        assert!(store.clear("team-a").await.unwrap().is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn session_keys_are_restricted() {
        assert!(validate_session("default").is_ok());
        assert!(validate_session("team_a-1").is_ok());
        assert!(validate_session("").is_err());
        assert!(validate_session("../etc").is_err());
    }
}
