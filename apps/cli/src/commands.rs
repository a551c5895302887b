//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Report, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use url::Url;

use bizproposal_core::pipeline::{PipelineStage, ProgressReporter};
use bizproposal_core::{
    Collaborators, DEFAULT_SESSION, FileInstructionStore, InstructionNormalizer,
    InstructionSource, InstructionStore, ProposalOutcome, ProposalPipeline, ProposalRequest,
    analyze_document, assembler, instructions, resolver,
};
use bizproposal_providers::{
    DetailCollector, FileDetailCollector, GoogleTranslateClient, GroqGenerator,
    HttpDetailCollector, LocalTextExtractor, OcrSpaceExtractor, TextExtractor, is_plain_text,
};
use bizproposal_render::OutputFormat;
use bizproposal_shared::{
    AppConfig, BusinessMetadata, DetailsConfig, ErrorPayload, FailurePolicy, LanguageTag,
    PipelineSettings, ProposalError, SourceDocument, TAXONOMY, TemplateRegistry, Topic,
    config_dir, init_config, load_config, parse_yes_no, validate_api_keys,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// bizproposal: turn a business document into a complete proposal.
#[derive(Parser)]
#[command(
    name = "bizproposal",
    version,
    about = "Assemble a structured business proposal from a source document and instructions.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print results, and errors as `{"error", "message"}`, in JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Extract a document's text and report which topics it is missing.
    Analyze {
        /// Scanned image, PDF, or plain-text document.
        file: PathBuf,

        /// TOML/JSON file mapping topic names to details for missing topics.
        #[arg(long, conflicts_with = "collect_url")]
        details: Option<PathBuf>,

        /// Base URL of a detail service (`POST {url}/missing/{topic}`).
        #[arg(long)]
        collect_url: Option<Url>,
    },

    /// Submit, show, or clear stored instructions.
    Instructions {
        #[command(subcommand)]
        action: InstructionsAction,
    },

    /// Generate a proposal document.
    Generate(GenerateArgs),

    /// List the topic taxonomy.
    Topics,

    /// List registered templates.
    Templates,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Instruction subcommands.
#[derive(Subcommand)]
pub(crate) enum InstructionsAction {
    /// Normalize instructions to the working language and store them.
    Submit {
        /// Instruction text (or a voice transcript with --voice).
        text: String,

        /// Language of the text: en, si, or auto.
        #[arg(short, long, default_value = "auto")]
        language: String,

        /// Session key the instructions are stored under.
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,

        /// The text is a voice transcript.
        #[arg(long)]
        voice: bool,
    },
    /// Show the stored instructions.
    Show {
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
    },
    /// Discard the stored instructions.
    Clear {
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
    },
}

/// Arguments for `generate`.
#[derive(Args)]
pub(crate) struct GenerateArgs {
    /// Scanned image, PDF, or plain-text document.
    pub file: PathBuf,

    /// Business name.
    #[arg(long)]
    pub name: String,

    /// Business domain, e.g. "Food export".
    #[arg(long)]
    pub domain: String,

    /// Whether the business already operates: yes or no.
    #[arg(long, value_parser = parse_yes_no, default_value = "no", action = clap::ArgAction::Set)]
    pub existing: bool,

    /// Instructions for this run; stored session instructions are used when omitted.
    #[arg(short, long)]
    pub instructions: Option<String>,

    /// Session key to read stored instructions from.
    #[arg(long, default_value = DEFAULT_SESSION)]
    pub session: String,

    /// Template name (defaults to `[defaults] template`).
    #[arg(short, long)]
    pub template: Option<String>,

    /// Output format: docx or md.
    #[arg(short, long)]
    pub format: Option<String>,

    /// Output directory (defaults to `[defaults] output_dir`).
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// TOML/JSON file mapping topic names to details for missing topics.
    #[arg(long)]
    pub details: Option<PathBuf>,

    /// What a failed topic does: mark (keep going) or abort.
    #[arg(long)]
    pub failure_policy: Option<String>,

    /// Document title.
    #[arg(long)]
    pub title: Option<String>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "bizproposal=info",
        1 => "bizproposal=debug",
        _ => "bizproposal=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Error output
// ---------------------------------------------------------------------------

/// Structured form of a failed command.
pub(crate) fn error_payload(report: &Report) -> ErrorPayload {
    match report.downcast_ref::<ProposalError>() {
        Some(e) => e.to_payload(),
        None => ErrorPayload {
            error: "internal".to_string(),
            message: report.to_string(),
        },
    }
}

pub(crate) fn print_error_payload(report: &Report) {
    let payload = error_payload(report);
    match serde_json::to_string(&payload) {
        Ok(json) => println!("{json}"),
        Err(_) => println!("{{\"error\":\"{}\"}}", payload.error),
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Command::Analyze {
            file,
            details,
            collect_url,
        } => cmd_analyze(&file, details.as_deref(), collect_url, json).await,
        Command::Instructions { action } => match action {
            InstructionsAction::Submit {
                text,
                language,
                session,
                voice,
            } => cmd_instructions_submit(&text, &language, &session, voice, json).await,
            InstructionsAction::Show { session } => cmd_instructions_show(&session, json).await,
            InstructionsAction::Clear { session } => cmd_instructions_clear(&session, json).await,
        },
        Command::Generate(args) => cmd_generate(args, json).await,
        Command::Topics => cmd_topics(json),
        Command::Templates => cmd_templates(json),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Collaborator wiring
// ---------------------------------------------------------------------------

fn instruction_store() -> Result<FileInstructionStore> {
    Ok(FileInstructionStore::new(config_dir()?.join("sessions")))
}

fn read_document(path: &Path) -> Result<SourceDocument> {
    let bytes = std::fs::read(path).map_err(|e| ProposalError::io(path, e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceDocument { file_name, bytes })
}

/// Plain-text documents are read locally; everything else goes through OCR.
fn extractor_for(file_name: &str, config: &AppConfig) -> Result<Arc<dyn TextExtractor>> {
    if is_plain_text(file_name) {
        debug!(file = file_name, "reading plain-text document locally");
        Ok(Arc::new(LocalTextExtractor))
    } else {
        Ok(Arc::new(OcrSpaceExtractor::from_config(&config.extraction)?))
    }
}

/// A details file wins over a collect URL, which wins over `[details]`.
fn detail_collector(
    details_file: Option<&Path>,
    collect_url: Option<Url>,
    config: &DetailsConfig,
) -> Result<Option<Arc<dyn DetailCollector>>> {
    if let Some(path) = details_file {
        let collector = FileDetailCollector::load(path)?;
        info!(path = %path.display(), entries = collector.len(), "loaded topic details");
        return Ok(Some(Arc::new(collector)));
    }
    if let Some(url) = collect_url {
        return Ok(Some(Arc::new(HttpDetailCollector::new(url, config)?)));
    }
    Ok(HttpDetailCollector::from_config(config)?
        .map(|collector| Arc::new(collector) as Arc<dyn DetailCollector>))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_analyze(
    file: &Path,
    details_file: Option<&Path>,
    collect_url: Option<Url>,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let document = read_document(file)?;
    let extractor = extractor_for(&document.file_name, &config)?;
    let collector = detail_collector(details_file, collect_url, &config.details)?;

    info!(file = %document.file_name, "analyzing document");
    let analysis = analyze_document(extractor.as_ref(), &document).await?;

    let details = match &collector {
        Some(collector) => Some(
            resolver::resolve_details(&analysis.report.missing, Some(collector.as_ref())).await,
        ),
        None => None,
    };

    if json {
        let mut value = serde_json::to_value(&analysis)?;
        if let Some(details) = &details {
            value["details"] = serde_json::to_value(details)?;
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("  Document:   {}", analysis.file_name);
    println!("  Characters: {}", analysis.characters);
    println!(
        "  Present:    {}/{}",
        analysis.report.present.len(),
        TAXONOMY.len()
    );
    if analysis.report.missing.is_empty() {
        println!("  Missing:    none");
    } else {
        println!("  Missing:");
        for topic in &analysis.report.missing {
            match details.as_ref().and_then(|d| d.get(topic)) {
                Some(detail) => println!("    - {topic}: {detail}"),
                None => println!("    - {topic}"),
            }
        }
    }
    println!();

    Ok(())
}

/// Parse a submission language: `auto`, or one of the configured pair.
fn submission_language(raw: &str, settings: &PipelineSettings) -> Result<LanguageTag> {
    let tag: LanguageTag = raw.parse()?;
    if let LanguageTag::Code(code) = &tag {
        let base = code.split('-').next().unwrap_or(code);
        if base != settings.primary_language && base != settings.secondary_language {
            return Err(ProposalError::validation(format!(
                "unsupported language '{code}': expected {}, {}, or auto",
                settings.primary_language, settings.secondary_language
            ))
            .into());
        }
    }
    Ok(tag)
}

async fn cmd_instructions_submit(
    text: &str,
    language: &str,
    session: &str,
    voice: bool,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let settings = PipelineSettings::from(&config);
    let language = submission_language(language, &settings)?;

    let translate = Arc::new(GoogleTranslateClient::new(&config.translation)?);
    let normalizer = InstructionNormalizer::new(translate.clone(), translate, &settings);
    let store = instruction_store()?;

    let label = if voice { "Voice instructions" } else { "Instructions" };
    info!(session, voice, "submitting instructions");

    let stored =
        instructions::submit_instructions(&normalizer, &store, session, text, &language).await?;

    if json {
        let value = serde_json::json!({
            "session": session,
            "voice": voice,
            "original_language": stored.original_language,
            "text": stored.text,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("  {label} processed and stored.");
    println!("  Session:  {session}");
    println!("  Language: {}", stored.original_language);
    println!("  Stored:   {}", stored.text);
    println!();

    Ok(())
}

async fn cmd_instructions_show(session: &str, json: bool) -> Result<()> {
    let stored = instruction_store()?.get(session).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stored)?);
        return Ok(());
    }

    match stored {
        Some(stored) => {
            println!("[{}] {}", stored.original_language, stored.text);
        }
        None => println!("No instructions stored for session '{session}'."),
    }
    Ok(())
}

async fn cmd_instructions_clear(session: &str, json: bool) -> Result<()> {
    let removed = instruction_store()?.clear(session).await?;

    if json {
        println!("{}", serde_json::json!({ "session": session, "cleared": removed.is_some() }));
    } else if removed.is_some() {
        println!("Cleared instructions for session '{session}'.");
    } else {
        println!("No instructions stored for session '{session}'.");
    }
    Ok(())
}

async fn cmd_generate(args: GenerateArgs, json: bool) -> Result<()> {
    let config = load_config()?;
    let templates = TemplateRegistry::from_config(&config.templates)?;

    // User errors first, before any credential or network work
    let template_name = args
        .template
        .clone()
        .unwrap_or_else(|| config.defaults.template.clone());
    templates.get(&template_name)?;

    let store = Arc::new(instruction_store()?);
    let source = InstructionSource::from_parts(args.instructions.clone(), &args.session);
    source.resolve(store.as_ref()).await?;

    let format: OutputFormat = args
        .format
        .as_deref()
        .unwrap_or(&config.defaults.format)
        .parse()?;

    let mut settings = PipelineSettings::from(&config);
    if let Some(policy) = &args.failure_policy {
        settings.failure_policy = policy.parse::<FailurePolicy>()?;
    }
    if let Some(title) = &args.title {
        settings.title = title.clone();
    }

    let document = read_document(&args.file)?;
    if !is_plain_text(&document.file_name) {
        validate_api_keys(&config)?;
    }

    let translate = Arc::new(GoogleTranslateClient::new(&config.translation)?);
    let collaborators = Collaborators {
        extractor: extractor_for(&document.file_name, &config)?,
        detector: translate.clone(),
        translator: translate,
        generator: Arc::new(GroqGenerator::from_config(&config.generation)?),
        details: detail_collector(args.details.as_deref(), None, &config.details)?,
        renderer: Arc::from(format.renderer()),
    };

    let pipeline = ProposalPipeline::new(collaborators, templates, settings, store);
    let request = ProposalRequest {
        document,
        metadata: BusinessMetadata {
            name: args.name,
            domain: args.domain,
            is_existing: args.existing,
        },
        instructions: source,
        template: template_name,
    };

    info!(
        file = %request.document.file_name,
        template = %request.template,
        "generating proposal"
    );

    let reporter = CliProgress::new(json);
    let outcome = pipeline.run(&request, &reporter).await?;

    let out_dir = args
        .out
        .unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));
    let path = assembler::write_artifact(&out_dir, &outcome.artifact)?;

    print_outcome(&outcome, &path, json)
}

fn print_outcome(outcome: &ProposalOutcome, path: &Path, json: bool) -> Result<()> {
    let failed = outcome.content.failed_topics();

    if json {
        let value = serde_json::json!({
            "run_id": outcome.run_id,
            "path": path.display().to_string(),
            "content_type": outcome.artifact.content_type,
            "sha256": outcome.artifact.sha256,
            "template": outcome.template,
            "sections": outcome.content.topics(),
            "failed": failed,
            "missing": outcome.missing,
            "elapsed_ms": outcome.elapsed.as_millis() as u64,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("  Proposal generated successfully!");
    println!("  Run:      {}", outcome.run_id);
    println!("  Template: {}", outcome.template);
    println!("  Sections: {}", outcome.content.len());
    if !failed.is_empty() {
        let names: Vec<&str> = failed.iter().map(|t| t.name()).collect();
        println!("  Failed:   {}", names.join(", "));
    }
    println!("  Path:     {}", path.display());
    println!("  Time:     {:.1}s", outcome.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_topics(json: bool) -> Result<()> {
    if json {
        let topics: Vec<_> = TAXONOMY
            .iter()
            .map(|t| serde_json::json!({ "name": t.name(), "slug": t.slug() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&topics)?);
        return Ok(());
    }

    for (i, topic) in TAXONOMY.iter().enumerate() {
        println!("{:>2}. {:<40} {}", i + 1, topic.name(), topic.slug());
    }
    Ok(())
}

fn cmd_templates(json: bool) -> Result<()> {
    let config = load_config()?;
    let templates = TemplateRegistry::from_config(&config.templates)?;

    if json {
        let list: Vec<_> = templates.iter().collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    for template in templates.iter() {
        let marker = if template.name.eq_ignore_ascii_case(&config.defaults.template) {
            " (default)"
        } else {
            ""
        };
        println!("{}{marker}", template.name);
        for topic in &template.topics {
            println!("  - {}", topic.name());
        }
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new(hidden: bool) -> Self {
        let spinner = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, stage: PipelineStage) {
        match stage {
            PipelineStage::Delivered | PipelineStage::Failed => self.spinner.finish_and_clear(),
            PipelineStage::InstructionsNormalized => {
                self.spinner.set_message("Generating sections");
            }
            other => self.spinner.set_message(capitalize(&other.to_string())),
        }
    }

    fn section_generated(&self, topic: Topic, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Generating [{current}/{total}] {topic}"));
    }

    fn failed(&self, stage: PipelineStage, error: &ProposalError) {
        self.spinner
            .set_message(format!("Failed after {stage}: {}", error.code()));
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
