//! Proposal document assembly.
//!
//! Turns ordered generated content into a renderer-independent document,
//! renders it, and writes the resulting artifact to disk.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use bizproposal_render::DocumentRenderer;
use bizproposal_shared::{
    Artifact, DEFAULT_TITLE, DocumentSection, ProposalContent, ProposalDocument, ProposalError,
    Result,
};

/// Build the document: one section per content entry, in insertion order,
/// headed by the topic name.
pub fn assemble(title: &str, content: &ProposalContent) -> ProposalDocument {
    let title = match title.trim() {
        "" => DEFAULT_TITLE.to_string(),
        t => t.to_string(),
    };

    let sections = content
        .sections
        .iter()
        .map(|section| DocumentSection {
            heading: section.topic.name().to_string(),
            body: section.body.render_text(),
        })
        .collect();

    ProposalDocument { title, sections }
}

/// Render an assembled document. Rendering failures are fatal.
#[instrument(
    skip_all,
    fields(title = %document.title, sections = document.sections.len(), format = renderer.extension())
)]
pub fn render(document: &ProposalDocument, renderer: &dyn DocumentRenderer) -> Result<Artifact> {
    let artifact = renderer.render(document)?;
    debug!(
        file = %artifact.file_name,
        size = artifact.bytes.len(),
        sha256 = %artifact.sha256,
        "document rendered"
    );
    Ok(artifact)
}

/// Write an artifact into `dir`, returning the final path.
///
/// Writes to a temp file first, then renames into place.
#[instrument(skip_all, fields(dir = %dir.display(), file = %artifact.file_name))]
pub fn write_artifact(dir: &Path, artifact: &Artifact) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| ProposalError::io(dir, e))?;

    let target = dir.join(&artifact.file_name);
    let temp = dir.join(format!(".{}.tmp", artifact.file_name));

    std::fs::write(&temp, &artifact.bytes).map_err(|e| ProposalError::io(&temp, e))?;
    std::fs::rename(&temp, &target).map_err(|e| ProposalError::io(&target, e))?;

    info!(path = %target.display(), size = artifact.bytes.len(), "artifact written");
    Ok(target)
}
