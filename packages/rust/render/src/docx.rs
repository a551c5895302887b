//! Word-processing (`.docx`) rendering via `docx-rs`.

use std::io::Cursor;

use docx_rs::{BreakType, Docx, Paragraph, Run, Style, StyleType};
use tracing::{debug, instrument};

use bizproposal_shared::{Artifact, DOCX_CONTENT_TYPE, ProposalDocument, ProposalError, Result};

use crate::{DocumentRenderer, file_name_for};

const TITLE_STYLE: &str = "Title";
const HEADING_STYLE: &str = "Heading1";

/// Renders a title, then per section a level-1 heading, the body paragraphs
/// and a page break.
#[derive(Debug, Clone)]
pub struct DocxRenderer {
    /// Title size in half-points.
    pub title_size: usize,
    /// Heading size in half-points.
    pub heading_size: usize,
}

impl Default for DocxRenderer {
    fn default() -> Self {
        Self {
            title_size: 52,
            heading_size: 32,
        }
    }
}

impl DocxRenderer {
    fn build(&self, document: &ProposalDocument) -> Docx {
        let mut docx = Docx::new()
            .add_style(
                Style::new(TITLE_STYLE, StyleType::Paragraph)
                    .name("Title")
                    .size(self.title_size)
                    .bold(),
            )
            .add_style(
                Style::new(HEADING_STYLE, StyleType::Paragraph)
                    .name("Heading 1")
                    .size(self.heading_size)
                    .bold(),
            )
            .add_paragraph(
                Paragraph::new()
                    .add_run(Run::new().add_text(&document.title))
                    .style(TITLE_STYLE),
            );

        for section in &document.sections {
            docx = docx.add_paragraph(
                Paragraph::new()
                    .add_run(Run::new().add_text(&section.heading))
                    .style(HEADING_STYLE),
            );

            for line in body_paragraphs(&section.body) {
                docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(line)));
            }

            docx = docx
                .add_paragraph(Paragraph::new().add_run(Run::new().add_break(BreakType::Page)));
        }

        docx
    }
}

/// Split a generated body into paragraphs, one per non-blank line.
fn body_paragraphs(body: &str) -> Vec<&str> {
    let lines: Vec<&str> = body
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();
    if lines.is_empty() { vec![""] } else { lines }
}

impl DocumentRenderer for DocxRenderer {
    #[instrument(skip_all, fields(sections = document.sections.len()))]
    fn render(&self, document: &ProposalDocument) -> Result<Artifact> {
        let mut cursor = Cursor::new(Vec::new());
        self.build(document)
            .build()
            .pack(&mut cursor)
            .map_err(|e| ProposalError::Rendering(format!("failed to write docx: {e}")))?;

        let bytes = cursor.into_inner();
        debug!(size = bytes.len(), "docx rendered");

        Ok(Artifact::new(
            file_name_for(&document.title, self.extension()),
            DOCX_CONTENT_TYPE,
            bytes,
        ))
    }

    fn extension(&self) -> &'static str {
        "docx"
    }
}
