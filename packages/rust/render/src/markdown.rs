//! Markdown rendering.

use bizproposal_shared::{Artifact, MARKDOWN_CONTENT_TYPE, ProposalDocument, Result};

use crate::{DocumentRenderer, file_name_for};

/// Title as H1, sections as H2, `---` between sections.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn to_markdown(document: &ProposalDocument) -> String {
        let mut out = format!("# {}\n", document.title.trim());
        for section in &document.sections {
            out.push_str(&format!("\n## {}\n\n", section.heading));
            let body = section.body.trim();
            if !body.is_empty() {
                out.push_str(body);
                out.push('\n');
            }
            out.push_str("\n---\n");
        }
        out
    }
}

impl DocumentRenderer for MarkdownRenderer {
    fn render(&self, document: &ProposalDocument) -> Result<Artifact> {
        Ok(Artifact::new(
            file_name_for(&document.title, self.extension()),
            MARKDOWN_CONTENT_TYPE,
            Self::to_markdown(document).into_bytes(),
        ))
    }

    fn extension(&self) -> &'static str {
        "md"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizproposal_shared::DocumentSection;

    #[test]
    fn sections_follow_document_order() {
        let doc = ProposalDocument {
            title: "Business Proposal".into(),
            sections: vec![
                DocumentSection {
                    heading: "Market Analysis".into(),
                    body: "Growing.\n".into(),
                },
                DocumentSection {
                    heading: "Company Overview".into(),
                    body: "Family owned.".into(),
                },
            ],
        };

        let md = MarkdownRenderer::to_markdown(&doc);
        assert_eq!(
            md,
            "# Business Proposal\n\n## Market Analysis\n\nGrowing.\n\n---\n\n## Company Overview\n\nFamily owned.\n\n---\n"
        );

        let artifact = MarkdownRenderer.render(&doc).unwrap();
        assert_eq!(artifact.file_name, "Business_Proposal.md");
        assert_eq!(artifact.content_type, MARKDOWN_CONTENT_TYPE);
    }
}
