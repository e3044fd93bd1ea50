//! Markdown → DOCX rendering.
//!
//! ## Data Flow
//!
//! ```text
//! markdown ──▶ preprocess ──▶ convert ──▶ numbering ──▶ writer
//!              (line fixes)   (comrak)    (restarts)    (docx-rs)
//!                                │
//!                                └─ on failure: notice + plain text
//! ```
//!
//! Rendering is a pure function of its input: the same Markdown always
//! yields the same document text and the same numbering instances.

pub mod convert;
pub mod model;
pub mod numbering;
pub mod preprocess;
pub mod writer;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::RenderError;
pub use model::RenderedDocument;
pub use numbering::{NumberingSource, FALLBACK_ABSTRACT_NUMBERING_ID};
pub use writer::StyleCatalog;

/// Result of [`render_markdown`].
#[derive(Debug, Clone, Serialize)]
pub struct RenderOutcome {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub document: RenderedDocument,
    /// The markup could not be converted and the document holds plain text.
    pub degraded: bool,
}

/// Build the document model: preprocess, convert (or fall back), number.
pub fn build_document(markdown: &str) -> (RenderedDocument, bool) {
    let source = preprocess::preprocess_markdown(markdown);
    let (mut document, degraded) = match convert::convert_markdown(&source) {
        Ok(document) => (document, false),
        Err(e) => {
            warn!("Markdown conversion failed, falling back to plain text: {}", e);
            (convert::plain_text_document(&source), true)
        }
    };
    numbering::restart_ordered_lists(&mut document, &StyleCatalog);
    (document, degraded)
}

/// Render Markdown to DOCX and report whether the fallback was used.
pub fn render_markdown(markdown: &str) -> Result<RenderOutcome, RenderError> {
    let (document, degraded) = build_document(markdown);
    let bytes = writer::write_docx(&document)?;
    debug!(
        "Rendered {} blocks, {} list instances, {} bytes",
        document.blocks.len(),
        document.numbering.len(),
        bytes.len()
    );
    Ok(RenderOutcome {
        bytes,
        document,
        degraded,
    })
}

/// Render Markdown to DOCX bytes.
pub fn render_markdown_to_docx(markdown: &str) -> Result<Vec<u8>, RenderError> {
    render_markdown(markdown).map(|outcome| outcome.bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::{paragraph_text, Document, Package, XmlElement};
    use crate::pipeline::extract::plain_text;
    use model::DisplayNumber;

    fn display(doc: &RenderedDocument) -> Vec<(usize, usize)> {
        doc.display_numbers()
            .iter()
            .map(|&DisplayNumber { num_id, value, .. }| (num_id, value))
            .collect()
    }

    #[test]
    fn separated_lists_each_start_at_one() {
        let (doc, degraded) = build_document("1. A\n2. B\n\ntext\n\n1. C\n2. D");
        assert!(!degraded);
        assert_eq!(doc.numbering.len(), 2);
        assert_eq!(display(&doc), vec![(4, 1), (4, 2), (5, 1), (5, 2)]);
    }

    #[test]
    fn list_numbered_from_five_still_starts_at_one() {
        let (doc, _) = build_document("5. A\n6. B");
        assert_eq!(display(&doc), vec![(4, 1), (4, 2)]);
    }

    #[test]
    fn rendering_is_deterministic() {
        let md = "# Plan\n\n1. one\n2. two\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n1. again";
        let first = render_markdown(md).unwrap();
        let second = render_markdown(md).unwrap();
        assert_eq!(first.document, second.document);

        let text = |bytes: &[u8]| plain_text(&Document::parse(bytes).unwrap());
        assert_eq!(text(&first.bytes), text(&second.bytes));
    }

    #[test]
    fn output_opens_with_the_document_reader() {
        let outcome = render_markdown("Intro\n\n1. first\n2. second\n\nEnd").unwrap();
        let doc = Document::parse(&outcome.bytes).unwrap();
        assert_eq!(plain_text(&doc), "Intro\nfirst\nsecond\nEnd");

        let numbered: Vec<String> = doc
            .body()
            .elements()
            .filter(|p| p.is_w("p"))
            .filter(|p| {
                p.w_child("pPr")
                    .and_then(|ppr| ppr.w_child("numPr"))
                    .and_then(|num| num.w_child("numId"))
                    .and_then(|id| id.attr("val"))
                    == Some("4")
            })
            .map(paragraph_text)
            .collect();
        assert_eq!(numbered, vec!["first", "second"]);

        let numbering: XmlElement = Package::read(&outcome.bytes)
            .unwrap()
            .xml_part("word/numbering.xml")
            .unwrap();
        assert!(numbering
            .elements()
            .any(|n| n.is_w("num") && n.attr("numId") == Some("4")));
    }

    #[test]
    fn too_deep_markup_degrades_to_plain_text() {
        let md: String = (0..12).map(|i| format!("{}- level {i}\n", "  ".repeat(i))).collect();
        let outcome = render_markdown(&md).unwrap();
        assert!(outcome.degraded);
        let texts: Vec<String> = outcome.document.paragraphs().map(|p| p.text()).collect();
        assert_eq!(texts[0], convert::FALLBACK_NOTICE);
        assert!(texts[1].starts_with("- level 0\n  - level 1"));
        assert!(Document::parse(&outcome.bytes).is_ok());
    }

    #[test]
    fn render_to_docx_returns_a_zip() {
        let bytes = render_markdown_to_docx("hello").unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
