//! Document text extraction: DOCX, PDF and plain text.
//!
//! Two views of a document are produced here:
//!
//! * **Plain** ([`extract_text`]): what a reader would see, for document
//!   Q&A. DOCX paragraphs come first, then one line per table row.
//! * **Structural** ([`extract_structural`]): every paragraph tagged with
//!   its position and style name, tables bracketed by markers. The model
//!   uses the markers to tell a heading from a signature line and a table
//!   cell from body text when it proposes replacements.
//!
//! ```text
//! [0|Title] Service agreement
//! [2|Normal] Company: ООО Ромашка
//! [TABLE 1]
//! [1.1] Party | Signature
//! [1.2] ООО «Ромашка» | ________
//! [/TABLE 1]
//! ```
//!
//! Extraction of a supported format never panics. The untyped entry points
//! turn a corrupt document into a readable message such as
//! `"Failed to read DOCX: …"`; the `try_*` variants keep the typed error.

use std::borrow::Cow;

use encoding_rs::{Encoding, KOI8_R, WINDOWS_1251, WINDOWS_1252};
use tracing::{debug, warn};

use crate::docx::{cell_text, paragraph_style_id, paragraph_text, row_cells, table_rows, Block, Document};
use crate::error::ExtractError;

/// File extensions the extractor accepts.
pub const SUPPORTED_FORMATS: &[&str] = &[".docx", ".pdf", ".txt"];

/// Appended to text cut by [`truncate_for_prompt`].
pub const TRUNCATION_MARKER: &str = "\n\n[... text truncated ...]";

const CELL_SEPARATOR: &str = " | ";

/// Result of [`extract_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Extracted text, or a description of why a supported document could
    /// not be read.
    Text(String),
    /// The extension is not one of [`SUPPORTED_FORMATS`].
    Unsupported { extension: String },
}

impl Extraction {
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Unsupported { .. } => None,
        }
    }
}

/// Comma-separated list of supported formats for user-facing messages.
pub fn supported_formats_list() -> String {
    SUPPORTED_FORMATS.join(", ")
}

/// Lowercased extension of `filename`, including the dot (`".docx"`).
/// Empty when the name has none.
pub fn file_extension(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!(".{}", ext.to_lowercase()),
        _ => String::new(),
    }
}

/// Extract plain text, dispatching on the file extension.
pub fn extract_text(bytes: &[u8], filename: &str) -> Extraction {
    match try_extract_text(bytes, filename) {
        Ok(text) => Extraction::Text(text),
        Err(ExtractError::Unsupported { extension }) => Extraction::Unsupported { extension },
        Err(e) => {
            warn!("Extraction of '{}' failed: {}", filename, e);
            Extraction::Text(e.to_string())
        }
    }
}

/// Typed variant of [`extract_text`].
pub fn try_extract_text(bytes: &[u8], filename: &str) -> Result<String, ExtractError> {
    let extension = file_extension(filename);
    debug!("Extracting '{}' as {}", filename, extension);
    match extension.as_str() {
        ".docx" => try_extract_docx(bytes),
        ".pdf" => try_extract_pdf(bytes),
        ".txt" => Ok(decode_text(bytes)),
        _ => Err(ExtractError::Unsupported { extension }),
    }
}

/// Plain DOCX text: non-empty top-level paragraphs, then table rows.
pub fn try_extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let document = Document::parse(bytes)?;
    Ok(plain_text(&document))
}

/// Plain text of an already parsed document.
pub fn plain_text(document: &Document) -> String {
    let blocks = document.blocks();
    let mut lines: Vec<String> = Vec::new();

    for block in &blocks {
        if let Block::Paragraph(p) = block {
            let text = paragraph_text(p);
            if !text.trim().is_empty() {
                lines.push(text);
            }
        }
    }

    for block in &blocks {
        if let Block::Table(table) = block {
            for row in table_rows(table) {
                let cells: Vec<String> = row_cells(row)
                    .into_iter()
                    .map(|cell| cell_text(cell).trim().to_string())
                    .filter(|text| !text.is_empty())
                    .collect();
                if !cells.is_empty() {
                    lines.push(cells.join(CELL_SEPARATOR));
                }
            }
        }
    }

    lines.join("\n")
}

/// Structural DOCX text for change-request prompts.
///
/// A corrupt document yields the `"Failed to read DOCX: …"` description.
pub fn extract_structural(bytes: &[u8]) -> String {
    match Document::parse(bytes) {
        Ok(document) => structural_text(&document),
        Err(e) => {
            let e = ExtractError::from(e);
            warn!("Structural extraction failed: {}", e);
            e.to_string()
        }
    }
}

/// Structural text of an already parsed document.
///
/// Paragraph indices count every top-level paragraph, empty ones included,
/// so they stay stable however much of the body is blank. Tables and rows
/// are numbered from 1.
pub fn structural_text(document: &Document) -> String {
    let styles = document.styles();
    let mut lines = Vec::new();
    let mut paragraph_index = 0usize;
    let mut table_index = 0usize;

    for block in document.blocks() {
        match block {
            Block::Paragraph(p) => {
                let text = paragraph_text(p);
                if !text.trim().is_empty() {
                    let style = styles.name_for(paragraph_style_id(p));
                    lines.push(format!("[{paragraph_index}|{style}] {text}"));
                }
                paragraph_index += 1;
            }
            Block::Table(table) => {
                table_index += 1;
                lines.push(format!("[TABLE {table_index}]"));
                for (row_index, row) in table_rows(table).into_iter().enumerate() {
                    let cells: Vec<String> = row_cells(row)
                        .into_iter()
                        .map(|cell| cell_text(cell).trim().to_string())
                        .collect();
                    lines.push(format!(
                        "[{table_index}.{}] {}",
                        row_index + 1,
                        cells.join(CELL_SEPARATOR)
                    ));
                }
                lines.push(format!("[/TABLE {table_index}]"));
            }
        }
    }

    lines.join("\n")
}

/// Cut `text` to at most `limit` characters and append [`TRUNCATION_MARKER`].
///
/// The cut lands on a char boundary; text within the limit is borrowed
/// unchanged.
pub fn truncate_for_prompt(text: &str, limit: usize) -> Cow<'_, str> {
    match text.char_indices().nth(limit) {
        None => Cow::Borrowed(text),
        Some((cut, _)) => {
            debug!("Truncating prompt text at {} chars", limit);
            Cow::Owned(format!("{}{}", &text[..cut], TRUNCATION_MARKER))
        }
    }
}

// ── Plain text ───────────────────────────────────────────────────────────

/// Decode a text file, trying UTF-8 first and then legacy code pages.
///
/// Order: UTF-8 (BOM stripped), windows-1251, windows-1252, ISO-8859-1,
/// KOI8-R, then lossy UTF-8. Never fails.
///
/// encoding_rs maps all 256 windows-1251 bytes, so any input that is not
/// UTF-8 decodes as windows-1251 and the later steps are not reached.
/// windows-1252 text therefore comes back as Cyrillic.
pub fn decode_text(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(body) {
        return text.to_string();
    }

    for encoding in [WINDOWS_1251, WINDOWS_1252] {
        if let Some(text) = decode_strict(encoding, bytes) {
            debug!("Decoded text as {}", encoding.name());
            return text;
        }
    }
    if let Some(text) = decode_latin1(bytes) {
        debug!("Decoded text as ISO-8859-1");
        return text;
    }
    if let Some(text) = decode_strict(KOI8_R, bytes) {
        debug!("Decoded text as {}", KOI8_R.name());
        return text;
    }

    warn!("No encoding matched; decoding with replacement characters");
    String::from_utf8_lossy(bytes).into_owned()
}

fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
}

/// ISO-8859-1 maps every byte to the code point of the same value.
fn decode_latin1(bytes: &[u8]) -> Option<String> {
    Some(bytes.iter().map(|&b| char::from(b)).collect())
}

// ── PDF ──────────────────────────────────────────────────────────────────

/// PDF text, one `--- Page N ---` block per non-empty page.
#[cfg(feature = "pdf")]
pub fn try_extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    use pdfium_render::prelude::*;

    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&path))
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExtractError::Pdf(format!("failed to bind pdfium: {e:?}")))?;
    let pdfium = Pdfium::new(bindings);

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| ExtractError::Pdf(format!("{e:?}")))?;

    let mut pages = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| ExtractError::Pdf(format!("page {}: {e:?}", index + 1)))?
            .all();
        if !text.trim().is_empty() {
            pages.push(format_pdf_page(index + 1, &text));
        }
    }
    debug!("Extracted {} non-empty PDF pages", pages.len());
    Ok(pages.join("\n\n"))
}

#[cfg(not(feature = "pdf"))]
pub fn try_extract_pdf(_bytes: &[u8]) -> Result<String, ExtractError> {
    Err(ExtractError::PdfUnavailable)
}

#[cfg_attr(not(feature = "pdf"), allow(dead_code))]
fn format_pdf_page(number: usize, text: &str) -> String {
    format!("--- Page {number} ---\n{text}")
}
