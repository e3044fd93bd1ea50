//! Read/modify/write model of a Word document.
//!
//! [`Document`] wraps a [`Package`] together with owned XML trees of the
//! parts the pipeline reads or edits:
//!
//! ```text
//! .docx (zip)
//!  ├─ _rels/.rels          → locates the main part
//!  ├─ word/document.xml    → body: paragraphs, tables, content controls
//!  ├─ word/_rels/…rels     → locates headers, footers, styles
//!  ├─ word/header*.xml     → header paragraphs (and tables)
//!  ├─ word/footer*.xml     → footer paragraphs (and tables)
//!  └─ word/styles.xml      → styleId → display name
//! ```
//!
//! Parts are re-serialised on [`Document::to_bytes`] only when an edit
//! changed one of their paragraphs; everything else is written back
//! unchanged.

pub mod package;
pub mod paragraph;
pub mod xml;

use std::collections::HashMap;

use tracing::debug;

use crate::error::DocxError;
pub use package::{Package, Relationship};
pub use paragraph::{paragraph_style_id, paragraph_text, run_text, runs, runs_mut, set_run_text};
pub use xml::{XmlElement, XmlNode};

/// Wrappers that are transparent for block traversal (content controls,
/// custom XML).
const TRANSPARENT: &[&str] = &["sdt", "sdtContent", "customXml"];

/// Where a paragraph lives; used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphScope {
    Body,
    Table,
    Header,
    Footer,
}

/// A top-level body block.
#[derive(Debug, Clone, Copy)]
pub enum Block<'a> {
    Paragraph(&'a XmlElement),
    Table(&'a XmlElement),
}

/// Header or footer part.
#[derive(Debug, Clone)]
pub struct SectionPart {
    pub path: String,
    pub scope: ParagraphScope,
    pub root: XmlElement,
    dirty: bool,
}

/// Paragraph style names keyed by style id.
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    names: HashMap<String, String>,
    default_paragraph: Option<String>,
}

impl StyleSheet {
    pub const FALLBACK_NAME: &'static str = "Normal";

    /// Build from the root of `styles.xml`.
    pub fn from_xml(root: &XmlElement) -> Self {
        let mut sheet = Self::default();
        for style in root.elements().filter(|el| el.is_w("style")) {
            if style.attr("type") != Some("paragraph") {
                continue;
            }
            let Some(id) = style.attr("styleId") else {
                continue;
            };
            let name = style
                .w_child("name")
                .and_then(|n| n.attr("val"))
                .map(display_style_name)
                .unwrap_or_else(|| id.to_string());
            if matches!(style.attr("default"), Some("1" | "true" | "on")) {
                sheet.default_paragraph = Some(name.clone());
            }
            sheet.names.insert(id.to_string(), name);
        }
        sheet
    }

    /// Display name for a paragraph's style id, or the default paragraph
    /// style when the paragraph sets none.
    pub fn name_for(&self, style_id: Option<&str>) -> String {
        match style_id {
            Some(id) => self.names.get(id).cloned().unwrap_or_else(|| id.to_string()),
            None => self.default_name().to_string(),
        }
    }

    pub fn default_name(&self) -> &str {
        self.default_paragraph.as_deref().unwrap_or(Self::FALLBACK_NAME)
    }
}

/// Built-in styles are stored lowercase (`heading 1`); Word shows them
/// capitalised.
fn display_style_name(raw: &str) -> String {
    if raw.chars().any(|c| c.is_uppercase()) {
        return raw.to_string();
    }
    raw.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A parsed `.docx` document.
#[derive(Debug, Clone)]
pub struct Document {
    package: Package,
    main_path: String,
    main: XmlElement,
    main_dirty: bool,
    sections: Vec<SectionPart>,
    styles: StyleSheet,
}

impl Document {
    /// Parse a `.docx` byte buffer.
    pub fn parse(bytes: &[u8]) -> Result<Self, DocxError> {
        let package = Package::read(bytes)?;
        let main_path = package.main_document_path();
        let main = package.xml_part(&main_path)?;
        if main.w_child("body").is_none() {
            return Err(DocxError::Xml {
                part: main_path,
                detail: "document has no w:body".to_string(),
            });
        }

        let source_dir = main_path.rsplit_once('/').map_or("", |(dir, _)| dir);
        let rels = package.part_relationships(&main_path)?;

        let mut sections = Vec::new();
        let mut styles = StyleSheet::default();
        let mut styles_found = false;
        for rel in &rels {
            let path = package::resolve_target(source_dir, &rel.target);
            let scope = if rel.rel_type.ends_with("/header") {
                ParagraphScope::Header
            } else if rel.rel_type.ends_with("/footer") {
                ParagraphScope::Footer
            } else if rel.rel_type.ends_with("/styles") {
                if package.part(&path).is_some() {
                    styles = StyleSheet::from_xml(&package.xml_part(&path)?);
                    styles_found = true;
                }
                continue;
            } else {
                continue;
            };
            if package.part(&path).is_none() {
                debug!("Relationship {} points at missing part {}", rel.id, path);
                continue;
            }
            let root = package.xml_part(&path)?;
            sections.push(SectionPart {
                path,
                scope,
                root,
                dirty: false,
            });
        }
        if !styles_found && package.part("word/styles.xml").is_some() {
            styles = StyleSheet::from_xml(&package.xml_part("word/styles.xml")?);
        }

        debug!(
            "Parsed {} with {} header/footer parts",
            main_path,
            sections.len()
        );
        Ok(Self {
            package,
            main_path,
            main,
            main_dirty: false,
            sections,
            styles,
        })
    }

    /// The `w:body` element.
    pub fn body(&self) -> &XmlElement {
        self.main
            .w_child("body")
            .unwrap_or(&self.main)
    }

    pub fn styles(&self) -> &StyleSheet {
        &self.styles
    }

    pub fn sections(&self) -> &[SectionPart] {
        &self.sections
    }

    /// Top-level blocks in body order, looking through content controls.
    pub fn blocks(&self) -> Vec<Block<'_>> {
        let mut out = Vec::new();
        collect_blocks(self.body(), &mut out);
        out
    }

    /// Visit every paragraph in replacement order: body paragraphs, then
    /// table cells (row-major, nested tables recursing), then header and
    /// footer parts.
    ///
    /// The visitor returns whether it changed the paragraph; only parts with
    /// a changed paragraph are re-serialised by [`Document::to_bytes`].
    pub fn for_each_paragraph_mut(
        &mut self,
        mut visit: impl FnMut(ParagraphScope, &mut XmlElement) -> bool,
    ) {
        if let Some(body) = self.main.w_child_mut("body") {
            let paragraphs = visit_body_paragraphs_mut(body, &mut visit);
            let tables = visit_body_tables_mut(body, &mut visit);
            self.main_dirty |= paragraphs | tables;
        }
        for section in &mut self.sections {
            let scope = section.scope;
            section.dirty |= visit_in_order_mut(&mut section.root, scope, &mut visit);
        }
    }

    /// Serialise the document, rewriting only the parts that were edited.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        let mut package = self.package.clone();
        if self.main_dirty {
            package.set_part(&self.main_path, self.main.to_xml().into_bytes());
        }
        for section in self.sections.iter().filter(|s| s.dirty) {
            package.set_part(&section.path, section.root.to_xml().into_bytes());
        }
        package.to_bytes()
    }
}

/// Rows of a table, looking through content controls.
pub fn table_rows(table: &XmlElement) -> Vec<&XmlElement> {
    transparent_children(table, "tr")
}

/// Cells of a row, looking through content controls.
pub fn row_cells(row: &XmlElement) -> Vec<&XmlElement> {
    transparent_children(row, "tc")
}

/// Paragraph texts directly inside a cell, joined by newlines.
pub fn cell_text(cell: &XmlElement) -> String {
    transparent_children(cell, "p")
        .into_iter()
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_transparent(el: &XmlElement) -> bool {
    TRANSPARENT.iter().any(|local| el.is_w(local))
}

fn transparent_children<'a>(el: &'a XmlElement, local: &str) -> Vec<&'a XmlElement> {
    let mut out = Vec::new();
    for child in el.elements() {
        if child.is_w(local) {
            out.push(child);
        } else if is_transparent(child) {
            out.extend(transparent_children(child, local));
        }
    }
    out
}

fn collect_blocks<'a>(container: &'a XmlElement, out: &mut Vec<Block<'a>>) {
    for child in container.elements() {
        if child.is_w("p") {
            out.push(Block::Paragraph(child));
        } else if child.is_w("tbl") {
            out.push(Block::Table(child));
        } else if is_transparent(child) {
            collect_blocks(child, out);
        }
    }
}

type Visitor<'v> = dyn FnMut(ParagraphScope, &mut XmlElement) -> bool + 'v;

fn visit_body_paragraphs_mut(container: &mut XmlElement, visit: &mut Visitor<'_>) -> bool {
    let mut changed = false;
    for child in container.elements_mut() {
        if child.is_w("p") {
            changed |= visit(ParagraphScope::Body, child);
        } else if is_transparent(child) {
            changed |= visit_body_paragraphs_mut(child, visit);
        }
    }
    changed
}

fn visit_body_tables_mut(container: &mut XmlElement, visit: &mut Visitor<'_>) -> bool {
    let mut changed = false;
    for child in container.elements_mut() {
        if child.is_w("tbl") {
            changed |= visit_table_mut(child, ParagraphScope::Table, visit);
        } else if is_transparent(child) {
            changed |= visit_body_tables_mut(child, visit);
        }
    }
    changed
}

/// Rows, cells and nested tables are all walked in document order.
fn visit_table_mut(table: &mut XmlElement, scope: ParagraphScope, visit: &mut Visitor<'_>) -> bool {
    let mut changed = false;
    for child in table.elements_mut() {
        if child.is_w("p") {
            changed |= visit(scope, child);
        } else if child.is_w("tr") || child.is_w("tc") || child.is_w("tbl") || is_transparent(child) {
            changed |= visit_table_mut(child, scope, visit);
        }
    }
    changed
}

fn visit_in_order_mut(container: &mut XmlElement, scope: ParagraphScope, visit: &mut Visitor<'_>) -> bool {
    let mut changed = false;
    for child in container.elements_mut() {
        if child.is_w("p") {
            changed |= visit(scope, child);
        } else if child.is_w("tbl") {
            changed |= visit_table_mut(child, scope, visit);
        } else if is_transparent(child) {
            changed |= visit_in_order_mut(child, scope, visit);
        }
    }
    changed
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Hand-assembled `.docx` packages for unit tests.

    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::xml::W_NS;

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#;
    const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;
    const DOC_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer" Target="footer1.xml"/></Relationships>"#;

    /// A run with optional bold formatting.
    pub fn run(text: &str, bold: bool) -> String {
        let rpr = if bold { "<w:rPr><w:b/></w:rPr>" } else { "" };
        format!(r#"<w:r>{rpr}<w:t xml:space="preserve">{text}</w:t></w:r>"#)
    }

    pub fn para(style: Option<&str>, runs: &[String]) -> String {
        let ppr = style
            .map(|s| format!(r#"<w:pPr><w:pStyle w:val="{s}"/></w:pPr>"#))
            .unwrap_or_default();
        format!("<w:p>{ppr}{}</w:p>", runs.concat())
    }

    pub fn table(rows: &[&[&str]]) -> String {
        let mut xml = String::from("<w:tbl>");
        for row in rows {
            xml.push_str("<w:tr>");
            for cell in *row {
                xml.push_str(&format!("<w:tc>{}</w:tc>", para(None, &[run(cell, false)])));
            }
            xml.push_str("</w:tr>");
        }
        xml.push_str("</w:tbl>");
        xml
    }

    /// Build a package with the given body XML, header and footer paragraphs.
    pub fn docx(body: &str, header: &str, footer: &str) -> Vec<u8> {
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}"><w:body>{body}<w:sectPr/></w:body></w:document>"#
        );
        let styles = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:styles xmlns:w="{W_NS}"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style><w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/></w:style></w:styles>"#
        );
        let header = format!(r#"<w:hdr xmlns:w="{W_NS}">{header}</w:hdr>"#);
        let footer = format!(r#"<w:ftr xmlns:w="{W_NS}">{footer}</w:ftr>"#);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES.to_string()),
            ("_rels/.rels", ROOT_RELS.to_string()),
            ("word/_rels/document.xml.rels", DOC_RELS.to_string()),
            ("word/document.xml", document),
            ("word/styles.xml", styles),
            ("word/header1.xml", header),
            ("word/footer1.xml", footer),
        ];
        for (name, body) in parts {
            writer.start_file(name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}
