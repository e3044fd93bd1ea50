//! OPC zip container for `.docx` files.
//!
//! A [`Package`] keeps every entry of the archive in its original order with
//! its decompressed bytes. Parts the editor never touches are written back
//! unchanged; only parts replaced through [`Package::set_part`] differ.

use std::io::{Cursor, Read, Write};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::docx::xml::{XmlElement, REL_NS};
use crate::error::DocxError;

/// Relationship type of the main document part in `_rels/.rels`.
pub const OFFICE_DOCUMENT_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

const DEFAULT_MAIN_PART: &str = "word/document.xml";

/// One `Relationship` entry of a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

/// The decompressed entries of a zip package.
#[derive(Debug, Clone, Default)]
pub struct Package {
    entries: Vec<(String, Vec<u8>)>,
}

impl Package {
    /// Read every file entry of a zip archive.
    pub fn read(bytes: &[u8]) -> Result<Self, DocxError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push((name, data));
        }
        debug!("Read package with {} parts", entries.len());
        Ok(Self { entries })
    }

    /// Raw bytes of a part, if present.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, data)| data.as_slice())
    }

    /// Replace a part's bytes, appending the part when it does not exist.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|(entry, _)| entry == name) {
            Some(slot) => slot.1 = data,
            None => self.entries.push((name.to_string(), data)),
        }
    }

    /// Part names in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Parse a part as XML.
    pub fn xml_part(&self, name: &str) -> Result<XmlElement, DocxError> {
        let data = self.part(name).ok_or_else(|| DocxError::MissingPart {
            name: name.to_string(),
        })?;
        let text = std::str::from_utf8(strip_bom(data)).map_err(|_| DocxError::NotUtf8 {
            part: name.to_string(),
        })?;
        XmlElement::parse(text).map_err(|e| DocxError::Xml {
            part: name.to_string(),
            detail: e.to_string(),
        })
    }

    /// Path of the main document part, resolved through `_rels/.rels`.
    pub fn main_document_path(&self) -> String {
        self.relationships("_rels/.rels")
            .ok()
            .and_then(|rels| {
                rels.into_iter()
                    .find(|rel| rel.rel_type == OFFICE_DOCUMENT_REL)
                    .map(|rel| resolve_target("", &rel.target))
            })
            .filter(|path| self.part(path).is_some())
            .unwrap_or_else(|| DEFAULT_MAIN_PART.to_string())
    }

    /// Relationships declared in a `.rels` part. A missing part yields none.
    pub fn relationships(&self, rels_part: &str) -> Result<Vec<Relationship>, DocxError> {
        if self.part(rels_part).is_none() {
            return Ok(Vec::new());
        }
        let root = self.xml_part(rels_part)?;
        Ok(root
            .elements()
            .filter(|el| el.is(REL_NS, "Relationship"))
            .filter_map(|el| {
                Some(Relationship {
                    id: el.attr("Id")?.to_string(),
                    rel_type: el.attr("Type")?.to_string(),
                    target: el.attr("Target")?.to_string(),
                })
            })
            .collect())
    }

    /// Relationships of a given part (`word/document.xml` → `word/_rels/document.xml.rels`).
    pub fn part_relationships(&self, part: &str) -> Result<Vec<Relationship>, DocxError> {
        self.relationships(&rels_path_for(part))
    }

    /// Serialise the package back into a zip archive.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in &self.entries {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(data)?;
        }
        Ok(writer.finish()?.into_inner())
    }
}

/// `word/document.xml` → `word/_rels/document.xml.rels`.
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target relative to the directory of the source part.
///
/// Absolute targets (`/word/header1.xml`) are taken from the package root.
pub fn resolve_target(source_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = source_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zip_of(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in parts {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn rels_path_for_nested_and_root_parts() {
        assert_eq!(rels_path_for("word/document.xml"), "word/_rels/document.xml.rels");
        assert_eq!(rels_path_for("document.xml"), "_rels/document.xml.rels");
    }

    #[test]
    fn resolve_target_handles_relative_and_absolute() {
        assert_eq!(resolve_target("word", "header1.xml"), "word/header1.xml");
        assert_eq!(resolve_target("word", "/word/footer1.xml"), "word/footer1.xml");
        assert_eq!(resolve_target("word/sub", "../styles.xml"), "word/styles.xml");
        assert_eq!(resolve_target("", "word/document.xml"), "word/document.xml");
    }

    #[test]
    fn main_document_path_follows_root_relationship() {
        let rels = format!(
            r#"<Relationships xmlns="{REL_NS}"><Relationship Id="rId1" Type="{OFFICE_DOCUMENT_REL}" Target="word/main.xml"/></Relationships>"#
        );
        let bytes = zip_of(&[("_rels/.rels", &rels), ("word/main.xml", "<x/>")]);
        let package = Package::read(&bytes).unwrap();
        assert_eq!(package.main_document_path(), "word/main.xml");
    }

    #[test]
    fn main_document_path_falls_back_without_rels() {
        let bytes = zip_of(&[("word/document.xml", "<x/>")]);
        let package = Package::read(&bytes).unwrap();
        assert_eq!(package.main_document_path(), "word/document.xml");
    }

    #[test]
    fn untouched_parts_survive_rewrite() {
        let bytes = zip_of(&[("a.xml", "<a>1</a>"), ("b.bin", "\u{1}\u{2}raw")]);
        let mut package = Package::read(&bytes).unwrap();
        package.set_part("a.xml", b"<a>2</a>".to_vec());
        let rewritten = Package::read(&package.to_bytes().unwrap()).unwrap();
        assert_eq!(rewritten.part("a.xml"), Some(&b"<a>2</a>"[..]));
        assert_eq!(rewritten.part("b.bin"), Some("\u{1}\u{2}raw".as_bytes()));
        let names: Vec<_> = rewritten.part_names().collect();
        assert_eq!(names, vec!["a.xml", "b.bin"]);
    }

    #[test]
    fn garbage_is_a_zip_error() {
        let err = Package::read(b"definitely not a zip").unwrap_err();
        assert!(matches!(err, DocxError::Zip(_)));
    }

    #[test]
    fn missing_part_is_reported() {
        let bytes = zip_of(&[("a.xml", "<a/>")]);
        let package = Package::read(&bytes).unwrap();
        let err = package.xml_part("word/document.xml").unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }
}
