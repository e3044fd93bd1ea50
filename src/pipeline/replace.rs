//! Format-preserving text replacement inside a `.docx` document.
//!
//! Word splits a visually continuous sentence into many runs (`w:r`), one
//! per formatting change, spell-check boundary or edit session. A
//! replacement therefore works paragraph by paragraph:
//!
//! 1. Skip the paragraph unless its full text contains the key.
//! 2. **Fast path**: substitute inside every run whose own text contains the
//!    key. Formatting of every run is untouched.
//! 3. **Slow path**: if that does not reproduce the full-text substitution
//!    (an occurrence straddles a run boundary), write the substituted
//!    paragraph text into the first run and empty the rest. The first run's
//!    formatting wins for the whole paragraph.
//!
//! Every key is a separate pass over body paragraphs, table cells, headers
//! and footers, in mapping order, so a later key can match text written by
//! an earlier one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::docx::xml::{is_xml_char, XmlElement};
use crate::docx::{paragraph_text, run_text, runs_mut, set_run_text, Document, ParagraphScope};
use crate::error::DocxError;

// ── Mapping ──────────────────────────────────────────────────────────────

/// Ordered map from exact source text to its replacement.
///
/// Keys are unique; re-inserting a key updates its value in place. Entries
/// apply in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    into = "Map<String, Value>",
    try_from = "Map<String, Value>"
)]
pub struct ReplacementMapping {
    entries: Vec<(String, String)>,
}

impl ReplacementMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a key, keeping its original position.
    ///
    /// Characters XML cannot hold are dropped from the value; a document
    /// never contains them, so keys are kept as given.
    pub fn insert(&mut self, old: impl Into<String>, new: impl Into<String>) {
        let old = old.into();
        let mut new = new.into();
        if !new.chars().all(is_xml_char) {
            debug!("Dropping non-XML characters from the value for {:?}", old);
            new.retain(is_xml_char);
        }
        match self.entries.iter_mut().find(|(key, _)| *key == old) {
            Some(slot) => slot.1 = new,
            None => self.entries.push((old, new)),
        }
    }

    pub fn get(&self, old: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == old)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ReplacementMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (old, new) in iter {
            mapping.insert(old, new);
        }
        mapping
    }
}

impl From<ReplacementMapping> for Map<String, Value> {
    fn from(mapping: ReplacementMapping) -> Self {
        mapping
            .entries
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect()
    }
}

impl TryFrom<Map<String, Value>> for ReplacementMapping {
    type Error = String;

    /// Strict conversion for mapping files: every value must be a string.
    fn try_from(object: Map<String, Value>) -> Result<Self, Self::Error> {
        object
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => Ok((key, s)),
                other => Err(format!("value for {key:?} must be a string, got {other}")),
            })
            .collect()
    }
}

// ── Report ───────────────────────────────────────────────────────────────

/// How one mapping entry was applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyReport {
    pub key: String,
    /// Paragraphs changed entirely inside single runs.
    pub fast_path: usize,
    /// Paragraphs rewritten through the first run.
    pub slow_path: usize,
    /// The key was empty and not applied.
    pub skipped: bool,
}

impl KeyReport {
    pub fn paragraphs(&self) -> usize {
        self.fast_path + self.slow_path
    }
}

/// Outcome of [`apply_replacements`], one entry per mapping key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplacementReport {
    pub keys: Vec<KeyReport>,
}

impl ReplacementReport {
    /// Non-empty keys that matched no paragraph.
    pub fn unmatched(&self) -> Vec<&str> {
        self.keys
            .iter()
            .filter(|k| !k.skipped && k.paragraphs() == 0)
            .map(|k| k.key.as_str())
            .collect()
    }

    /// Total paragraphs changed across all keys.
    pub fn paragraphs_changed(&self) -> usize {
        self.keys.iter().map(KeyReport::paragraphs).sum()
    }

    /// Paragraphs that needed the lossy first-run rewrite.
    pub fn slow_path_count(&self) -> usize {
        self.keys.iter().map(|k| k.slow_path).sum()
    }
}

// ── Engine ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathTaken {
    Fast,
    Slow,
}

/// Apply every mapping entry to the document in place.
pub fn apply_replacements(document: &mut Document, mapping: &ReplacementMapping) -> ReplacementReport {
    let mut report = ReplacementReport::default();

    for (old, new) in mapping.iter() {
        let mut key_report = KeyReport {
            key: old.to_string(),
            ..KeyReport::default()
        };
        if old.is_empty() {
            warn!("Skipping empty replacement key (value {:?})", new);
            key_report.skipped = true;
            report.keys.push(key_report);
            continue;
        }

        document.for_each_paragraph_mut(|scope, paragraph| {
            match replace_in_paragraph(paragraph, old, new) {
                Some(PathTaken::Fast) => {
                    key_report.fast_path += 1;
                    true
                }
                Some(PathTaken::Slow) => {
                    debug!("Key {:?} spans runs in a {:?} paragraph; rewriting first run", old, scope);
                    key_report.slow_path += 1;
                    true
                }
                None => false,
            }
        });

        if key_report.paragraphs() == 0 {
            debug!("Replacement key {:?} matched nothing", old);
        }
        report.keys.push(key_report);
    }

    info!(
        "Applied {} replacement keys: {} paragraphs changed, {} via first-run rewrite, {} unmatched",
        report.keys.len(),
        report.paragraphs_changed(),
        report.slow_path_count(),
        report.unmatched().len()
    );
    report
}

/// Parse, apply and serialise in one step.
///
/// Corrupt input fails before any change is made, so no partially edited
/// document can be returned.
pub fn replace_in_docx(
    bytes: &[u8],
    mapping: &ReplacementMapping,
) -> Result<(Vec<u8>, ReplacementReport), DocxError> {
    let mut document = Document::parse(bytes)?;
    let report = apply_replacements(&mut document, mapping);
    Ok((document.to_bytes()?, report))
}

fn replace_in_paragraph(paragraph: &mut XmlElement, old: &str, new: &str) -> Option<PathTaken> {
    let full = paragraph_text(paragraph);
    if !full.contains(old) {
        return None;
    }
    let expected = full.replace(old, new);
    let mut runs = runs_mut(paragraph);

    let mut touched = false;
    for run in runs.iter_mut() {
        let text = run_text(run);
        if text.contains(old) {
            set_run_text(run, &text.replace(old, new));
            touched = true;
        }
    }
    if touched {
        let actual: String = runs.iter().map(|run| run_text(run)).collect();
        if actual == expected {
            return Some(PathTaken::Fast);
        }
    }

    let mut runs = runs.into_iter();
    if let Some(first) = runs.next() {
        set_run_text(first, &expected);
    }
    for run in runs {
        if !run_text(run).is_empty() {
            set_run_text(run, "");
        }
    }
    Some(PathTaken::Slow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures::*;
    use crate::docx::{runs, Block};
    use crate::pipeline::extract::try_extract_docx;

    fn body_paragraphs(doc: &Document) -> Vec<&XmlElement> {
        doc.blocks()
            .into_iter()
            .filter_map(|b| match b {
                Block::Paragraph(p) => Some(p),
                Block::Table(_) => None,
            })
            .collect()
    }

    #[test]
    fn mapping_keeps_insertion_order_and_updates_in_place() {
        let mut mapping = ReplacementMapping::new();
        mapping.insert("b", "1");
        mapping.insert("a", "2");
        mapping.insert("b", "3");
        let pairs: Vec<_> = mapping.iter().collect();
        assert_eq!(pairs, vec![("b", "3"), ("a", "2")]);
    }

    #[test]
    fn mapping_json_round_trip_preserves_order() {
        let mapping: ReplacementMapping =
            serde_json::from_str(r#"{"z": "1", "a": "2"}"#).unwrap();
        assert_eq!(mapping.iter().map(|(k, _)| k).collect::<Vec<_>>(), ["z", "a"]);
        assert_eq!(serde_json::to_string(&mapping).unwrap(), r#"{"z":"1","a":"2"}"#);
        assert!(serde_json::from_str::<ReplacementMapping>(r#"{"a": 1}"#).is_err());
    }

    #[test]
    fn fast_path_keeps_sibling_formatting() {
        let body = para(None, &[run("Date: ", true), run("01.01.2024", false)]);
        let mut doc = Document::parse(&docx(&body, "", "")).unwrap();
        let mapping: ReplacementMapping = [("01.01.2024", "12.05.2025")].into_iter().collect();
        let report = apply_replacements(&mut doc, &mapping);

        assert_eq!(report.keys[0].fast_path, 1);
        assert_eq!(report.keys[0].slow_path, 0);
        let p = body_paragraphs(&doc)[0];
        let rs = runs(p);
        assert_eq!(run_text(rs[0]), "Date: ");
        assert!(rs[0].w_child("rPr").is_some());
        assert_eq!(run_text(rs[1]), "12.05.2025");
    }

    #[test]
    fn control_characters_in_values_keep_the_document_readable() {
        let body = para(None, &[run("Signed: ", true), run("Bob", false)]);
        let mapping: ReplacementMapping = [("Bob", "Al\u{7}ice")].into_iter().collect();
        assert_eq!(mapping.get("Bob"), Some("Alice"));

        let (bytes, report) = replace_in_docx(&docx(&body, "", ""), &mapping).unwrap();
        assert_eq!(report.keys[0].fast_path, 1);
        let doc = Document::parse(&bytes).unwrap();
        assert_eq!(try_extract_docx(&bytes).unwrap(), "Signed: Alice");
        assert_eq!(body_paragraphs(&doc).len(), 1);
    }

    #[test]
    fn key_spanning_runs_takes_slow_path() {
        let body = para(None, &[run("Hello Wo", true), run("rld and more", false)]);
        let mut doc = Document::parse(&docx(&body, "", "")).unwrap();
        let mapping: ReplacementMapping = [("World", "Earth")].into_iter().collect();
        let report = apply_replacements(&mut doc, &mapping);

        assert_eq!(report.keys[0].slow_path, 1);
        let p = body_paragraphs(&doc)[0];
        let rs = runs(p);
        assert_eq!(rs.len(), 2);
        assert_eq!(run_text(rs[0]), "Hello Earth and more");
        assert_eq!(run_text(rs[1]), "");
        assert!(rs[0].w_child("rPr").is_some());
        assert_eq!(paragraph_text(p), "Hello Earth and more");
    }

    #[test]
    fn partial_fast_path_falls_back_to_full_rewrite() {
        // One occurrence sits in a single run, the other straddles two.
        let body = para(None, &[run("ab ab a", false), run("b", false)]);
        let mut doc = Document::parse(&docx(&body, "", "")).unwrap();
        let mapping: ReplacementMapping = [("ab", "X")].into_iter().collect();
        apply_replacements(&mut doc, &mapping);
        let p = body_paragraphs(&doc)[0];
        assert_eq!(paragraph_text(p), "X X X");
    }

    #[test]
    fn replacements_reach_tables_headers_and_footers() {
        let body = format!(
            "{}{}",
            para(None, &[run("ACME in body", false)]),
            table(&[&["ACME in cell"]])
        );
        let header = para(None, &[run("ACME header", false)]);
        let footer = para(None, &[run("ACME footer", false)]);
        let bytes = docx(&body, &header, &footer);
        let mapping: ReplacementMapping = [("ACME", "Globex")].into_iter().collect();
        let (out, report) = replace_in_docx(&bytes, &mapping).unwrap();

        assert_eq!(report.keys[0].paragraphs(), 4);
        let doc = Document::parse(&out).unwrap();
        for section in doc.sections() {
            let xml = section.root.to_xml();
            assert!(xml.contains("Globex"), "{} not updated", section.path);
            assert!(!xml.contains("ACME"));
        }
        let text = try_extract_docx(&out).unwrap();
        assert_eq!(text, "Globex in body\nGlobex in cell");
    }

    #[test]
    fn nested_tables_are_visited() {
        let inner = table(&[&["deep ACME"]]);
        let body = format!("<w:tbl><w:tr><w:tc>{inner}<w:p/></w:tc></w:tr></w:tbl>");
        let mapping: ReplacementMapping = [("ACME", "Globex")].into_iter().collect();
        let (out, report) = replace_in_docx(&docx(&body, "", ""), &mapping).unwrap();
        assert_eq!(report.keys[0].paragraphs(), 1);
        let doc = Document::parse(&out).unwrap();
        let Block::Table(outer) = doc.blocks()[0] else {
            panic!("expected table");
        };
        assert!(outer.to_xml().contains("deep Globex"));
    }

    #[test]
    fn keys_compound_in_mapping_order() {
        let body = para(None, &[run("alpha", false)]);
        let mapping: ReplacementMapping =
            [("alpha", "beta"), ("beta", "gamma")].into_iter().collect();
        let (out, _) = replace_in_docx(&docx(&body, "", ""), &mapping).unwrap();
        assert_eq!(try_extract_docx(&out).unwrap(), "gamma");
    }

    #[test]
    fn unmatched_and_empty_keys_are_reported() {
        let body = para(None, &[run("text", false)]);
        let mapping: ReplacementMapping =
            [("", "x"), ("missing", "y"), ("text", "z")].into_iter().collect();
        let (_, report) = replace_in_docx(&docx(&body, "", ""), &mapping).unwrap();
        assert!(report.keys[0].skipped);
        assert_eq!(report.unmatched(), vec!["missing"]);
        assert_eq!(report.paragraphs_changed(), 1);
    }

    #[test]
    fn untouched_parts_are_byte_identical() {
        let bytes = docx(
            &para(None, &[run("change me", false)]),
            &para(None, &[run("header", false)]),
            "",
        );
        let mapping: ReplacementMapping = [("change", "changed")].into_iter().collect();
        let (out, _) = replace_in_docx(&bytes, &mapping).unwrap();
        let before = crate::docx::Package::read(&bytes).unwrap();
        let after = crate::docx::Package::read(&out).unwrap();
        for part in ["word/header1.xml", "word/footer1.xml", "word/styles.xml", "_rels/.rels"] {
            assert_eq!(before.part(part), after.part(part), "{part} changed");
        }
        assert_ne!(before.part("word/document.xml"), after.part("word/document.xml"));
    }

    #[test]
    fn corrupt_input_is_an_error() {
        let mapping: ReplacementMapping = [("a", "b")].into_iter().collect();
        assert!(replace_in_docx(b"PK\x03\x04 broken", &mapping).is_err());
    }

    #[test]
    fn cyrillic_company_name_in_paragraph_and_cell() {
        let body = format!(
            "{}{}{}",
            para(None, &[run("Company: ", false), run("ООО Ромашка", true)]),
            para(None, &[run("Unrelated line", false)]),
            table(&[&["ООО «Ромашка»", "Director"]])
        );
        let mapping: ReplacementMapping = [
            ("ООО Ромашка", "ООО Василёк"),
            ("ООО «Ромашка»", "ООО «Василёк»"),
        ]
        .into_iter()
        .collect();
        let (out, report) = replace_in_docx(&docx(&body, "", ""), &mapping).unwrap();
        assert!(report.unmatched().is_empty());
        assert_eq!(
            try_extract_docx(&out).unwrap(),
            "Company: ООО Василёк\nUnrelated line\nООО «Василёк» | Director"
        );
    }
}
