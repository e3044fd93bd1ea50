//! Paragraph and run helpers over the owned XML tree.
//!
//! A paragraph (`w:p`) holds runs (`w:r`) either directly or wrapped in
//! hyperlinks, tracked insertions and smart tags. A run's visible text is
//! the concatenation of its `w:t` text, `\t` for every `w:tab`, and `\n`
//! for every `w:br`/`w:cr`. Run properties (`w:rPr`) are never touched
//! when text is rewritten.

use crate::docx::xml::{is_xml_char, XmlElement, XmlNode, W_NS};

/// Inline wrappers whose runs count as part of the paragraph text.
const RUN_CONTAINERS: &[&str] = &["hyperlink", "ins", "smartTag", "fldSimple", "customXml"];

/// Elements rebuilt by [`set_run_text`].
const TEXT_CONTENT: &[&str] = &["t", "tab", "br", "cr"];

/// Visible text of one run.
pub fn run_text(run: &XmlElement) -> String {
    let mut out = String::new();
    for child in run.elements() {
        if child.is_w("t") {
            out.push_str(&child.text());
        } else if child.is_w("tab") {
            out.push('\t');
        } else if child.is_w("br") || child.is_w("cr") {
            out.push('\n');
        }
    }
    out
}

/// Replace a run's text content, keeping `w:rPr` and any non-text children.
///
/// The new content is inserted where the first old text element stood, or
/// appended when the run had none.
pub fn set_run_text(run: &mut XmlElement, text: &str) {
    let insert_at = run
        .children
        .iter()
        .position(|child| is_text_content(child))
        .unwrap_or(run.children.len());
    let kept_before = run.children[..insert_at]
        .iter()
        .filter(|child| !is_text_content(child))
        .count();
    run.children.retain(|child| !is_text_content(child));

    let content = build_text_content(run, text);
    let at = kept_before.min(run.children.len());
    run.children.splice(at..at, content);
}

/// All runs of a paragraph in document order.
pub fn runs(paragraph: &XmlElement) -> Vec<&XmlElement> {
    let mut out = Vec::new();
    collect_runs(paragraph, &mut out);
    out
}

/// Mutable variant of [`runs`].
pub fn runs_mut(paragraph: &mut XmlElement) -> Vec<&mut XmlElement> {
    let mut out = Vec::new();
    collect_runs_mut(paragraph, &mut out);
    out
}

/// Concatenated text of all runs.
pub fn paragraph_text(paragraph: &XmlElement) -> String {
    runs(paragraph).into_iter().map(run_text).collect()
}

/// The `w:pStyle` value of a paragraph, if set.
pub fn paragraph_style_id(paragraph: &XmlElement) -> Option<&str> {
    paragraph
        .w_child("pPr")?
        .w_child("pStyle")?
        .attr("val")
}

fn collect_runs<'a>(el: &'a XmlElement, out: &mut Vec<&'a XmlElement>) {
    for child in el.elements() {
        if child.is_w("r") {
            out.push(child);
        } else if RUN_CONTAINERS.iter().any(|c| child.is_w(c)) {
            collect_runs(child, out);
        }
    }
}

fn collect_runs_mut<'a>(el: &'a mut XmlElement, out: &mut Vec<&'a mut XmlElement>) {
    for child in el.elements_mut() {
        if child.is_w("r") {
            out.push(child);
        } else if RUN_CONTAINERS.iter().any(|c| child.is_w(c)) {
            collect_runs_mut(child, out);
        }
    }
}

fn is_text_content(node: &XmlNode) -> bool {
    matches!(node, XmlNode::Element(el) if TEXT_CONTENT.iter().any(|local| el.is_w(local)))
}

fn build_text_content(run: &XmlElement, text: &str) -> Vec<XmlNode> {
    let mut nodes = Vec::new();
    let mut pending = String::new();

    let flush = |pending: &mut String, nodes: &mut Vec<XmlNode>| {
        if pending.is_empty() {
            return;
        }
        nodes.push(XmlNode::Element(text_element(run, std::mem::take(pending))));
    };

    for ch in text.chars() {
        match ch {
            '\t' => {
                flush(&mut pending, &mut nodes);
                nodes.push(XmlNode::Element(XmlElement::new(run.qualified("tab"), Some(W_NS))));
            }
            '\n' => {
                flush(&mut pending, &mut nodes);
                nodes.push(XmlNode::Element(XmlElement::new(run.qualified("br"), Some(W_NS))));
            }
            '\r' => {}
            other if !is_xml_char(other) => {}
            other => pending.push(other),
        }
    }
    flush(&mut pending, &mut nodes);

    if nodes.is_empty() {
        nodes.push(XmlNode::Element(text_element(run, String::new())));
    }
    nodes
}

fn text_element(run: &XmlElement, text: String) -> XmlElement {
    let mut t = XmlElement::new(run.qualified("t"), Some(W_NS));
    t.attrs.push(("xml:space".to_string(), "preserve".to_string()));
    if !text.is_empty() {
        t.children.push(XmlNode::Text(text));
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(xml_body: &str) -> XmlElement {
        let xml = format!(r#"<w:p xmlns:w="{W_NS}">{xml_body}</w:p>"#);
        XmlElement::parse(&xml).unwrap()
    }

    #[test]
    fn run_text_covers_tabs_and_breaks() {
        let p = paragraph("<w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r>");
        assert_eq!(paragraph_text(&p), "a\tb\nc");
    }

    #[test]
    fn hyperlink_runs_are_included_in_order() {
        let p = paragraph(
            r#"<w:r><w:t>see </w:t></w:r><w:hyperlink><w:r><w:t>here</w:t></w:r></w:hyperlink><w:r><w:t>.</w:t></w:r>"#,
        );
        assert_eq!(runs(&p).len(), 3);
        assert_eq!(paragraph_text(&p), "see here.");
    }

    #[test]
    fn set_run_text_keeps_run_properties_first() {
        let mut p = paragraph("<w:r><w:rPr><w:b/></w:rPr><w:t>old</w:t></w:r>");
        if let Some(run) = runs_mut(&mut p).into_iter().next() {
            set_run_text(run, "new\tvalue");
        }
        let run = runs(&p)[0];
        assert!(run.elements().next().unwrap().is_w("rPr"));
        assert_eq!(run_text(run), "new\tvalue");
        let t = run.w_child("t").unwrap();
        assert_eq!(t.attr("space"), Some("preserve"));
    }

    #[test]
    fn set_run_text_drops_characters_xml_cannot_hold() {
        let mut p = paragraph("<w:r><w:t>Bob</w:t></w:r>");
        if let Some(run) = runs_mut(&mut p).into_iter().next() {
            set_run_text(run, "Al\u{7}ice\u{FFFF}");
        }
        assert_eq!(paragraph_text(&p), "Alice");
        assert!(XmlElement::parse(&p.to_xml()).is_ok());
    }

    #[test]
    fn set_run_text_to_empty_leaves_empty_text_element() {
        let mut p = paragraph("<w:r><w:t>gone</w:t></w:r>");
        if let Some(run) = runs_mut(&mut p).into_iter().next() {
            set_run_text(run, "");
        }
        assert_eq!(paragraph_text(&p), "");
        assert!(runs(&p)[0].w_child("t").is_some());
    }

    #[test]
    fn style_id_is_read_from_paragraph_properties() {
        let p = paragraph(r#"<w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>x</w:t></w:r>"#);
        assert_eq!(paragraph_style_id(&p), Some("Heading1"));
        assert_eq!(paragraph_style_id(&paragraph("")), None);
    }
}
