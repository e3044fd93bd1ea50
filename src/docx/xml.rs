//! Owned, mutable XML tree for OOXML parts.
//!
//! `roxmltree` gives a fast read-only view; the replacement engine needs to
//! rewrite run text in place and write the part back. Parsing therefore
//! copies the read-only tree into [`XmlElement`] values that remember the
//! qualified name as written (`w:p`), the resolved namespace URI, and the
//! namespace declarations introduced at each element. Serialising the tree
//! reproduces an equivalent document: every element, attribute, text node
//! and comment survives, only insignificant formatting inside tags changes.

use std::fmt::Write as _;

/// WordprocessingML main namespace.
pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Package relationships namespace (`_rels/*.rels`).
pub const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// The implicit `xml:` namespace; never declared explicitly.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// A child node of an [`XmlElement`].
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    Comment(String),
}

/// An element with its qualified name, namespace, attributes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    /// Qualified name as written in the source, e.g. `w:t`.
    pub name: String,
    /// Resolved namespace URI, if the element is namespaced.
    pub namespace: Option<String>,
    /// Attributes in source order, including `xmlns` declarations.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an empty element in the given namespace.
    pub fn new(name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.map(str::to_string),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Parse a complete XML document and return its root element.
    pub fn parse(xml: &str) -> Result<Self, roxmltree::Error> {
        let doc = roxmltree::Document::parse(xml)?;
        Ok(from_node(doc.root_element(), &[]))
    }

    /// Serialise the element as a standalone XML document.
    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(4096);
        out.push_str(XML_DECLARATION);
        out.push('\n');
        self.write_into(&mut out);
        out
    }

    /// Local part of the qualified name (`p` for `w:p`).
    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    /// True when the element is `{namespace}local`.
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.local_name() == local
    }

    /// True when the element is a WordprocessingML element with this local name.
    pub fn is_w(&self, local: &str) -> bool {
        self.is(W_NS, local)
    }

    /// Build the qualified name for a sibling element in the same namespace,
    /// reusing this element's prefix.
    pub fn qualified(&self, local: &str) -> String {
        match self.name.split_once(':') {
            Some((prefix, _)) => format!("{prefix}:{local}"),
            None => local.to_string(),
        }
    }

    /// Attribute lookup by local name, ignoring the prefix.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attrs.iter().find_map(|(key, value)| {
            let key_local = key.split_once(':').map_or(key.as_str(), |(prefix, rest)| {
                if prefix == "xmlns" { "" } else { rest }
            });
            (key != "xmlns" && key_local == local).then_some(value.as_str())
        })
    }

    /// Set (or replace) an attribute by its qualified name.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    /// Child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    /// Mutable child elements, skipping text and comments.
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|child| match child {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    /// First WordprocessingML child with the given local name.
    pub fn w_child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.is_w(local))
    }

    /// Mutable variant of [`XmlElement::w_child`].
    pub fn w_child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|el| el.is_w(local))
    }

    /// Concatenated direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlNode::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            let _ = write!(out, " {}=\"{}\"", key, escape_attr(value));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Element(el) => el.write_into(out),
                XmlNode::Text(text) => out.push_str(&escape_text(text)),
                XmlNode::Comment(comment) => {
                    let _ = write!(out, "<!--{comment}-->");
                }
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// Copy a `roxmltree` element into an owned tree.
///
/// `parent_ns` is the list of in-scope namespace bindings of the parent;
/// only bindings that are new at this element become `xmlns` attributes.
fn from_node(node: roxmltree::Node<'_, '_>, parent_ns: &[(Option<String>, String)]) -> XmlElement {
    let in_scope: Vec<(Option<String>, String)> = node
        .namespaces()
        .filter(|ns| ns.uri() != XML_NS)
        .map(|ns| (ns.name().map(str::to_string), ns.uri().to_string()))
        .collect();

    let tag = node.tag_name();
    let name = qualify(node, tag.namespace(), tag.name());
    let mut attrs = Vec::new();

    if in_scope.as_slice() != parent_ns {
        for (prefix, uri) in &in_scope {
            if parent_ns.iter().any(|(p, u)| p == prefix && u == uri) {
                continue;
            }
            let key = match prefix {
                Some(prefix) => format!("xmlns:{prefix}"),
                None => "xmlns".to_string(),
            };
            attrs.push((key, uri.clone()));
        }
    }

    for attr in node.attributes() {
        let key = match attr.namespace() {
            Some(XML_NS) => format!("xml:{}", attr.name()),
            Some(ns) => match node.lookup_prefix(ns) {
                Some(prefix) => format!("{prefix}:{}", attr.name()),
                None => attr.name().to_string(),
            },
            None => attr.name().to_string(),
        };
        attrs.push((key, attr.value().to_string()));
    }

    let mut children = Vec::new();
    for child in node.children() {
        if child.is_element() {
            children.push(XmlNode::Element(from_node(child, &in_scope)));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                children.push(XmlNode::Text(text.to_string()));
            }
        } else if child.is_comment() {
            if let Some(text) = child.text() {
                children.push(XmlNode::Comment(text.to_string()));
            }
        }
    }

    XmlElement {
        name,
        namespace: tag.namespace().map(str::to_string),
        attrs,
        children,
    }
}

fn qualify(node: roxmltree::Node<'_, '_>, namespace: Option<&str>, local: &str) -> String {
    match namespace.and_then(|ns| node.lookup_prefix(ns)) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local}"),
        _ => local.to_string(),
    }
}

/// Whether `ch` may appear in XML 1.0 character data.
pub fn is_xml_char(ch: char) -> bool {
    matches!(
        ch,
        '\t' | '\n'
            | '\r'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="urn:rels"><w:body><w:p><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve"> A &amp; B </w:t></w:r></w:p></w:body></w:document>"#;

    #[test]
    fn parse_keeps_prefixes_and_namespaces() {
        let root = XmlElement::parse(SAMPLE).unwrap();
        assert_eq!(root.name, "w:document");
        assert!(root.is_w("document"));
        assert!(root
            .attrs
            .iter()
            .any(|(k, v)| k == "xmlns:w" && v == W_NS));
        let body = root.w_child("body").unwrap();
        let p = body.w_child("p").unwrap();
        let r = p.w_child("r").unwrap();
        let t = r.w_child("t").unwrap();
        assert_eq!(t.text(), " A & B ");
        assert_eq!(t.attr("space"), Some("preserve"));
    }

    #[test]
    fn child_elements_do_not_redeclare_inherited_namespaces() {
        let root = XmlElement::parse(SAMPLE).unwrap();
        let body = root.w_child("body").unwrap();
        assert!(body.attrs.is_empty());
    }

    #[test]
    fn serialise_round_trips_structure() {
        let root = XmlElement::parse(SAMPLE).unwrap();
        let xml = root.to_xml();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(r#"<w:t xml:space="preserve"> A &amp; B </w:t>"#));
        assert!(xml.contains("<w:b/>"));
        let reparsed = XmlElement::parse(&xml).unwrap();
        assert_eq!(reparsed, root);
    }

    #[test]
    fn qualified_reuses_prefix() {
        let el = XmlElement::new("w:r", Some(W_NS));
        assert_eq!(el.qualified("t"), "w:t");
        let bare = XmlElement::new("r", Some(W_NS));
        assert_eq!(bare.qualified("t"), "t");
    }

    #[test]
    fn attribute_values_are_escaped() {
        let mut el = XmlElement::new("w:t", Some(W_NS));
        el.set_attr("w:val", "a\"b<c");
        el.children.push(XmlNode::Text("x<y".into()));
        let xml = el.to_xml();
        assert!(xml.contains(r#"w:val="a&quot;b&lt;c""#));
        assert!(xml.contains("x&lt;y"));
    }

    #[test]
    fn control_characters_are_not_xml_chars() {
        assert!(is_xml_char('\t'));
        assert!(is_xml_char('Ж'));
        assert!(is_xml_char('\u{1F600}'));
        assert!(!is_xml_char('\u{7}'));
        assert!(!is_xml_char('\u{0}'));
        assert!(!is_xml_char('\u{FFFE}'));
    }
}
