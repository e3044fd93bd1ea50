//! Intermediate document model between Markdown and DOCX.
//!
//! The converter produces a [`RenderedDocument`], the numbering pass assigns
//! list instances on it, and the writer serialises it. Keeping the model
//! plain data means every stage is testable without opening a zip.

use std::collections::HashMap;

use serde::Serialize;

/// Word supports nine list levels (`w:ilvl` 0..=8).
pub const MAX_LIST_LEVELS: usize = 9;

// ── Blocks ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderedDocument {
    pub blocks: Vec<Block>,
    /// Numbering instances minted by the restart pass, in `numId` order.
    pub numbering: Vec<NumberingInstance>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Paragraph(RenderedParagraph),
    Table(RenderedTable),
}

/// Paragraph styles the writer defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParagraphStyle {
    Normal,
    Heading(u8),
    CodeBlock,
    Quote,
    ListNumber,
    ListBullet,
    ListContinue,
    DefinitionTerm,
    Definition,
    FootnoteText,
    Notice,
}

impl ParagraphStyle {
    /// Style id written to `w:pStyle`; `None` for the document default.
    pub fn style_id(self) -> Option<&'static str> {
        Some(match self {
            Self::Normal => return None,
            Self::Heading(1) => "Heading1",
            Self::Heading(2) => "Heading2",
            Self::Heading(3) => "Heading3",
            Self::Heading(4) => "Heading4",
            Self::Heading(5) => "Heading5",
            Self::Heading(_) => "Heading6",
            Self::CodeBlock => "CodeBlock",
            Self::Quote => "Quote",
            Self::ListNumber => "ListNumber",
            Self::ListBullet => "ListBullet",
            Self::ListContinue => "ListContinue",
            Self::DefinitionTerm => "DefinitionTerm",
            Self::Definition => "Definition",
            Self::FootnoteText => "FootnoteText",
            Self::Notice => "Notice",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Ordered,
    Bullet,
    /// A later paragraph inside a list item; carries no number.
    Continuation,
}

/// Position of a paragraph inside a (possibly nested) list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListMarker {
    pub kind: ListKind,
    /// Nesting depth, 0 for a top-level item.
    pub level: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedParagraph {
    pub style: ParagraphStyle,
    pub inlines: Vec<Inline>,
    pub list: Option<ListMarker>,
    /// `numId` assigned by the numbering pass.
    pub num_id: Option<usize>,
    pub align: Option<Alignment>,
}

impl RenderedParagraph {
    pub fn new(style: ParagraphStyle, inlines: Vec<Inline>) -> Self {
        Self {
            style,
            inlines,
            list: None,
            num_id: None,
            align: None,
        }
    }

    pub fn text(&self) -> String {
        inline_text(&self.inlines)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedTable {
    /// One entry per column.
    pub alignments: Vec<Option<Alignment>>,
    pub rows: Vec<Vec<Vec<Inline>>>,
    /// Leading rows rendered as the header.
    pub header_rows: usize,
}

// ── Inlines ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunFormat {
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
    pub code: bool,
    pub footnote_ref: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRun {
    pub text: String,
    pub format: RunFormat,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: RunFormat::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inline {
    Text(TextRun),
    LineBreak,
    Link { url: String, runs: Vec<TextRun> },
}

pub fn inline_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(run) => out.push_str(&run.text),
            Inline::LineBreak => out.push('\n'),
            Inline::Link { runs, .. } => runs.iter().for_each(|r| out.push_str(&r.text)),
        }
    }
    out
}

// ── Numbering ───────────────────────────────────────────────────────────────

/// A `w:num` element: an abstract definition plus per-level start overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumberingInstance {
    pub num_id: usize,
    pub abstract_id: usize,
    /// Levels restarted at 1, ascending.
    pub start_overrides: Vec<usize>,
}

/// The number Word would display for one ordered-list paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayNumber {
    /// Index into [`RenderedDocument::blocks`].
    pub block: usize,
    pub num_id: usize,
    pub level: usize,
    pub value: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CounterOwner {
    Instance(usize),
    Abstract(usize),
}

impl RenderedDocument {
    pub fn paragraphs(&self) -> impl Iterator<Item = &RenderedParagraph> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            Block::Table(_) => None,
        })
    }

    /// Visible text, one line per paragraph and per table row.
    pub fn text(&self) -> String {
        let mut lines = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Paragraph(p) => lines.push(p.text()),
                Block::Table(t) => {
                    for row in &t.rows {
                        let cells: Vec<String> = row.iter().map(|c| inline_text(c)).collect();
                        lines.push(cells.join(" | "));
                    }
                }
            }
        }
        lines.join("\n")
    }

    pub fn instance(&self, num_id: usize) -> Option<&NumberingInstance> {
        self.numbering.iter().find(|n| n.num_id == num_id)
    }

    /// Evaluate ordered-list numbering the way Word does.
    ///
    /// A level counts in its instance when the instance overrides that
    /// level's start; otherwise it counts in the shared abstract definition,
    /// which is why unrelated lists without overrides keep counting. Using a
    /// level resets every deeper level of the same counter.
    pub fn display_numbers(&self) -> Vec<DisplayNumber> {
        let mut counters: HashMap<CounterOwner, [Option<usize>; MAX_LIST_LEVELS]> =
            HashMap::new();
        let mut out = Vec::new();

        for (index, block) in self.blocks.iter().enumerate() {
            let Block::Paragraph(p) = block else { continue };
            let (Some(marker), Some(num_id)) = (p.list, p.num_id) else {
                continue;
            };
            if marker.kind != ListKind::Ordered || marker.level >= MAX_LIST_LEVELS {
                continue;
            }

            let owner = match self.instance(num_id) {
                Some(inst) if inst.start_overrides.contains(&marker.level) => {
                    CounterOwner::Instance(num_id)
                }
                Some(inst) => CounterOwner::Abstract(inst.abstract_id),
                None => CounterOwner::Abstract(num_id),
            };
            let levels = counters.entry(owner).or_insert([None; MAX_LIST_LEVELS]);
            let value = levels[marker.level].map_or(1, |v| v + 1);
            levels[marker.level] = Some(value);
            for deeper in levels.iter_mut().skip(marker.level + 1) {
                *deeper = None;
            }

            out.push(DisplayNumber {
                block: index,
                num_id,
                level: marker.level,
                value,
            });
        }
        out
    }
}
