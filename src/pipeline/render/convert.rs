//! Markdown AST → [`RenderedDocument`].
//!
//! Parsing never fails; the conversion walk can. Markup that the DOCX model
//! cannot express (lists nested deeper than Word's nine levels, block nesting
//! past [`MAX_BLOCK_DEPTH`], a table row wider than its header) aborts the
//! walk with a [`ConversionError`], and the caller falls back to
//! [`plain_text_document`].

use comrak::nodes::{AstNode, ListType, NodeValue, TableAlignment};
use comrak::{parse_document, Arena, Options};
use thiserror::Error;

use super::model::{
    inline_text, Alignment, Block, Inline, ListKind, ListMarker, ParagraphStyle, RenderedDocument,
    RenderedParagraph, RenderedTable, RunFormat, TextRun, MAX_LIST_LEVELS,
};

/// Deepest block nesting (quotes, lists, footnotes) the walk accepts.
pub const MAX_BLOCK_DEPTH: usize = 32;

/// Notice placed above the plain-text fallback.
pub const FALLBACK_NOTICE: &str = "The formatting could not be converted. Source text:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("nesting depth {depth} exceeds the supported {limit}")]
    NestingTooDeep { depth: usize, limit: usize },

    #[error("malformed table: {detail}")]
    MalformedTable { detail: String },
}

/// Extensions matching what chat models emit: GFM tables, footnotes,
/// definition lists and strikethrough. Fenced code is core CommonMark.
pub fn markdown_options() -> Options<'static> {
    let mut options = Options::default();
    let ext = &mut options.extension;
    ext.table = true;
    ext.footnotes = true;
    ext.description_lists = true;
    ext.strikethrough = true;
    options.render.hardbreaks = true;
    options
}

/// Parse and convert. The input is expected to be preprocessed already.
pub fn convert_markdown(markdown: &str) -> Result<RenderedDocument, ConversionError> {
    let arena = Arena::new();
    let root = parse_document(&arena, markdown, &markdown_options());
    let mut converter = Converter::default();
    converter.children(root, 0)?;
    converter.flush_marker();
    Ok(RenderedDocument {
        blocks: converter.blocks,
        numbering: Vec::new(),
    })
}

/// Notice paragraph followed by `text` verbatim, one break per line.
pub fn plain_text_document(text: &str) -> RenderedDocument {
    let mut inlines = Vec::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            inlines.push(Inline::LineBreak);
        }
        if !line.is_empty() {
            inlines.push(Inline::Text(TextRun::plain(line)));
        }
    }
    RenderedDocument {
        blocks: vec![
            Block::Paragraph(RenderedParagraph::new(
                ParagraphStyle::Notice,
                vec![Inline::Text(TextRun::plain(FALLBACK_NOTICE))],
            )),
            Block::Paragraph(RenderedParagraph::new(ParagraphStyle::Normal, inlines)),
        ],
        numbering: Vec::new(),
    }
}

// ── Block walk ──────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq)]
enum Container {
    Quote,
    Term,
    Details,
}

#[derive(Default)]
struct Converter {
    blocks: Vec<Block>,
    /// Kinds of the enclosing lists, outermost first.
    lists: Vec<ListKind>,
    /// Marker waiting for the first paragraph of the current item.
    pending_marker: Option<ListMarker>,
    /// Footnote number waiting for the first paragraph of its definition.
    pending_footnote: Option<usize>,
    footnotes: usize,
    containers: Vec<Container>,
}

impl Converter {
    fn children<'a>(&mut self, node: &'a AstNode<'a>, depth: usize) -> Result<(), ConversionError> {
        for child in node.children() {
            self.block(child, depth + 1)?;
        }
        Ok(())
    }

    fn block<'a>(&mut self, node: &'a AstNode<'a>, depth: usize) -> Result<(), ConversionError> {
        if depth > MAX_BLOCK_DEPTH {
            return Err(ConversionError::NestingTooDeep {
                depth,
                limit: MAX_BLOCK_DEPTH,
            });
        }

        // Clone the payload out so no borrow of the node outlives this match.
        let value = node.data.borrow().value.clone();
        match value {
            NodeValue::Paragraph => {
                let inlines = collect_inlines(node);
                self.push_paragraph(self.context_style(), inlines);
            }
            NodeValue::Heading(heading) => {
                self.flush_marker();
                let inlines = collect_inlines(node);
                self.push_paragraph(ParagraphStyle::Heading(heading.level), inlines);
            }
            NodeValue::CodeBlock(code) => {
                self.flush_marker();
                let literal = code.literal.strip_suffix('\n').unwrap_or(&code.literal);
                self.push_paragraph(ParagraphStyle::CodeBlock, lines_with_breaks(literal));
            }
            NodeValue::HtmlBlock(html) => {
                let literal = html.literal.trim_end_matches('\n');
                self.push_paragraph(self.context_style(), lines_with_breaks(literal));
            }
            NodeValue::ThematicBreak => {
                self.flush_marker();
                let mut p = RenderedParagraph::new(
                    ParagraphStyle::Normal,
                    vec![Inline::Text(TextRun::plain("* * *"))],
                );
                p.align = Some(Alignment::Center);
                self.blocks.push(Block::Paragraph(p));
            }
            NodeValue::BlockQuote | NodeValue::MultilineBlockQuote(_) => {
                self.flush_marker();
                self.within(Container::Quote, node, depth)?;
            }
            NodeValue::List(list) => {
                self.flush_marker();
                if self.lists.len() >= MAX_LIST_LEVELS {
                    return Err(ConversionError::NestingTooDeep {
                        depth: self.lists.len() + 1,
                        limit: MAX_LIST_LEVELS,
                    });
                }
                self.lists.push(match list.list_type {
                    ListType::Ordered => ListKind::Ordered,
                    ListType::Bullet => ListKind::Bullet,
                });
                let result = self.children(node, depth);
                self.lists.pop();
                result?;
            }
            NodeValue::Item(_) => {
                let kind = self.lists.last().copied().unwrap_or(ListKind::Bullet);
                self.pending_marker = Some(ListMarker {
                    kind,
                    level: self.lists.len().saturating_sub(1),
                });
                self.children(node, depth)?;
                self.flush_marker();
            }
            NodeValue::Table(table) => {
                self.flush_marker();
                let alignments = table.alignments.iter().map(|a| map_alignment(*a)).collect();
                let rendered = convert_table(node, alignments)?;
                self.blocks.push(Block::Table(rendered));
            }
            NodeValue::FootnoteDefinition(_) => {
                self.flush_marker();
                self.footnotes += 1;
                self.pending_footnote = Some(self.footnotes);
                self.children(node, depth)?;
                if let Some(n) = self.pending_footnote.take() {
                    self.push_paragraph(ParagraphStyle::FootnoteText, vec![footnote_label(n)]);
                }
            }
            NodeValue::DescriptionTerm => self.within(Container::Term, node, depth)?,
            NodeValue::DescriptionDetails => self.within(Container::Details, node, depth)?,
            NodeValue::FrontMatter(_) => {}
            _ => self.children(node, depth)?,
        }
        Ok(())
    }

    fn within<'a>(
        &mut self,
        container: Container,
        node: &'a AstNode<'a>,
        depth: usize,
    ) -> Result<(), ConversionError> {
        self.containers.push(container);
        let result = self.children(node, depth);
        self.containers.pop();
        result
    }

    /// Style for an ordinary paragraph in the current context.
    fn context_style(&self) -> ParagraphStyle {
        match self.containers.last() {
            Some(Container::Quote) => ParagraphStyle::Quote,
            Some(Container::Term) => ParagraphStyle::DefinitionTerm,
            Some(Container::Details) => ParagraphStyle::Definition,
            None => ParagraphStyle::Normal,
        }
    }

    fn push_paragraph(&mut self, style: ParagraphStyle, mut inlines: Vec<Inline>) {
        if let Some(n) = self.pending_footnote.take() {
            inlines.insert(0, footnote_label(n));
            let p = RenderedParagraph::new(ParagraphStyle::FootnoteText, inlines);
            self.blocks.push(Block::Paragraph(p));
            return;
        }

        let mut p = RenderedParagraph::new(style, inlines);
        if let Some(marker) = self.pending_marker.take() {
            p.style = list_style(marker.kind);
            p.list = Some(marker);
        } else if !self.lists.is_empty() {
            if style == ParagraphStyle::Normal {
                p.style = ParagraphStyle::ListContinue;
            }
            p.list = Some(ListMarker {
                kind: ListKind::Continuation,
                level: self.lists.len() - 1,
            });
        }
        self.blocks.push(Block::Paragraph(p));
    }

    /// An item whose first block is not a paragraph still shows its marker.
    fn flush_marker(&mut self) {
        if let Some(marker) = self.pending_marker.take() {
            let mut p = RenderedParagraph::new(list_style(marker.kind), Vec::new());
            p.list = Some(marker);
            self.blocks.push(Block::Paragraph(p));
        }
    }
}

fn list_style(kind: ListKind) -> ParagraphStyle {
    match kind {
        ListKind::Ordered => ParagraphStyle::ListNumber,
        ListKind::Bullet => ParagraphStyle::ListBullet,
        ListKind::Continuation => ParagraphStyle::ListContinue,
    }
}

fn footnote_label(n: usize) -> Inline {
    Inline::Text(TextRun {
        text: format!("[{n}] "),
        format: RunFormat {
            footnote_ref: true,
            ..RunFormat::default()
        },
    })
}

fn lines_with_breaks(text: &str) -> Vec<Inline> {
    let mut inlines = Vec::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            inlines.push(Inline::LineBreak);
        }
        if !line.is_empty() {
            inlines.push(Inline::Text(TextRun::plain(line)));
        }
    }
    inlines
}

fn map_alignment(alignment: TableAlignment) -> Option<Alignment> {
    match alignment {
        TableAlignment::Left => Some(Alignment::Left),
        TableAlignment::Center => Some(Alignment::Center),
        TableAlignment::Right => Some(Alignment::Right),
        TableAlignment::None => None,
    }
}

// ── Tables ──────────────────────────────────────────────────────────────────

fn convert_table<'a>(
    node: &'a AstNode<'a>,
    alignments: Vec<Option<Alignment>>,
) -> Result<RenderedTable, ConversionError> {
    let columns = alignments.len();
    let mut rows = Vec::new();
    let mut header_rows = 0;

    for row in node.children() {
        let header = match &row.data.borrow().value {
            NodeValue::TableRow(header) => *header,
            other => {
                return Err(ConversionError::MalformedTable {
                    detail: format!("unexpected {} inside a table", node_name(other)),
                })
            }
        };
        let cells: Vec<Vec<Inline>> = row.children().map(collect_inlines).collect();
        if cells.len() > columns {
            return Err(ConversionError::MalformedTable {
                detail: format!("row {} has {} cells for {} columns", rows.len() + 1, cells.len(), columns),
            });
        }
        if header && header_rows == rows.len() {
            header_rows += 1;
        }
        rows.push(cells);
    }

    if rows.is_empty() {
        return Err(ConversionError::MalformedTable {
            detail: "table has no rows".into(),
        });
    }

    Ok(RenderedTable {
        alignments,
        rows,
        header_rows,
    })
}

fn node_name(value: &NodeValue) -> &'static str {
    match value {
        NodeValue::Paragraph => "paragraph",
        NodeValue::Table(_) => "table",
        NodeValue::TableCell => "cell",
        _ => "node",
    }
}

// ── Inlines ─────────────────────────────────────────────────────────────────

fn collect_inlines<'a>(node: &'a AstNode<'a>) -> Vec<Inline> {
    let mut out = Vec::new();
    for child in node.children() {
        inline(child, RunFormat::default(), &mut out);
    }
    out
}

fn inline<'a>(node: &'a AstNode<'a>, format: RunFormat, out: &mut Vec<Inline>) {
    let value = node.data.borrow().value.clone();
    match value {
        NodeValue::Text(text) => push_text(out, &text, format),
        // Newlines inside a paragraph are kept as line breaks.
        NodeValue::SoftBreak | NodeValue::LineBreak => out.push(Inline::LineBreak),
        NodeValue::Code(code) => push_text(
            out,
            &code.literal,
            RunFormat {
                code: true,
                ..format
            },
        ),
        NodeValue::HtmlInline(html) => push_text(out, &html, format),
        NodeValue::Emph => inline_children(node, RunFormat { italic: true, ..format }, out),
        NodeValue::Strong => inline_children(node, RunFormat { bold: true, ..format }, out),
        NodeValue::Strikethrough => {
            inline_children(node, RunFormat { strike: true, ..format }, out)
        }
        NodeValue::Link(link) => {
            let mut inner = Vec::new();
            inline_children(node, format, &mut inner);
            let runs = inner
                .into_iter()
                .flat_map(|i| match i {
                    Inline::Text(run) => vec![run],
                    Inline::LineBreak => vec![TextRun { text: " ".into(), format }],
                    Inline::Link { runs, .. } => runs,
                })
                .collect::<Vec<_>>();
            let runs = if runs.is_empty() {
                vec![TextRun { text: link.url.to_string(), format }]
            } else {
                runs
            };
            out.push(Inline::Link {
                url: link.url.to_string(),
                runs,
            });
        }
        NodeValue::Image(link) => {
            let mut inner = Vec::new();
            inline_children(node, format, &mut inner);
            let alt = inline_text(&inner);
            let label = if alt.trim().is_empty() {
                link.url.to_string()
            } else {
                alt
            };
            push_text(
                out,
                &format!("[image: {label}]"),
                RunFormat { italic: true, ..format },
            );
        }
        NodeValue::FootnoteReference(reference) => push_text(
            out,
            &format!("[{}]", reference.ix),
            RunFormat {
                footnote_ref: true,
                ..format
            },
        ),
        _ => inline_children(node, format, out),
    }
}

fn inline_children<'a>(node: &'a AstNode<'a>, format: RunFormat, out: &mut Vec<Inline>) {
    for child in node.children() {
        inline(child, format, out);
    }
}

/// Merge adjacent text with the same formatting into one run.
fn push_text(out: &mut Vec<Inline>, text: &str, format: RunFormat) {
    if text.is_empty() {
        return;
    }
    if let Some(Inline::Text(last)) = out.last_mut() {
        if last.format == format {
            last.text.push_str(text);
            return;
        }
    }
    out.push(Inline::Text(TextRun {
        text: text.to_string(),
        format,
    }));
}
