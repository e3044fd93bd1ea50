//! [`RenderedDocument`] → DOCX bytes via `docx-rs`.

use std::io::Cursor;

use docx_rs::*;

use super::model::{
    Alignment, Block, Inline, ListKind, RenderedDocument, RenderedParagraph,
    RenderedTable, RunFormat, TextRun, MAX_LIST_LEVELS,
};
use super::numbering::{
    NumberingSource, BULLET_ABSTRACT_ID, BULLET_NUM_ID, ORDERED_ABSTRACT_ID, ORDERED_NUM_ID,
};
use crate::error::RenderError;

const CODE_FONT: &str = "Courier New";

/// The styles this writer defines, and the numbering each list style uses.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleCatalog;

impl NumberingSource for StyleCatalog {
    fn abstract_numbering_for_style(&self, style_id: &str) -> Option<usize> {
        match style_id {
            "ListNumber" => Some(ORDERED_ABSTRACT_ID),
            "ListBullet" => Some(BULLET_ABSTRACT_ID),
            _ => None,
        }
    }
}

/// Serialise a document whose numbering has already been assigned.
pub fn write_docx(doc: &RenderedDocument) -> Result<Vec<u8>, RenderError> {
    let mut docx = add_numbering(add_styles(Docx::new()), doc);

    for block in &doc.blocks {
        docx = match block {
            Block::Paragraph(p) => docx.add_paragraph(build_paragraph(p)),
            Block::Table(t) => docx.add_table(build_table(t)),
        };
    }

    let mut buffer = Vec::new();
    docx.build()
        .pack(&mut Cursor::new(&mut buffer))
        .map_err(|e| RenderError::Package(e.to_string()))?;
    Ok(buffer)
}

// ── Styles ──────────────────────────────────────────────────────────────────

fn heading_style(level: u8, size: usize) -> Style {
    Style::new(format!("Heading{level}"), StyleType::Paragraph)
        .name(format!("Heading {level}"))
        .size(size)
        .bold()
}

fn code_fonts() -> RunFonts {
    RunFonts::new()
        .ascii(CODE_FONT)
        .hi_ansi(CODE_FONT)
        .east_asia(CODE_FONT)
        .cs(CODE_FONT)
}

fn add_styles(docx: Docx) -> Docx {
    let mut docx = docx;
    for (level, size) in [(1, 32), (2, 28), (3, 26), (4, 24), (5, 22), (6, 20)] {
        docx = docx.add_style(heading_style(level, size));
    }

    docx.add_style(
        Style::new("CodeBlock", StyleType::Paragraph)
            .name("Code Block")
            .fonts(code_fonts())
            .size(18),
    )
    .add_style(
        Style::new("CodeInline", StyleType::Character)
            .name("Code Inline")
            .fonts(code_fonts())
            .size(18),
    )
    .add_style(
        Style::new("Quote", StyleType::Paragraph)
            .name("Quote")
            .indent(Some(720), None, None, None)
            .italic(),
    )
    .add_style(Style::new("ListNumber", StyleType::Paragraph).name("List Number"))
    .add_style(Style::new("ListBullet", StyleType::Paragraph).name("List Bullet"))
    .add_style(Style::new("ListContinue", StyleType::Paragraph).name("List Continue"))
    .add_style(
        Style::new("DefinitionTerm", StyleType::Paragraph)
            .name("Definition Term")
            .bold(),
    )
    .add_style(
        Style::new("Definition", StyleType::Paragraph)
            .name("Definition")
            .indent(Some(720), None, None, None),
    )
    .add_style(
        Style::new("FootnoteText", StyleType::Paragraph)
            .name("Footnote Text")
            .size(18),
    )
    .add_style(
        Style::new("FootnoteReference", StyleType::Character)
            .name("Footnote Reference")
            .size(16),
    )
    .add_style(
        Style::new("Notice", StyleType::Paragraph)
            .name("Notice")
            .italic()
            .color("C00000"),
    )
    .add_style(
        Style::new("Hyperlink", StyleType::Character)
            .name("Hyperlink")
            .color("0000FF")
            .underline("single"),
    )
    .add_style(
        Style::new("Table", StyleType::Table)
            .name("Table")
            .table_align(TableAlignmentType::Center),
    )
}

// ── Numbering ───────────────────────────────────────────────────────────────

fn list_level(level: usize, format: &str, text: &str, hanging: i32) -> Level {
    Level::new(
        level,
        Start::new(1),
        NumberFormat::new(format),
        LevelText::new(text),
        LevelJc::new("left"),
    )
    .indent(
        Some(720 * (level as i32 + 1)),
        Some(SpecialIndentType::Hanging(hanging)),
        None,
        None,
    )
}

fn ordered_abstract() -> AbstractNumbering {
    (0..MAX_LIST_LEVELS).fold(AbstractNumbering::new(ORDERED_ABSTRACT_ID), |abs, level| {
        let format = match level % 3 {
            0 => "decimal",
            1 => "lowerLetter",
            _ => "lowerRoman",
        };
        abs.add_level(list_level(level, format, &format!("%{}.", level + 1), 420))
    })
}

fn bullet_abstract() -> AbstractNumbering {
    const BULLETS: [&str; 3] = ["•", "○", "▪"];
    (0..MAX_LIST_LEVELS).fold(AbstractNumbering::new(BULLET_ABSTRACT_ID), |abs, level| {
        abs.add_level(list_level(level, "bullet", BULLETS[level % BULLETS.len()], 360))
    })
}

fn add_numbering(docx: Docx, doc: &RenderedDocument) -> Docx {
    let mut docx = docx
        .add_abstract_numbering(ordered_abstract())
        .add_abstract_numbering(bullet_abstract())
        .add_numbering(Numbering::new(ORDERED_NUM_ID, ORDERED_ABSTRACT_ID))
        .add_numbering(Numbering::new(BULLET_NUM_ID, BULLET_ABSTRACT_ID));

    for instance in &doc.numbering {
        let numbering = instance.start_overrides.iter().fold(
            Numbering::new(instance.num_id, instance.abstract_id),
            |num, &level| num.add_override(LevelOverride::new(level).start(1)),
        );
        docx = docx.add_numbering(numbering);
    }
    docx
}

// ── Paragraphs ──────────────────────────────────────────────────────────────

fn map_alignment(alignment: Alignment) -> AlignmentType {
    match alignment {
        Alignment::Left => AlignmentType::Left,
        Alignment::Center => AlignmentType::Center,
        Alignment::Right => AlignmentType::Right,
    }
}

fn build_paragraph(p: &RenderedParagraph) -> Paragraph {
    let mut para = Paragraph::new();
    if let Some(style_id) = p.style.style_id() {
        para = para.style(style_id);
    }

    match (p.list, p.num_id) {
        (Some(marker), Some(num_id)) if marker.kind != ListKind::Continuation => {
            para = para.numbering(NumberingId::new(num_id), IndentLevel::new(marker.level));
        }
        (Some(marker), _) => {
            para = para.indent(Some(720 * (marker.level as i32 + 1)), None, None, None);
        }
        (None, _) => {}
    }

    if let Some(alignment) = p.align {
        para.property = para.property.clone().align(map_alignment(alignment));
    }

    add_inlines(para, &p.inlines, false)
}

fn add_inlines(mut para: Paragraph, inlines: &[Inline], bold: bool) -> Paragraph {
    for inline in inlines {
        para = match inline {
            Inline::Text(run) => para.add_run(build_run(run, bold)),
            Inline::LineBreak => para.add_run(Run::new().add_break(BreakType::TextWrapping)),
            Inline::Link { url, runs } => {
                let link = runs.iter().fold(
                    Hyperlink::new(url, HyperlinkType::External),
                    |link, run| link.add_run(build_run(run, bold).style("Hyperlink")),
                );
                para.add_hyperlink(link)
            }
        };
    }
    para
}

fn build_run(run: &TextRun, force_bold: bool) -> Run {
    let RunFormat {
        bold,
        italic,
        strike,
        code,
        footnote_ref,
    } = run.format;

    let mut r = Run::new().add_text(&run.text);
    if code {
        r = r.style("CodeInline");
    } else if footnote_ref {
        r = r.style("FootnoteReference");
    }
    if bold || force_bold {
        r = r.bold();
    }
    if italic {
        r = r.italic();
    }
    if strike {
        r = r.strike();
    }
    r
}

// ── Tables ──────────────────────────────────────────────────────────────────

fn build_table(t: &RenderedTable) -> Table {
    let columns = t.alignments.len().max(1);
    let mut table = Table::new(vec![]).style("Table");

    for (row_index, row) in t.rows.iter().enumerate() {
        let header = row_index < t.header_rows;
        let cells = (0..columns)
            .map(|col| {
                let mut para = Paragraph::new();
                if let Some(alignment) = t.alignments.get(col).copied().flatten() {
                    para.property = para.property.clone().align(map_alignment(alignment));
                }
                if let Some(inlines) = row.get(col) {
                    para = add_inlines(para, inlines, header);
                }
                TableCell::new().add_paragraph(para)
            })
            .collect();
        table = table.add_row(TableRow::new(cells));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::{Package, XmlElement};
    use std::collections::HashSet;

    use crate::pipeline::render::model::{ListMarker, NumberingInstance, ParagraphStyle};
    use crate::pipeline::render::numbering::FIRST_MINTED_NUM_ID;

    fn numbering_xml(bytes: &[u8]) -> XmlElement {
        let package = Package::read(bytes).unwrap();
        package.xml_part("word/numbering.xml").unwrap()
    }

    #[test]
    fn style_catalog_maps_list_styles() {
        assert_eq!(
            StyleCatalog.abstract_numbering_for_style("ListNumber"),
            Some(ORDERED_ABSTRACT_ID)
        );
        assert_eq!(
            StyleCatalog.abstract_numbering_for_style("ListBullet"),
            Some(BULLET_ABSTRACT_ID)
        );
        assert_eq!(StyleCatalog.abstract_numbering_for_style("Heading1"), None);
    }

    #[test]
    fn minted_instances_carry_start_overrides() {
        let mut p = RenderedParagraph::new(
            ParagraphStyle::ListNumber,
            vec![Inline::Text(TextRun::plain("item"))],
        );
        p.list = Some(ListMarker {
            kind: ListKind::Ordered,
            level: 0,
        });
        p.num_id = Some(FIRST_MINTED_NUM_ID);
        let doc = RenderedDocument {
            blocks: vec![Block::Paragraph(p)],
            numbering: vec![NumberingInstance {
                num_id: FIRST_MINTED_NUM_ID,
                abstract_id: ORDERED_ABSTRACT_ID,
                start_overrides: vec![0],
            }],
        };

        let bytes = write_docx(&doc).unwrap();
        let root = numbering_xml(&bytes);
        let nums: Vec<&XmlElement> = root.elements().filter(|e| e.is_w("num")).collect();
        // The docx-rs default instance plus ordered, bullet and the minted one.
        assert_eq!(nums.len(), 4);

        let minted_id = FIRST_MINTED_NUM_ID.to_string();
        let minted = nums
            .iter()
            .find(|n| n.attr("numId") == Some(minted_id.as_str()))
            .expect("minted instance");
        let override_ = minted.w_child("lvlOverride").expect("lvlOverride");
        assert_eq!(override_.attr("ilvl"), Some("0"));
        assert_eq!(
            override_.w_child("startOverride").and_then(|s| s.attr("val")),
            Some("1")
        );
    }

    fn ids<'a>(root: &'a XmlElement, element: &str, attr: &str) -> Vec<&'a str> {
        root.elements()
            .filter(|e| e.is_w(element))
            .filter_map(|e| e.attr(attr))
            .collect()
    }

    #[test]
    fn numbering_ids_are_unique() {
        let (doc, _) = crate::pipeline::render::build_document(
            "1. A\n2. B\n\ntext\n\n1. C\n2. D\n\n- x\n- y",
        );
        let root = numbering_xml(&write_docx(&doc).unwrap());

        for (element, attr) in [("abstractNum", "abstractNumId"), ("num", "numId")] {
            let all = ids(&root, element, attr);
            let unique: HashSet<&str> = all.iter().copied().collect();
            assert_eq!(unique.len(), all.len(), "duplicate {element} ids: {all:?}");
        }

        // Every minted instance points at the decimal definition.
        let ordered = ORDERED_ABSTRACT_ID.to_string();
        for instance in &doc.numbering {
            let id = instance.num_id.to_string();
            let num = root
                .elements()
                .find(|e| e.is_w("num") && e.attr("numId") == Some(id.as_str()))
                .expect("minted num");
            assert_eq!(
                num.w_child("abstractNumId").and_then(|a| a.attr("val")),
                Some(ordered.as_str())
            );
        }
        let decimal = root
            .elements()
            .find(|e| e.is_w("abstractNum") && e.attr("abstractNumId") == Some(ordered.as_str()))
            .expect("ordered definition");
        let level0 = decimal.elements().find(|l| l.is_w("lvl")).expect("level 0");
        assert_eq!(
            level0.w_child("numFmt").and_then(|f| f.attr("val")),
            Some("decimal")
        );
    }
}
