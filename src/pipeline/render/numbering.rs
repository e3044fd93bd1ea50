//! Numbering-restart pass for ordered lists.
//!
//! Word keeps counting across every paragraph that shares an abstract
//! numbering definition, so two separate Markdown lists would render as
//! 1, 2 … 3, 4. This pass splits ordered-list paragraphs into runs and gives
//! each run its own `w:num` instance with `startOverride = 1`.
//!
//! ## Run boundaries
//!
//! | Element | Effect on the current run |
//! |---------|---------------------------|
//! | ordered item (any level) | joins, or starts a new run |
//! | continuation paragraph | none |
//! | bullet item, level ≥ 1 | none |
//! | bullet item, level 0 | ends it |
//! | other paragraph, table | ends it |

use tracing::debug;

use super::model::{Block, ListKind, NumberingInstance, ParagraphStyle, RenderedDocument};

/// `abstractNum 1` and `num 1` come with every `docx_rs::Docx`; ids here
/// start above them.
const RESERVED_NUMBERING_ID: usize = 1;

/// Abstract definition for decimal lists.
pub const ORDERED_ABSTRACT_ID: usize = RESERVED_NUMBERING_ID + 1;
/// Abstract definition for bullet lists.
pub const BULLET_ABSTRACT_ID: usize = RESERVED_NUMBERING_ID + 2;
/// Base instance of [`ORDERED_ABSTRACT_ID`].
pub const ORDERED_NUM_ID: usize = RESERVED_NUMBERING_ID + 1;
/// Base instance of [`BULLET_ABSTRACT_ID`], shared by every bullet item.
pub const BULLET_NUM_ID: usize = RESERVED_NUMBERING_ID + 2;
/// First id handed out to a restarted run.
pub const FIRST_MINTED_NUM_ID: usize = RESERVED_NUMBERING_ID + 3;

/// Abstract definition used when the style lookup finds nothing.
pub const FALLBACK_ABSTRACT_NUMBERING_ID: usize = ORDERED_ABSTRACT_ID;

/// Where list styles find their abstract numbering definition.
pub trait NumberingSource {
    fn abstract_numbering_for_style(&self, style_id: &str) -> Option<usize>;
}

/// Assign `num_id` to every list paragraph and mint one instance per
/// ordered run. Replaces any previous assignment.
pub fn restart_ordered_lists(doc: &mut RenderedDocument, source: &dyn NumberingSource) {
    doc.numbering.clear();
    let mut next_num_id = FIRST_MINTED_NUM_ID;
    // Index into doc.numbering of the run in progress.
    let mut current: Option<usize> = None;

    for block in &mut doc.blocks {
        let p = match block {
            Block::Table(_) => {
                current = None;
                continue;
            }
            Block::Paragraph(p) => p,
        };
        p.num_id = None;

        let Some(marker) = p.list else {
            current = None;
            continue;
        };

        match marker.kind {
            ListKind::Continuation => {}
            ListKind::Bullet => {
                if marker.level == 0 {
                    current = None;
                }
                p.num_id = Some(BULLET_NUM_ID);
            }
            ListKind::Ordered => {
                let index = match current {
                    Some(index) => index,
                    None => {
                        let style_id = p
                            .style
                            .style_id()
                            .or(ParagraphStyle::ListNumber.style_id())
                            .unwrap_or_default();
                        let abstract_id = source
                            .abstract_numbering_for_style(style_id)
                            .unwrap_or(FALLBACK_ABSTRACT_NUMBERING_ID);
                        doc.numbering.push(NumberingInstance {
                            num_id: next_num_id,
                            abstract_id,
                            start_overrides: vec![0],
                        });
                        next_num_id += 1;
                        doc.numbering.len() - 1
                    }
                };
                current = Some(index);

                let instance = &mut doc.numbering[index];
                if let Err(pos) = instance.start_overrides.binary_search(&marker.level) {
                    instance.start_overrides.insert(pos, marker.level);
                }
                p.num_id = Some(instance.num_id);
            }
        }
    }

    debug!("Minted {} list numbering instances", doc.numbering.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::model::{
        Inline, ListMarker, RenderedParagraph, RenderedTable, TextRun,
    };

    struct Styles;

    impl NumberingSource for Styles {
        fn abstract_numbering_for_style(&self, style_id: &str) -> Option<usize> {
            match style_id {
                "ListNumber" => Some(7),
                _ => None,
            }
        }
    }

    struct Empty;

    impl NumberingSource for Empty {
        fn abstract_numbering_for_style(&self, _: &str) -> Option<usize> {
            None
        }
    }

    fn item(kind: ListKind, level: usize) -> Block {
        let style = match kind {
            ListKind::Ordered => ParagraphStyle::ListNumber,
            ListKind::Bullet => ParagraphStyle::ListBullet,
            ListKind::Continuation => ParagraphStyle::ListContinue,
        };
        let mut p = RenderedParagraph::new(style, vec![Inline::Text(TextRun::plain("x"))]);
        p.list = Some(ListMarker { kind, level });
        Block::Paragraph(p)
    }

    fn text() -> Block {
        Block::Paragraph(RenderedParagraph::new(ParagraphStyle::Normal, vec![]))
    }

    fn table() -> Block {
        Block::Table(RenderedTable {
            alignments: vec![None],
            rows: vec![vec![vec![]]],
            header_rows: 0,
        })
    }

    fn num_ids(doc: &RenderedDocument) -> Vec<Option<usize>> {
        doc.paragraphs().map(|p| p.num_id).collect()
    }

    fn run(blocks: Vec<Block>) -> RenderedDocument {
        let mut doc = RenderedDocument {
            blocks,
            numbering: vec![],
        };
        restart_ordered_lists(&mut doc, &Styles);
        doc
    }

    #[test]
    fn paragraph_and_table_break_runs() {
        use ListKind::Ordered;
        let doc = run(vec![
            item(Ordered, 0),
            item(Ordered, 0),
            text(),
            item(Ordered, 0),
            table(),
            item(Ordered, 0),
        ]);
        assert_eq!(
            num_ids(&doc),
            vec![Some(4), Some(4), None, Some(5), Some(6)]
        );
        assert_eq!(doc.numbering.len(), 3);
        assert!(doc.numbering.iter().all(|n| n.abstract_id == 7));
        assert!(doc.numbering.iter().all(|n| n.start_overrides == vec![0]));
    }

    #[test]
    fn nested_material_keeps_the_run() {
        use ListKind::*;
        let doc = run(vec![
            item(Ordered, 0),
            item(Continuation, 0),
            item(Bullet, 1),
            item(Ordered, 1),
            item(Ordered, 0),
        ]);
        assert_eq!(
            num_ids(&doc),
            vec![Some(4), None, Some(BULLET_NUM_ID), Some(4), Some(4)]
        );
        assert_eq!(doc.numbering[0].start_overrides, vec![0, 1]);
    }

    #[test]
    fn top_level_bullet_breaks_the_run() {
        use ListKind::*;
        let doc = run(vec![item(Ordered, 0), item(Bullet, 0), item(Ordered, 0)]);
        assert_eq!(num_ids(&doc), vec![Some(4), Some(BULLET_NUM_ID), Some(5)]);
    }

    #[test]
    fn n_disjoint_lists_get_n_contiguous_instances() {
        let mut blocks = Vec::new();
        for _ in 0..5 {
            blocks.push(item(ListKind::Ordered, 0));
            blocks.push(item(ListKind::Ordered, 0));
            blocks.push(text());
        }
        let doc = run(blocks);
        let ids: Vec<usize> = doc.numbering.iter().map(|n| n.num_id).collect();
        assert_eq!(ids, vec![4, 5, 6, 7, 8]);
        let values: Vec<usize> = doc.display_numbers().iter().map(|d| d.value).collect();
        assert_eq!(values, vec![1, 2, 1, 2, 1, 2, 1, 2, 1, 2]);
    }

    #[test]
    fn unknown_style_uses_fallback_definition() {
        let mut doc = RenderedDocument {
            blocks: vec![item(ListKind::Ordered, 0)],
            numbering: vec![],
        };
        restart_ordered_lists(&mut doc, &Empty);
        assert_eq!(doc.numbering[0].abstract_id, FALLBACK_ABSTRACT_NUMBERING_ID);
    }

    #[test]
    fn pass_is_idempotent() {
        let mut doc = run(vec![item(ListKind::Ordered, 0), text(), item(ListKind::Ordered, 0)]);
        let first = doc.clone();
        restart_ordered_lists(&mut doc, &Styles);
        assert_eq!(doc, first);
    }
}
