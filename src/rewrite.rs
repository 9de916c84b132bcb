use anyhow::anyhow;

use crate::ir::{NodeRef, Paragraph, Replacement, SpanOrigin, SurfacePiece, TokenMatch};
use crate::number::NumberAssigner;
use crate::pattern::{format_tag, TokenPattern};

/// One pending text replacement inside a single node.
#[derive(Clone, Debug)]
pub struct SpanEdit {
    pub node: NodeRef,
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

/// All edits targeting one node, ordered highest offset first.
#[derive(Clone, Debug)]
pub struct NodeEdits {
    pub node: NodeRef,
    pub edits: Vec<SpanEdit>,
}

/// `before + replacement + after`, bounds-checked against the current text.
pub fn splice(text: &str, start: usize, end: usize, replacement: &str) -> anyhow::Result<String> {
    if start > end {
        return Err(anyhow!("splice range reversed: {start}..{end}"));
    }
    let before = text
        .get(..start)
        .ok_or_else(|| anyhow!("splice start {start} out of bounds (len {})", text.len()))?;
    let after = text
        .get(end..)
        .ok_or_else(|| anyhow!("splice end {end} out of bounds (len {})", text.len()))?;
    let mut out = String::with_capacity(before.len() + replacement.len() + after.len());
    out.push_str(before);
    out.push_str(replacement);
    out.push_str(after);
    Ok(out)
}

/// Walks the ordered match list once: issues a number per match, records the
/// replacement, and pairs it with the edit to apply later.
pub fn plan_rewrites(
    matches: &[TokenMatch],
    assigner: &mut NumberAssigner,
) -> (Vec<Replacement>, Vec<SpanEdit>) {
    let mut records = Vec::with_capacity(matches.len());
    let mut edits = Vec::with_capacity(matches.len());
    for m in matches {
        let number = assigner.next(&m.prefix);
        let generated = format_tag(&m.prefix, number);
        records.push(Replacement {
            prefix: m.prefix.clone(),
            number,
            original: m.matched_text.clone(),
            generated: generated.clone(),
            origin: m.origin,
            region: m.region,
        });
        edits.push(SpanEdit {
            node: m.node.clone(),
            start: m.start,
            end: m.end,
            replacement: generated,
        });
    }
    (records, edits)
}

/// Groups edits by target node, keeping first-seen node order, and sorts
/// each group highest offset first.
pub fn group_by_node(edits: Vec<SpanEdit>) -> Vec<NodeEdits> {
    let mut out: Vec<NodeEdits> = Vec::new();
    for edit in edits {
        match out.iter_mut().find(|g| g.node == edit.node) {
            Some(group) => group.edits.push(edit),
            None => out.push(NodeEdits {
                node: edit.node.clone(),
                edits: vec![edit],
            }),
        }
    }
    for group in out.iter_mut() {
        group.edits.sort_by(|a, b| b.start.cmp(&a.start));
    }
    out
}

/// Applies one node's edits to its captured text. Highest offsets go first,
/// so every edit sees the offsets it was collected against; ranges must not
/// overlap.
pub fn apply_node_edits(text: &str, group: &NodeEdits) -> anyhow::Result<String> {
    for pair in group.edits.windows(2) {
        if pair[1].end > pair[0].start {
            return Err(anyhow!(
                "overlapping edits in one node: {}..{} and {}..{}",
                pair[1].start,
                pair[1].end,
                pair[0].start,
                pair[0].end
            ));
        }
    }
    let mut out = text.to_string();
    for edit in &group.edits {
        out = splice(&out, edit.start, edit.end, &edit.replacement)?;
    }
    Ok(out)
}

/// Result of the whole-paragraph strategy for one region.
#[derive(Clone, Debug)]
pub enum FallbackOutcome {
    Untouched,
    /// Final text per touched node; node indices were never invalidated.
    InPlace(Vec<(NodeRef, String)>),
    /// The paragraph's runs are replaced by these plain texts, in order.
    /// Tab and break characters inside them re-expand to control elements.
    Rebuilt(Vec<String>),
}

struct Cell {
    node: Option<NodeRef>,
    text: String,
    editable: bool,
    dirty: bool,
}

/// Whole-paragraph renumbering: match against the concatenated surface,
/// number in left-to-right document order, then place each replacement by
/// literal search. A literal found inside one cell is spliced there; one
/// that straddles cells forces a rebuild into three plain cells (before,
/// replacement, after), discarding per-run formatting and any revision
/// content of the paragraph.
pub fn renumber_paragraph_fallback(
    para: &Paragraph,
    pattern: &TokenPattern,
    prefixes: &[String],
    assigner: &mut NumberAssigner,
    records: &mut Vec<Replacement>,
) -> anyhow::Result<FallbackOutcome> {
    let surface = para.surface();
    let hits = pattern.hits(&surface);
    if hits.is_empty() {
        return Ok(FallbackOutcome::Untouched);
    }

    let mut cells: Vec<Cell> = para
        .pieces
        .iter()
        .map(|piece| match piece {
            SurfacePiece::Span(i) => Cell {
                node: Some(para.spans[*i].node.clone()),
                text: para.spans[*i].text.clone(),
                editable: true,
                dirty: false,
            },
            SurfacePiece::Control(c) => Cell {
                node: None,
                text: (*c).to_string(),
                editable: false,
                dirty: false,
            },
        })
        .collect();
    let mut rebuilt = false;
    let mut touched = false;

    for hit in hits {
        if !prefixes.iter().any(|p| p == &hit.prefix) {
            continue;
        }
        let number = assigner.next(&hit.prefix);
        let generated = format_tag(&hit.prefix, number);
        records.push(Replacement {
            prefix: hit.prefix.clone(),
            number,
            original: hit.text.clone(),
            generated: generated.clone(),
            origin: SpanOrigin::Visible,
            region: para.region,
        });

        let found = cells.iter().enumerate().find_map(|(i, c)| {
            if !c.editable {
                return None;
            }
            c.text.find(&hit.text).map(|pos| (i, pos))
        });
        if let Some((i, pos)) = found {
            let end = pos + hit.text.len();
            cells[i].text = splice(&cells[i].text, pos, end, &generated)?;
            cells[i].dirty = true;
            touched = true;
            continue;
        }

        let full: String = cells.iter().map(|c| c.text.as_str()).collect();
        let Some(pos) = full.find(&hit.text) else {
            // An earlier splice of an identical token consumed this literal;
            // the issued number stands.
            continue;
        };
        let before = full[..pos].to_string();
        let after = full[pos + hit.text.len()..].to_string();
        cells = vec![
            Cell {
                node: None,
                text: before,
                editable: true,
                dirty: true,
            },
            Cell {
                node: None,
                text: generated,
                editable: true,
                dirty: true,
            },
            Cell {
                node: None,
                text: after,
                editable: true,
                dirty: true,
            },
        ];
        rebuilt = true;
        touched = true;
    }

    if !touched {
        return Ok(FallbackOutcome::Untouched);
    }
    if rebuilt {
        let texts: Vec<String> = cells
            .into_iter()
            .map(|c| c.text)
            .filter(|t| !t.is_empty())
            .collect();
        return Ok(FallbackOutcome::Rebuilt(texts));
    }
    let mut out = Vec::new();
    for cell in cells {
        if let (Some(node), true) = (cell.node, cell.dirty) {
            out.push((node, cell.text));
        }
    }
    if out.is_empty() {
        return Ok(FallbackOutcome::Untouched);
    }
    Ok(FallbackOutcome::InPlace(out))
}

#[cfg(test)]
mod tests {
    use super::{
        apply_node_edits, group_by_node, plan_rewrites, renumber_paragraph_fallback, splice,
        FallbackOutcome, SpanEdit,
    };
    use crate::ir::{
        NodeRef, Paragraph, RegionKind, Span, SpanOrigin, SurfacePiece, TokenMatch,
    };
    use crate::number::NumberAssigner;
    use crate::pattern::TokenPattern;

    fn node(elem: usize) -> NodeRef {
        NodeRef {
            part_name: "word/document.xml".to_string(),
            elem_event_index: elem,
            text_event_index: elem + 1,
        }
    }

    fn edit(elem: usize, start: usize, end: usize, replacement: &str) -> SpanEdit {
        SpanEdit {
            node: node(elem),
            start,
            end,
            replacement: replacement.to_string(),
        }
    }

    #[test]
    fn splice_replaces_the_range_only() {
        assert_eq!(splice("see [REQ-XXX].", 4, 13, "[REQ-001]").unwrap(), "see [REQ-001].");
        assert_eq!(splice("abc", 0, 0, "x").unwrap(), "xabc");
        assert_eq!(splice("abc", 3, 3, "x").unwrap(), "abcx");
    }

    #[test]
    fn splice_rejects_bad_ranges() {
        assert!(splice("abc", 2, 1, "x").is_err());
        assert!(splice("abc", 0, 9, "x").is_err());
        assert!(splice("héllo", 2, 3, "x").is_err());
    }

    #[test]
    fn plan_issues_numbers_in_list_order() {
        let matches: Vec<TokenMatch> = [("REQ", 0), ("SYS", 10), ("REQ", 20)]
            .iter()
            .map(|(prefix, elem)| TokenMatch {
                prefix: prefix.to_string(),
                matched_text: format!("[{prefix}-XXX]"),
                node: node(*elem),
                start: 0,
                end: 9,
                origin: SpanOrigin::Visible,
                region: RegionKind::Body,
            })
            .collect();
        let mut assigner = NumberAssigner::new();
        let (records, edits) = plan_rewrites(&matches, &mut assigner);
        let generated: Vec<&str> = records.iter().map(|r| r.generated.as_str()).collect();
        assert_eq!(generated, vec!["[REQ-001]", "[SYS-001]", "[REQ-002]"]);
        assert_eq!(edits.len(), 3);
        assert_eq!(edits[2].replacement, "[REQ-002]");
    }

    #[test]
    fn second_edit_in_same_node_keeps_original_offsets() {
        // Replacements of different lengths: applying low-to-high would shift
        // the second range and corrupt the text.
        let text = "[REQ-XXX] and [SYS-XXX]";
        let groups = group_by_node(vec![
            edit(0, 0, 9, "[REQ-1000]"),
            edit(0, 14, 23, "[SYS-001]"),
        ]);
        assert_eq!(groups.len(), 1);
        let out = apply_node_edits(text, &groups[0]).unwrap();
        assert_eq!(out, "[REQ-1000] and [SYS-001]");
    }

    #[test]
    fn overlapping_edits_are_rejected() {
        let groups = group_by_node(vec![edit(0, 0, 9, "a"), edit(0, 5, 12, "b")]);
        assert!(apply_node_edits("[REQ-XXX]XXX]", &groups[0]).is_err());
    }

    #[test]
    fn grouping_keeps_first_seen_node_order() {
        let groups = group_by_node(vec![
            edit(7, 0, 1, "a"),
            edit(3, 0, 1, "b"),
            edit(7, 5, 6, "c"),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].node, node(7));
        assert_eq!(groups[0].edits.len(), 2);
        assert_eq!(groups[0].edits[0].start, 5);
        assert_eq!(groups[1].node, node(3));
    }

    fn fallback_para(texts: &[&str], controls_after: &[Option<&'static str>]) -> Paragraph {
        let spans: Vec<Span> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Span {
                node: node(i * 4),
                text: t.to_string(),
                origin: SpanOrigin::Visible,
            })
            .collect();
        let mut pieces = Vec::new();
        for i in 0..spans.len() {
            pieces.push(SurfacePiece::Span(i));
            if let Some(Some(c)) = controls_after.get(i) {
                pieces.push(SurfacePiece::Control(c));
            }
        }
        Paragraph {
            region: RegionKind::Body,
            part_name: "word/document.xml".to_string(),
            start_event: 0,
            end_event: 0,
            spans,
            overlay: Ok(Vec::new()),
            pieces,
        }
    }

    fn prefixes() -> Vec<String> {
        vec!["REQ".to_string(), "SYS".to_string()]
    }

    #[test]
    fn fallback_splices_in_place_when_one_span_holds_the_token() {
        let para = fallback_para(&["intro ", "[REQ-XXX]", " outro"], &[None, None, None]);
        let mut assigner = NumberAssigner::new();
        let mut records = Vec::new();
        let out = renumber_paragraph_fallback(
            &para,
            &TokenPattern::default(),
            &prefixes(),
            &mut assigner,
            &mut records,
        )
        .unwrap();
        match out {
            FallbackOutcome::InPlace(cells) => {
                assert_eq!(cells.len(), 1);
                assert_eq!(cells[0].0, node(4));
                assert_eq!(cells[0].1, "[REQ-001]");
            }
            other => panic!("expected in-place outcome, got {other:?}"),
        }
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn fallback_rebuilds_three_cells_when_the_token_straddles() {
        let para = fallback_para(&["head [RE", "Q-XXX] tail"], &[None, None]);
        let mut assigner = NumberAssigner::new();
        let mut records = Vec::new();
        let out = renumber_paragraph_fallback(
            &para,
            &TokenPattern::default(),
            &prefixes(),
            &mut assigner,
            &mut records,
        )
        .unwrap();
        match out {
            FallbackOutcome::Rebuilt(texts) => {
                assert_eq!(texts, vec!["head ", "[REQ-001]", " tail"]);
                assert_eq!(texts.concat(), "head [REQ-001] tail");
            }
            other => panic!("expected rebuild, got {other:?}"),
        }
    }

    #[test]
    fn fallback_keeps_controls_as_plain_chars_in_rebuilt_text() {
        let para = fallback_para(&["a", "[RE", "Q-XXX]b"], &[Some("\t"), None, None]);
        let mut assigner = NumberAssigner::new();
        let mut records = Vec::new();
        let out = renumber_paragraph_fallback(
            &para,
            &TokenPattern::default(),
            &prefixes(),
            &mut assigner,
            &mut records,
        )
        .unwrap();
        match out {
            FallbackOutcome::Rebuilt(texts) => {
                assert_eq!(texts.concat(), "a\t[REQ-001]b");
            }
            other => panic!("expected rebuild, got {other:?}"),
        }
    }

    #[test]
    fn fallback_numbers_in_document_order_across_prefixes() {
        let para = fallback_para(
            &["[SYS-XXX] then [REQ-XXX] then [SYS-xxx]"],
            &[None],
        );
        let mut assigner = NumberAssigner::new();
        let mut records = Vec::new();
        renumber_paragraph_fallback(
            &para,
            &TokenPattern::default(),
            &prefixes(),
            &mut assigner,
            &mut records,
        )
        .unwrap();
        let generated: Vec<&str> = records.iter().map(|r| r.generated.as_str()).collect();
        assert_eq!(generated, vec!["[SYS-001]", "[REQ-001]", "[SYS-002]"]);
    }

    #[test]
    fn fallback_ignores_unrecognized_prefixes_without_consuming_numbers() {
        let para = fallback_para(&["[FOO-XXX] [REQ-XXX]"], &[None]);
        let mut assigner = NumberAssigner::new();
        let mut records = Vec::new();
        let out = renumber_paragraph_fallback(
            &para,
            &TokenPattern::default(),
            &prefixes(),
            &mut assigner,
            &mut records,
        )
        .unwrap();
        match out {
            FallbackOutcome::InPlace(cells) => {
                assert_eq!(cells[0].1, "[FOO-XXX] [REQ-001]");
            }
            other => panic!("expected in-place outcome, got {other:?}"),
        }
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].generated, "[REQ-001]");
    }

    #[test]
    fn fallback_handles_repeated_tokens_in_one_cell() {
        let para = fallback_para(&["[REQ-XXX] [REQ-XXX]"], &[None]);
        let mut assigner = NumberAssigner::new();
        let mut records = Vec::new();
        let out = renumber_paragraph_fallback(
            &para,
            &TokenPattern::default(),
            &prefixes(),
            &mut assigner,
            &mut records,
        )
        .unwrap();
        match out {
            FallbackOutcome::InPlace(cells) => {
                assert_eq!(cells[0].1, "[REQ-001] [REQ-002]");
            }
            other => panic!("expected in-place outcome, got {other:?}"),
        }
    }
}
