use crate::ir::{Paragraph, RegionKind, Span, TokenMatch};
use crate::number::NumberingOrder;
use crate::pattern::TokenPattern;

/// Canonical traversal: body paragraphs, then table-cell paragraphs, then
/// per-section header and footer paragraphs. Stored order inside each group
/// is document order, so a stable partition is enough.
pub fn traversal_order(paragraphs: &[Paragraph]) -> Vec<&Paragraph> {
    let mut out: Vec<&Paragraph> = Vec::new();
    out.extend(
        paragraphs
            .iter()
            .filter(|p| matches!(p.region, RegionKind::Body)),
    );
    out.extend(
        paragraphs
            .iter()
            .filter(|p| matches!(p.region, RegionKind::TableCell { .. })),
    );
    out.extend(paragraphs.iter().filter(|p| {
        matches!(
            p.region,
            RegionKind::Header { .. } | RegionKind::Footer { .. }
        )
    }));
    out
}

fn scan_spans(
    spans: &[Span],
    region: RegionKind,
    pattern: &TokenPattern,
    prefixes: &[String],
    out: &mut Vec<TokenMatch>,
) {
    for span in spans {
        if span.text.trim().is_empty() {
            continue;
        }
        for hit in pattern.hits(&span.text) {
            if !prefixes.iter().any(|p| p == &hit.prefix) {
                continue;
            }
            out.push(TokenMatch {
                prefix: hit.prefix,
                matched_text: hit.text,
                node: span.node.clone(),
                start: hit.start,
                end: hit.end,
                origin: span.origin,
                region,
            });
        }
    }
}

/// Every recognized match, per region: visible spans first, then that
/// region's revision overlay. A failed overlay walk contributes no matches;
/// reporting the failure is the caller's job (`Paragraph::overlay` keeps the
/// reason). Under `Prefix` order the list is then stably re-sorted by prefix
/// alone, so matches sharing a prefix keep their traversal-order sequence.
pub fn collect_matches(
    paragraphs: &[Paragraph],
    pattern: &TokenPattern,
    prefixes: &[String],
    order: NumberingOrder,
) -> Vec<TokenMatch> {
    let mut all: Vec<TokenMatch> = Vec::new();
    for para in traversal_order(paragraphs) {
        scan_spans(&para.spans, para.region, pattern, prefixes, &mut all);
        if let Ok(overlay) = &para.overlay {
            scan_spans(overlay, para.region, pattern, prefixes, &mut all);
        }
    }
    if order == NumberingOrder::Prefix {
        all.sort_by(|a, b| a.prefix.cmp(&b.prefix));
    }
    all
}

#[cfg(test)]
mod tests {
    use super::{collect_matches, traversal_order};
    use crate::ir::{NodeRef, Paragraph, RegionKind, Span, SpanOrigin, SurfacePiece};
    use crate::number::NumberingOrder;
    use crate::pattern::TokenPattern;

    fn span(text: &str, idx: usize, origin: SpanOrigin) -> Span {
        Span {
            node: NodeRef {
                part_name: "word/document.xml".to_string(),
                elem_event_index: idx * 3,
                text_event_index: idx * 3 + 1,
            },
            text: text.to_string(),
            origin,
        }
    }

    fn para(region: RegionKind, texts: &[&str]) -> Paragraph {
        let spans: Vec<Span> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| span(t, i, SpanOrigin::Visible))
            .collect();
        let pieces = (0..spans.len()).map(SurfacePiece::Span).collect();
        Paragraph {
            region,
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
    fn matches_stay_inside_one_span() {
        let pat = TokenPattern::default();
        let p = para(RegionKind::Body, &["see [REQ-", "XXX] here"]);
        assert!(collect_matches(&[p], &pat, &prefixes(), NumberingOrder::Document).is_empty());
    }

    #[test]
    fn blank_and_unrecognized_spans_are_skipped() {
        let pat = TokenPattern::default();
        let p = para(
            RegionKind::Body,
            &["[REQ-XXX]", "   ", "[FOO-XXX]", "[SYS-xxx]"],
        );
        let got = collect_matches(&[p], &pat, &prefixes(), NumberingOrder::Document);
        let got: Vec<&str> = got.iter().map(|m| m.prefix.as_str()).collect();
        assert_eq!(got, vec!["REQ", "SYS"]);
    }

    #[test]
    fn overlay_matches_follow_visible_matches_of_the_same_region() {
        let pat = TokenPattern::default();
        let mut p = para(RegionKind::Body, &["[SYS-XXX]"]);
        p.overlay = Ok(vec![span("[REQ-XXX]", 9, SpanOrigin::Inserted)]);
        let got = collect_matches(&[p], &pat, &prefixes(), NumberingOrder::Document);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].prefix, "SYS");
        assert_eq!(got[0].origin, SpanOrigin::Visible);
        assert_eq!(got[1].prefix, "REQ");
        assert_eq!(got[1].origin, SpanOrigin::Inserted);
    }

    #[test]
    fn failed_overlay_walk_contributes_nothing() {
        let pat = TokenPattern::default();
        let mut p = para(RegionKind::Body, &["[SYS-XXX]"]);
        p.overlay = Err("unbalanced revision markup".to_string());
        let got = collect_matches(&[p], &pat, &prefixes(), NumberingOrder::Document);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].prefix, "SYS");
    }

    #[test]
    fn traversal_groups_body_then_tables_then_sections() {
        let cell = RegionKind::TableCell {
            table: 1,
            row: 1,
            cell: 1,
        };
        let head = RegionKind::Header { section: 1 };
        let paras = vec![
            para(RegionKind::Body, &["a"]),
            para(cell, &["b"]),
            para(RegionKind::Body, &["c"]),
            para(head, &["d"]),
        ];
        let order: Vec<String> = traversal_order(&paras)
            .iter()
            .map(|p| p.surface())
            .collect();
        assert_eq!(order, vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn prefix_order_batches_but_keeps_relative_sequence() {
        let pat = TokenPattern::default();
        let paras = vec![
            para(RegionKind::Body, &["[SYS-XXX] one"]),
            para(RegionKind::Body, &["[REQ-XXX] two"]),
            para(RegionKind::Body, &["[SYS-xxx] three"]),
            para(RegionKind::Body, &["[REQ-xxx] four"]),
        ];
        let got = collect_matches(&paras, &pat, &prefixes(), NumberingOrder::Prefix);
        assert_eq!(
            got.iter().map(|m| m.matched_text.as_str()).collect::<Vec<_>>(),
            vec!["[REQ-XXX]", "[REQ-xxx]", "[SYS-XXX]", "[SYS-xxx]"]
        );
        let doc = collect_matches(&paras, &pat, &prefixes(), NumberingOrder::Document);
        assert_eq!(
            doc.iter().map(|m| m.matched_text.as_str()).collect::<Vec<_>>(),
            vec!["[SYS-XXX]", "[REQ-XXX]", "[SYS-xxx]", "[REQ-xxx]"]
        );
    }
}
