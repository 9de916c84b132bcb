use std::collections::HashMap;

use anyhow::{anyhow, Context};

use crate::docx::package::DocxPackage;
use crate::docx::xml::{parse_xml_part, XmlEvent, XmlPart};
use crate::ir::{AnnotatedRun, NodeRef, Paragraph, RegionKind, Span, SpanOrigin, SurfacePiece};

fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Plain-text form of a run control element, if it has one. Matches how the
/// surface text is later re-expanded: tabs and breaks round-trip, a no-break
/// hyphen degrades to a plain hyphen.
fn control_char(name: &str, attrs: &[(String, String)]) -> Option<&'static str> {
    match name {
        "w:tab" | "w:ptab" => Some("\t"),
        "w:cr" => Some("\n"),
        "w:br" => {
            let br_type = find_attr(attrs, "w:type").unwrap_or("textWrapping");
            if br_type == "textWrapping" {
                Some("\n")
            } else {
                None
            }
        }
        "w:noBreakHyphen" => Some("-"),
        _ => None,
    }
}

fn is_control(name: &str) -> bool {
    matches!(
        name,
        "w:tab" | "w:ptab" | "w:cr" | "w:br" | "w:noBreakHyphen" | "w:softHyphen"
    )
}

#[derive(Clone, Copy)]
enum WalkScope {
    /// Body paragraphs plus depth-1 table cells of `word/document.xml`.
    Document,
    /// Direct paragraphs of a header or footer part.
    Part {
        root: &'static str,
        region: RegionKind,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Visible,
    Overlay(SpanOrigin),
}

struct ParaCapture {
    region: RegionKind,
    start_event: usize,
    /// Stack depth just inside the `w:p` element.
    p_depth: usize,
    spans: Vec<Span>,
    overlay: Vec<Span>,
    overlay_origin: Option<SpanOrigin>,
    overlay_depth: usize,
    overlay_broken: Option<String>,
    pieces: Vec<SurfacePiece>,
    direct_r: Option<usize>,
    hyperlink: Option<usize>,
    hyperlink_r: Option<usize>,
    text_elem: Option<(usize, usize, Bucket)>,
}

impl ParaCapture {
    fn new(region: RegionKind, start_event: usize, p_depth: usize) -> Self {
        Self {
            region,
            start_event,
            p_depth,
            spans: Vec::new(),
            overlay: Vec::new(),
            overlay_origin: None,
            overlay_depth: 0,
            overlay_broken: None,
            pieces: Vec::new(),
            direct_r: None,
            hyperlink: None,
            hyperlink_r: None,
            text_elem: None,
        }
    }

    fn in_visible_run(&self, depth: usize) -> bool {
        self.overlay_origin.is_none()
            && (self.direct_r == Some(depth) || self.hyperlink_r == Some(depth))
    }

    fn finish(self, part_name: &str, end_event: usize) -> Paragraph {
        let overlay = match self.overlay_broken {
            Some(reason) => Err(reason),
            None => Ok(self.overlay),
        };
        Paragraph {
            region: self.region,
            part_name: part_name.to_string(),
            start_event: self.start_event,
            end_event,
            spans: self.spans,
            overlay,
            pieces: self.pieces,
        }
    }
}

/// Stack-based event walk collecting paragraphs with their text leaves.
/// Visible spans come from `w:t` under direct and hyperlink runs; leaves
/// under `w:ins`/`w:del` go to the overlay with their origin. Nested tables
/// and paragraphs inside other containers are left alone.
fn walk_paragraphs(part: &XmlPart, scope: WalkScope) -> Vec<Paragraph> {
    let mut out: Vec<Paragraph> = Vec::new();
    let mut stack: Vec<String> = Vec::new();

    let mut tbl_depth = 0usize;
    let mut table_index = 0usize;
    let mut row_index = 0usize;
    let mut cell_index = 0usize;

    let mut capture: Option<ParaCapture> = None;

    for (idx, ev) in part.events.iter().enumerate() {
        match ev {
            XmlEvent::Start { name, attrs } => {
                let parent = stack.last().map(|s| s.as_str()).unwrap_or("");

                if let WalkScope::Document = scope {
                    if name == "w:tbl" {
                        if parent == "w:body" && tbl_depth == 0 {
                            table_index += 1;
                            row_index = 0;
                            cell_index = 0;
                        }
                        tbl_depth += 1;
                    } else if name == "w:tr" && tbl_depth == 1 && parent == "w:tbl" {
                        row_index += 1;
                        cell_index = 0;
                    } else if name == "w:tc" && tbl_depth == 1 && parent == "w:tr" {
                        cell_index += 1;
                    }
                }

                if name == "w:p" && capture.is_none() {
                    let region = match scope {
                        WalkScope::Document => {
                            if parent == "w:body" && tbl_depth == 0 {
                                Some(RegionKind::Body)
                            } else if parent == "w:tc" && tbl_depth == 1 {
                                Some(RegionKind::TableCell {
                                    table: table_index,
                                    row: row_index,
                                    cell: cell_index,
                                })
                            } else {
                                None
                            }
                        }
                        WalkScope::Part { root, region } => {
                            (parent == root).then_some(region)
                        }
                    };
                    if let Some(region) = region {
                        capture = Some(ParaCapture::new(region, idx, stack.len() + 1));
                    }
                }

                if let Some(cap) = capture.as_mut() {
                    let depth = stack.len();
                    match name.as_str() {
                        "w:ins" | "w:del" => {
                            cap.overlay_depth += 1;
                            if cap.overlay_depth == 1 {
                                cap.overlay_origin = Some(if name == "w:ins" {
                                    SpanOrigin::Inserted
                                } else {
                                    SpanOrigin::Deleted
                                });
                            }
                        }
                        "w:hyperlink" => {
                            if parent == "w:p" && depth == cap.p_depth {
                                cap.hyperlink = Some(depth + 1);
                            }
                        }
                        "w:r" => {
                            if parent == "w:p" && depth == cap.p_depth {
                                cap.direct_r = Some(depth + 1);
                            } else if parent == "w:hyperlink" && cap.hyperlink == Some(depth) {
                                cap.hyperlink_r = Some(depth + 1);
                            }
                        }
                        "w:t" | "w:delText" => {
                            if let Some(origin) = cap.overlay_origin {
                                cap.text_elem = Some((idx, depth + 1, Bucket::Overlay(origin)));
                            } else if name == "w:t"
                                && parent == "w:r"
                                && cap.in_visible_run(depth)
                            {
                                cap.text_elem = Some((idx, depth + 1, Bucket::Visible));
                            }
                        }
                        _ => {
                            if is_control(name) && parent == "w:r" && cap.in_visible_run(depth) {
                                if let Some(c) = control_char(name, attrs) {
                                    cap.pieces.push(SurfacePiece::Control(c));
                                }
                            }
                        }
                    }
                }

                stack.push(name.clone());
            }
            XmlEvent::Empty { name, attrs } => {
                let parent = stack.last().map(|s| s.as_str()).unwrap_or("");

                if let WalkScope::Document = scope {
                    if name == "w:tbl" && parent == "w:body" && tbl_depth == 0 {
                        table_index += 1;
                        row_index = 0;
                        cell_index = 0;
                    }
                }

                if name == "w:p" && capture.is_none() {
                    let eligible = match scope {
                        WalkScope::Document => parent == "w:body" && tbl_depth == 0,
                        WalkScope::Part { root, .. } => parent == root,
                    };
                    if eligible {
                        let region = match scope {
                            WalkScope::Document => RegionKind::Body,
                            WalkScope::Part { region, .. } => region,
                        };
                        out.push(ParaCapture::new(region, idx, stack.len() + 1)
                            .finish(&part.name, idx));
                    }
                    continue;
                }

                if let Some(cap) = capture.as_mut() {
                    let depth = stack.len();
                    if is_control(name) && parent == "w:r" && cap.in_visible_run(depth) {
                        if let Some(c) = control_char(name, attrs) {
                            cap.pieces.push(SurfacePiece::Control(c));
                        }
                    }
                }
            }
            XmlEvent::Text { text } => {
                if let Some(cap) = capture.as_mut() {
                    if let Some((elem_idx, _, bucket)) = cap.text_elem {
                        let span = Span {
                            node: NodeRef {
                                part_name: part.name.clone(),
                                elem_event_index: elem_idx,
                                text_event_index: idx,
                            },
                            text: text.clone(),
                            origin: match bucket {
                                Bucket::Visible => SpanOrigin::Visible,
                                Bucket::Overlay(origin) => origin,
                            },
                        };
                        match bucket {
                            Bucket::Visible => {
                                cap.spans.push(span);
                                cap.pieces.push(SurfacePiece::Span(cap.spans.len() - 1));
                            }
                            Bucket::Overlay(_) => cap.overlay.push(span),
                        }
                    }
                }
            }
            XmlEvent::End { name } => {
                let depth = stack.len();
                if let Some(cap) = capture.as_mut() {
                    match name.as_str() {
                        "w:t" | "w:delText" => {
                            if cap.text_elem.map(|(_, d, _)| d) == Some(depth) {
                                cap.text_elem = None;
                            }
                        }
                        "w:ins" | "w:del" => {
                            if cap.overlay_depth == 0 {
                                cap.overlay_broken
                                    .get_or_insert_with(|| "unbalanced revision markup".to_string());
                            } else {
                                cap.overlay_depth -= 1;
                                if cap.overlay_depth == 0 {
                                    cap.overlay_origin = None;
                                }
                            }
                        }
                        "w:r" => {
                            if cap.direct_r == Some(depth) {
                                cap.direct_r = None;
                            }
                            if cap.hyperlink_r == Some(depth) {
                                cap.hyperlink_r = None;
                            }
                        }
                        "w:hyperlink" => {
                            if cap.hyperlink == Some(depth) {
                                cap.hyperlink = None;
                                cap.hyperlink_r = None;
                            }
                        }
                        _ => {}
                    }
                }

                if name == "w:p" {
                    if capture.as_ref().map(|c| c.p_depth) == Some(depth) {
                        if let Some(mut cap) = capture.take() {
                            if cap.overlay_depth != 0 {
                                cap.overlay_broken.get_or_insert_with(|| {
                                    "revision group left open at paragraph end".to_string()
                                });
                            }
                            out.push(cap.finish(&part.name, idx));
                        }
                    }
                }

                if let WalkScope::Document = scope {
                    if name == "w:tbl" && tbl_depth > 0 {
                        tbl_depth -= 1;
                    }
                }

                let _ = stack.pop();
            }
            _ => {}
        }
    }
    out
}

fn normalize_target(target: &str) -> String {
    let mut t = target.replace('\\', "/");
    while t.starts_with('/') || t.starts_with("../") {
        t = t
            .trim_start_matches('/')
            .trim_start_matches("../")
            .to_string();
    }
    format!("word/{t}")
}

fn relationship_targets(rels: &XmlPart) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = HashMap::new();
    for ev in &rels.events {
        if let XmlEvent::Empty { name, attrs } | XmlEvent::Start { name, attrs } = ev {
            if name != "Relationship" {
                continue;
            }
            let id = find_attr(attrs, "Id").unwrap_or("").trim();
            let target = find_attr(attrs, "Target").unwrap_or("").trim();
            if id.is_empty() || target.is_empty() {
                continue;
            }
            map.insert(id.to_string(), normalize_target(target));
        }
    }
    map
}

#[derive(Default, Clone)]
struct SectionRefs {
    header_rid: Option<String>,
    footer_rid: Option<String>,
}

/// Section boundaries of the document part, each with its `type="default"`
/// header and footer relationship ids. A `w:sectPr` at body level or inside
/// a body paragraph's properties closes one section.
fn section_refs(doc: &XmlPart) -> Vec<SectionRefs> {
    let mut sections: Vec<SectionRefs> = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut in_sectpr = false;
    let mut pending = SectionRefs::default();

    let sectpr_here = |name: &str, stack: &[String]| {
        let parent = stack.last().map(|s| s.as_str()).unwrap_or("");
        name == "w:sectPr"
            && (parent == "w:body"
                || (parent == "w:pPr"
                    && stack.len() >= 3
                    && stack[stack.len() - 2] == "w:p"
                    && stack[stack.len() - 3] == "w:body"))
    };

    let take_ref = |pending: &mut SectionRefs, name: &str, attrs: &[(String, String)]| {
        if find_attr(attrs, "w:type").unwrap_or("default") != "default" {
            return;
        }
        let Some(rid) = find_attr(attrs, "r:id").map(str::trim).filter(|r| !r.is_empty()) else {
            return;
        };
        if name == "w:headerReference" {
            pending.header_rid = Some(rid.to_string());
        } else {
            pending.footer_rid = Some(rid.to_string());
        }
    };

    for ev in &doc.events {
        match ev {
            XmlEvent::Start { name, attrs } => {
                if sectpr_here(name, &stack) {
                    in_sectpr = true;
                    pending = SectionRefs::default();
                } else if in_sectpr
                    && (name == "w:headerReference" || name == "w:footerReference")
                {
                    take_ref(&mut pending, name, attrs);
                }
                stack.push(name.clone());
            }
            XmlEvent::Empty { name, attrs } => {
                if sectpr_here(name, &stack) {
                    sections.push(SectionRefs::default());
                } else if in_sectpr
                    && (name == "w:headerReference" || name == "w:footerReference")
                {
                    take_ref(&mut pending, name, attrs);
                }
            }
            XmlEvent::End { name } => {
                if name == "w:sectPr" && in_sectpr {
                    sections.push(pending.clone());
                    in_sectpr = false;
                }
                let _ = stack.pop();
            }
            _ => {}
        }
    }
    sections
}

/// Extracts every scannable paragraph of the package: the document body and
/// its depth-1 table cells, then each section's default header and footer.
/// Header and footer parts get parsed into `parts` so later edits can target
/// them by name.
pub fn extract_paragraphs(
    pkg: &DocxPackage,
    parts: &mut HashMap<String, XmlPart>,
) -> anyhow::Result<Vec<Paragraph>> {
    if !parts.contains_key("word/document.xml") {
        let ent = pkg.entry("word/document.xml")?;
        parts.insert(
            ent.name.clone(),
            parse_xml_part(&ent.name, &ent.data).context("parse word/document.xml")?,
        );
    }
    let doc = parts
        .get("word/document.xml")
        .ok_or_else(|| anyhow!("missing word/document.xml"))?;

    let mut paragraphs = walk_paragraphs(doc, WalkScope::Document);
    let sections = section_refs(doc);

    let rels_map = if pkg.has_entry("word/_rels/document.xml.rels") {
        let ent = pkg.entry("word/_rels/document.xml.rels")?;
        let rels = parse_xml_part(&ent.name, &ent.data)
            .context("parse word/_rels/document.xml.rels")?;
        relationship_targets(&rels)
    } else {
        HashMap::new()
    };

    for (i, sect) in sections.iter().enumerate() {
        let section = i + 1;
        let refs = [
            (
                sect.header_rid.as_ref(),
                "w:hdr",
                RegionKind::Header { section },
            ),
            (
                sect.footer_rid.as_ref(),
                "w:ftr",
                RegionKind::Footer { section },
            ),
        ];
        for (rid, root, region) in refs {
            let Some(part_name) = rid.and_then(|r| rels_map.get(r)) else {
                continue;
            };
            if !pkg.has_entry(part_name) {
                continue;
            }
            if !parts.contains_key(part_name) {
                let ent = pkg.entry(part_name)?;
                if ent.data.is_empty() {
                    continue;
                }
                parts.insert(
                    part_name.clone(),
                    parse_xml_part(part_name, &ent.data)
                        .with_context(|| format!("parse part: {part_name}"))?,
                );
            }
            let part = parts
                .get(part_name)
                .ok_or_else(|| anyhow!("missing part: {part_name}"))?;
            paragraphs.extend(walk_paragraphs(part, WalkScope::Part { root, region }));
        }
    }

    Ok(paragraphs)
}

pub fn node_text(parts: &HashMap<String, XmlPart>, node: &NodeRef) -> anyhow::Result<String> {
    let part = parts
        .get(&node.part_name)
        .ok_or_else(|| anyhow!("missing part: {}", node.part_name))?;
    match part.events.get(node.text_event_index) {
        Some(XmlEvent::Text { text }) => Ok(text.clone()),
        _ => Err(anyhow!(
            "expected text event at {} in {}",
            node.text_event_index,
            node.part_name
        )),
    }
}

/// Writes new text into the referenced leaf. Boundary whitespace gets
/// `xml:space="preserve"` on the element so it survives a reload.
pub fn set_node_text(
    parts: &mut HashMap<String, XmlPart>,
    node: &NodeRef,
    new_text: &str,
) -> anyhow::Result<()> {
    let part = parts
        .get_mut(&node.part_name)
        .ok_or_else(|| anyhow!("missing part: {}", node.part_name))?;
    match part.events.get_mut(node.text_event_index) {
        Some(XmlEvent::Text { text }) => *text = new_text.to_string(),
        _ => {
            return Err(anyhow!(
                "expected text event at {} in {}",
                node.text_event_index,
                node.part_name
            ))
        }
    }
    if new_text.starts_with(' ') || new_text.ends_with(' ') {
        let ev = part
            .events
            .get_mut(node.elem_event_index)
            .ok_or_else(|| anyhow!("element index out of range in {}", node.part_name))?;
        set_attr_value(ev, "xml:space", "preserve");
    }
    Ok(())
}

fn set_attr_value(ev: &mut XmlEvent, key: &str, value: &str) {
    if let XmlEvent::Start { attrs, .. } | XmlEvent::Empty { attrs, .. } = ev {
        for (k, v) in attrs.iter_mut() {
            if k == key {
                *v = value.to_string();
                return;
            }
        }
        attrs.push((key.to_string(), value.to_string()));
    }
}

fn push_run_events(events: &mut Vec<XmlEvent>, text: &str) {
    events.push(XmlEvent::start("w:r", &[]));
    let mut buf = String::new();
    let flush = |events: &mut Vec<XmlEvent>, buf: &mut String| {
        if buf.is_empty() {
            return;
        }
        if buf.starts_with(' ') || buf.ends_with(' ') {
            events.push(XmlEvent::start("w:t", &[("xml:space", "preserve")]));
        } else {
            events.push(XmlEvent::start("w:t", &[]));
        }
        events.push(XmlEvent::text(buf.clone()));
        events.push(XmlEvent::end("w:t"));
        buf.clear();
    };
    for ch in text.chars() {
        match ch {
            '\t' => {
                flush(events, &mut buf);
                events.push(XmlEvent::empty("w:tab", &[]));
            }
            '\n' => {
                flush(events, &mut buf);
                events.push(XmlEvent::empty("w:br", &[]));
            }
            _ => buf.push(ch),
        }
    }
    flush(events, &mut buf);
    events.push(XmlEvent::end("w:r"));
}

/// Replaces a paragraph's content with plain runs holding `texts`, keeping
/// the `w:p` element and its leading `w:pPr` subtree. Tab and break
/// characters in the texts become control elements again. Event indices
/// after the paragraph shift, so callers apply rebuilds back to front.
pub fn rebuild_paragraph_runs(
    part: &mut XmlPart,
    start_event: usize,
    end_event: usize,
    texts: &[String],
) -> anyhow::Result<()> {
    let open = match part.events.get(start_event) {
        Some(XmlEvent::Start { name, .. }) if name == "w:p" => {
            part.events[start_event].clone()
        }
        _ => return Err(anyhow!("rebuild target is not a paragraph start")),
    };
    let close = match part.events.get(end_event) {
        Some(XmlEvent::End { name }) if name == "w:p" => part.events[end_event].clone(),
        _ => return Err(anyhow!("rebuild target is not a paragraph end")),
    };

    let mut new_events: Vec<XmlEvent> = vec![open];
    match part.events.get(start_event + 1) {
        Some(XmlEvent::Start { name, .. }) if name == "w:pPr" => {
            let mut depth = 0usize;
            let mut idx = start_event + 1;
            loop {
                let ev = part
                    .events
                    .get(idx)
                    .ok_or_else(|| anyhow!("paragraph properties never close"))?;
                match ev {
                    XmlEvent::Start { .. } => depth += 1,
                    XmlEvent::End { .. } => depth -= 1,
                    _ => {}
                }
                new_events.push(ev.clone());
                if depth == 0 {
                    break;
                }
                idx += 1;
            }
        }
        Some(XmlEvent::Empty { name, .. }) if name == "w:pPr" => {
            new_events.push(part.events[start_event + 1].clone());
        }
        _ => {}
    }
    for text in texts {
        if !text.is_empty() {
            push_run_events(&mut new_events, text);
        }
    }
    new_events.push(close);

    part.events.splice(start_event..=end_event, new_events);
    Ok(())
}

/// Comment id to comment text, from `word/comments.xml`. Multi-paragraph
/// comments join their paragraph texts with newlines.
pub fn comment_texts(comments: &XmlPart) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = HashMap::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<(String, String, usize)> = None;
    let mut in_text: Option<usize> = None;

    for ev in &comments.events {
        match ev {
            XmlEvent::Start { name, attrs } => {
                if name == "w:comment" && current.is_none() {
                    if let Some(id) = find_attr(attrs, "w:id") {
                        current = Some((id.to_string(), String::new(), 0));
                    }
                } else if let Some((_, buf, para_count)) = current.as_mut() {
                    if name == "w:p" {
                        if *para_count > 0 {
                            buf.push('\n');
                        }
                        *para_count += 1;
                    } else if name == "w:t" {
                        in_text = Some(stack.len() + 1);
                    }
                }
                stack.push(name.clone());
            }
            XmlEvent::Empty { name, attrs } => {
                if let Some((_, buf, _)) = current.as_mut() {
                    if let Some(c) = control_char(name, attrs) {
                        buf.push_str(c);
                    }
                }
            }
            XmlEvent::Text { text } => {
                if in_text.is_some() {
                    if let Some((_, buf, _)) = current.as_mut() {
                        buf.push_str(text);
                    }
                }
            }
            XmlEvent::End { name } => {
                if name == "w:t" && in_text == Some(stack.len()) {
                    in_text = None;
                } else if name == "w:comment" {
                    if let Some((id, buf, _)) = current.take() {
                        map.insert(id, buf);
                    }
                }
                let _ = stack.pop();
            }
            _ => {}
        }
    }
    map
}

/// Direct body paragraphs as annotated runs for the glossary pass: each
/// direct `w:r` child with its text (controls mapped to plain characters)
/// and the texts of comments referenced from inside it. Table, header and
/// footer content does not participate.
pub fn annotated_body_runs(
    doc: &XmlPart,
    comments: Option<&XmlPart>,
) -> Vec<Vec<AnnotatedRun>> {
    let comment_map = comments.map(comment_texts).unwrap_or_default();

    let mut out: Vec<Vec<AnnotatedRun>> = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut tbl_depth = 0usize;

    let mut para: Option<Vec<AnnotatedRun>> = None;
    let mut p_depth = 0usize;
    let mut run: Option<AnnotatedRun> = None;
    let mut run_depth = 0usize;
    let mut in_text: Option<usize> = None;

    for ev in &doc.events {
        match ev {
            XmlEvent::Start { name, attrs } => {
                let parent = stack.last().map(|s| s.as_str()).unwrap_or("");
                if name == "w:tbl" {
                    tbl_depth += 1;
                } else if name == "w:p" && parent == "w:body" && tbl_depth == 0 {
                    para = Some(Vec::new());
                    p_depth = stack.len() + 1;
                } else if para.is_some() {
                    if name == "w:r" && parent == "w:p" && stack.len() == p_depth {
                        run = Some(AnnotatedRun::default());
                        run_depth = stack.len() + 1;
                    } else if let Some(r) = run.as_mut() {
                        if name == "w:t" && parent == "w:r" && stack.len() == run_depth {
                            in_text = Some(stack.len() + 1);
                        } else if is_control(name) {
                            if let Some(c) = control_char(name, attrs) {
                                r.text.push_str(c);
                            }
                        } else if name == "w:commentReference" {
                            if let Some(id) = find_attr(attrs, "w:id") {
                                if let Some(text) = comment_map.get(id) {
                                    r.comments.push(text.clone());
                                }
                            }
                        }
                    }
                }
                stack.push(name.clone());
            }
            XmlEvent::Empty { name, attrs } => {
                if let Some(r) = run.as_mut() {
                    if is_control(name) {
                        if let Some(c) = control_char(name, attrs) {
                            r.text.push_str(c);
                        }
                    } else if name == "w:commentReference" {
                        if let Some(id) = find_attr(attrs, "w:id") {
                            if let Some(text) = comment_map.get(id) {
                                r.comments.push(text.clone());
                            }
                        }
                    }
                } else if name == "w:p"
                    && stack.last().map(|s| s.as_str()) == Some("w:body")
                    && tbl_depth == 0
                {
                    out.push(Vec::new());
                }
            }
            XmlEvent::Text { text } => {
                if in_text.is_some() {
                    if let Some(r) = run.as_mut() {
                        r.text.push_str(text);
                    }
                }
            }
            XmlEvent::End { name } => {
                let depth = stack.len();
                if name == "w:t" && in_text == Some(depth) {
                    in_text = None;
                } else if name == "w:r" && run.is_some() && depth == run_depth {
                    if let (Some(p), Some(r)) = (para.as_mut(), run.take()) {
                        p.push(r);
                    }
                } else if name == "w:p" && para.is_some() && depth == p_depth {
                    if let Some(p) = para.take() {
                        out.push(p);
                    }
                } else if name == "w:tbl" && tbl_depth > 0 {
                    tbl_depth -= 1;
                }
                let _ = stack.pop();
            }
            _ => {}
        }
    }
    out
}
