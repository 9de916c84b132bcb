use std::fmt;

use serde::Serialize;

/// Address of one text leaf (`w:t` or `w:delText`) inside a part's event
/// stream. Indices stay valid as long as no events are inserted or removed
/// in that part.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub part_name: String,
    /// Start event of the enclosing text element.
    pub elem_event_index: usize,
    /// Text event carrying the characters.
    pub text_event_index: usize,
}

/// Whether a span sits in visible text or inside a revision group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanOrigin {
    Visible,
    Inserted,
    Deleted,
}

/// One text leaf with its content captured at extraction time. Identity (the
/// node ref) survives a rewrite; only the text changes.
#[derive(Clone, Debug)]
pub struct Span {
    pub node: NodeRef,
    pub text: String,
    pub origin: SpanOrigin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RegionKind {
    Body,
    TableCell { table: usize, row: usize, cell: usize },
    Header { section: usize },
    Footer { section: usize },
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKind::Body => write!(f, "body"),
            RegionKind::TableCell { table, row, cell } => {
                write!(f, "table {table} row {row} cell {cell}")
            }
            RegionKind::Header { section } => write!(f, "header {section}"),
            RegionKind::Footer { section } => write!(f, "footer {section}"),
        }
    }
}

/// Ordered surface content of a paragraph: visible span texts interleaved
/// with run controls (tab, break, no-break hyphen) in document order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfacePiece {
    /// Index into the paragraph's visible spans.
    Span(usize),
    /// Control element mapped to its plain-text form.
    Control(&'static str),
}

/// One paragraph-like region. `spans` are the visible leaves in document
/// order; `overlay` holds leaves under `w:ins`/`w:del` revision groups, or
/// the reason that walk failed. `pieces` indexes into `spans` and is always
/// consistent with it.
#[derive(Clone, Debug)]
pub struct Paragraph {
    pub region: RegionKind,
    pub part_name: String,
    /// Event range of the `w:p` element in its part, inclusive.
    pub start_event: usize,
    pub end_event: usize,
    pub spans: Vec<Span>,
    pub overlay: Result<Vec<Span>, String>,
    pub pieces: Vec<SurfacePiece>,
}

impl Paragraph {
    /// Visible text with controls mapped to plain characters, the form the
    /// whole-paragraph strategy matches against.
    pub fn surface(&self) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                SurfacePiece::Span(i) => out.push_str(&self.spans[*i].text),
                SurfacePiece::Control(c) => out.push_str(c),
            }
        }
        out
    }
}

/// A token located in one span. Offsets are byte positions into that span's
/// text as captured at collection time; `start < end <= text.len()`.
#[derive(Clone, Debug)]
pub struct TokenMatch {
    pub prefix: String,
    pub matched_text: String,
    pub node: NodeRef,
    pub start: usize,
    pub end: usize,
    pub origin: SpanOrigin,
    pub region: RegionKind,
}

/// One numbered rewrite, as recorded in the run report.
#[derive(Clone, Debug, Serialize)]
pub struct Replacement {
    pub prefix: String,
    pub number: u32,
    pub original: String,
    pub generated: String,
    pub origin: SpanOrigin,
    pub region: RegionKind,
}

/// One run of a body paragraph paired with the review comments anchored on
/// it, for the glossary pass.
#[derive(Clone, Debug, Default)]
pub struct AnnotatedRun {
    pub text: String,
    pub comments: Vec<String>,
}
