use std::collections::BTreeMap;

use anyhow::{anyhow, Context};
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;
use sha2::{Digest, Sha256};

/// Text-bearing tags whose character data the numbering pass is allowed to
/// change. Everything else must survive byte-identically at the structural
/// level.
fn is_text_tag(name: &str) -> bool {
    name == "w:t" || name == "w:delText"
}

#[derive(Clone, Debug)]
pub enum XmlEvent {
    Decl {
        version: String,
        encoding: Option<String>,
        standalone: Option<String>,
    },
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
    CData {
        text: String,
    },
    Comment {
        text: String,
    },
    PI {
        content: String,
    },
    DocType {
        text: String,
    },
}

impl XmlEvent {
    pub fn start(name: &str, attrs: &[(&str, &str)]) -> Self {
        XmlEvent::Start {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn end(name: &str) -> Self {
        XmlEvent::End {
            name: name.to_string(),
        }
    }

    pub fn empty(name: &str, attrs: &[(&str, &str)]) -> Self {
        XmlEvent::Empty {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        XmlEvent::Text { text: text.into() }
    }
}

/// One XML part of the package, held as an event stream so text nodes can be
/// edited in place and the rest written back untouched.
#[derive(Clone)]
pub struct XmlPart {
    pub name: String,
    pub events: Vec<XmlEvent>,
    pub baseline_hash: String,
}

pub fn parse_xml_part(name: &str, xml_bytes: &[u8]) -> anyhow::Result<XmlPart> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut events: Vec<XmlEvent> = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader.read_event_into(&mut buf).context("read xml event")?;
        match ev {
            Event::Eof => break,
            Event::Decl(d) => {
                let version = decode(d.version().context("decl version")?);
                let encoding = d
                    .encoding()
                    .map(|r| r.map(decode))
                    .transpose()
                    .unwrap_or(None);
                let standalone = d
                    .standalone()
                    .map(|r| r.map(decode))
                    .transpose()
                    .unwrap_or(None);
                events.push(XmlEvent::Decl {
                    version,
                    encoding,
                    standalone,
                });
            }
            Event::Start(s) => {
                events.push(XmlEvent::Start {
                    name: decode(s.name().as_ref()),
                    attrs: collect_attrs(&s)?,
                });
            }
            Event::End(e) => {
                events.push(XmlEvent::End {
                    name: decode(e.name().as_ref()),
                });
            }
            Event::Empty(s) => {
                events.push(XmlEvent::Empty {
                    name: decode(s.name().as_ref()),
                    attrs: collect_attrs(&s)?,
                });
            }
            Event::Text(t) => {
                let text = t.unescape().context("unescape text")?.into_owned();
                events.push(XmlEvent::Text { text });
            }
            Event::CData(t) => {
                events.push(XmlEvent::CData {
                    text: decode(t.into_inner()),
                });
            }
            Event::Comment(t) => {
                events.push(XmlEvent::Comment {
                    text: decode(t.into_inner()),
                });
            }
            Event::PI(t) => {
                let target = decode(t.target());
                let rest = decode(t.content());
                let content = if rest.is_empty() {
                    target
                } else {
                    format!("{target} {rest}")
                };
                events.push(XmlEvent::PI { content });
            }
            Event::DocType(t) => {
                events.push(XmlEvent::DocType {
                    text: decode(t.into_inner()),
                });
            }
        }
    }

    let baseline_hash = structure_hash(&events);
    Ok(XmlPart {
        name: name.to_string(),
        events,
        baseline_hash,
    })
}

fn collect_attrs(s: &BytesStart<'_>) -> anyhow::Result<Vec<(String, String)>> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for a in s.attributes() {
        let a = a.context("attr")?;
        let key = decode(a.key.as_ref());
        // Keep attribute bytes raw (already escaped). Values such as VML
        // `o:gfxdata` encode CRLF as character references; unescaping and
        // re-writing them would let attribute normalization turn the
        // newlines into spaces and corrupt the embedded data.
        let val = decode(a.value.as_ref());
        attrs.push((key, val));
    }
    Ok(attrs)
}

fn decode(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

pub fn write_xml_part(part: &XmlPart) -> anyhow::Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();

    fn escape_text_into(out: &mut Vec<u8>, text: &str) {
        for ch in text.chars() {
            match ch {
                '&' => out.extend_from_slice(b"&amp;"),
                '<' => out.extend_from_slice(b"&lt;"),
                '>' => out.extend_from_slice(b"&gt;"),
                _ => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
    }

    fn write_start_like(out: &mut Vec<u8>, name: &str, attrs: &[(String, String)], empty: bool) {
        out.extend_from_slice(b"<");
        out.extend_from_slice(name.as_bytes());
        // Attribute values are raw XML bytes; escaping again would double-encode.
        for (k, v) in attrs {
            out.extend_from_slice(b" ");
            out.extend_from_slice(k.as_bytes());
            out.extend_from_slice(b"=\"");
            out.extend_from_slice(v.as_bytes());
            out.extend_from_slice(b"\"");
        }
        if empty {
            out.extend_from_slice(b"/>");
        } else {
            out.extend_from_slice(b">");
        }
    }

    for ev in &part.events {
        match ev {
            XmlEvent::Decl {
                version,
                encoding,
                standalone,
            } => {
                let d =
                    BytesDecl::new(version.as_str(), encoding.as_deref(), standalone.as_deref());
                let mut writer = quick_xml::Writer::new(Vec::new());
                writer.write_event(Event::Decl(d)).context("write decl")?;
                out.extend_from_slice(&writer.into_inner());
            }
            XmlEvent::Start { name, attrs } => {
                write_start_like(&mut out, name, attrs, false);
            }
            XmlEvent::End { name } => {
                out.extend_from_slice(b"</");
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(b">");
            }
            XmlEvent::Empty { name, attrs } => {
                write_start_like(&mut out, name, attrs, true);
            }
            XmlEvent::Text { text } => {
                escape_text_into(&mut out, text);
            }
            XmlEvent::CData { text } => {
                // CDATA must remain unescaped.
                out.extend_from_slice(b"<![CDATA[");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b"]]>");
            }
            XmlEvent::Comment { text } => {
                out.extend_from_slice(b"<!--");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b"-->");
            }
            XmlEvent::PI { content } => {
                out.extend_from_slice(b"<?");
                out.extend_from_slice(content.as_bytes());
                out.extend_from_slice(b"?>");
            }
            XmlEvent::DocType { text } => {
                out.extend_from_slice(b"<!DOCTYPE");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b">");
            }
        }
    }

    Ok(out)
}

/// Fails if anything other than text under `w:t`/`w:delText` differs from the
/// state captured at parse time.
pub fn verify_structure_unchanged(part: &XmlPart) -> anyhow::Result<()> {
    let cur = structure_hash(&part.events);
    if cur != part.baseline_hash {
        return Err(anyhow!(
            "non-text structure changed in {} (baseline={} current={})",
            part.name,
            part.baseline_hash,
            cur
        ));
    }
    Ok(())
}

pub fn structure_hash(events: &[XmlEvent]) -> String {
    let mut hasher = Sha256::new();
    let mut stack: Vec<String> = Vec::new();

    for ev in events {
        match ev {
            XmlEvent::Start { name, attrs } => {
                stack.push(name.clone());
                hash_start_like(&mut hasher, name, attrs);
            }
            XmlEvent::Empty { name, attrs } => {
                hash_start_like(&mut hasher, name, attrs);
                hash_end_like(&mut hasher, name);
            }
            XmlEvent::End { name } => {
                hash_end_like(&mut hasher, name);
                let _ = stack.pop();
            }
            XmlEvent::Text { text } => {
                let cur = stack.last().map(|s| s.as_str()).unwrap_or("");
                if is_text_tag(cur) {
                    continue;
                }
                hasher.update(b"T:");
                hasher.update(text.as_bytes());
                hasher.update(b"\n");
            }
            XmlEvent::Decl {
                version,
                encoding,
                standalone,
            } => {
                hasher.update(b"D:");
                hasher.update(version.as_bytes());
                hasher.update(b"|");
                if let Some(e) = encoding.as_ref() {
                    hasher.update(e.as_bytes());
                }
                hasher.update(b"|");
                if let Some(s) = standalone.as_ref() {
                    hasher.update(s.as_bytes());
                }
                hasher.update(b"\n");
            }
            XmlEvent::CData { text } => {
                hasher.update(b"C:");
                hasher.update(text.as_bytes());
                hasher.update(b"\n");
            }
            XmlEvent::Comment { text } => {
                hasher.update(b"M:");
                hasher.update(text.as_bytes());
                hasher.update(b"\n");
            }
            XmlEvent::PI { content } => {
                hasher.update(b"P:");
                hasher.update(content.as_bytes());
                hasher.update(b"\n");
            }
            XmlEvent::DocType { text } => {
                hasher.update(b"Y:");
                hasher.update(text.as_bytes());
                hasher.update(b"\n");
            }
        }
    }
    hex::encode(hasher.finalize())
}

fn hash_start_like(hasher: &mut Sha256, name: &str, attrs: &[(String, String)]) {
    hasher.update(b"S:");
    hasher.update(name.as_bytes());
    hasher.update(b"|");

    // xml:space is excluded: editing a text node may add or drop
    // space-preservation without that counting as a structural change.
    let mut map: BTreeMap<&str, &str> = BTreeMap::new();
    for (k, v) in attrs {
        if k == "xml:space" {
            continue;
        }
        map.insert(k, v);
    }
    for (k, v) in map {
        hasher.update(k.as_bytes());
        hasher.update(b"=");
        hasher.update(v.as_bytes());
        hasher.update(b";");
    }
    hasher.update(b"\n");
}

fn hash_end_like(hasher: &mut Sha256, name: &str) {
    hasher.update(b"E:");
    hasher.update(name.as_bytes());
    hasher.update(b"\n");
}
