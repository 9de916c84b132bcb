use crate::docx::package::DocxPackage;
use crate::docx::xml::{write_xml_part, XmlEvent, XmlPart};

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

fn push_cell(events: &mut Vec<XmlEvent>, text: &str) {
    events.push(XmlEvent::start("w:tc", &[]));
    events.push(XmlEvent::start("w:tcPr", &[]));
    events.push(XmlEvent::empty(
        "w:tcW",
        &[("w:w", "4675"), ("w:type", "dxa")],
    ));
    events.push(XmlEvent::end("w:tcPr"));
    events.push(XmlEvent::start("w:p", &[]));
    if !text.is_empty() {
        events.push(XmlEvent::start("w:r", &[]));
        if text.starts_with(' ') || text.ends_with(' ') {
            events.push(XmlEvent::start("w:t", &[("xml:space", "preserve")]));
        } else {
            events.push(XmlEvent::start("w:t", &[]));
        }
        events.push(XmlEvent::text(text));
        events.push(XmlEvent::end("w:t"));
        events.push(XmlEvent::end("w:r"));
    }
    events.push(XmlEvent::end("w:p"));
    events.push(XmlEvent::end("w:tc"));
}

fn push_row(events: &mut Vec<XmlEvent>, left: &str, right: &str) {
    events.push(XmlEvent::start("w:tr", &[]));
    push_cell(events, left);
    push_cell(events, right);
    events.push(XmlEvent::end("w:tr"));
}

/// Builds a standalone one-table document: a bordered two column table with
/// a title row followed by one row per entry.
pub fn two_column_table_package(
    headers: (&str, &str),
    rows: &[(String, String)],
) -> anyhow::Result<DocxPackage> {
    let mut ev: Vec<XmlEvent> = vec![
        XmlEvent::start("w:document", &[("xmlns:w", WORDML_NS)]),
        XmlEvent::start("w:body", &[]),
        XmlEvent::start("w:tbl", &[]),
        XmlEvent::start("w:tblPr", &[]),
        XmlEvent::empty("w:tblStyle", &[("w:val", "TableGrid")]),
        XmlEvent::empty("w:tblW", &[("w:w", "0"), ("w:type", "auto")]),
        XmlEvent::start("w:tblBorders", &[]),
    ];
    for side in ["w:top", "w:left", "w:bottom", "w:right", "w:insideH", "w:insideV"] {
        ev.push(XmlEvent::empty(
            side,
            &[
                ("w:val", "single"),
                ("w:sz", "4"),
                ("w:space", "0"),
                ("w:color", "auto"),
            ],
        ));
    }
    ev.push(XmlEvent::end("w:tblBorders"));
    ev.push(XmlEvent::end("w:tblPr"));
    ev.push(XmlEvent::start("w:tblGrid", &[]));
    ev.push(XmlEvent::empty("w:gridCol", &[("w:w", "4675")]));
    ev.push(XmlEvent::empty("w:gridCol", &[("w:w", "4675")]));
    ev.push(XmlEvent::end("w:tblGrid"));

    push_row(&mut ev, headers.0, headers.1);
    for (left, right) in rows {
        push_row(&mut ev, left, right);
    }

    ev.push(XmlEvent::end("w:tbl"));
    ev.push(XmlEvent::start("w:sectPr", &[]));
    ev.push(XmlEvent::empty(
        "w:pgSz",
        &[("w:w", "11906"), ("w:h", "16838")],
    ));
    ev.push(XmlEvent::end("w:sectPr"));
    ev.push(XmlEvent::end("w:body"));
    ev.push(XmlEvent::end("w:document"));

    let part = XmlPart {
        name: "word/document.xml".to_string(),
        events: ev,
        baseline_hash: String::new(),
    };
    let doc_bytes = write_xml_part(&part)?;

    Ok(DocxPackage::from_parts(vec![
        (
            "[Content_Types].xml".to_string(),
            CONTENT_TYPES_XML.as_bytes().to_vec(),
        ),
        ("_rels/.rels".to_string(), ROOT_RELS_XML.as_bytes().to_vec()),
        ("word/document.xml".to_string(), doc_bytes),
    ]))
}

#[cfg(test)]
mod tests {
    use super::two_column_table_package;
    use crate::docx::document::extract_paragraphs;
    use crate::ir::RegionKind;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn emitted_table_reads_back_row_by_row() {
        let rows = vec![
            ("API".to_string(), "Application Programming Interface".to_string()),
            ("UAV".to_string(), "Unmanned Aerial Vehicle".to_string()),
        ];
        let pkg = two_column_table_package(("Abbreviation", "Meaning"), &rows).expect("emit");

        let mut parts = HashMap::new();
        let paras = extract_paragraphs(&pkg, &mut parts).expect("extract");
        let got: Vec<(String, RegionKind)> =
            paras.iter().map(|p| (p.surface(), p.region)).collect();
        let cell = |row: usize, cell: usize| RegionKind::TableCell {
            table: 1,
            row,
            cell,
        };
        assert_eq!(
            got,
            vec![
                ("Abbreviation".to_string(), cell(1, 1)),
                ("Meaning".to_string(), cell(1, 2)),
                ("API".to_string(), cell(2, 1)),
                (
                    "Application Programming Interface".to_string(),
                    cell(2, 2)
                ),
                ("UAV".to_string(), cell(3, 1)),
                ("Unmanned Aerial Vehicle".to_string(), cell(3, 2)),
            ]
        );
    }

    #[test]
    fn package_carries_required_parts() {
        let pkg = two_column_table_package(("Term", "Definition"), &[]).expect("emit");
        assert!(pkg.has_entry("[Content_Types].xml"));
        assert!(pkg.has_entry("_rels/.rels"));
        assert!(pkg.has_entry("word/document.xml"));
    }
}
