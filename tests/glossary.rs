use std::collections::HashMap;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

use reqnum::docx::document::extract_paragraphs;
use reqnum::docx::package::DocxPackage;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

fn annotated_docx(dir: &Path, name: &str) -> PathBuf {
    let body = r#"<w:p><w:r><w:t>API</w:t></w:r><w:r><w:commentReference w:id="1"/></w:r></w:p><w:p><w:r><w:t>The latency budget</w:t><w:commentReference w:id="2"/></w:r></w:p><w:p><w:r><w:t>Broken</w:t><w:commentReference w:id="3"/></w:r></w:p><w:p><w:r><w:t>API</w:t></w:r><w:r><w:commentReference w:id="4"/></w:r></w:p><w:p><w:r><w:t>UAV</w:t></w:r></w:p><w:p><w:r><w:t> </w:t></w:r><w:r><w:commentReference w:id="5"/></w:r></w:p>"#;
    let doc = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );
    let comments = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:comments xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:comment w:id="1" w:author="rev"><w:p><w:r><w:t>@Application Programming Interface</w:t></w:r></w:p></w:comment><w:comment w:id="2" w:author="rev"><w:p><w:r><w:t>#Latency: Time from stimulus to response</w:t></w:r></w:p></w:comment><w:comment w:id="3" w:author="rev"><w:p><w:r><w:t>#NoSeparator</w:t></w:r></w:p></w:comment><w:comment w:id="4" w:author="rev"><w:p><w:r><w:t>@Application Programming Interface v2</w:t></w:r></w:p></w:comment><w:comment w:id="5" w:author="rev"><w:p><w:r><w:t>@Unmanned Aerial Vehicle</w:t></w:r></w:p></w:comment></w:comments>"#;

    let pkg = DocxPackage::from_parts(vec![
        (
            "[Content_Types].xml".to_string(),
            CONTENT_TYPES.as_bytes().to_vec(),
        ),
        ("_rels/.rels".to_string(), ROOT_RELS.as_bytes().to_vec()),
        ("word/document.xml".to_string(), doc.into_bytes()),
        ("word/comments.xml".to_string(), comments.as_bytes().to_vec()),
    ]);
    let path = dir.join(name);
    pkg.write(&path).expect("write fixture docx");
    path
}

fn table_surfaces(path: &Path) -> Vec<String> {
    let pkg = DocxPackage::read(path).expect("read glossary docx");
    let mut parts = HashMap::new();
    let paras = extract_paragraphs(&pkg, &mut parts).expect("extract glossary");
    paras.iter().map(|p| p.surface()).collect()
}

#[test]
fn reduces_annotations_into_two_tables() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = annotated_docx(dir.path(), "requirements.docx");
    let abbr = dir.path().join("abbr.docx");
    let terms = dir.path().join("terms.docx");

    cargo_bin_cmd!("reqnum")
        .arg(&input)
        .arg("--extract-glossary")
        .arg("--abbr-output")
        .arg(&abbr)
        .arg("--terms-output")
        .arg(&terms)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Abbreviations table has been written to")
                .and(predicate::str::contains("(2 entries)"))
                .and(predicate::str::contains("Terms table has been written to"))
                .and(predicate::str::contains("(1 entries)")),
        )
        .stderr(predicate::str::contains("skipped paragraph (Broken)"));

    // Duplicate key kept its first position with the last value; the blank
    // run did not move the anchor off "UAV".
    assert_eq!(
        table_surfaces(&abbr),
        vec![
            "Abbreviation".to_string(),
            "Meaning".to_string(),
            "API".to_string(),
            "Application Programming Interface v2".to_string(),
            "UAV".to_string(),
            "Unmanned Aerial Vehicle".to_string(),
        ]
    );
    assert_eq!(
        table_surfaces(&terms),
        vec![
            "Term".to_string(),
            "Definition".to_string(),
            "Latency".to_string(),
            "Time from stimulus to response".to_string(),
        ]
    );
}

#[test]
fn default_outputs_sit_next_to_the_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = annotated_docx(dir.path(), "requirements.docx");

    cargo_bin_cmd!("reqnum")
        .arg(&input)
        .arg("--extract-glossary")
        .arg("--quiet")
        .assert()
        .success();

    assert!(dir.path().join("requirements_abbr.docx").exists());
    assert!(dir.path().join("requirements_terms.docx").exists());
}

#[test]
fn document_without_comments_yields_empty_tables() {
    let dir = tempfile::tempdir().expect("tempdir");
    let doc = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>plain text</w:t></w:r></w:p></w:body></w:document>"#;
    let pkg = DocxPackage::from_parts(vec![
        (
            "[Content_Types].xml".to_string(),
            CONTENT_TYPES.as_bytes().to_vec(),
        ),
        ("_rels/.rels".to_string(), ROOT_RELS.as_bytes().to_vec()),
        ("word/document.xml".to_string(), doc.as_bytes().to_vec()),
    ]);
    let input = dir.path().join("plain.docx");
    pkg.write(&input).expect("write fixture docx");
    let abbr = dir.path().join("abbr.docx");
    let terms = dir.path().join("terms.docx");

    cargo_bin_cmd!("reqnum")
        .arg(&input)
        .arg("--extract-glossary")
        .arg("--abbr-output")
        .arg(&abbr)
        .arg("--terms-output")
        .arg(&terms)
        .assert()
        .success();

    assert_eq!(
        table_surfaces(&abbr),
        vec!["Abbreviation".to_string(), "Meaning".to_string()]
    );
    assert_eq!(
        table_surfaces(&terms),
        vec!["Term".to_string(), "Definition".to_string()]
    );
}
