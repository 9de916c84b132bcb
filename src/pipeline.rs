use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{anyhow, Context};
use serde::Serialize;

use crate::docx::document::{
    annotated_body_runs, extract_paragraphs, node_text, rebuild_paragraph_runs, set_node_text,
};
use crate::docx::emit::two_column_table_package;
use crate::docx::package::DocxPackage;
use crate::docx::xml::{parse_xml_part, verify_structure_unchanged, write_xml_part, XmlPart};
use crate::ir::{Paragraph, Replacement};
use crate::number::{NumberAssigner, NumberingOrder};
use crate::pattern::TokenPattern;
use crate::progress::ConsoleProgress;
use crate::reduce::{reduce_annotations, Glossary};
use crate::rewrite::{
    apply_node_edits, group_by_node, plan_rewrites, renumber_paragraph_fallback, FallbackOutcome,
};
use crate::scan::{collect_matches, traversal_order};

pub struct EnumerateOptions {
    pub prefixes: Vec<String>,
    pub pattern: TokenPattern,
    pub order: NumberingOrder,
    /// Whole-paragraph strategy: match the concatenated surface and rebuild
    /// runs when a placeholder straddles spans.
    pub fallback_runs: bool,
    /// Refuse to save when anything besides text changed (span path only;
    /// a rebuild replaces elements on purpose).
    pub verify_structure: bool,
}

impl Default for EnumerateOptions {
    fn default() -> Self {
        Self {
            prefixes: vec!["REQ".to_string(), "SYS".to_string()],
            pattern: TokenPattern::default(),
            order: NumberingOrder::Document,
            fallback_runs: false,
            verify_structure: true,
        }
    }
}

/// What one enumeration run did: per-prefix generated tags in assignment
/// order, the full per-match records, and any non-fatal warnings.
#[derive(Serialize)]
pub struct Report {
    pub tags: BTreeMap<String, Vec<String>>,
    pub replacements: Vec<Replacement>,
    pub warnings: Vec<String>,
}

impl Report {
    fn new(replacements: Vec<Replacement>, warnings: Vec<String>) -> Self {
        let mut tags: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for r in &replacements {
            tags.entry(r.prefix.clone())
                .or_default()
                .push(r.generated.clone());
        }
        Self {
            tags,
            replacements,
            warnings,
        }
    }

    pub fn total(&self) -> usize {
        self.replacements.len()
    }
}

pub fn write_report_json(report: &Report, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("write report: {}", path.display()))?;
    Ok(())
}

pub struct Enumerator {
    opts: EnumerateOptions,
    progress: ConsoleProgress,
}

impl Enumerator {
    pub fn new(opts: EnumerateOptions, progress: ConsoleProgress) -> Self {
        Self { opts, progress }
    }

    pub fn renumber_docx(&self, input: &Path, output: &Path) -> anyhow::Result<Report> {
        self.progress.info(format!("Read DOCX: {}", input.display()));
        let pkg = DocxPackage::read(input)?;

        let mut parts: HashMap<String, XmlPart> = HashMap::new();
        let paragraphs = extract_paragraphs(&pkg, &mut parts)?;
        self.progress
            .info(format!("Scanned {} paragraphs", paragraphs.len()));

        let mut warnings: Vec<String> = Vec::new();
        for para in &paragraphs {
            if let Err(reason) = &para.overlay {
                let msg = format!("revision scan failed in {}: {reason}", para.region);
                self.progress.warn(&msg);
                warnings.push(msg);
            }
        }
        if self.opts.fallback_runs && self.opts.order == NumberingOrder::Prefix {
            let msg =
                "whole-paragraph strategy assigns numbers in document order; --order prefix ignored"
                    .to_string();
            self.progress.warn(&msg);
            warnings.push(msg);
        }

        let mut assigner = NumberAssigner::new();
        let replacements = if self.opts.fallback_runs {
            self.apply_fallback(&paragraphs, &mut parts, &mut assigner)?
        } else {
            self.apply_in_place(&paragraphs, &mut parts, &mut assigner)?
        };
        self.progress
            .info(format!("Replaced {} placeholders", replacements.len()));

        let verify = self.opts.verify_structure && !self.opts.fallback_runs;
        write_docx_with_parts(&pkg, &parts, output, verify)?;
        self.progress.info(format!("Saved: {}", output.display()));

        Ok(Report::new(replacements, warnings))
    }

    fn apply_in_place(
        &self,
        paragraphs: &[Paragraph],
        parts: &mut HashMap<String, XmlPart>,
        assigner: &mut NumberAssigner,
    ) -> anyhow::Result<Vec<Replacement>> {
        let matches = collect_matches(
            paragraphs,
            &self.opts.pattern,
            &self.opts.prefixes,
            self.opts.order,
        );
        let (records, edits) = plan_rewrites(&matches, assigner);
        for group in group_by_node(edits) {
            let text = node_text(parts, &group.node)?;
            let new_text = apply_node_edits(&text, &group)
                .with_context(|| format!("apply edits in {}", group.node.part_name))?;
            set_node_text(parts, &group.node, &new_text)?;
        }
        Ok(records)
    }

    fn apply_fallback(
        &self,
        paragraphs: &[Paragraph],
        parts: &mut HashMap<String, XmlPart>,
        assigner: &mut NumberAssigner,
    ) -> anyhow::Result<Vec<Replacement>> {
        let mut records: Vec<Replacement> = Vec::new();
        // Rebuilds splice the event stream and shift indices, so they are
        // collected first and applied back to front per part.
        let mut rebuilds: Vec<(String, usize, usize, Vec<String>)> = Vec::new();

        for para in traversal_order(paragraphs) {
            let outcome = renumber_paragraph_fallback(
                para,
                &self.opts.pattern,
                &self.opts.prefixes,
                assigner,
                &mut records,
            )
            .with_context(|| format!("renumber paragraph in {}", para.region))?;
            match outcome {
                FallbackOutcome::Untouched => {}
                FallbackOutcome::InPlace(list) => {
                    for (node, text) in list {
                        set_node_text(parts, &node, &text)?;
                    }
                }
                FallbackOutcome::Rebuilt(texts) => {
                    rebuilds.push((
                        para.part_name.clone(),
                        para.start_event,
                        para.end_event,
                        texts,
                    ));
                }
            }
        }

        rebuilds.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
        for (part_name, start, end, texts) in rebuilds {
            let part = parts
                .get_mut(&part_name)
                .ok_or_else(|| anyhow!("missing part: {part_name}"))?;
            rebuild_paragraph_runs(part, start, end, &texts)
                .with_context(|| format!("rebuild paragraph in {part_name}"))?;
        }
        Ok(records)
    }
}

/// Reduces run comment annotations into the two glossary maps and writes
/// each as its own one-table document.
pub fn extract_glossary_docx(
    progress: &ConsoleProgress,
    input: &Path,
    abbr_output: &Path,
    terms_output: &Path,
) -> anyhow::Result<Glossary> {
    progress.info(format!("Read DOCX: {}", input.display()));
    let pkg = DocxPackage::read(input)?;
    let doc_ent = pkg.entry("word/document.xml")?;
    let doc = parse_xml_part(&doc_ent.name, &doc_ent.data).context("parse word/document.xml")?;
    let comments = if pkg.has_entry("word/comments.xml") {
        let ent = pkg.entry("word/comments.xml")?;
        Some(parse_xml_part(&ent.name, &ent.data).context("parse word/comments.xml")?)
    } else {
        None
    };

    let annotated = annotated_body_runs(&doc, comments.as_ref());
    let (glossary, warnings) = reduce_annotations(&annotated);
    for w in &warnings {
        progress.warn(w);
    }
    progress.info(format!(
        "Abbreviations: {}  Terms: {}",
        glossary.abbreviations.len(),
        glossary.terms.len()
    ));

    two_column_table_package(("Abbreviation", "Meaning"), glossary.abbreviations.entries())?
        .write(abbr_output)?;
    progress.info(format!("Saved: {}", abbr_output.display()));
    two_column_table_package(("Term", "Definition"), glossary.terms.entries())?
        .write(terms_output)?;
    progress.info(format!("Saved: {}", terms_output.display()));

    Ok(glossary)
}

fn write_docx_with_parts(
    pkg: &DocxPackage,
    parts: &HashMap<String, XmlPart>,
    output: &Path,
    verify: bool,
) -> anyhow::Result<()> {
    let mut replacements: HashMap<String, Vec<u8>> = HashMap::new();
    for (name, part) in parts.iter() {
        if verify {
            verify_structure_unchanged(part)
                .with_context(|| format!("verify structure: {name}"))?;
        }
        let bytes = write_xml_part(part).with_context(|| format!("serialize xml: {name}"))?;
        replacements.insert(name.clone(), bytes);
    }
    pkg.write_with_replacements(output, &replacements)?;
    Ok(())
}
