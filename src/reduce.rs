use anyhow::anyhow;

use crate::ir::AnnotatedRun;

/// Insertion-ordered string map with overwrite-in-place semantics: a
/// duplicate key replaces the value but keeps the first position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderedMap {
    entries: Vec<(String, String)>,
}

impl OrderedMap {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The two tables produced by the glossary pass.
#[derive(Clone, Debug, Default)]
pub struct Glossary {
    pub abbreviations: OrderedMap,
    pub terms: OrderedMap,
}

/// Folds annotated body runs into abbreviation and term tables, top to
/// bottom. The anchor is the most recent non-blank run text and carries
/// across paragraph boundaries. `@rest` records `abbreviations[anchor] =
/// rest`; `#key: value` records a term with both halves trimmed. A `#`
/// annotation without the separator abandons the rest of that paragraph
/// only; the returned warnings name each abandoned paragraph.
pub fn reduce_annotations(paragraphs: &[Vec<AnnotatedRun>]) -> (Glossary, Vec<String>) {
    let mut glossary = Glossary::default();
    let mut warnings = Vec::new();
    let mut anchor = String::new();
    for runs in paragraphs {
        if let Err(err) = reduce_paragraph(runs, &mut anchor, &mut glossary) {
            let lead = runs
                .first()
                .map(|r| r.text.as_str())
                .unwrap_or("empty paragraph");
            warnings.push(format!("skipped paragraph ({lead}): {err}"));
        }
    }
    (glossary, warnings)
}

fn reduce_paragraph(
    runs: &[AnnotatedRun],
    anchor: &mut String,
    glossary: &mut Glossary,
) -> anyhow::Result<()> {
    for run in runs {
        let trimmed = run.text.trim();
        if !trimmed.is_empty() {
            *anchor = trimmed.to_string();
        }
        for comment in &run.comments {
            let note = comment.trim();
            if let Some(rest) = note.strip_prefix('@') {
                glossary.abbreviations.insert(anchor.clone(), rest);
            } else if let Some(rest) = note.strip_prefix('#') {
                let Some((term, definition)) = rest.split_once(':') else {
                    return Err(anyhow!("term annotation missing ':' separator: {note}"));
                };
                glossary.terms.insert(term.trim(), definition.trim());
            }
        }
    }
    Ok(())
}
