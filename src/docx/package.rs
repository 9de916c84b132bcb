use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{anyhow, Context};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// A `.docx` held as its raw zip entries, in archive order. Entry metadata is
/// kept so a rewrite reproduces the container apart from the parts we touch.
pub struct DocxPackage {
    pub entries: Vec<DocxEntry>,
}

pub struct DocxEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
}

impl DocxPackage {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let f = File::open(path).with_context(|| format!("open docx: {}", path.display()))?;
        let mut zip = ZipArchive::new(f).context("read zip")?;
        let mut entries = Vec::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).context("zip entry")?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data).context("read zip entry")?;
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    /// Build a package from scratch, for generated documents. All parts are
    /// deflated, in the given order.
    pub fn from_parts(parts: Vec<(String, Vec<u8>)>) -> Self {
        let entries = parts
            .into_iter()
            .map(|(name, data)| DocxEntry {
                name,
                data,
                compression: CompressionMethod::Deflated,
                last_modified: zip::DateTime::default(),
                unix_mode: None,
                is_dir: false,
            })
            .collect();
        Self { entries }
    }

    pub fn entry(&self, name: &str) -> anyhow::Result<&DocxEntry> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| anyhow!("missing package part: {name}"))
    }

    pub fn has_entry(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn write(&self, output_path: &Path) -> anyhow::Result<()> {
        self.write_with_replacements(output_path, &HashMap::new())
    }

    pub fn write_with_replacements(
        &self,
        output_path: &Path,
        replacements: &HashMap<String, Vec<u8>>,
    ) -> anyhow::Result<()> {
        let f = File::create(output_path)
            .with_context(|| format!("create output docx: {}", output_path.display()))?;
        let mut zout = ZipWriter::new(f);
        for ent in &self.entries {
            let data = replacements
                .get(&ent.name)
                .map(|d| d.as_slice())
                .unwrap_or(&ent.data);
            let mut opts = SimpleFileOptions::default()
                .compression_method(ent.compression)
                .last_modified_time(ent.last_modified);
            if let Some(mode) = ent.unix_mode {
                opts = opts.unix_permissions(mode);
            }
            if ent.is_dir || ent.name.ends_with('/') {
                zout.add_directory(&ent.name, opts)
                    .with_context(|| format!("add zip dir: {}", ent.name))?;
            } else {
                zout.start_file(&ent.name, opts)
                    .with_context(|| format!("start zip file: {}", ent.name))?;
                zout.write_all(data)
                    .with_context(|| format!("write zip file: {}", ent.name))?;
            }
        }
        zout.finish().context("finish zip")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::DocxPackage;
    use std::collections::HashMap;

    #[test]
    fn round_trip_preserves_untouched_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("in.docx");
        let dst = dir.path().join("out.docx");

        let pkg = DocxPackage::from_parts(vec![
            ("[Content_Types].xml".to_string(), b"<Types/>".to_vec()),
            ("word/document.xml".to_string(), b"<w:document/>".to_vec()),
        ]);
        pkg.write(&src).expect("write source");

        let loaded = DocxPackage::read(&src).expect("read source");
        assert_eq!(
            loaded.entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            vec!["[Content_Types].xml", "word/document.xml"]
        );

        let mut repl = HashMap::new();
        repl.insert("word/document.xml".to_string(), b"<w:document>x</w:document>".to_vec());
        loaded
            .write_with_replacements(&dst, &repl)
            .expect("write output");

        let back = DocxPackage::read(&dst).expect("read output");
        assert_eq!(back.entry("[Content_Types].xml").unwrap().data, b"<Types/>");
        assert_eq!(
            back.entry("word/document.xml").unwrap().data,
            b"<w:document>x</w:document>"
        );
    }
}
