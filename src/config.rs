use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILENAME: &str = "reqnum.toml";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub numbering: NumberingSection,
    #[serde(default)]
    pub glossary: GlossarySection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct NumberingSection {
    /// Prefixes whose placeholders get numbered. Others are left alone.
    #[serde(default)]
    pub prefixes: Option<Vec<String>>,

    /// Placeholder pattern. Must carry exactly one capture group (the prefix).
    #[serde(default)]
    pub pattern: Option<String>,

    /// Assignment order: "document" or "prefix".
    #[serde(default)]
    pub order: Option<String>,

    /// Verify that only text changed before saving (in-place path only).
    #[serde(default)]
    pub verify_structure: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct GlossarySection {
    /// Output stem suffix for the abbreviation table (default "_abbr").
    #[serde(default)]
    pub abbr_suffix: Option<String>,

    /// Output stem suffix for the term table (default "_terms").
    #[serde(default)]
    pub terms_suffix: Option<String>,
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}
