use anyhow::{anyhow, Context};
use once_cell::sync::Lazy;
use regex::Regex;

/// Matches `[PREFIX-XXX]` with a case-insensitive `XXX` placeholder. The
/// generated `[PREFIX-001]` form does not re-match, so a second pass over an
/// already numbered document finds nothing.
pub const DEFAULT_PATTERN: &str = r"\[([A-Z]+)-[Xx][Xx][Xx]\]";

static DEFAULT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(DEFAULT_PATTERN).expect("default token pattern"));

/// A compiled token pattern. Exactly one capturing group is required; it
/// yields the prefix.
#[derive(Clone, Debug)]
pub struct TokenPattern {
    re: Regex,
}

/// One pattern occurrence within a single text, with byte offsets into it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenHit {
    pub prefix: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl TokenPattern {
    pub fn new(pattern: &str) -> anyhow::Result<Self> {
        let re = Regex::new(pattern)
            .with_context(|| format!("compile token pattern: {pattern}"))?;
        let groups = re.captures_len() - 1;
        if groups != 1 {
            return Err(anyhow!(
                "token pattern needs exactly one capturing group for the prefix, found {groups}: {pattern}"
            ));
        }
        Ok(Self { re })
    }

    /// All non-overlapping hits in `text`, left to right. Hits whose capture
    /// group did not participate are dropped.
    pub fn hits(&self, text: &str) -> Vec<TokenHit> {
        let mut out = Vec::new();
        for caps in self.re.captures_iter(text) {
            let (Some(whole), Some(prefix)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push(TokenHit {
                prefix: prefix.as_str().to_string(),
                text: whole.as_str().to_string(),
                start: whole.start(),
                end: whole.end(),
            });
        }
        out
    }
}

impl Default for TokenPattern {
    fn default() -> Self {
        TokenPattern {
            re: DEFAULT_RE.clone(),
        }
    }
}

/// `[REQ-001]` style tag. The pad is three digits and widens silently past
/// 999.
pub fn format_tag(prefix: &str, number: u32) -> String {
    format!("[{prefix}-{number:03}]")
}
