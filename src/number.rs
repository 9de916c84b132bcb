use std::collections::BTreeMap;

use anyhow::anyhow;

/// Whether matches are processed in document-traversal order or batched by
/// prefix. Per-prefix numbers come out identical either way; the choice is
/// visible in the physical rewrite sequence and in report record order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NumberingOrder {
    #[default]
    Document,
    Prefix,
}

impl NumberingOrder {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" => Ok(NumberingOrder::Document),
            "prefix" => Ok(NumberingOrder::Prefix),
            other => Err(anyhow!(
                "unknown numbering order: {other} (expected document or prefix)"
            )),
        }
    }
}

/// Per-prefix sequence counters, 1-based, never reset within a run. One
/// instance is threaded through a whole invocation; there is no ambient
/// counter state anywhere else.
#[derive(Debug, Default)]
pub struct NumberAssigner {
    counters: BTreeMap<String, u32>,
}

impl NumberAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the next number for `prefix` and advances its counter.
    pub fn next(&mut self, prefix: &str) -> u32 {
        let slot = self.counters.entry(prefix.to_string()).or_insert(1);
        let n = *slot;
        *slot += 1;
        n
    }

    /// How many numbers have been handed out for `prefix`.
    pub fn issued(&self, prefix: &str) -> u32 {
        self.counters.get(prefix).map(|n| n - 1).unwrap_or(0)
    }
}
