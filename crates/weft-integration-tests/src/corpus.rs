//! Round-trip runs over named sources

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;
use weft_core::round_trip::RoundTripValidator;

/// Small programs exercising every construct the parser knows
pub const SAMPLE_SOURCES: &[(&str, &str)] = &[
    ("empty.py", ""),
    ("assign.py", "x = 1\ny = x + 2  # sum\n"),
    (
        "functions.py",
        "# helpers\n\ndef add(a, b=0):\n    return a + b\n\n\ndef noop():\n    pass\n",
    ),
    (
        "branches.py",
        "if ready:\n    go()\nelif waiting:\n    # not yet\n    wait(1)\nelse:\n    stop()\n",
    ),
    (
        "calls.py",
        "result = client.fetch(\n    'items',  # what\n    limit=10,\n)\n",
    ),
    ("crlf.py", "a = 1\r\nb = a * 2\r\n"),
    ("no_newline.py", "value = 'end'"),
    ("semicolons.py", "a = 1; b = 2; print(a, b)\n"),
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusEntry {
    pub name: String,
    pub lossless: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusReport {
    pub total: usize,
    pub lossless: usize,
    pub entries: Vec<CorpusEntry>,
}

impl CorpusReport {
    pub fn all_lossless(&self) -> bool {
        self.lossless == self.total
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing corpus report")
    }
}

/// Validate every `(name, source)` pair
///
/// Fails on the first source that does not parse.
pub fn run_corpus(sources: &[(&str, &str)]) -> Result<CorpusReport> {
    let validator = RoundTripValidator::new();
    let mut entries = Vec::with_capacity(sources.len());
    for (name, source) in sources {
        let report = validator
            .validate(source)
            .with_context(|| format!("parsing {name}"))?;
        entries.push(CorpusEntry {
            name: (*name).to_string(),
            lossless: report.is_lossless(),
            issues: report.issues(),
        });
    }

    let lossless = entries.iter().filter(|entry| entry.lossless).count();
    info!("{} of {} sources round-trip", lossless, entries.len());
    Ok(CorpusReport {
        total: entries.len(),
        lossless,
        entries,
    })
}
