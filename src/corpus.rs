//! Benchmark corpus of known compiler bugs
//!
//! One record per line:
//! `<bug id>,<revision>,<passing descriptor>,<failing descriptor>,<file>+<file>...`
//! Descriptors use `+` in place of spaces. Blank lines and `#` comments are skipped.

use crate::configuration::Configuration;
use crate::error::{SflError, SflResult};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// One benchmark bug driving an end-to-end localization run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugRecord {
    pub id: String,
    pub revision: String,
    pub passing: Configuration,
    pub failing: Configuration,
    /// Ground-truth buggy files, relative to the build root
    pub buggy_files: Vec<String>,
}

impl BugRecord {
    /// Parse one corpus line (`line_no` is only used for error messages)
    pub fn parse(line: &str, line_no: usize) -> SflResult<Self> {
        let fields: Vec<&str> = line.trim().split(',').collect();
        if fields.len() != 5 {
            return Err(SflError::CorpusFormat {
                line: line_no,
                reason: format!("expected 5 fields, found {}", fields.len()),
            });
        }
        if fields[0].is_empty() || fields[1].is_empty() {
            return Err(SflError::CorpusFormat {
                line: line_no,
                reason: "bug id and revision must be non-empty".to_string(),
            });
        }

        let buggy_files: Vec<String> = fields[4]
            .split('+')
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            id: fields[0].to_string(),
            revision: fields[1].to_string(),
            passing: Configuration::from_descriptor(fields[2]),
            failing: Configuration::from_descriptor(fields[3]),
            buggy_files,
        })
    }
}

/// Parse a whole corpus description
pub fn parse_corpus(content: &str) -> SflResult<Vec<BugRecord>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| BugRecord::parse(line, i + 1))
        .collect()
}

/// Load the corpus description from disk
pub fn load_corpus<P: AsRef<Path>>(path: P) -> Result<Vec<BugRecord>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read corpus file: {}", path.as_ref().display()))?;
    parse_corpus(&content).context("Failed to parse corpus description")
}

/// Find one bug by id
pub fn find_bug<'a>(corpus: &'a [BugRecord], bug_id: &str) -> Option<&'a BugRecord> {
    corpus.iter().find(|bug| bug.id == bug_id)
}
