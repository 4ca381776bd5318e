//! File-level scores and rank assignment

use super::{compute_spectrum, SbflFormula};
use crate::coverage::CoverageSet;
use crate::error::{SflError, SflResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean suspiciousness per source file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileScores(BTreeMap<String, f64>);

impl FileScores {
    pub fn new(scores: BTreeMap<String, f64>) -> Self {
        Self(scores)
    }

    pub fn get(&self, file: &str) -> Option<f64> {
        self.0.get(file).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.0
    }

    /// 1-based rank: files with a strictly greater score, plus one
    ///
    /// `None` if the file is not in the scorable domain.
    pub fn rank_of(&self, file: &str) -> Option<usize> {
        let score = self.get(file)?;
        Some(self.0.values().filter(|&&other| other > score).count() + 1)
    }

    /// Files by descending score, ties by path
    pub fn ranking(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self.0.iter().map(|(f, s)| (f.as_str(), *s)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// Scores files from failing and passing coverage
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectrumRanker {
    formula: SbflFormula,
}

impl SpectrumRanker {
    pub fn new(formula: SbflFormula) -> Self {
        Self { formula }
    }

    pub fn formula(&self) -> SbflFormula {
        self.formula
    }

    pub fn rank(&self, failing: &[CoverageSet], passing: &[CoverageSet]) -> SflResult<FileScores> {
        let spectrum = compute_spectrum(failing, passing);

        let mut per_file: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for (stmt, counts) in &spectrum {
            let score = self
                .formula
                .score(counts)
                .ok_or_else(|| SflError::ZeroDenominator {
                    formula: self.formula.to_string(),
                    statement: stmt.to_string(),
                })?;
            let entry = per_file.entry(stmt.file.clone()).or_insert((0.0, 0));
            entry.0 += score;
            entry.1 += 1;
        }

        let scores = per_file
            .into_iter()
            .map(|(file, (sum, n))| (file, sum / n as f64))
            .collect();
        tracing::debug!(
            formula = %self.formula,
            statements = spectrum.len(),
            "ranked {} failing / {} passing runs",
            failing.len(),
            passing.len()
        );
        Ok(FileScores(scores))
    }
}
