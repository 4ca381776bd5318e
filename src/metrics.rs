//! Corpus-level localization accuracy
//!
//! Each bug contributes the ranks of its ground-truth buggy files. Bugs with
//! no scorable buggy file are excluded from every aggregate and listed
//! separately instead of being given a made-up worst rank.

use crate::spectrum::FileScores;
use serde::Serialize;
use std::fmt::Write as _;

/// Ranks of one bug's ground-truth files; empty means ranking inapplicable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BugRanks {
    pub bug_id: String,
    pub ranks: Vec<usize>,
}

impl BugRanks {
    pub fn new(bug_id: &str, ranks: Vec<usize>) -> Self {
        Self {
            bug_id: bug_id.to_string(),
            ranks,
        }
    }

    pub fn is_applicable(&self) -> bool {
        !self.ranks.is_empty()
    }

    /// Best rank of the bug
    pub fn first_rank(&self) -> Option<usize> {
        self.ranks.iter().copied().min()
    }

    pub fn average_rank(&self) -> Option<f64> {
        if self.ranks.is_empty() {
            return None;
        }
        Some(self.ranks.iter().sum::<usize>() as f64 / self.ranks.len() as f64)
    }
}

/// Ranks of `buggy_files` within `scores`, in ground-truth order
///
/// Files outside the scorable domain are skipped.
pub fn rank_buggy_files(scores: &FileScores, buggy_files: &[String]) -> Vec<usize> {
    buggy_files
        .iter()
        .filter_map(|file| scores.rank_of(file))
        .collect()
}

/// Number of applicable bugs whose best rank is at most `k`
pub fn top_k(bugs: &[BugRanks], k: usize) -> usize {
    bugs.iter()
        .filter_map(BugRanks::first_rank)
        .filter(|&rank| rank <= k)
        .count()
}

/// Round to two decimals for display
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Aggregate metrics over a corpus of rank lists
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusMetrics {
    pub top1: usize,
    pub top5: usize,
    pub top10: usize,
    pub top20: usize,
    /// Mean first rank, full precision; `None` without applicable bugs
    pub mfr: Option<f64>,
    /// Mean average rank, full precision
    pub mar: Option<f64>,
    pub evaluated: usize,
    pub excluded: Vec<String>,
}

impl CorpusMetrics {
    pub fn evaluate(bugs: &[BugRanks]) -> Self {
        let applicable: Vec<&BugRanks> = bugs.iter().filter(|b| b.is_applicable()).collect();
        let excluded: Vec<String> = bugs
            .iter()
            .filter(|b| !b.is_applicable())
            .map(|b| b.bug_id.clone())
            .collect();
        if !excluded.is_empty() {
            tracing::warn!(
                count = excluded.len(),
                "bugs without a scorable buggy file are excluded from metrics"
            );
        }

        let n = applicable.len();
        let mean = |values: Vec<f64>| (n > 0).then(|| values.iter().sum::<f64>() / n as f64);
        let mfr = mean(
            applicable
                .iter()
                .filter_map(|b| b.first_rank())
                .map(|r| r as f64)
                .collect(),
        );
        let mar = mean(applicable.iter().filter_map(|b| b.average_rank()).collect());

        Self {
            top1: top_k(bugs, 1),
            top5: top_k(bugs, 5),
            top10: top_k(bugs, 10),
            top20: top_k(bugs, 20),
            mfr,
            mar,
            evaluated: n,
            excluded,
        }
    }

    /// Human-readable report: per-bug ranks, then the metrics
    pub fn to_report_string(&self, bugs: &[BugRanks]) -> String {
        let mut out = String::new();
        let rule = "=".repeat(51);
        let _ = writeln!(out, "{}", rule);
        let mut sorted: Vec<&BugRanks> = bugs.iter().collect();
        sorted.sort_by(|a, b| a.bug_id.cmp(&b.bug_id));
        for bug in sorted {
            let ranks: Vec<String> = bug.ranks.iter().map(usize::to_string).collect();
            let _ = writeln!(out, "{},[{}]", bug.bug_id, ranks.join(", "));
        }
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "[metric]:");
        let _ = writeln!(out, "Top-1: {}", self.top1);
        let _ = writeln!(out, "Top-5: {}", self.top5);
        let _ = writeln!(out, "Top-10: {}", self.top10);
        let _ = writeln!(out, "Top-20: {}", self.top20);
        let fmt_mean = |v: Option<f64>| v.map_or("n/a".to_string(), |v| format!("{:.2}", round2(v)));
        let _ = writeln!(out, "MFR: {}", fmt_mean(self.mfr));
        let _ = writeln!(out, "MAR: {}", fmt_mean(self.mar));
        let _ = writeln!(out, "Evaluated: {}", self.evaluated);
        if !self.excluded.is_empty() {
            let _ = writeln!(
                out,
                "Excluded (no scorable buggy file): {}",
                self.excluded.join(", ")
            );
        }
        out
    }
}
