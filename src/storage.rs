//! On-disk layout of localization results
//!
//! ```text
//! <coverage_dir>/<bug>/fail1/stmt_info.txt    coverage sets, "path$lines"
//! <coverage_dir>/<bug>/pass1/stmt_info.txt
//! <coverage_dir>/<bug>/Ochiai_scores.json     file -> mean score
//! <coverage_dir>/<bug>/confs.txt              searched configurations
//! <rank_file>                                 "<bug>,[r1, r2]" per line
//! ```

use crate::configuration::Configuration;
use crate::coverage::CoverageSet;
use crate::metrics::BugRanks;
use crate::spectrum::{FileScores, SbflFormula};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const COVERAGE_FILE: &str = "stmt_info.txt";
const CONFS_FILE: &str = "confs.txt";

/// Which side of the pass/fail divide a run belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunClass {
    Pass,
    Fail,
}

impl RunClass {
    fn prefix(self) -> &'static str {
        match self {
            RunClass::Pass => "pass",
            RunClass::Fail => "fail",
        }
    }

    /// Run label, 1-based: `pass1`, `fail3`
    pub fn label(self, index: usize) -> String {
        format!("{}{}", self.prefix(), index)
    }
}

/// Per-bug coverage, score and configuration files
#[derive(Debug, Clone)]
pub struct CoverageStore {
    root: PathBuf,
}

impl CoverageStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn bug_dir(&self, bug_id: &str) -> PathBuf {
        self.root.join(bug_id)
    }

    /// Remove whatever an earlier run left for this bug
    pub fn reset_bug(&self, bug_id: &str) -> Result<()> {
        let dir = self.bug_dir(bug_id);
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to clear {}", dir.display()))?;
        }
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))
    }

    pub fn write_coverage(&self, bug_id: &str, label: &str, coverage: &CoverageSet) -> Result<()> {
        let dir = self.bug_dir(bug_id).join(label);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(COVERAGE_FILE);
        fs::write(&path, coverage.to_text())
            .with_context(|| format!("Failed to write coverage file: {}", path.display()))
    }

    pub fn read_coverage(&self, bug_id: &str, label: &str) -> Result<CoverageSet> {
        let path = self.bug_dir(bug_id).join(label).join(COVERAGE_FILE);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read coverage file: {}", path.display()))?;
        CoverageSet::parse_text(&text)
            .with_context(|| format!("Failed to parse coverage file: {}", path.display()))
    }

    /// Stored run labels of one class, in numeric order
    pub fn labels(&self, bug_id: &str, class: RunClass) -> Result<Vec<String>> {
        let dir = self.bug_dir(bug_id);
        let entries =
            fs::read_dir(&dir).with_context(|| format!("Failed to list {}", dir.display()))?;

        let mut indexed: Vec<(usize, String)> = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.path().join(COVERAGE_FILE).is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(n) = name
                .strip_prefix(class.prefix())
                .and_then(|n| n.parse::<usize>().ok())
            {
                indexed.push((n, name));
            }
        }
        indexed.sort();
        Ok(indexed.into_iter().map(|(_, name)| name).collect())
    }

    /// All stored coverage sets of one class
    pub fn read_class(&self, bug_id: &str, class: RunClass) -> Result<Vec<CoverageSet>> {
        self.labels(bug_id, class)?
            .iter()
            .map(|label| self.read_coverage(bug_id, label))
            .collect()
    }

    fn scores_path(&self, bug_id: &str, formula: SbflFormula) -> PathBuf {
        self.bug_dir(bug_id).join(format!("{}_scores.json", formula))
    }

    pub fn write_scores(&self, bug_id: &str, formula: SbflFormula, scores: &FileScores) -> Result<()> {
        let path = self.scores_path(bug_id, formula);
        let json = serde_json::to_string_pretty(scores)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write scores: {}", path.display()))
    }

    pub fn read_scores(&self, bug_id: &str, formula: SbflFormula) -> Result<FileScores> {
        let path = self.scores_path(bug_id, formula);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scores: {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse scores: {}", path.display()))
    }

    pub fn write_configurations(
        &self,
        bug_id: &str,
        passing: &[Configuration],
        failing: &[Configuration],
    ) -> Result<()> {
        let mut text = String::from("PASS CONFIGS:\n");
        for conf in passing {
            text.push_str(&format!("{}\n", conf));
        }
        text.push_str("\nFAIL CONFIGS:\n");
        for conf in failing {
            text.push_str(&format!("{}\n", conf));
        }
        let path = self.bug_dir(bug_id).join(CONFS_FILE);
        fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Failing configurations recorded by an earlier search
    pub fn read_failing_configurations(&self, bug_id: &str) -> Result<Vec<Configuration>> {
        let path = self.bug_dir(bug_id).join(CONFS_FILE);
        let text = fs::read_to_string(&path).with_context(|| {
            format!("{} not found; run the pipeline for bug {} first", path.display(), bug_id)
        })?;

        let mut in_fail = false;
        let mut failing = Vec::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if line.starts_with("PASS CONFIGS:") {
                in_fail = false;
            } else if line.starts_with("FAIL CONFIGS:") {
                in_fail = true;
            } else if in_fail {
                failing.push(Configuration::parse(line));
            }
        }
        Ok(failing)
    }

    /// Write an auxiliary text report next to the bug's coverage
    pub fn write_report(&self, bug_id: &str, name: &str, text: &str) -> Result<PathBuf> {
        let dir = self.bug_dir(bug_id);
        fs::create_dir_all(&dir)?;
        let path = dir.join(name);
        fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Append-only log of per-bug rank lists
#[derive(Debug, Clone)]
pub struct RankLog {
    path: PathBuf,
}

impl RankLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format_line(ranks: &BugRanks) -> String {
        let list: Vec<String> = ranks.ranks.iter().map(usize::to_string).collect();
        format!("{},[{}]", ranks.bug_id, list.join(", "))
    }

    pub fn append(&self, ranks: &BugRanks) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open rank log: {}", self.path.display()))?;
        writeln!(file, "{}", Self::format_line(ranks))
            .with_context(|| format!("Failed to append to {}", self.path.display()))
    }

    /// Load the log; a later line for the same bug replaces an earlier one
    pub fn load(&self) -> Result<Vec<BugRanks>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read rank log: {}", self.path.display()))?;
        parse_rank_log(&content)
    }
}

/// Parse rank-log text into bugs sorted by id
pub fn parse_rank_log(content: &str) -> Result<Vec<BugRanks>> {
    let line_re = Regex::new(r"^([^,]+),\[(.*)\]$")?;
    let mut bugs: BTreeMap<String, Vec<usize>> = BTreeMap::new();

    for (no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let caps = line_re
            .captures(line)
            .with_context(|| format!("Malformed rank log line {}: '{}'", no + 1, line))?;
        let ranks = caps[2]
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| r.parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Bad rank on line {}: '{}'", no + 1, line))?;
        bugs.insert(caps[1].trim().to_string(), ranks);
    }

    Ok(bugs
        .into_iter()
        .map(|(bug_id, ranks)| BugRanks { bug_id, ranks })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::StatementId;
    use tempfile::TempDir;

    fn coverage(stmts: &[(&str, u32)]) -> CoverageSet {
        stmts.iter().map(|(f, l)| StatementId::new(f, *l)).collect()
    }

    #[test]
    fn test_coverage_round_trip_and_labels() {
        let dir = TempDir::new().unwrap();
        let store = CoverageStore::new(dir.path());
        store.reset_bug("58343").unwrap();

        for i in [1, 2, 10] {
            let label = RunClass::Fail.label(i);
            store
                .write_coverage("58343", &label, &coverage(&[("gcc/a.c", i as u32)]))
                .unwrap();
        }
        store
            .write_coverage("58343", "pass1", &coverage(&[("gcc/a.c", 1)]))
            .unwrap();

        assert_eq!(
            store.labels("58343", RunClass::Fail).unwrap(),
            vec!["fail1", "fail2", "fail10"]
        );
        let failing = store.read_class("58343", RunClass::Fail).unwrap();
        assert_eq!(failing.len(), 3);
        assert!(failing[2].contains(&StatementId::new("gcc/a.c", 10)));
        assert_eq!(store.read_class("58343", RunClass::Pass).unwrap().len(), 1);
    }

    #[test]
    fn test_reset_bug_clears_previous_runs() {
        let dir = TempDir::new().unwrap();
        let store = CoverageStore::new(dir.path());
        store.write_coverage("1", "fail1", &coverage(&[("a.c", 1)])).unwrap();
        store.reset_bug("1").unwrap();
        assert!(store.labels("1", RunClass::Fail).unwrap().is_empty());
    }

    #[test]
    fn test_scores_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = CoverageStore::new(dir.path());
        store.reset_bug("7").unwrap();
        let mut map = BTreeMap::new();
        map.insert("gcc/a.c".to_string(), 0.75);
        let scores = FileScores::new(map);

        store.write_scores("7", SbflFormula::Ochiai, &scores).unwrap();
        assert!(dir.path().join("7/Ochiai_scores.json").is_file());
        assert_eq!(store.read_scores("7", SbflFormula::Ochiai).unwrap(), scores);
    }

    #[test]
    fn test_configurations_file() {
        let dir = TempDir::new().unwrap();
        let store = CoverageStore::new(dir.path());
        store.reset_bug("9").unwrap();
        let passing = vec![Configuration::parse("-O2 -fno-x")];
        let failing = vec![Configuration::parse("-O2"), Configuration::parse("-O2 -fno-y")];

        store.write_configurations("9", &passing, &failing).unwrap();
        let text = fs::read_to_string(dir.path().join("9/confs.txt")).unwrap();
        assert!(text.starts_with("PASS CONFIGS:\n-O2 -fno-x\n"));
        assert_eq!(store.read_failing_configurations("9").unwrap(), failing);
    }

    #[test]
    fn test_rank_log_last_line_wins() {
        let dir = TempDir::new().unwrap();
        let log = RankLog::new(dir.path().join("ranks.txt"));
        log.append(&BugRanks::new("58343", vec![3])).unwrap();
        log.append(&BugRanks::new("56478", vec![1, 4])).unwrap();
        log.append(&BugRanks::new("58343", vec![2])).unwrap();
        log.append(&BugRanks::new("61518", vec![])).unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        assert!(text.contains("56478,[1, 4]\n"));
        assert!(text.contains("61518,[]\n"));

        let bugs = log.load().unwrap();
        assert_eq!(
            bugs,
            vec![
                BugRanks::new("56478", vec![1, 4]),
                BugRanks::new("58343", vec![2]),
                BugRanks::new("61518", vec![]),
            ]
        );
    }

    #[test]
    fn test_rank_log_rejects_garbage() {
        assert!(parse_rank_log("58343 rank 3\n").is_err());
        assert!(parse_rank_log("58343,[x]\n").is_err());
    }
}
