// Statement coverage of the compiler under test
//
// A coverage set is the set of (source file, line) statements one compiler
// invocation executed at least once. It is stored as one text line per file:
// `<relative path>$<line>,<line>,...`.

mod collector;
mod gcov;
mod lease;

pub use collector::{CoverageCollector, GcovCollector};
pub use gcov::executed_lines;
pub use lease::InstrumentationLease;

use crate::error::{SflError, SflResult};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One source statement, identified by file (relative to the build root) and line
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatementId {
    pub file: String,
    pub line: u32,
}

impl StatementId {
    pub fn new(file: &str, line: u32) -> Self {
        Self {
            file: file.to_string(),
            line,
        }
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.file, self.line)
    }
}

/// Statements executed by one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageSet {
    statements: BTreeSet<StatementId>,
}

impl CoverageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every line of one file; an empty `lines` adds nothing
    pub fn insert_file<I: IntoIterator<Item = u32>>(&mut self, file: &str, lines: I) {
        for line in lines {
            self.statements.insert(StatementId::new(file, line));
        }
    }

    pub fn insert(&mut self, statement: StatementId) {
        self.statements.insert(statement);
    }

    pub fn contains(&self, statement: &StatementId) -> bool {
        self.statements.contains(statement)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatementId> {
        self.statements.iter()
    }

    /// Number of distinct source files
    pub fn file_count(&self) -> usize {
        self.by_file().len()
    }

    fn by_file(&self) -> BTreeMap<&str, Vec<u32>> {
        let mut files: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
        for stmt in &self.statements {
            files.entry(stmt.file.as_str()).or_default().push(stmt.line);
        }
        files
    }

    /// Render in the `path$lines` storage format, files and lines ascending
    pub fn to_text(&self) -> String {
        self.by_file()
            .into_iter()
            .map(|(file, lines)| {
                let lines: Vec<String> = lines.iter().map(u32::to_string).collect();
                format!("{}${}", file, lines.join(","))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse the `path$lines` storage format
    pub fn parse_text(text: &str) -> SflResult<Self> {
        let mut set = Self::new();
        for record in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (file, lines) = record.rsplit_once('$').ok_or_else(|| SflError::CoverageFormat {
                record: record.to_string(),
                reason: "missing '$' separator".to_string(),
            })?;
            if file.is_empty() {
                return Err(SflError::CoverageFormat {
                    record: record.to_string(),
                    reason: "empty file path".to_string(),
                });
            }
            for line in lines.split(',') {
                let line = line.trim().parse::<u32>().map_err(|e| SflError::CoverageFormat {
                    record: record.to_string(),
                    reason: format!("bad line number '{}': {}", line, e),
                })?;
                set.insert(StatementId::new(file, line));
            }
        }
        Ok(set)
    }
}

impl FromIterator<StatementId> for CoverageSet {
    fn from_iter<I: IntoIterator<Item = StatementId>>(iter: I) -> Self {
        Self {
            statements: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CoverageSet {
    type Item = &'a StatementId;
    type IntoIter = std::collections::btree_set::Iter<'a, StatementId>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_text_groups_by_file() {
        let mut set = CoverageSet::new();
        set.insert_file("gcc/b.c", [5]);
        set.insert_file("gcc/a.c", [11, 10]);
        assert_eq!(set.to_text(), "gcc/a.c$10,11\ngcc/b.c$5");
        assert_eq!(set.file_count(), 2);
    }

    #[test]
    fn test_parse_text() {
        let set = CoverageSet::parse_text("a.c$10,11\nb.c$5\n").unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains(&StatementId::new("a.c", 11)));
        assert!(set.contains(&StatementId::new("b.c", 5)));
    }

    #[test]
    fn test_parse_empty_text() {
        assert!(CoverageSet::parse_text("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        assert!(CoverageSet::parse_text("a.c 10,11").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_line() {
        let err = CoverageSet::parse_text("a.c$10,x").unwrap_err();
        assert!(err.to_string().contains("bad line number"));
    }

    #[test]
    fn test_empty_file_adds_nothing() {
        let mut set = CoverageSet::new();
        set.insert_file("a.c", Vec::new());
        assert!(set.is_empty());
        assert_eq!(set.to_text(), "");
    }

    #[test]
    fn test_statement_display() {
        assert_eq!(StatementId::new("a.c", 10).to_string(), "a.c,10");
    }
}
