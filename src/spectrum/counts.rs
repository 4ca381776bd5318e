//! Per-statement spectrum counts

use crate::coverage::{CoverageSet, StatementId};
use std::collections::BTreeMap;

/// Hit/miss counts of one statement across the failing and passing runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpectrumCounts {
    /// Failing runs that executed the statement
    pub ef: usize,
    /// Failing runs that did not
    pub nf: usize,
    /// Passing runs that executed the statement
    pub ep: usize,
    /// Passing runs that did not
    pub np: usize,
}

/// Counts for every statement hit by at least one failing run
///
/// Statements only passing runs executed are not scorable and are left out.
pub fn compute_spectrum(
    failing: &[CoverageSet],
    passing: &[CoverageSet],
) -> BTreeMap<StatementId, SpectrumCounts> {
    let mut spectrum: BTreeMap<StatementId, SpectrumCounts> = BTreeMap::new();
    for set in failing {
        for stmt in set {
            spectrum.entry(stmt.clone()).or_default().ef += 1;
        }
    }
    for (stmt, counts) in spectrum.iter_mut() {
        counts.nf = failing.len() - counts.ef;
        counts.ep = passing.iter().filter(|set| set.contains(stmt)).count();
        counts.np = passing.len() - counts.ep;
    }
    spectrum
}
