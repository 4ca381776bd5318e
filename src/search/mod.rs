// Configuration search: from one known pass/fail pair, find several passing
// and failing configurations that differ as little as possible.
//
// Two strategies, chosen by the compiler family:
// - Bisection over a monotone pass-count cutoff (LLVM -opt-bisect-limit)
// - Greedy single-switch minimization over `-f` switches (GCC)
//
// Class labels are established by oracle calls during the search and are not
// re-verified afterwards.

mod bisection;
mod greedy;
mod probe;

pub use bisection::bisect_cutoff;
pub use greedy::minimize_switches;
pub use probe::{parse_enabled_switches, CompilerProbe, OptionProbe};

use crate::configuration::Configuration;
use crate::error::{SflError, SflResult};
use crate::oracle::{ExecutionOracle, OutcomeSignature};
use crate::toolchain::CompilerKind;
use std::cell::Cell;
use std::collections::HashSet;

/// Configurations discovered for one bug
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Reproduce the passing signature
    pub passing: Vec<Configuration>,
    /// Do not reproduce the passing signature
    pub failing: Vec<Configuration>,
    /// Oracle evaluations spent by the strategy
    pub probes: usize,
}

/// Search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    Bisection,
    GreedyMinimization,
}

impl From<CompilerKind> for SearchStrategy {
    fn from(kind: CompilerKind) -> Self {
        match kind {
            CompilerKind::Gcc => SearchStrategy::GreedyMinimization,
            CompilerKind::Llvm => SearchStrategy::Bisection,
        }
    }
}

/// Oracle wrapper that answers "does this reproduce the passing signature?"
pub(crate) struct PassCheck<'a, O: ExecutionOracle + ?Sized> {
    oracle: &'a O,
    passing_signature: &'a OutcomeSignature,
    calls: Cell<usize>,
}

impl<'a, O: ExecutionOracle + ?Sized> PassCheck<'a, O> {
    pub(crate) fn new(oracle: &'a O, passing_signature: &'a OutcomeSignature) -> Self {
        Self {
            oracle,
            passing_signature,
            calls: Cell::new(0),
        }
    }

    pub(crate) fn passes(&self, configuration: &Configuration) -> SflResult<bool> {
        self.calls.set(self.calls.get() + 1);
        let signature = self.oracle.evaluate(configuration)?;
        let passed = &signature == self.passing_signature;
        tracing::debug!(conf = %configuration, passed, "probe");
        Ok(passed)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }
}

/// Configuration search with its injected deny-list
#[derive(Debug, Clone)]
pub struct ConfigurationSearch {
    strategy: SearchStrategy,
    skipped_switches: HashSet<String>,
}

impl ConfigurationSearch {
    pub fn new(strategy: SearchStrategy) -> Self {
        Self {
            strategy,
            skipped_switches: HashSet::new(),
        }
    }

    /// Flipped switches that only affect diagnostics and are never tried
    pub fn with_skipped_switches(mut self, skipped: HashSet<String>) -> Self {
        self.skipped_switches = skipped;
        self
    }

    pub fn strategy(&self) -> SearchStrategy {
        self.strategy
    }

    /// Run the search for one bug
    ///
    /// The passing signature is taken from `passing`; the result always holds
    /// at least one configuration per class, or an error.
    pub fn run<O, P>(
        &self,
        oracle: &O,
        probe: &P,
        passing: &Configuration,
        failing: &Configuration,
    ) -> SflResult<SearchOutcome>
    where
        O: ExecutionOracle + ?Sized,
        P: OptionProbe + ?Sized,
    {
        let passing_signature = oracle.evaluate(passing)?;
        tracing::debug!(signature = %passing_signature, "passing signature");

        let outcome = match self.strategy {
            SearchStrategy::Bisection => {
                let max_cutoff = probe.max_cutoff(failing)?;
                bisect_cutoff(oracle, &passing_signature, failing, max_cutoff)?
            }
            SearchStrategy::GreedyMinimization => minimize_switches(
                oracle,
                probe,
                &passing_signature,
                passing,
                failing,
                &self.skipped_switches,
            )?,
        };

        if outcome.passing.is_empty() || outcome.failing.is_empty() {
            return Err(SflError::Search(format!(
                "found {} passing and {} failing configurations",
                outcome.passing.len(),
                outcome.failing.len()
            )));
        }
        Ok(outcome)
    }
}
