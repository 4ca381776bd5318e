//! Greedy single-switch minimization

use super::{OptionProbe, PassCheck, SearchOutcome};
use crate::configuration::{flip_switch, Configuration};
use crate::error::SflResult;
use crate::oracle::{ExecutionOracle, OutcomeSignature};
use std::collections::{BTreeSet, HashSet};

/// Minimize the `-f` switches that separate the failing run from a passing one
///
/// 1. Flip each switch enabled under `failing` on its own (deny-listed flips
///    are skipped). A flip that reproduces the passing signature is
///    *triggering*; the rest are base candidates.
/// 2. Base = `failing` + every non-triggering flip. If that combination
///    happens to pass, rebuild it greedily: walk the candidates in order and
///    keep a flip only while the accumulated configuration still fails.
/// 3. Base + one triggering flip is a passing configuration when it passes,
///    an extra failing configuration otherwise.
///
/// The greedy pass is not guaranteed to reach a globally minimal base.
/// When no triggering flip passes on top of the base, `passing` itself is the
/// only passing configuration.
pub fn minimize_switches<O, P>(
    oracle: &O,
    probe: &P,
    passing_signature: &OutcomeSignature,
    passing: &Configuration,
    failing: &Configuration,
    skipped_switches: &HashSet<String>,
) -> SflResult<SearchOutcome>
where
    O: ExecutionOracle + ?Sized,
    P: OptionProbe + ?Sized,
{
    let check = PassCheck::new(oracle, passing_signature);

    let mut triggering = BTreeSet::new();
    let mut candidates = BTreeSet::new();
    for switch in probe.enabled_switches(failing)? {
        let flipped = flip_switch(&switch);
        if skipped_switches.contains(&flipped) {
            continue;
        }
        if check.passes(&failing.with_switch(&flipped))? {
            triggering.insert(flipped);
        } else {
            candidates.insert(flipped);
        }
    }
    tracing::info!(
        triggering = triggering.len(),
        candidates = candidates.len(),
        "classified switches"
    );

    let mut base = failing.with_switches(&candidates);
    if check.passes(&base)? {
        let mut kept = BTreeSet::new();
        for flip in &candidates {
            let trial = failing.with_switches(&kept).with_switch(flip);
            if !check.passes(&trial)? {
                kept.insert(flip.clone());
            }
        }
        tracing::debug!(kept = kept.len(), "rebuilt base configuration");
        base = failing.with_switches(&kept);
    }

    let mut passing_confs = Vec::new();
    let mut failing_confs = vec![base.clone()];
    for flip in &triggering {
        let trial = base.with_switch(flip);
        if check.passes(&trial)? {
            passing_confs.push(trial);
        } else {
            failing_confs.push(trial);
        }
    }

    if passing_confs.is_empty() {
        passing_confs.push(passing.clone());
    }

    Ok(SearchOutcome {
        passing: passing_confs,
        failing: failing_confs,
        probes: check.calls(),
    })
}
