//! Bisection over a pass-count cutoff

use super::{PassCheck, SearchOutcome};
use crate::configuration::Configuration;
use crate::error::{SflError, SflResult};
use crate::oracle::{ExecutionOracle, OutcomeSignature};

/// Neighbours added on each side of the boundary
const NEIGHBOURS: u64 = 2;

/// Binary-search the cutoff interval `[0, max_cutoff]` for the pass/fail boundary
///
/// Returns the passing configuration at boundary `b` (plus up to two lower
/// neighbours) and the failing configuration at `b + 1` (plus up to two
/// higher neighbours, never beyond `max_cutoff`).
///
/// # Preconditions
/// - Cutoff 0 reproduces the passing signature and `max_cutoff` does not.
///   Neither endpoint is probed.
/// - "Reproduces the passing signature" is monotone: it holds for every
///   cutoff at or below the boundary and for none above. If the compiler bug
///   is order-sensitive or flaky the search still terminates, but the
///   boundary it returns may not be the first divergent pass, and the
///   unprobed neighbours may be mislabelled.
pub fn bisect_cutoff<O: ExecutionOracle + ?Sized>(
    oracle: &O,
    passing_signature: &OutcomeSignature,
    failing: &Configuration,
    max_cutoff: u64,
) -> SflResult<SearchOutcome> {
    if max_cutoff == 0 {
        return Err(SflError::Search(format!(
            "'{}' runs no cutoff-controlled passes",
            failing
        )));
    }

    let check = PassCheck::new(oracle, passing_signature);
    let mut pass_limit = 0u64;
    let mut fail_limit = max_cutoff;

    while fail_limit - pass_limit > 1 {
        tracing::debug!(pass_limit, fail_limit, "bisecting");
        let mid = pass_limit + (fail_limit - pass_limit) / 2;
        if check.passes(&failing.with_cutoff(mid as i64))? {
            pass_limit = mid;
        } else {
            fail_limit = mid;
        }
    }
    tracing::info!(boundary = pass_limit, probes = check.calls(), "bisection converged");

    let passing = (0..=NEIGHBOURS)
        .filter_map(|i| pass_limit.checked_sub(i))
        .map(|limit| failing.with_cutoff(limit as i64))
        .collect();
    let failing_confs = (0..=NEIGHBOURS)
        .map(|i| fail_limit + i)
        .filter(|&limit| limit <= max_cutoff)
        .map(|limit| failing.with_cutoff(limit as i64))
        .collect();

    Ok(SearchOutcome {
        passing,
        failing: failing_confs,
        probes: check.calls(),
    })
}
