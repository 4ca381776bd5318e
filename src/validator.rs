//! Minimality audit of searched failing configurations
//!
//! Greedy minimization is a heuristic, so a failing configuration it returns
//! may still contain switches whose flip would make the bug disappear. The
//! audit samples random flips of the recorded failing configurations and
//! reports every flip that reproduces the passing signature. A non-empty
//! success list is a diagnostic, not a failure.

use crate::configuration::Configuration;
use crate::corpus::{find_bug, load_corpus};
use crate::error::{SflError, SflResult};
use crate::oracle::{ExecutionOracle, OutcomeSignature};
use crate::pipeline::compiler_oracle;
use crate::search::{CompilerProbe, OptionProbe};
use crate::settings::Settings;
use crate::storage::CoverageStore;
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Audit parameters
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Number of random trials
    pub trials: usize,
    /// Upper bound on switches flipped per trial
    pub max_flips: usize,
    /// PRNG seed; equal seeds replay equal trials
    pub seed: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            trials: 20,
            max_flips: 3,
            seed: 0,
        }
    }
}

impl AuditConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_flips == 0 {
            return Err("max_flips must be >= 1".to_string());
        }
        Ok(())
    }
}

/// One sampled flip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trial {
    pub base: Configuration,
    pub flipped: Configuration,
    pub signature: OutcomeSignature,
    pub became_pass: bool,
}

/// Result of an audit
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub bug_id: String,
    pub baseline: Configuration,
    pub baseline_signature: OutcomeSignature,
    pub trials: Vec<Trial>,
}

impl AuditReport {
    /// Trials whose flip reproduced the passing signature
    pub fn successes(&self) -> Vec<&Trial> {
        self.trials.iter().filter(|t| t.became_pass).collect()
    }

    pub fn to_report_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Bug {} validation trials: {}", self.bug_id, self.trials.len());
        let _ = writeln!(
            out,
            "Pass baseline: {} -> {}",
            self.baseline, self.baseline_signature
        );
        let _ = writeln!(out);
        for (i, trial) in self.trials.iter().enumerate() {
            let _ = writeln!(out, "[{}] BASE FAIL CONF: {}", i + 1, trial.base);
            let _ = writeln!(out, "    FLIPPED CONF   : {}", trial.flipped);
            let _ = writeln!(out, "    RESULT         : {}", trial.signature);
            let _ = writeln!(out, "    BECAME PASS    : {}", trial.became_pass);
            let _ = writeln!(out);
        }

        let successes = self.successes();
        let _ = writeln!(out, "=== SUMMARY ===");
        let _ = writeln!(
            out,
            "Flipped configs that became PASS: {}/{}",
            successes.len(),
            self.trials.len()
        );
        if !successes.is_empty() {
            let _ = writeln!(out, "Examples (up to 5):");
            for trial in successes.iter().take(5) {
                let _ = writeln!(
                    out,
                    "- BASE: {}\n  FLIP: {}\n  RES : {}",
                    trial.base, trial.flipped, trial.signature
                );
            }
        }
        out
    }
}

/// Flip between 1 and `max_flips` distinct `-f` switches of `base`
fn random_flip<R: Rng>(base: &Configuration, rng: &mut R, max_flips: usize) -> Configuration {
    let positions = base.switch_positions();
    if positions.is_empty() {
        return base.clone();
    }
    let flips = rng.gen_range(1..=max_flips.min(positions.len()));
    let chosen: Vec<usize> = positions.choose_multiple(rng, flips).copied().collect();
    base.with_flipped(&chosen)
}

/// Sample `config.trials` random flips of `failing` against the oracle
pub fn audit<O: ExecutionOracle + ?Sized>(
    oracle: &O,
    failing: &[Configuration],
    passing_signature: &OutcomeSignature,
    config: &AuditConfig,
) -> SflResult<Vec<Trial>> {
    config.validate().map_err(SflError::Search)?;
    if failing.is_empty() {
        return Err(SflError::Search("no failing configurations to audit".to_string()));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut trials = Vec::with_capacity(config.trials);
    for _ in 0..config.trials {
        let Some(base) = failing.choose(&mut rng) else {
            break;
        };
        let flipped = random_flip(base, &mut rng, config.max_flips);
        let signature = oracle.evaluate(&flipped)?;
        let became_pass = &signature == passing_signature;
        if became_pass {
            tracing::info!(base = %base, flipped = %flipped, "flip reproduces the passing signature");
        }
        trials.push(Trial {
            base: base.clone(),
            flipped,
            signature,
            became_pass,
        });
    }
    Ok(trials)
}

/// Enabled switches before and after minimization
pub fn options_summary<P: OptionProbe + ?Sized>(
    probe: &P,
    bug_id: &str,
    original: &Configuration,
    minimized: &Configuration,
) -> SflResult<String> {
    let before = probe.enabled_switches(original)?;
    let after = probe.enabled_switches(minimized)?;

    let mut out = String::new();
    let _ = writeln!(out, "=== ENABLED OPTIONS SUMMARY ===");
    let _ = writeln!(out, "Bug ID: {}", bug_id);
    let _ = writeln!(out);
    let mut section = |title: &str, conf: &Configuration, enabled: &[String]| {
        let _ = writeln!(out, "{}: {}", title, conf);
        let _ = writeln!(out, "ENABLED COUNT: {}", enabled.len());
        if !enabled.is_empty() {
            let _ = writeln!(out, "ENABLED OPTIONS:");
            for opt in enabled {
                let _ = writeln!(out, "  {}", opt);
            }
        }
        let _ = writeln!(out);
    };
    section("ORIGINAL FAIL CONFIG", original, before.as_slice());
    section("MINIMIZED FAIL CONFIG (example)", minimized, after.as_slice());

    let reduction = before.len() as i64 - after.len() as i64;
    let _ = writeln!(
        out,
        "REDUCTION: {} options disabled ({} -> {})",
        reduction,
        before.len(),
        after.len()
    );
    if reduction > 0 {
        let remaining: BTreeSet<&String> = after.iter().collect();
        let _ = writeln!(out, "DISABLED OPTIONS:");
        for opt in before.iter().filter(|o| !remaining.contains(o)) {
            let _ = writeln!(out, "  {}", opt);
        }
    }
    Ok(out)
}

/// Paths written by [`audit_bug`]
#[derive(Debug)]
pub struct AuditFiles {
    pub report: PathBuf,
    pub summary: Option<PathBuf>,
}

/// Audit one corpus bug against its stored failing configurations
pub fn audit_bug(
    settings: &Settings,
    bug_id: &str,
    config: &AuditConfig,
    show_summary: bool,
) -> Result<(AuditReport, AuditFiles)> {
    let corpus = load_corpus(&settings.corpus_file)?;
    let bug = find_bug(&corpus, bug_id)
        .with_context(|| format!("Bug {} is not in {}", bug_id, settings.corpus_file.display()))?;
    let store = CoverageStore::new(&settings.coverage_dir);
    let failing = store.read_failing_configurations(bug_id)?;
    if failing.is_empty() {
        anyhow::bail!("No FAIL CONFIGS recorded for bug {}", bug_id);
    }

    let oracle = compiler_oracle(settings, bug);
    let baseline_signature = oracle
        .evaluate(&bug.passing)
        .with_context(|| format!("Failed to evaluate passing configuration of bug {}", bug_id))?;

    let summary = if show_summary {
        let toolchain = settings.toolchain(&bug.revision);
        let probe = CompilerProbe::new(
            &toolchain.driver,
            settings.bug_dir(bug_id),
            &settings.input_file,
            settings.timeout(),
        );
        let text = options_summary(&probe, bug_id, &bug.failing, &failing[0])?;
        Some(store.write_report(bug_id, "options_summary.txt", &text)?)
    } else {
        None
    };

    let trials = audit(&oracle, &failing, &baseline_signature, config)?;
    let report = AuditReport {
        bug_id: bug_id.to_string(),
        baseline: bug.passing.clone(),
        baseline_signature,
        trials,
    };
    let path = store.write_report(bug_id, "validate_report.txt", &report.to_report_string())?;
    tracing::info!(
        bug = %bug_id,
        successes = report.successes().len(),
        trials = report.trials.len(),
        "audit finished"
    );
    Ok((
        report,
        AuditFiles {
            report: path,
            summary,
        },
    ))
}
