// Localization pipeline
//
// One bug runs strictly in sequence: configuration search, failing coverage,
// passing coverage, ranking. Bugs are independent and fan out over a bounded
// worker pool. Bugs that share a compiler revision share its instrumentation
// counters, so a per-revision lock serializes them. The calling thread is the
// only writer of the rank log.

use crate::configuration::Configuration;
use crate::corpus::BugRecord;
use crate::coverage::{CoverageCollector, CoverageSet, GcovCollector};
use crate::metrics::{rank_buggy_files, BugRanks};
use crate::oracle::{CompilerOracle, ExecutionOracle};
use crate::search::{CompilerProbe, ConfigurationSearch, OptionProbe};
use crate::settings::Settings;
use crate::spectrum::SpectrumRanker;
use crate::storage::{CoverageStore, RankLog, RunClass};
use anyhow::{Context, Result};
use crossbeam::channel;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// How one bug ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BugOutcome {
    /// At least one buggy file was ranked
    Ranked(BugRanks),
    /// No buggy file was executed by a failing run
    Inapplicable(String),
    /// Abandoned before ranking
    Skipped { bug_id: String, reason: String },
}

impl BugOutcome {
    pub fn from_ranks(ranks: BugRanks) -> Self {
        if ranks.is_applicable() {
            BugOutcome::Ranked(ranks)
        } else {
            BugOutcome::Inapplicable(ranks.bug_id)
        }
    }

    pub fn bug_id(&self) -> &str {
        match self {
            BugOutcome::Ranked(ranks) => &ranks.bug_id,
            BugOutcome::Inapplicable(bug_id) | BugOutcome::Skipped { bug_id, .. } => bug_id,
        }
    }

    /// Rank-log entry; skipped bugs have none
    pub fn rank_entry(&self) -> Option<BugRanks> {
        match self {
            BugOutcome::Ranked(ranks) => Some(ranks.clone()),
            BugOutcome::Inapplicable(bug_id) => Some(BugRanks::new(bug_id, Vec::new())),
            BugOutcome::Skipped { .. } => None,
        }
    }
}

/// Totals of a corpus run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ranked: Vec<BugRanks>,
    pub inapplicable: Vec<String>,
    pub skipped: Vec<(String, String)>,
}

impl RunSummary {
    fn record(&mut self, outcome: BugOutcome, log: &RankLog) -> Result<()> {
        if let Some(entry) = outcome.rank_entry() {
            log.append(&entry)?;
        }
        match outcome {
            BugOutcome::Ranked(ranks) => {
                tracing::info!(bug = %ranks.bug_id, ranks = ?ranks.ranks, "ranked");
                self.ranked.push(ranks);
            }
            BugOutcome::Inapplicable(bug_id) => {
                tracing::warn!(bug = %bug_id, "no buggy file in the scorable domain");
                self.inapplicable.push(bug_id);
            }
            BugOutcome::Skipped { bug_id, reason } => {
                self.skipped.push((bug_id, reason));
            }
        }
        Ok(())
    }

    pub fn total(&self) -> usize {
        self.ranked.len() + self.inapplicable.len() + self.skipped.len()
    }
}

/// Oracle for one bug, with the crash allow-list applied
pub fn compiler_oracle(settings: &Settings, bug: &BugRecord) -> CompilerOracle {
    let toolchain = settings.toolchain(&bug.revision);
    CompilerOracle::new(&toolchain.driver, settings.bug_dir(&bug.id))
        .with_input(&settings.input_file)
        .with_timeout(settings.timeout())
        .exit_code_only(settings.crash_bug_ids.contains(&bug.id))
}

fn collect_class<C: CoverageCollector + ?Sized>(
    collector: &C,
    store: &CoverageStore,
    bug_id: &str,
    class: RunClass,
    configurations: &[Configuration],
) -> Result<Vec<CoverageSet>> {
    let mut sets = Vec::with_capacity(configurations.len());
    for (i, conf) in configurations.iter().enumerate() {
        let label = class.label(i + 1);
        let coverage = collector
            .collect(conf)
            .with_context(|| format!("Failed to collect coverage for {} ({})", label, conf))?;
        tracing::debug!(bug = %bug_id, %label, statements = coverage.len(), "coverage");
        store.write_coverage(bug_id, &label, &coverage)?;
        sets.push(coverage);
    }
    Ok(sets)
}

/// Search, collect and rank one bug
pub fn localize_bug<O, P, C>(
    bug: &BugRecord,
    oracle: &O,
    probe: &P,
    collector: &C,
    search: &ConfigurationSearch,
    store: &CoverageStore,
    ranker: &SpectrumRanker,
) -> Result<BugRanks>
where
    O: ExecutionOracle + ?Sized,
    P: OptionProbe + ?Sized,
    C: CoverageCollector + ?Sized,
{
    let found = search
        .run(oracle, probe, &bug.passing, &bug.failing)
        .with_context(|| format!("Configuration search failed for bug {}", bug.id))?;
    tracing::info!(
        bug = %bug.id,
        passing = found.passing.len(),
        failing = found.failing.len(),
        probes = found.probes,
        "search finished"
    );

    store.reset_bug(&bug.id)?;
    store.write_configurations(&bug.id, &found.passing, &found.failing)?;

    let failing = collect_class(collector, store, &bug.id, RunClass::Fail, &found.failing)?;
    let passing = collect_class(collector, store, &bug.id, RunClass::Pass, &found.passing)?;

    let scores = ranker.rank(&failing, &passing)?;
    store.write_scores(&bug.id, ranker.formula(), &scores)?;
    Ok(BugRanks::new(&bug.id, rank_buggy_files(&scores, &bug.buggy_files)))
}

/// Recompute one bug's scores from stored coverage, without the compiler
pub fn rerank_bug(store: &CoverageStore, bug: &BugRecord, ranker: &SpectrumRanker) -> Result<BugRanks> {
    let failing = store.read_class(&bug.id, RunClass::Fail)?;
    if failing.is_empty() {
        anyhow::bail!("No stored failing coverage for bug {}", bug.id);
    }
    let passing = store.read_class(&bug.id, RunClass::Pass)?;
    let scores = ranker.rank(&failing, &passing)?;
    store.write_scores(&bug.id, ranker.formula(), &scores)?;
    Ok(BugRanks::new(&bug.id, rank_buggy_files(&scores, &bug.buggy_files)))
}

/// Run `bugs` over a pool of `workers` threads, then `sequential` ids in order
///
/// Outcomes are appended to `log` by the calling thread as they arrive.
pub fn run_pool<F>(
    bugs: &[BugRecord],
    workers: usize,
    sequential: &[String],
    log: &RankLog,
    run: F,
) -> Result<RunSummary>
where
    F: Fn(&BugRecord) -> BugOutcome + Sync,
{
    let (deferred, pooled): (Vec<&BugRecord>, Vec<&BugRecord>) =
        bugs.iter().partition(|bug| sequential.contains(&bug.id));
    let workers = workers.clamp(1, pooled.len().max(1));
    let mut summary = RunSummary::default();

    tracing::info!(
        bugs = pooled.len(),
        sequential = deferred.len(),
        workers,
        "starting corpus run"
    );

    std::thread::scope(|s| -> Result<()> {
        let (task_tx, task_rx) = channel::bounded::<&BugRecord>(workers);
        let (result_tx, result_rx) = channel::unbounded::<BugOutcome>();

        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let run = &run;
            s.spawn(move || {
                for bug in task_rx.iter() {
                    if result_tx.send(run(bug)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(task_rx);
        drop(result_tx);

        for bug in &pooled {
            if task_tx.send(*bug).is_err() {
                break;
            }
        }
        drop(task_tx);

        for outcome in result_rx.iter() {
            summary.record(outcome, log)?;
        }
        Ok(())
    })?;

    for bug in deferred {
        summary.record(run(bug), log)?;
    }

    if summary.total() < bugs.len() {
        tracing::warn!(
            expected = bugs.len(),
            finished = summary.total(),
            "some bugs produced no outcome"
        );
    }
    Ok(summary)
}

/// Pipeline wired to the real compiler, gcov and storage
#[derive(Debug)]
pub struct Pipeline {
    settings: Settings,
    store: CoverageStore,
    ranker: SpectrumRanker,
    revision_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        let store = CoverageStore::new(&settings.coverage_dir);
        let ranker = SpectrumRanker::new(settings.formula);
        Self {
            settings,
            store,
            ranker,
            revision_locks: Mutex::new(HashMap::new()),
        }
    }

    fn revision_lock(&self, revision: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .revision_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(revision.to_string()).or_default().clone()
    }

    /// Run one bug end to end; failures become [`BugOutcome::Skipped`]
    pub fn run_bug(&self, bug: &BugRecord) -> BugOutcome {
        let _span = tracing::info_span!("bug", id = %bug.id).entered();

        let toolchain = self.settings.toolchain(&bug.revision);
        if !toolchain.is_installed() {
            let reason = format!("compiler revision {} is not installed", bug.revision);
            tracing::warn!(bug = %bug.id, "skipping: {}", reason);
            return BugOutcome::Skipped {
                bug_id: bug.id.clone(),
                reason,
            };
        }

        let lock = self.revision_lock(&bug.revision);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let work_dir = self.settings.bug_dir(&bug.id);
        let oracle = compiler_oracle(&self.settings, bug);
        let probe = CompilerProbe::new(
            &toolchain.driver,
            &work_dir,
            &self.settings.input_file,
            self.settings.timeout(),
        );
        let collector = GcovCollector::new(toolchain, &work_dir)
            .with_input(&self.settings.input_file)
            .with_timeout(self.settings.timeout());
        let search = ConfigurationSearch::new(self.settings.compiler.into())
            .with_skipped_switches(self.settings.skipped_set());

        match localize_bug(bug, &oracle, &probe, &collector, &search, &self.store, &self.ranker) {
            Ok(ranks) => BugOutcome::from_ranks(ranks),
            Err(e) => {
                tracing::warn!(bug = %bug.id, "skipping: {:#}", e);
                BugOutcome::Skipped {
                    bug_id: bug.id.clone(),
                    reason: format!("{:#}", e),
                }
            }
        }
    }

    /// Run the corpus through the worker pool and append to the rank log
    pub fn run_corpus(&self, bugs: &[BugRecord]) -> Result<RunSummary> {
        let workers = if self.settings.parallel {
            self.settings.workers
        } else {
            1
        };
        let log = RankLog::new(&self.settings.rank_file);
        run_pool(
            bugs,
            workers,
            &self.settings.sequential_bug_ids,
            &log,
            |bug| self.run_bug(bug),
        )
    }

    /// Re-rank stored coverage with the configured formula
    pub fn rerank(&self, bugs: &[BugRecord]) -> Result<RunSummary> {
        let log = RankLog::new(&self.settings.rank_file);
        let mut summary = RunSummary::default();
        for bug in bugs {
            let outcome = match rerank_bug(&self.store, bug, &self.ranker) {
                Ok(ranks) => BugOutcome::from_ranks(ranks),
                Err(e) => {
                    tracing::warn!(bug = %bug.id, "skipping: {:#}", e);
                    BugOutcome::Skipped {
                        bug_id: bug.id.clone(),
                        reason: format!("{:#}", e),
                    }
                }
            };
            summary.record(outcome, &log)?;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::StatementId;
    use crate::error::SflResult;
    use crate::oracle::OutcomeSignature;
    use crate::search::SearchStrategy;
    use crate::spectrum::SbflFormula;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn has(conf: &Configuration, flag: &str) -> bool {
        conf.flags().iter().any(|f| f == flag)
    }

    /// Miscompiles under -O2 unless -fno-x is given
    struct FakeOracle;

    impl ExecutionOracle for FakeOracle {
        fn evaluate(&self, conf: &Configuration) -> SflResult<OutcomeSignature> {
            let ok = has(conf, "-O1") || has(conf, "-fno-x");
            Ok(OutcomeSignature::Completed {
                exit_code: if ok { 0 } else { 1 },
                stdout: if ok { "ok" } else { "wrong" }.to_string(),
                stderr: String::new(),
            })
        }
    }

    struct FakeProbe;

    impl OptionProbe for FakeProbe {
        fn enabled_switches(&self, _: &Configuration) -> SflResult<Vec<String>> {
            Ok(vec!["-fx".to_string(), "-fy".to_string()])
        }

        fn max_cutoff(&self, _: &Configuration) -> SflResult<u64> {
            Ok(0)
        }
    }

    /// The buggy x pass runs a.c:11 and b.c:5
    struct FakeCollector;

    impl CoverageCollector for FakeCollector {
        fn collect(&self, conf: &Configuration) -> SflResult<CoverageSet> {
            let mut set = CoverageSet::new();
            set.insert(StatementId::new("a.c", 10));
            if !has(conf, "-fno-x") {
                set.insert(StatementId::new("a.c", 11));
                set.insert(StatementId::new("b.c", 5));
            }
            Ok(set)
        }
    }

    fn bug(id: &str) -> BugRecord {
        BugRecord::parse(&format!("{id},r1,-O1,-O2,a.c+missing.c"), 1).unwrap()
    }

    fn search() -> ConfigurationSearch {
        ConfigurationSearch::new(SearchStrategy::GreedyMinimization)
            .with_skipped_switches(HashSet::new())
    }

    #[test]
    fn test_localize_bug_end_to_end() {
        let dir = TempDir::new().unwrap();
        let store = CoverageStore::new(dir.path());
        let ranker = SpectrumRanker::new(SbflFormula::Ochiai);

        let ranks = localize_bug(
            &bug("100"),
            &FakeOracle,
            &FakeProbe,
            &FakeCollector,
            &search(),
            &store,
            &ranker,
        )
        .unwrap();

        // b.c scores 1.0, a.c the mean of 1/sqrt(2) and 1.0
        assert_eq!(ranks, BugRanks::new("100", vec![2]));
        let scores = store.read_scores("100", SbflFormula::Ochiai).unwrap();
        assert_eq!(scores.rank_of("b.c"), Some(1));
        assert_eq!(
            store.read_failing_configurations("100").unwrap(),
            vec![Configuration::parse("-O2 -fno-y")]
        );
        let fail1 = fs::read_to_string(dir.path().join("100/fail1/stmt_info.txt")).unwrap();
        assert_eq!(fail1, "a.c$10,11\nb.c$5");
        let pass1 = fs::read_to_string(dir.path().join("100/pass1/stmt_info.txt")).unwrap();
        assert_eq!(pass1, "a.c$10");
    }

    #[test]
    fn test_rerank_matches_stored_run() {
        let dir = TempDir::new().unwrap();
        let store = CoverageStore::new(dir.path());
        let ochiai = SpectrumRanker::new(SbflFormula::Ochiai);
        let first = localize_bug(
            &bug("100"),
            &FakeOracle,
            &FakeProbe,
            &FakeCollector,
            &search(),
            &store,
            &ochiai,
        )
        .unwrap();

        assert_eq!(rerank_bug(&store, &bug("100"), &ochiai).unwrap(), first);
        let dstar = SpectrumRanker::new(SbflFormula::DStar);
        rerank_bug(&store, &bug("100"), &dstar).unwrap();
        assert!(dir.path().join("100/DStar_scores.json").is_file());
        assert!(rerank_bug(&store, &bug("200"), &ochiai).is_err());
    }

    #[test]
    fn test_failed_search_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = CoverageStore::new(dir.path());
        let result = localize_bug(
            &bug("100"),
            &FakeOracle,
            &FakeProbe,
            &FakeCollector,
            &ConfigurationSearch::new(SearchStrategy::Bisection),
            &store,
            &SpectrumRanker::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_pool_writes_every_outcome_and_defers_sequential_bugs() {
        let dir = TempDir::new().unwrap();
        let log = RankLog::new(dir.path().join("ranks.txt"));
        let bugs: Vec<BugRecord> = ["1", "2", "3", "4", "5", "6"].iter().map(|id| bug(id)).collect();

        let summary = run_pool(&bugs, 3, &["2".to_string()], &log, |bug| match bug.id.as_str() {
            "3" => BugOutcome::Skipped {
                bug_id: bug.id.clone(),
                reason: "search failed".to_string(),
            },
            "4" => BugOutcome::Inapplicable(bug.id.clone()),
            id => BugOutcome::Ranked(BugRanks::new(id, vec![id.parse().unwrap()])),
        })
        .unwrap();

        assert_eq!(summary.ranked.len(), 4);
        assert_eq!(summary.inapplicable, vec!["4".to_string()]);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.total(), 6);

        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.lines().count(), 5);
        assert_eq!(text.lines().last(), Some("2,[2]"));
        assert!(text.contains("4,[]\n"));
        assert!(!text.contains("3,"));
    }

    #[test]
    fn test_single_worker_pool() {
        let dir = TempDir::new().unwrap();
        let log = RankLog::new(dir.path().join("ranks.txt"));
        let bugs = vec![bug("1"), bug("2")];
        let summary = run_pool(&bugs, 1, &[], &log, |bug| {
            BugOutcome::Ranked(BugRanks::new(&bug.id, vec![1]))
        })
        .unwrap();
        assert_eq!(summary.ranked.len(), 2);
        assert_eq!(log.load().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_toolchain_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::embedded_default().unwrap();
        settings.resolve_paths(dir.path());
        let pipeline = Pipeline::new(settings);

        match pipeline.run_bug(&bug("56478")) {
            BugOutcome::Skipped { bug_id, reason } => {
                assert_eq!(bug_id, "56478");
                assert!(reason.contains("r1"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_crash_list_selects_exit_code_oracle() {
        let settings = Settings::embedded_default().unwrap();
        let crash = BugRecord::parse("58343,r1,-O1,-O2,a.c", 1).unwrap();
        let oracle = compiler_oracle(&settings, &crash);
        assert!(format!("{oracle:?}").contains("exit_code_only: true"));
        let normal = compiler_oracle(&settings, &bug("100"));
        assert!(format!("{normal:?}").contains("exit_code_only: false"));
    }
}
