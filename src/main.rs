use anyhow::{Context, Result};
use clap::Parser;
use compfl::cli::{Cli, Command};
use compfl::corpus::{load_corpus, BugRecord};
use compfl::metrics::CorpusMetrics;
use compfl::pipeline::{Pipeline, RunSummary};
use compfl::settings::Settings;
use compfl::storage::RankLog;
use compfl::validator::{audit_bug, AuditConfig};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `--debug` forces TRACE
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Corpus restricted to `ids`, or all of it when `ids` is empty
fn select_bugs(corpus: Vec<BugRecord>, ids: &[String]) -> Result<Vec<BugRecord>> {
    if ids.is_empty() {
        return Ok(corpus);
    }
    if let Some(unknown) = ids.iter().find(|id| !corpus.iter().any(|b| &b.id == *id)) {
        anyhow::bail!("Bug {} is not in the corpus", unknown);
    }
    Ok(corpus.into_iter().filter(|b| ids.contains(&b.id)).collect())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Ranked: {}, inapplicable: {}, skipped: {}",
        summary.ranked.len(),
        summary.inapplicable.len(),
        summary.skipped.len()
    );
    for (bug_id, reason) in &summary.skipped {
        println!("  skipped {}: {}", bug_id, reason);
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let mut settings = Settings::load(args.config.as_deref())?;

    match args.command {
        Command::Run {
            formula,
            workers,
            timeout,
            sequential,
            bugs,
        } => {
            if let Some(formula) = formula {
                settings.formula = formula;
            }
            if let Some(workers) = workers {
                settings.workers = workers;
            }
            if let Some(timeout) = timeout {
                settings.timeout_secs = timeout;
            }
            if sequential {
                settings.parallel = false;
            }
            settings.validate().map_err(|e| anyhow::anyhow!(e))?;

            let corpus = select_bugs(load_corpus(&settings.corpus_file)?, &bugs)?;
            let pipeline = Pipeline::new(settings);
            let summary = pipeline.run_corpus(&corpus)?;
            print_summary(&summary);
        }
        Command::Rerank { formula, bugs } => {
            if let Some(formula) = formula {
                settings.formula = formula;
            }
            let corpus = select_bugs(load_corpus(&settings.corpus_file)?, &bugs)?;
            let pipeline = Pipeline::new(settings);
            let summary = pipeline.rerank(&corpus)?;
            print_summary(&summary);
        }
        Command::Metrics { rank_file } => {
            let log = RankLog::new(rank_file.unwrap_or_else(|| settings.rank_file.clone()));
            let bugs = log.load()?;
            let metrics = CorpusMetrics::evaluate(&bugs);
            print!("{}", metrics.to_report_string(&bugs));
        }
        Command::Audit {
            bug_id,
            samples,
            max_flips,
            timeout,
            seed,
            show_summary,
        } => {
            if let Some(timeout) = timeout {
                settings.timeout_secs = timeout;
            }
            settings.validate().map_err(|e| anyhow::anyhow!(e))?;
            let config = AuditConfig {
                trials: samples,
                max_flips,
                seed,
            };
            config.validate().map_err(|e| anyhow::anyhow!(e))?;

            let (report, files) = audit_bug(&settings, &bug_id, &config, show_summary)
                .with_context(|| format!("Audit of bug {} failed", bug_id))?;
            if let Some(summary) = &files.summary {
                println!("Wrote options summary to {}", summary.display());
            }
            println!("Wrote validation report to {}", files.report.display());
            let successes = report.successes().len();
            if successes > 0 {
                println!(
                    "Found {} flipped configurations that PASS. FAIL CONFIGS may not be globally minimal.",
                    successes
                );
            } else {
                println!("No flipped configurations became PASS in sampled trials.");
            }
        }
    }

    Ok(())
}
