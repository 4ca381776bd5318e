//! CLI argument parsing for compfl

use crate::spectrum::SbflFormula;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "compfl")]
#[command(version)]
#[command(
    about = "Spectrum-based fault localization for compiler regressions",
    long_about = None
)]
pub struct Cli {
    /// Settings file (TOML); the embedded defaults are used when omitted
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug tracing output (to stderr)
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search, collect coverage and rank every corpus bug
    Run {
        /// Suspiciousness formula
        #[arg(long, value_enum)]
        formula: Option<SbflFormula>,

        /// Worker pool size
        #[arg(short = 'j', long)]
        workers: Option<usize>,

        /// Compile/execute timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Process bugs one at a time
        #[arg(long)]
        sequential: bool,

        /// Only run these bug ids (repeatable)
        #[arg(long = "bug", value_name = "ID")]
        bugs: Vec<String>,
    },

    /// Recompute scores and ranks from stored coverage, without compiling
    Rerank {
        /// Suspiciousness formula
        #[arg(long, value_enum)]
        formula: Option<SbflFormula>,

        /// Only rerank these bug ids (repeatable)
        #[arg(long = "bug", value_name = "ID")]
        bugs: Vec<String>,
    },

    /// Print Top-K, MFR and MAR for a rank log
    Metrics {
        /// Rank log to read instead of the configured one
        #[arg(long, value_name = "PATH")]
        rank_file: Option<PathBuf>,
    },

    /// Flip random switches of a bug's failing configurations
    Audit {
        /// Bug id, e.g. 56478
        #[arg(long)]
        bug_id: String,

        /// Number of random trials
        #[arg(long, default_value = "20")]
        samples: usize,

        /// Max switches flipped per trial
        #[arg(long, default_value = "3")]
        max_flips: usize,

        /// Compile/execute timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Random seed for reproducibility
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Also write enabled-option counts for original vs minimized config
        #[arg(long)]
        show_summary: bool,
    },
}
