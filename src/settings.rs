// Tool settings loaded from TOML
//
// The crash allow-list and the diagnostic-switch deny-list live here as plain
// data and are handed to the oracle and the search when they are built.

use crate::spectrum::SbflFormula;
use crate::toolchain::{CompilerKind, Toolchain};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_TOML: &str = include_str!("../compfl-default.toml");

/// Settings for one localization campaign
///
/// # Example
/// ```
/// use compfl::settings::Settings;
///
/// let settings = Settings::embedded_default().unwrap();
/// assert_eq!(settings.timeout_secs, 15);
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Compiler family under test
    pub compiler: CompilerKind,

    /// Directory holding one `<revision>/build` tree per compiler revision
    pub compilers_dir: PathBuf,

    /// Directory holding one working directory per bug id
    pub benchmark_dir: PathBuf,

    /// Corpus description file
    pub corpus_file: PathBuf,

    /// Root of the per-bug coverage and score storage
    pub coverage_dir: PathBuf,

    /// Append-only ranking log
    pub rank_file: PathBuf,

    /// Test program compiled inside each bug's working directory
    #[serde(default = "default_input_file")]
    pub input_file: String,

    /// Wall-clock limit applied separately to compile and execute steps
    pub timeout_secs: u64,

    /// Worker pool size
    pub workers: usize,

    /// Run bugs through the worker pool (false: strictly one after another)
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Suspiciousness formula for ranking
    #[serde(default)]
    pub formula: SbflFormula,

    /// Override for the gcov executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcov: Option<PathBuf>,

    /// Bugs whose compiler crashes; their signatures use only the exit code
    #[serde(default)]
    pub crash_bug_ids: Vec<String>,

    /// Flipped switches never tried during minimization
    #[serde(default)]
    pub skipped_switches: Vec<String>,

    /// Bugs run one at a time after the worker pool drains
    #[serde(default)]
    pub sequential_bug_ids: Vec<String>,
}

fn default_input_file() -> String {
    "fail.c".to_string()
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Settings compiled into the binary
    pub fn embedded_default() -> Result<Self> {
        toml::from_str(DEFAULT_TOML).context("Failed to parse embedded compfl-default.toml")
    }

    /// Load settings from a TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read settings file: {}", path.as_ref().display())
        })?;
        let settings: Settings =
            toml::from_str(&content).with_context(|| "Failed to parse TOML settings")?;
        Ok(settings)
    }

    /// Load from `path` when given, otherwise fall back to the embedded defaults
    ///
    /// Relative paths are resolved against the settings file's directory, or
    /// the current directory for the embedded defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let (mut settings, base) = match path {
            Some(path) => {
                let base = match path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => cwd.join(parent),
                    _ => cwd,
                };
                (Self::from_toml(path)?, base)
            }
            None => (Self::embedded_default()?, cwd),
        };
        settings.validate().map_err(|e| anyhow::anyhow!(e))?;
        settings.resolve_paths(&base);
        Ok(settings)
    }

    /// Make every relative path absolute against `base`
    ///
    /// Compiler and gcov processes run with the bug's working directory as
    /// their current directory, so relative paths would resolve against it.
    /// A bare gcov command name is left for `PATH` lookup.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.compilers_dir,
            &mut self.benchmark_dir,
            &mut self.corpus_file,
            &mut self.coverage_dir,
            &mut self.rank_file,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if let Some(gcov) = self.gcov.as_mut() {
            if gcov.is_relative() && gcov.components().count() > 1 {
                *gcov = base.join(&*gcov);
            }
        }
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be > 0".to_string());
        }

        if self.workers == 0 {
            return Err("workers must be > 0".to_string());
        }

        if self.input_file.is_empty() {
            return Err("input_file must not be empty".to_string());
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn skipped_set(&self) -> HashSet<String> {
        self.skipped_switches.iter().cloned().collect()
    }

    /// Toolchain paths for one compiler revision
    pub fn toolchain(&self, revision: &str) -> Toolchain {
        Toolchain::new(
            self.compiler,
            &self.compilers_dir.join(revision),
            self.gcov.clone(),
        )
    }

    /// Working directory of one bug
    pub fn bug_dir(&self, bug_id: &str) -> PathBuf {
        self.benchmark_dir.join(bug_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults() {
        let settings = Settings::embedded_default().unwrap();
        assert_eq!(settings.compiler, CompilerKind::Gcc);
        assert_eq!(settings.workers, 10);
        assert_eq!(settings.formula, SbflFormula::Ochiai);
        assert_eq!(settings.crash_bug_ids.len(), 5);
        assert!(settings.skipped_set().contains("-fno-rtti"));
        assert_eq!(settings.sequential_bug_ids, vec!["61518"]);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_minimal_toml_uses_field_defaults() {
        let toml = r#"
            compiler = "llvm"
            compilers_dir = "c"
            benchmark_dir = "b"
            corpus_file = "b/llvmbugs_summary.txt"
            coverage_dir = "cov"
            rank_file = "ranks.txt"
            timeout_secs = 5
            workers = 2
        "#;
        let settings: Settings = toml::from_str(toml).unwrap();
        assert_eq!(settings.compiler, CompilerKind::Llvm);
        assert_eq!(settings.input_file, "fail.c");
        assert!(settings.parallel);
        assert!(settings.crash_bug_ids.is_empty());
    }

    #[test]
    fn test_invalid_timeout() {
        let mut settings = Settings::embedded_default().unwrap();
        settings.timeout_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_invalid_workers() {
        let mut settings = Settings::embedded_default().unwrap();
        settings.workers = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_resolve_paths() {
        let mut settings = Settings::embedded_default().unwrap();
        settings.rank_file = PathBuf::from("/abs/ranks.txt");
        settings.gcov = Some(PathBuf::from("gcov-5"));
        settings.resolve_paths(Path::new("/work"));
        assert_eq!(settings.compilers_dir, PathBuf::from("/work/compilers"));
        assert_eq!(settings.rank_file, PathBuf::from("/abs/ranks.txt"));
        assert_eq!(settings.gcov, Some(PathBuf::from("gcov-5")));
        assert_eq!(
            settings.bug_dir("56478"),
            PathBuf::from("/work/benchmark/gccbugs/56478")
        );
    }

    #[test]
    fn test_from_toml_missing_file() {
        assert!(Settings::from_toml("/nonexistent/compfl.toml").is_err());
    }
}
