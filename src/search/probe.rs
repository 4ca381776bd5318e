//! Queries about a compiler's option space

use crate::configuration::Configuration;
use crate::error::{SflError, SflResult};
use crate::oracle::{run_with_timeout, ProcessOutcome};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Option-space questions the search strategies ask
pub trait OptionProbe {
    /// `-f` switches enabled under `configuration`, sorted
    fn enabled_switches(&self, configuration: &Configuration) -> SflResult<Vec<String>>;

    /// Number of cutoff-controlled passes `configuration` runs with no cutoff
    fn max_cutoff(&self, configuration: &Configuration) -> SflResult<u64>;
}

/// Parse `gcc -Q --help=optimizers` output into the enabled switches
///
/// Only two-column lines (`-fname  [enabled]`) count; valued options such as
/// `-falign-loops=` are ignored.
pub fn parse_enabled_switches(help: &str) -> Vec<String> {
    let mut enabled: Vec<String> = help
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('-'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let (name, status) = (parts.next()?, parts.next()?);
            (parts.next().is_none() && status == "[enabled]").then(|| name.to_string())
        })
        .collect();
    enabled.sort();
    enabled.dedup();
    enabled
}

/// Probe backed by the compiler driver
#[derive(Debug, Clone)]
pub struct CompilerProbe {
    driver: PathBuf,
    work_dir: PathBuf,
    input_file: String,
    timeout: Duration,
}

impl CompilerProbe {
    pub fn new<D: AsRef<Path>, W: AsRef<Path>>(
        driver: D,
        work_dir: W,
        input_file: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            driver: driver.as_ref().to_path_buf(),
            work_dir: work_dir.as_ref().to_path_buf(),
            input_file: input_file.to_string(),
            timeout,
        }
    }

    fn run(&self, cmd: &mut Command) -> SflResult<(String, String)> {
        cmd.current_dir(&self.work_dir);
        match run_with_timeout(cmd, self.timeout)? {
            ProcessOutcome::Finished { stdout, stderr, .. } => Ok((stdout, stderr)),
            ProcessOutcome::TimedOut => Err(SflError::Search(format!(
                "option probe with {} timed out",
                self.driver.display()
            ))),
        }
    }
}

impl OptionProbe for CompilerProbe {
    fn enabled_switches(&self, configuration: &Configuration) -> SflResult<Vec<String>> {
        let mut cmd = Command::new(&self.driver);
        cmd.arg("-Q").arg("--help=optimizers").args(configuration.flags());
        let (stdout, _) = self.run(&mut cmd)?;
        Ok(parse_enabled_switches(&stdout))
    }

    fn max_cutoff(&self, configuration: &Configuration) -> SflResult<u64> {
        // Every pass the bisect machinery sees prints one line
        let mut cmd = Command::new(&self.driver);
        cmd.args(configuration.with_cutoff(-1).flags())
            .arg(&self.input_file);
        let (stdout, stderr) = self.run(&mut cmd)?;
        Ok((stdout.lines().count() + stderr.lines().count()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enabled_switches() {
        let help = "The following options control optimizations:\n\
                    \x20 -fgcse                       [enabled]\n\
                    \x20 -fgcse-las                   [disabled]\n\
                    \x20 -falign-loops=               0\n\
                    \x20 -ftree-vrp                   [enabled]\n\
                    \x20 -fno-threadsafe-statics      [enabled]\n";
        assert_eq!(
            parse_enabled_switches(help),
            vec!["-fgcse", "-fno-threadsafe-statics", "-ftree-vrp"]
        );
    }

    #[test]
    fn test_parse_enabled_switches_empty() {
        assert!(parse_enabled_switches("").is_empty());
    }
}
