// Execution oracle: compile the bug's test program under a configuration,
// run the produced binary, and reduce the result to a comparable signature.
//
// Two configurations behave the same iff their signatures are equal. The
// pass/fail divergence the search chases is "signature equals the one
// produced by the known passing configuration".

mod process;

pub use process::{run_with_timeout, ProcessOutcome};

use crate::configuration::Configuration;
use crate::error::SflResult;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Binary the driver produces in the working directory
const ARTIFACT: &str = "a.out";

/// Canonical outcome of one compile (+ execute) invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutcomeSignature {
    /// Exit code and trimmed streams of the last step that ran
    Completed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    /// Compile exit code alone, for compilers on the crash allow-list
    ExitCode(i32),
    /// Compile step exceeded the limit
    CompileTimeout,
    /// Produced binary exceeded the limit
    ExecuteTimeout,
}

impl fmt::Display for OutcomeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeSignature::Completed {
                exit_code,
                stdout,
                stderr,
            } => write!(f, "{}:{}:{}", exit_code, stdout, stderr),
            OutcomeSignature::ExitCode(code) => write!(f, "{}", code),
            OutcomeSignature::CompileTimeout => write!(f, "CPLTimeoutExpired"),
            OutcomeSignature::ExecuteTimeout => write!(f, "EXETimeoutExpired"),
        }
    }
}

/// Evaluates a configuration against a fixed test program
pub trait ExecutionOracle {
    fn evaluate(&self, configuration: &Configuration) -> SflResult<OutcomeSignature>;
}

/// Oracle backed by a real compiler driver
///
/// # Example
/// ```no_run
/// use compfl::configuration::Configuration;
/// use compfl::oracle::{CompilerOracle, ExecutionOracle};
/// use std::time::Duration;
///
/// let oracle = CompilerOracle::new("compilers/r196310/build/bin/gcc", "benchmark/gccbugs/56478")
///     .with_timeout(Duration::from_secs(15))
///     .exit_code_only(true);
/// let signature = oracle.evaluate(&Configuration::parse("-O2 -c"))?;
/// # Ok::<(), compfl::error::SflError>(())
/// ```
#[derive(Debug, Clone)]
pub struct CompilerOracle {
    driver: PathBuf,
    work_dir: PathBuf,
    input_file: String,
    timeout: Duration,
    exit_code_only: bool,
}

impl CompilerOracle {
    pub fn new<D: AsRef<Path>, W: AsRef<Path>>(driver: D, work_dir: W) -> Self {
        Self {
            driver: driver.as_ref().to_path_buf(),
            work_dir: work_dir.as_ref().to_path_buf(),
            input_file: "fail.c".to_string(),
            timeout: Duration::from_secs(15),
            exit_code_only: false,
        }
    }

    pub fn with_input(mut self, input_file: &str) -> Self {
        self.input_file = input_file.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Compare only the compile exit code (crash diagnostics are too noisy)
    pub fn exit_code_only(mut self, enabled: bool) -> Self {
        self.exit_code_only = enabled;
        self
    }

    /// `<driver> -w <flags...> <input>` inside the working directory
    pub fn compile_command(&self, configuration: &Configuration) -> Command {
        let mut cmd = Command::new(&self.driver);
        cmd.arg("-w")
            .args(configuration.flags())
            .arg(&self.input_file)
            .current_dir(&self.work_dir);
        cmd
    }
}

impl ExecutionOracle for CompilerOracle {
    fn evaluate(&self, configuration: &Configuration) -> SflResult<OutcomeSignature> {
        let artifact = self.work_dir.join(ARTIFACT);
        match std::fs::remove_file(&artifact) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }

        let compiled = run_with_timeout(&mut self.compile_command(configuration), self.timeout)?;
        let (exit_code, stdout, stderr) = match compiled {
            ProcessOutcome::TimedOut => return Ok(OutcomeSignature::CompileTimeout),
            ProcessOutcome::Finished {
                exit_code,
                stdout,
                stderr,
            } => (exit_code, stdout, stderr),
        };

        if self.exit_code_only {
            return Ok(OutcomeSignature::ExitCode(exit_code));
        }
        if exit_code != 0 {
            return Ok(OutcomeSignature::Completed {
                exit_code,
                stdout,
                stderr,
            });
        }

        // Compile-only configurations (-c, -S) leave nothing to run
        if !artifact.is_file() {
            tracing::trace!(conf = %configuration, "no executable produced");
            return Ok(OutcomeSignature::Completed {
                exit_code: 127,
                stdout: String::new(),
                stderr: format!("./{}: not found", ARTIFACT),
            });
        }

        let mut run = Command::new(Path::new(".").join(ARTIFACT));
        run.current_dir(&self.work_dir);
        let signature = match run_with_timeout(&mut run, self.timeout)? {
            ProcessOutcome::TimedOut => OutcomeSignature::ExecuteTimeout,
            ProcessOutcome::Finished {
                exit_code,
                stdout,
                stderr,
            } => OutcomeSignature::Completed {
                exit_code,
                stdout,
                stderr,
            },
        };
        tracing::trace!(conf = %configuration, signature = %signature, "evaluated");
        Ok(signature)
    }
}
