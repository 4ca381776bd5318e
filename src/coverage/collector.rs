//! Coverage collection through gcov

use super::gcov::executed_lines;
use super::lease::{files_with_suffix, remove_files_with_suffix, InstrumentationLease};
use super::CoverageSet;
use crate::configuration::Configuration;
use crate::error::SflResult;
use crate::oracle::{run_with_timeout, ProcessOutcome};
use crate::toolchain::{CompilerKind, Toolchain};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Produces the statement coverage of one compile
pub trait CoverageCollector {
    fn collect(&self, configuration: &Configuration) -> SflResult<CoverageSet>;
}

/// Collector for gcov-instrumented GCC and LLVM builds
///
/// Callers must not run two collections against the same build tree at
/// once; the counters are shared.
#[derive(Debug, Clone)]
pub struct GcovCollector {
    toolchain: Toolchain,
    work_dir: PathBuf,
    input_file: String,
    timeout: Duration,
}

impl GcovCollector {
    pub fn new<W: AsRef<Path>>(toolchain: Toolchain, work_dir: W) -> Self {
        Self {
            toolchain,
            work_dir: work_dir.as_ref().to_path_buf(),
            input_file: "fail.c".to_string(),
            timeout: Duration::from_secs(15),
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

    fn compile(&self, configuration: &Configuration) -> SflResult<()> {
        let mut cmd = Command::new(&self.toolchain.driver);
        cmd.arg("-w")
            .args(configuration.flags())
            .arg(&self.input_file)
            .current_dir(&self.work_dir);
        // Only the counters matter here; the outcome was judged by the oracle
        if let ProcessOutcome::TimedOut = run_with_timeout(&mut cmd, self.timeout)? {
            tracing::warn!(conf = %configuration, "compile timed out while collecting coverage");
        }
        Ok(())
    }

    fn run_gcov(&self, artifact: &Path) -> SflResult<()> {
        let mut cmd = Command::new(&self.toolchain.gcov);
        cmd.arg(artifact).current_dir(&self.toolchain.gcov_cwd);
        match run_with_timeout(&mut cmd, self.timeout)? {
            ProcessOutcome::Finished { exit_code, stderr, .. } if exit_code != 0 => {
                tracing::debug!(artifact = %artifact.display(), exit_code, %stderr, "gcov failed");
            }
            ProcessOutcome::TimedOut => {
                tracing::warn!(artifact = %artifact.display(), "gcov timed out");
            }
            _ => {}
        }
        Ok(())
    }

    fn add_report(set: &mut CoverageSet, source: &str, report: &Path) -> SflResult<()> {
        let bytes = fs::read(report)?;
        let lines = executed_lines(&String::from_utf8_lossy(&bytes));
        set.insert_file(source, lines);
        Ok(())
    }
}

impl CoverageCollector for GcovCollector {
    fn collect(&self, configuration: &Configuration) -> SflResult<CoverageSet> {
        let lease = InstrumentationLease::acquire(&self.toolchain.build_root)?;
        self.compile(configuration)?;

        let root = lease.root();
        let suffix = self.toolchain.report_suffix();
        remove_files_with_suffix(root, suffix)?;

        let artifacts: Vec<PathBuf> = lease
            .artifacts()
            .into_iter()
            .filter(|a| self.toolchain.accepts_artifact(a))
            .collect();

        let mut set = CoverageSet::new();
        match self.toolchain.kind {
            CompilerKind::Gcc => {
                for artifact in &artifacts {
                    self.run_gcov(artifact)?;
                }
                for report in files_with_suffix(root, suffix) {
                    if let Some(source) = self.toolchain.source_for_report(&report) {
                        Self::add_report(&mut set, &source, &report)?;
                    }
                }
            }
            CompilerKind::Llvm => {
                // Reports are named by basename only, so read each before the next run
                for artifact in &artifacts {
                    self.run_gcov(artifact)?;
                    let (Some(report), Some(source)) = (
                        self.toolchain.report_for_artifact(artifact),
                        self.toolchain.source_for_artifact(artifact),
                    ) else {
                        continue;
                    };
                    if report.is_file() {
                        Self::add_report(&mut set, &source, &report)?;
                    }
                }
            }
        }

        tracing::debug!(
            conf = %configuration,
            artifacts = artifacts.len(),
            statements = set.len(),
            files = set.file_count(),
            "collected coverage"
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::StatementId;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    const GCOV: &str = r#"#!/bin/sh
base=$(basename "$1" .gcda)
case "$base" in
  *.cpp) out="$base.gcov" ;;
  *) out="$base.c.gcov" ;;
esac
printf '        -:    0:Source:x\n        3:   10:a\n    #####:   11:b\n        1:   12:c\n' > "$out"
"#;

    fn gcc_setup() -> (TempDir, GcovCollector) {
        let dir = TempDir::new().unwrap();
        let rev = dir.path().join("compilers/r1");
        let build = rev.join("build");
        let driver = format!(
            "#!/bin/sh\n\
             mkdir -p {b}/gcc/testsuite\n\
             touch {b}/gcc/tree-vrp.gcda {b}/gcc/testsuite/t.gcda\n\
             case \" $* \" in *\" -fno-x \"*) ;; *) touch {b}/gcc/predict.gcda ;; esac\n",
            b = build.display()
        );
        script(&build.join("bin/gcc"), &driver);
        script(&build.join("bin/gcov"), GCOV);
        fs::create_dir_all(build.join("gcc")).unwrap();
        fs::write(build.join("gcc/stale.c.gcov"), "        9:    1:x\n").unwrap();

        let work = dir.path().join("bug");
        fs::create_dir_all(&work).unwrap();
        let toolchain = Toolchain::new(CompilerKind::Gcc, &rev, None);
        (dir, GcovCollector::new(toolchain, &work).with_timeout(Duration::from_secs(5)))
    }

    #[test]
    fn test_gcc_collection_follows_flags() {
        let (_dir, collector) = gcc_setup();

        let failing = collector.collect(&Configuration::parse("-O2")).unwrap();
        assert_eq!(failing.to_text(), "gcc/predict.c$10,12\ngcc/tree-vrp.c$10,12");

        let passing = collector.collect(&Configuration::parse("-O2 -fno-x")).unwrap();
        assert_eq!(passing.to_text(), "gcc/tree-vrp.c$10,12");
        assert!(!passing.contains(&StatementId::new("gcc/stale.c", 1)));
    }

    #[test]
    fn test_gcc_collection_resets_counters() {
        let (dir, collector) = gcc_setup();
        collector.collect(&Configuration::parse("-O2")).unwrap();
        let build = dir.path().join("compilers/r1/build");
        assert!(files_with_suffix(&build, ".gcda").is_empty());
    }

    #[test]
    fn test_llvm_collection_maps_cmake_dirs() {
        let dir = TempDir::new().unwrap();
        let rev = dir.path().join("r2");
        let build = rev.join("build");
        let obj = build.join("lib/Transforms/Scalar/CMakeFiles/LLVMScalarOpts.dir");
        let driver = format!(
            "#!/bin/sh\nmkdir -p {o} {b}/tools\ntouch {o}/GVN.cpp.gcda {b}/tools/driver.cpp.gcda\n",
            o = obj.display(),
            b = build.display()
        );
        script(&build.join("bin/clang"), &driver);
        let gcov = dir.path().join("gcov");
        script(&gcov, GCOV);

        let toolchain = Toolchain::new(CompilerKind::Llvm, &rev, Some(gcov));
        let collector = GcovCollector::new(toolchain, dir.path());
        let set = collector.collect(&Configuration::parse("-O3")).unwrap();
        assert_eq!(set.to_text(), "lib/Transforms/Scalar/GVN.cpp$10,12");
    }
}
