//! Coverage-instrumented compiler toolchains
//!
//! Each revision lives under `<compilers_dir>/<revision>/build`. The two
//! supported families differ in driver name, gcov location, which
//! instrumentation artifacts belong to the compiler proper, and how gcov
//! reports map back to source paths.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Compiler family under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerKind {
    /// GCC: greedy `-f` switch minimization
    Gcc,
    /// Clang/LLVM: `-opt-bisect-limit` bisection
    Llvm,
}

/// Paths of one compiler revision's instrumented build
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub kind: CompilerKind,
    /// Build root; statement paths are relative to it
    pub build_root: PathBuf,
    /// Compiler driver
    pub driver: PathBuf,
    /// gcov executable
    pub gcov: PathBuf,
    /// Directory gcov runs in (and writes its reports to)
    pub gcov_cwd: PathBuf,
}

impl Toolchain {
    pub fn new(kind: CompilerKind, revision_dir: &Path, gcov: Option<PathBuf>) -> Self {
        let build_root = revision_dir.join("build");
        match kind {
            CompilerKind::Gcc => Self {
                kind,
                driver: build_root.join("bin/gcc"),
                gcov: gcov.unwrap_or_else(|| build_root.join("bin/gcov")),
                gcov_cwd: build_root.join("gcc"),
                build_root,
            },
            CompilerKind::Llvm => Self {
                kind,
                driver: build_root.join("bin/clang"),
                gcov: gcov.unwrap_or_else(|| PathBuf::from("gcov-5")),
                gcov_cwd: build_root.clone(),
                build_root,
            },
        }
    }

    /// Whether the build tree exists at all
    pub fn is_installed(&self) -> bool {
        self.build_root.is_dir()
    }

    /// Whether an instrumentation artifact belongs to the compiler proper
    ///
    /// GCC's own testsuite leaves `.gcda` files in the build tree; those
    /// reflect build-time self tests and are never part of an invocation.
    pub fn accepts_artifact(&self, artifact: &Path) -> bool {
        let path = artifact.to_string_lossy();
        match self.kind {
            CompilerKind::Gcc => !path.contains("/gcc/testsuite/"),
            CompilerKind::Llvm => path.contains("/build/lib/"),
        }
    }

    /// Suffix of gcov reports left behind by earlier runs
    pub fn report_suffix(&self) -> &'static str {
        match self.kind {
            CompilerKind::Gcc => ".c.gcov",
            CompilerKind::Llvm => ".cpp.gcov",
        }
    }

    /// gcov report expected for one artifact (LLVM layout)
    pub fn report_for_artifact(&self, artifact: &Path) -> Option<PathBuf> {
        let name = artifact.file_name()?.to_string_lossy();
        let stem = name.strip_suffix(".gcda")?;
        Some(self.gcov_cwd.join(format!("{stem}.gcov")))
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.build_root).ok()?;
        Some(rel.to_string_lossy().into_owned())
    }

    /// Source path of a GCC gcov report found under the build root
    pub fn source_for_report(&self, report: &Path) -> Option<String> {
        Some(self.relative(report)?.replace(".c.gcov", ".c"))
    }

    /// Source path of an LLVM artifact, with the CMake object dir removed
    ///
    /// `lib/Transforms/Scalar/CMakeFiles/LLVMScalarOpts.dir/GVN.cpp.gcda`
    /// becomes `lib/Transforms/Scalar/GVN.cpp`.
    pub fn source_for_artifact(&self, artifact: &Path) -> Option<String> {
        let rel = self.relative(artifact)?.replace(".cpp.gcda", ".cpp");
        let head = rel.split("/CMakeFiles/").next()?;
        let (_, tail) = rel.split_once(".dir")?;
        Some(format!("{head}{tail}"))
    }
}
