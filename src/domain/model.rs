use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

#[cfg(windows)]
const BIN_DIR: &str = "Scripts";
#[cfg(not(windows))]
const BIN_DIR: &str = "bin";

#[cfg(windows)]
const PYTHON_EXE: &str = "python.exe";
#[cfg(not(windows))]
const PYTHON_EXE: &str = "python";

/// The four bootstrap phases, in the only order they ever run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    EnsureEnvironment,
    ActivateEnvironment,
    InstallDependencies,
    LaunchBot,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::EnsureEnvironment,
        Phase::ActivateEnvironment,
        Phase::InstallDependencies,
        Phase::LaunchBot,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Phase::EnsureEnvironment => "ensure environment",
            Phase::ActivateEnvironment => "activate environment",
            Phase::InstallDependencies => "install dependencies",
            Phase::LaunchBot => "launch bot",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Paths inside an isolated environment directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentLayout {
    pub root: PathBuf,
    pub bin_dir: PathBuf,
    pub python: PathBuf,
}

impl EnvironmentLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let bin_dir = root.join(BIN_DIR);
        let python = bin_dir.join(PYTHON_EXE);
        Self {
            root,
            bin_dir,
            python,
        }
    }

    pub fn exists(&self) -> bool {
        self.root.exists()
    }
}

/// What a shell `activate` script would have changed, captured as data and
/// applied to every child process started afterwards.
#[derive(Debug, Clone)]
pub struct ActiveEnvironment {
    pub layout: EnvironmentLayout,
    /// `PATH` with the environment's bin directory first.
    pub path_var: OsString,
}

impl ActiveEnvironment {
    pub fn python(&self) -> &Path {
        &self.layout.python
    }

    pub fn virtual_env(&self) -> &Path {
        &self.layout.root
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOutcome {
    /// Exit code of the bot process (128 + signal when it was killed).
    pub exit_code: i32,
    pub environment_created: bool,
}

/// One step of a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub phase: Phase,
    pub description: String,
    pub command: Option<String>,
}

impl PlannedStep {
    pub fn new(phase: Phase, description: impl Into<String>) -> Self {
        Self {
            phase,
            description: description.into(),
            command: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }
}
