use crate::domain::model::Phase;
use std::path::PathBuf;
use thiserror::Error;

/// 無法啟動子程序時回報的退出碼 (與 shell 的 "command not found" 一致)
pub const EXIT_NOT_FOUND: i32 = 127;
/// 子程序存在但無法執行
pub const EXIT_NOT_EXECUTABLE: i32 = 126;
/// 沒有自身退出碼的錯誤
pub const EXIT_FAILURE: i32 = 1;

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to create environment at {}: {message}", path.display())]
    EnvironmentCreation {
        path: PathBuf,
        code: i32,
        message: String,
    },

    #[error("Failed to activate environment at {}: {message}", path.display())]
    Activation { path: PathBuf, message: String },

    #[error("Dependency manifest not found: {}", path.display())]
    ManifestNotFound { path: PathBuf },

    #[error("Dependency installation failed during '{step}': {message}")]
    Installation {
        step: String,
        code: i32,
        message: String,
    },

    #[error("Failed to launch bot entry point {}: {message}", entry_point.display())]
    Launch {
        entry_point: PathBuf,
        code: i32,
        message: String,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Environment,
    Dependencies,
    Launch,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl BootstrapError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BootstrapError::EnvironmentCreation { .. } | BootstrapError::Activation { .. } => {
                ErrorCategory::Environment
            }
            BootstrapError::ManifestNotFound { .. } | BootstrapError::Installation { .. } => {
                ErrorCategory::Dependencies
            }
            BootstrapError::Launch { .. } => ErrorCategory::Launch,
            BootstrapError::ConfigError { .. }
            | BootstrapError::ConfigValidationError { .. }
            | BootstrapError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            BootstrapError::IoError(_) => ErrorCategory::System,
        }
    }

    /// Every bootstrap failure is fatal; severity only distinguishes operator
    /// mistakes from a broken toolchain in the logs.
    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::Medium,
            ErrorCategory::Dependencies | ErrorCategory::Launch => ErrorSeverity::High,
            ErrorCategory::Environment | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 發生錯誤的階段 (設定錯誤發生在任何階段之前)
    pub fn phase(&self) -> Option<Phase> {
        match self {
            BootstrapError::EnvironmentCreation { .. } => Some(Phase::EnsureEnvironment),
            BootstrapError::Activation { .. } => Some(Phase::ActivateEnvironment),
            BootstrapError::ManifestNotFound { .. } | BootstrapError::Installation { .. } => {
                Some(Phase::InstallDependencies)
            }
            BootstrapError::Launch { .. } => Some(Phase::LaunchBot),
            _ => None,
        }
    }

    /// Process exit code for this failure. Child failures keep the child's code.
    pub fn exit_code(&self) -> i32 {
        let code = match self {
            BootstrapError::EnvironmentCreation { code, .. }
            | BootstrapError::Installation { code, .. }
            | BootstrapError::Launch { code, .. } => *code,
            _ => EXIT_FAILURE,
        };
        if code == 0 {
            EXIT_FAILURE
        } else {
            code
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            BootstrapError::EnvironmentCreation { code, .. } if *code == EXIT_NOT_FOUND => {
                "Install Python 3 or point --python at a working interpreter"
            }
            BootstrapError::EnvironmentCreation { .. } => {
                "Check that the interpreter ships the venv module (e.g. python3-venv) and the directory is writable"
            }
            BootstrapError::Activation { .. } => {
                "Delete the environment directory so it is recreated on the next run"
            }
            BootstrapError::ManifestNotFound { .. } => {
                "Create requirements.txt or pass --manifest with the correct path"
            }
            BootstrapError::Installation { .. } => {
                "Check the manifest entries and your network connection, then rerun"
            }
            BootstrapError::Launch { .. } => {
                "Check that the bot entry point exists or pass --entry-point"
            }
            BootstrapError::ConfigError { .. }
            | BootstrapError::ConfigValidationError { .. }
            | BootstrapError::InvalidConfigValueError { .. } => {
                "Fix the configuration file or command line flags and rerun"
            }
            BootstrapError::IoError(_) => "Check file permissions in the working directory",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            BootstrapError::EnvironmentCreation { path, .. } => {
                format!("Could not create the environment at {}", path.display())
            }
            BootstrapError::Activation { path, .. } => {
                format!("The environment at {} is not usable", path.display())
            }
            BootstrapError::ManifestNotFound { path } => {
                format!("No dependency manifest at {}", path.display())
            }
            BootstrapError::Installation { step, code, .. } => {
                format!("'{}' failed with exit code {}", step, code)
            }
            BootstrapError::Launch { entry_point, .. } => {
                format!("Could not start the bot ({})", entry_point.display())
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
