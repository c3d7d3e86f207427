pub mod toml_config;

use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use std::path::{Path, PathBuf};
use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use crate::utils::logger::LogFormat;
#[cfg(feature = "cli")]
use clap::Parser;

pub const DEFAULT_CONFIG_FILE: &str = "bootstrap.toml";
pub const DEFAULT_ENV_DIR: &str = "venv";
pub const DEFAULT_MANIFEST: &str = "requirements.txt";
pub const DEFAULT_ENTRY_POINT: &str = "src/bot.py";
#[cfg(windows)]
pub const DEFAULT_INTERPRETER: &str = "python";
#[cfg(not(windows))]
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Fully resolved settings: defaults, then the TOML file, then CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherSettings {
    pub workdir: PathBuf,
    pub env_dir: PathBuf,
    pub manifest: PathBuf,
    pub entry_point: PathBuf,
    pub interpreter: String,
    pub upgrade_installer: bool,
    pub monitor: bool,
}

impl LauncherSettings {
    pub fn with_workdir(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            env_dir: PathBuf::from(DEFAULT_ENV_DIR),
            manifest: PathBuf::from(DEFAULT_MANIFEST),
            entry_point: PathBuf::from(DEFAULT_ENTRY_POINT),
            interpreter: DEFAULT_INTERPRETER.to_string(),
            upgrade_installer: true,
            monitor: false,
        }
    }

    /// Layers the values present in a TOML file over the current settings.
    pub fn merge_toml(mut self, file: &TomlConfig) -> Self {
        if let Some(path) = file.env_dir() {
            self.env_dir = path.to_path_buf();
        }
        if let Some(interpreter) = file.interpreter() {
            self.interpreter = interpreter.to_string();
        }
        if let Some(manifest) = file.manifest() {
            self.manifest = manifest.to_path_buf();
        }
        if let Some(upgrade) = file.upgrade_installer() {
            self.upgrade_installer = upgrade;
        }
        if let Some(entry_point) = file.entry_point() {
            self.entry_point = entry_point.to_path_buf();
        }
        self.monitor = self.monitor || file.monitoring_enabled();
        self
    }
}

impl ConfigProvider for LauncherSettings {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn env_dir(&self) -> &Path {
        &self.env_dir
    }

    fn manifest(&self) -> &Path {
        &self.manifest
    }

    fn entry_point(&self) -> &Path {
        &self.entry_point
    }

    fn interpreter(&self) -> &str {
        &self.interpreter
    }

    fn upgrade_installer(&self) -> bool {
        self.upgrade_installer
    }
}

impl Validate for LauncherSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_existing_dir("workdir", &self.workdir)?;
        validation::validate_path("environment.path", &self.env_dir)?;
        validation::validate_path("dependencies.manifest", &self.manifest)?;
        validation::validate_path("bot.entry_point", &self.entry_point)?;
        validation::validate_non_empty_string("environment.interpreter", &self.interpreter)?;
        Ok(())
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "bot-bootstrap")]
#[command(about = "Prepare an isolated Python environment and launch the media-to-Telegraph bot")]
pub struct CliConfig {
    /// Directory the environment, manifest and entry point are relative to
    #[arg(short = 'C', long, default_value = ".")]
    pub workdir: PathBuf,

    /// TOML configuration file, relative to the current directory
    /// (defaults to bootstrap.toml in the workdir, if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Environment directory
    #[arg(long)]
    pub env_dir: Option<PathBuf>,

    /// Dependency manifest passed to `pip install -r`
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Bot entry point script
    #[arg(long)]
    pub entry_point: Option<PathBuf>,

    /// Interpreter used to create the environment
    #[arg(long)]
    pub python: Option<String>,

    /// Skip upgrading pip before installing the manifest
    #[arg(long)]
    pub no_upgrade_installer: bool,

    #[arg(long, help = "Log resource usage after each phase")]
    pub monitor: bool,

    /// Print the steps that would run, without running them
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 合併預設值、設定檔與命令列參數
    pub fn resolve(&self) -> Result<LauncherSettings> {
        let workdir = std::path::absolute(&self.workdir)?;

        let file = match self.config_file(&workdir) {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path.display());
                Some(TomlConfig::from_file(&path)?)
            }
            None => None,
        };

        let mut settings = LauncherSettings::with_workdir(workdir);
        if let Some(file) = &file {
            file.validate()?;
            settings = settings.merge_toml(file);
        }
        self.apply_overrides(&mut settings);

        Ok(settings)
    }

    /// An explicit `--config` is used as given, so a relative path is read
    /// from the invoking directory. Otherwise `bootstrap.toml` in the
    /// workdir is picked up if present.
    pub fn config_file(&self, workdir: &Path) -> Option<PathBuf> {
        if let Some(path) = &self.config {
            return Some(path.clone());
        }
        let default = workdir.join(DEFAULT_CONFIG_FILE);
        default.is_file().then_some(default)
    }

    fn apply_overrides(&self, settings: &mut LauncherSettings) {
        if let Some(env_dir) = &self.env_dir {
            settings.env_dir = env_dir.clone();
        }
        if let Some(manifest) = &self.manifest {
            settings.manifest = manifest.clone();
        }
        if let Some(entry_point) = &self.entry_point {
            settings.entry_point = entry_point.clone();
        }
        if let Some(python) = &self.python {
            settings.interpreter = python.clone();
        }
        if self.no_upgrade_installer {
            settings.upgrade_installer = false;
        }
        if self.monitor {
            settings.monitor = true;
        }
    }
}
