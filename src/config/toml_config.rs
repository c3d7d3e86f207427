use crate::utils::error::{BootstrapError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub environment: Option<EnvironmentConfig>,
    pub dependencies: Option<DependenciesConfig>,
    pub bot: Option<BotConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    pub path: Option<PathBuf>,
    pub interpreter: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependenciesConfig {
    pub manifest: Option<PathBuf>,
    pub upgrade_installer: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    pub entry_point: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| BootstrapError::ConfigError {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| BootstrapError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${BOT_HOME})，未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| BootstrapError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn env_dir(&self) -> Option<&Path> {
        self.environment.as_ref()?.path.as_deref()
    }

    pub fn interpreter(&self) -> Option<&str> {
        self.environment.as_ref()?.interpreter.as_deref()
    }

    pub fn manifest(&self) -> Option<&Path> {
        self.dependencies.as_ref()?.manifest.as_deref()
    }

    pub fn upgrade_installer(&self) -> Option<bool> {
        self.dependencies.as_ref()?.upgrade_installer
    }

    pub fn entry_point(&self) -> Option<&Path> {
        self.bot.as_ref()?.entry_point.as_deref()
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        if let Some(path) = self.env_dir() {
            validation::validate_path("environment.path", path)?;
        }
        if let Some(interpreter) = self.interpreter() {
            validation::validate_non_empty_string("environment.interpreter", interpreter)?;
        }
        if let Some(manifest) = self.manifest() {
            validation::validate_path("dependencies.manifest", manifest)?;
        }
        if let Some(entry_point) = self.entry_point() {
            validation::validate_path("bot.entry_point", entry_point)?;
        }
        Ok(())
    }
}
