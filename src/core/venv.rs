use crate::core::process::{
    self, apply_environment, describe, run_forwarding_signals, run_to_completion,
};
use crate::domain::model::{ActiveEnvironment, EnvironmentLayout, Phase, PlannedStep};
use crate::domain::ports::{Bootstrap, ConfigProvider};
use crate::utils::error::{BootstrapError, Result, EXIT_FAILURE};
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Bootstrap backed by the interpreter's `venv` module and `pip`.
pub struct VenvBootstrap<C: ConfigProvider> {
    pub(crate) config: C,
}

impl<C: ConfigProvider> VenvBootstrap<C> {
    pub fn new(config: C) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn layout(&self) -> EnvironmentLayout {
        EnvironmentLayout::new(self.resolve(self.config.env_dir()))
    }

    fn manifest_path(&self) -> PathBuf {
        self.resolve(self.config.manifest())
    }

    fn entry_point_path(&self) -> PathBuf {
        self.resolve(self.config.entry_point())
    }

    fn resolve(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.workdir().join(path)
        }
    }

    fn command(&self, program: impl AsRef<std::ffi::OsStr>) -> Command {
        let mut command = Command::new(program);
        command.current_dir(self.config.workdir());
        command
    }

    /// pip invocations in the order they run.
    fn install_steps(&self) -> Vec<Vec<OsString>> {
        let mut steps = Vec::new();
        if self.config.upgrade_installer() {
            steps.push(
                ["-m", "pip", "install", "--upgrade", "pip"]
                    .iter()
                    .map(OsString::from)
                    .collect(),
            );
        }
        let mut install: Vec<OsString> = ["-m", "pip", "install", "-r"]
            .iter()
            .map(OsString::from)
            .collect();
        install.push(self.manifest_path().into_os_string());
        steps.push(install);
        steps
    }
}

#[async_trait::async_trait]
impl<C: ConfigProvider> Bootstrap for VenvBootstrap<C> {
    async fn ensure_environment(&self) -> Result<bool> {
        let layout = self.layout();
        if layout.exists() {
            tracing::debug!("Reusing environment at {}", layout.root.display());
            return Ok(false);
        }

        let interpreter = self.config.interpreter();
        let args = [OsStr::new("-m"), OsStr::new("venv"), layout.root.as_os_str()];
        let command_line = describe(interpreter, &args);
        tracing::info!("Creating environment: {}", command_line);

        let mut command = self.command(interpreter);
        command.args(["-m", "venv"]).arg(&layout.root);

        run_to_completion(command, &command_line)
            .await
            .map_err(|failure| BootstrapError::EnvironmentCreation {
                path: layout.root.clone(),
                code: failure.code,
                message: failure.message,
            })?;

        Ok(true)
    }

    async fn activate_environment(&self) -> Result<ActiveEnvironment> {
        let layout = self.layout();
        if !layout.python.is_file() {
            return Err(BootstrapError::Activation {
                path: layout.root.clone(),
                message: format!("no interpreter at {}", layout.python.display()),
            });
        }

        // 將環境的 bin 目錄放在 PATH 最前面
        let mut paths = vec![layout.bin_dir.clone()];
        if let Some(existing) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&existing));
        }
        let path_var = std::env::join_paths(paths).map_err(|e| BootstrapError::Activation {
            path: layout.root.clone(),
            message: format!("cannot build PATH: {}", e),
        })?;

        tracing::debug!("Activated environment at {}", layout.root.display());
        Ok(ActiveEnvironment { layout, path_var })
    }

    async fn install_dependencies(&self, env: &ActiveEnvironment) -> Result<()> {
        let manifest = self.manifest_path();
        if !manifest.is_file() {
            return Err(BootstrapError::ManifestNotFound { path: manifest });
        }

        for args in self.install_steps() {
            let command_line = describe(env.python(), &args[..]);
            tracing::info!("Installing: {}", command_line);

            let mut command = self.command(env.python());
            command.args(&args);
            apply_environment(&mut command, env);

            run_to_completion(command, &command_line)
                .await
                .map_err(|failure| BootstrapError::Installation {
                    step: command_line.clone(),
                    code: failure.code,
                    message: failure.message,
                })?;
        }

        Ok(())
    }

    async fn launch_bot(&self, env: &ActiveEnvironment) -> Result<i32> {
        let entry_point = self.entry_point_path();
        if !entry_point.is_file() {
            return Err(BootstrapError::Launch {
                entry_point,
                code: EXIT_FAILURE,
                message: "entry point does not exist".to_string(),
            });
        }

        let command_line = describe(env.python(), &[entry_point.as_os_str()]);
        tracing::info!("Starting {}", command_line);

        // 不傳遞任何參數，也不提供 stdin
        let mut command = self.command(env.python());
        command
            .arg(&entry_point)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        apply_environment(&mut command, env);

        let status = run_forwarding_signals(command, &command_line)
            .await
            .map_err(|failure| BootstrapError::Launch {
                entry_point: entry_point.clone(),
                code: failure.code,
                message: failure.message,
            })?;

        let code = process::status_code(status);
        tracing::info!("Bot exited with code {}", code);
        Ok(code)
    }

    fn plan(&self) -> Vec<PlannedStep> {
        let layout = self.layout();
        let mut steps = Vec::new();

        if layout.exists() {
            steps.push(PlannedStep::new(
                Phase::EnsureEnvironment,
                format!("Reuse existing environment at {}", layout.root.display()),
            ));
        } else {
            let args = [OsStr::new("-m"), OsStr::new("venv"), layout.root.as_os_str()];
            steps.push(
                PlannedStep::new(
                    Phase::EnsureEnvironment,
                    format!("Create environment at {}", layout.root.display()),
                )
                .with_command(describe(self.config.interpreter(), &args)),
            );
        }

        steps.push(PlannedStep::new(
            Phase::ActivateEnvironment,
            format!("Use interpreter {}", layout.python.display()),
        ));

        for args in self.install_steps() {
            steps.push(
                PlannedStep::new(Phase::InstallDependencies, "Run installer")
                    .with_command(describe(&layout.python, &args[..])),
            );
        }

        let entry_point = self.entry_point_path();
        steps.push(
            PlannedStep::new(Phase::LaunchBot, "Start the bot")
                .with_command(describe(&layout.python, &[entry_point.as_os_str()])),
        );

        steps
    }
}
