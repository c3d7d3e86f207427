use crate::domain::model::{LaunchOutcome, Phase, PlannedStep};
use crate::domain::ports::Bootstrap;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// Drives a `Bootstrap` through ensure → activate → install → launch.
/// The first error ends the run; nothing is retried or rolled back.
pub struct LaunchEngine<B: Bootstrap> {
    bootstrap: B,
    monitor: SystemMonitor,
}

impl<B: Bootstrap> LaunchEngine<B> {
    pub fn new(bootstrap: B) -> Self {
        Self::new_with_monitoring(bootstrap, false)
    }

    pub fn new_with_monitoring(bootstrap: B, monitor_enabled: bool) -> Self {
        Self {
            bootstrap,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn bootstrap(&self) -> &B {
        &self.bootstrap
    }

    pub fn plan(&self) -> Vec<PlannedStep> {
        self.bootstrap.plan()
    }

    pub async fn run(&self) -> Result<LaunchOutcome> {
        // Ensure
        announce(Phase::EnsureEnvironment, "Checking environment...");
        let environment_created = self.bootstrap.ensure_environment().await?;
        if environment_created {
            println!("Environment created");
        } else {
            println!("Environment already exists, reusing it");
        }
        self.monitor.log_stats(Phase::EnsureEnvironment.label());

        // Activate
        announce(Phase::ActivateEnvironment, "Activating environment...");
        let env = self.bootstrap.activate_environment().await?;
        self.monitor.log_stats(Phase::ActivateEnvironment.label());

        // Install
        announce(Phase::InstallDependencies, "Installing dependencies...");
        self.bootstrap.install_dependencies(&env).await?;
        self.monitor.log_stats(Phase::InstallDependencies.label());

        // Launch
        announce(Phase::LaunchBot, "Starting the bot...");
        let exit_code = self.bootstrap.launch_bot(&env).await?;
        self.monitor.log_final_stats();

        Ok(LaunchOutcome {
            exit_code,
            environment_created,
        })
    }
}

fn announce(phase: Phase, message: &str) {
    tracing::debug!(phase = %phase, "Entering phase");
    println!("{}", message);
}
