use bot_bootstrap::config::LauncherSettings;
use bot_bootstrap::core::{Bootstrap, PlannedStep};
use bot_bootstrap::utils::{logger, validation::Validate};
use bot_bootstrap::{BootstrapError, CliConfig, LaunchEngine, VenvBootstrap};
use clap::Parser;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_logger(config.verbose, config.log_format);

    tracing::info!("🚀 Starting bot-bootstrap");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 載入並驗證配置
    let settings = match config.resolve().and_then(|s| s.validate().map(|_| s)) {
        Ok(settings) => settings,
        Err(e) => fail(&e),
    };

    display_settings_summary(&settings);

    let bootstrap = VenvBootstrap::new(settings.clone());

    if config.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be executed");
        print_plan(&bootstrap.plan());
        return Ok(());
    }

    if settings.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let engine = LaunchEngine::new_with_monitoring(bootstrap, settings.monitor);

    match engine.run().await {
        Ok(outcome) => {
            tracing::info!(
                "Bot process finished (exit code {}, environment created: {})",
                outcome.exit_code,
                outcome.environment_created
            );
            if outcome.exit_code != 0 {
                std::process::exit(outcome.exit_code);
            }
        }
        Err(e) => fail(&e),
    }

    Ok(())
}

fn fail(e: &BootstrapError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Bootstrap failed: {} (Category: {:?}, Severity: {:?}, Phase: {})",
        e,
        e.category(),
        e.severity(),
        e.phase().map(|p| p.label()).unwrap_or("startup")
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    std::process::exit(e.exit_code());
}

fn display_settings_summary(settings: &LauncherSettings) {
    tracing::info!("📋 Working directory: {}", settings.workdir.display());
    tracing::info!("  Environment: {}", settings.env_dir.display());
    tracing::info!("  Interpreter: {}", settings.interpreter);
    tracing::info!("  Manifest: {}", settings.manifest.display());
    tracing::info!("  Entry point: {}", settings.entry_point.display());
    if !settings.upgrade_installer {
        tracing::info!("  Installer upgrade: skipped");
    }
}

fn print_plan(steps: &[PlannedStep]) {
    println!("🔍 Planned steps:");
    for (index, step) in steps.iter().enumerate() {
        println!("  {}. [{}] {}", index + 1, step.phase, step.description);
        if let Some(command) = &step.command {
            println!("       $ {}", command);
        }
    }
}
