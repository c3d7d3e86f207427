#![cfg(unix)]

use anyhow::Result;
use bot_bootstrap::core::{Bootstrap, Phase};
use bot_bootstrap::utils::error::EXIT_NOT_FOUND;
use bot_bootstrap::{BootstrapError, LaunchEngine, LauncherSettings, VenvBootstrap};
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// Scripts are written and then executed; serialising the tests keeps a
// concurrent fork from inheriting an open write handle (ETXTBSY).
static SERIAL: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

/// Stands in for python: `-m venv` copies itself into `<dir>/bin/python`,
/// `-m pip` logs and fails on manifest lines starting with `!!`, anything
/// else is treated as the bot: it logs its arguments, whether stdin had
/// data, writes its pid next to the log and then runs `@BOT_TAIL@`.
const FAKE_PYTHON: &str = r#"#!/bin/sh
log='@LOG@'
if [ "$1" = "-m" ] && [ "$2" = "venv" ]; then
  echo "venv $3" >> "$log"
  if [ "@VENV_EXIT@" != "0" ]; then exit @VENV_EXIT@; fi
  mkdir -p "$3/bin"
  cp "$0" "$3/bin/python"
  chmod +x "$3/bin/python"
  exit 0
fi
if [ "$1" = "-m" ] && [ "$2" = "pip" ]; then
  shift 2
  echo "pip $*" >> "$log"
  if [ "$2" = "-r" ] && grep -q '^!!' "$3"; then exit 3; fi
  exit 0
fi
echo "launch $# $*" >> "$log"
echo "env $VIRTUAL_ENV" >> "$log"
if read -r line; then echo "stdin data" >> "$log"; else echo "stdin eof" >> "$log"; fi
echo $$ > "$log.pid"
@BOT_TAIL@
"#;

struct Workspace {
    dir: TempDir,
    python: PathBuf,
    log: PathBuf,
}

impl Workspace {
    fn new(venv_exit: i32, bot_exit: i32) -> Result<Self> {
        Self::with_bot(venv_exit, &format!("exit {}", bot_exit))
    }

    fn with_bot(venv_exit: i32, bot_tail: &str) -> Result<Self> {
        let dir = TempDir::new()?;
        let log = dir.path().join("calls.log");
        let python = dir.path().join("fake-python");

        let script = FAKE_PYTHON
            .replace("@LOG@", log.to_str().unwrap())
            .replace("@VENV_EXIT@", &venv_exit.to_string())
            .replace("@BOT_TAIL@", bot_tail);
        std::fs::write(&python, script)?;
        std::fs::set_permissions(&python, std::fs::Permissions::from_mode(0o755))?;

        std::fs::create_dir_all(dir.path().join("src"))?;
        std::fs::write(dir.path().join("src/bot.py"), "print('bot')\n")?;
        std::fs::write(
            dir.path().join("requirements.txt"),
            "pyTelegramBotAPI\ntelegraph\nrequests\npython-dotenv\n",
        )?;

        Ok(Self { dir, python, log })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn settings(&self) -> LauncherSettings {
        let mut settings = LauncherSettings::with_workdir(self.path());
        settings.interpreter = self.python.to_str().unwrap().to_string();
        settings
    }

    fn bot_pid(&self) -> Option<libc::pid_t> {
        let pid_file = PathBuf::from(format!("{}.pid", self.log.display()));
        std::fs::read_to_string(pid_file).ok()?.trim().parse().ok()
    }

    fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

#[tokio::test]
async fn test_full_run_creates_installs_and_launches() -> Result<()> {
    let _guard = SERIAL.lock().await;
    let ws = Workspace::new(0, 0)?;

    let engine = LaunchEngine::new(VenvBootstrap::new(ws.settings()));
    let outcome = engine.run().await?;

    assert!(outcome.environment_created);
    assert_eq!(outcome.exit_code, 0);
    assert!(ws.path().join("venv/bin/python").is_file());

    let calls = ws.calls();
    let venv = ws.path().join("venv");
    let manifest = ws.path().join("requirements.txt");
    let entry = ws.path().join("src/bot.py");
    assert_eq!(
        calls,
        vec![
            format!("venv {}", venv.display()),
            "pip install --upgrade pip".to_string(),
            format!("pip install -r {}", manifest.display()),
            format!("launch 1 {}", entry.display()),
            format!("env {}", venv.display()),
            "stdin eof".to_string(),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_second_run_reuses_environment() -> Result<()> {
    let _guard = SERIAL.lock().await;
    let ws = Workspace::new(0, 0)?;
    let marker = ws.path().join("venv/marker");

    let first = LaunchEngine::new(VenvBootstrap::new(ws.settings()))
        .run()
        .await?;
    std::fs::write(&marker, "keep me")?;
    let second = LaunchEngine::new(VenvBootstrap::new(ws.settings()))
        .run()
        .await?;

    assert!(first.environment_created);
    assert!(!second.environment_created);
    assert!(marker.is_file());

    let venv_calls = ws.calls().iter().filter(|c| c.starts_with("venv ")).count();
    assert_eq!(venv_calls, 1);
    Ok(())
}

#[tokio::test]
async fn test_missing_manifest_aborts_before_launch() -> Result<()> {
    let _guard = SERIAL.lock().await;
    let ws = Workspace::new(0, 0)?;
    std::fs::remove_file(ws.path().join("requirements.txt"))?;

    let err = LaunchEngine::new(VenvBootstrap::new(ws.settings()))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::ManifestNotFound { .. }));
    assert_ne!(err.exit_code(), 0);
    let calls = ws.calls();
    assert!(calls.iter().all(|c| !c.starts_with("pip ")));
    assert!(calls.iter().all(|c| !c.starts_with("launch ")));
    Ok(())
}

#[tokio::test]
async fn test_installer_failure_aborts_before_launch() -> Result<()> {
    let _guard = SERIAL.lock().await;
    let ws = Workspace::new(0, 0)?;
    std::fs::write(
        ws.path().join("requirements.txt"),
        "pyTelegramBotAPI\n!!not a requirement\n",
    )?;

    let err = LaunchEngine::new(VenvBootstrap::new(ws.settings()))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::Installation { .. }));
    assert_eq!(err.exit_code(), 3);
    assert!(ws.calls().iter().all(|c| !c.starts_with("launch ")));
    Ok(())
}

#[tokio::test]
async fn test_environment_creation_failure_propagates_code() -> Result<()> {
    let _guard = SERIAL.lock().await;
    let ws = Workspace::new(4, 0)?;

    let err = LaunchEngine::new(VenvBootstrap::new(ws.settings()))
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Some(Phase::EnsureEnvironment));
    assert_eq!(err.exit_code(), 4);
    assert!(ws.calls().iter().all(|c| !c.starts_with("pip ")));
    Ok(())
}

#[tokio::test]
async fn test_missing_interpreter_is_not_found() -> Result<()> {
    let _guard = SERIAL.lock().await;
    let ws = Workspace::new(0, 0)?;
    let mut settings = ws.settings();
    settings.interpreter = ws.path().join("no-such-python").to_str().unwrap().to_string();

    let err = VenvBootstrap::new(settings)
        .ensure_environment()
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), EXIT_NOT_FOUND);
    assert!(!ws.path().join("venv").exists());
    Ok(())
}

#[tokio::test]
async fn test_foreign_directory_fails_activation() -> Result<()> {
    let _guard = SERIAL.lock().await;
    let ws = Workspace::new(0, 0)?;
    std::fs::create_dir(ws.path().join("venv"))?;

    let err = LaunchEngine::new(VenvBootstrap::new(ws.settings()))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::Activation { .. }));
    assert!(ws.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_missing_entry_point_fails_launch() -> Result<()> {
    let _guard = SERIAL.lock().await;
    let ws = Workspace::new(0, 0)?;
    let mut settings = ws.settings();
    settings.entry_point = PathBuf::from("bot.py");
    settings.upgrade_installer = false;

    let err = LaunchEngine::new(VenvBootstrap::new(settings))
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Some(Phase::LaunchBot));
    assert_ne!(err.exit_code(), 0);
    let calls = ws.calls();
    assert!(calls.iter().all(|c| c != "pip install --upgrade pip"));
    assert!(calls.iter().all(|c| !c.starts_with("launch ")));
    Ok(())
}

#[tokio::test]
async fn test_bot_exit_code_is_propagated() -> Result<()> {
    let _guard = SERIAL.lock().await;
    let ws = Workspace::new(0, 5)?;

    let outcome = LaunchEngine::new(VenvBootstrap::new(ws.settings()))
        .run()
        .await?;

    assert_eq!(outcome.exit_code, 5);
    Ok(())
}

#[test]
fn test_dry_run_plan_executes_nothing() -> Result<()> {
    let ws = Workspace::new(0, 0)?;

    let plan = VenvBootstrap::new(ws.settings()).plan();

    assert_eq!(plan.first().map(|s| s.phase), Some(Phase::EnsureEnvironment));
    assert_eq!(plan.last().map(|s| s.phase), Some(Phase::LaunchBot));
    assert!(ws.calls().is_empty());
    assert!(!ws.path().join("venv").exists());
    Ok(())
}

#[tokio::test]
async fn test_non_utf8_manifest_path_reaches_installer_intact() -> Result<()> {
    let _guard = SERIAL.lock().await;
    let ws = Workspace::new(0, 0)?;
    let odd_dir = ws.path().join(OsStr::from_bytes(b"deps-\xff"));
    std::fs::create_dir(&odd_dir)?;
    std::fs::write(odd_dir.join("requirements.txt"), "requests\n")?;

    let mut settings = ws.settings();
    settings.manifest = odd_dir.join("requirements.txt");
    settings.upgrade_installer = false;

    LaunchEngine::new(VenvBootstrap::new(settings)).run().await?;

    let log = std::fs::read(&ws.log)?;
    let expected = [b"pip install -r ".as_slice(), odd_dir.join("requirements.txt").as_os_str().as_bytes()].concat();
    assert!(log.windows(expected.len()).any(|w| w == expected.as_slice()));
    Ok(())
}

#[cfg(feature = "cli")]
#[tokio::test]
async fn test_sigterm_to_launcher_reaches_the_bot() -> Result<()> {
    let _guard = SERIAL.lock().await;
    let ws = Workspace::with_bot(0, "exec sleep 30")?;

    let mut launcher = std::process::Command::new(env!("CARGO_BIN_EXE_bot-bootstrap"))
        .arg("-C")
        .arg(ws.path())
        .arg("--python")
        .arg(&ws.python)
        .arg("--no-upgrade-installer")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let deadline = Instant::now() + Duration::from_secs(20);
    let bot_pid = loop {
        if let Some(pid) = ws.bot_pid() {
            break pid;
        }
        assert!(Instant::now() < deadline, "bot never started");
        tokio::time::sleep(Duration::from_millis(50)).await;
    };
    // the pid file is written just before `exec sleep`
    tokio::time::sleep(Duration::from_millis(200)).await;

    // SAFETY: plain kill(2) on pids this test started.
    unsafe {
        libc::kill(launcher.id() as libc::pid_t, libc::SIGTERM);
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = launcher.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            launcher.kill()?;
            // SAFETY: kill(2) on the bot this test started.
            unsafe {
                libc::kill(bot_pid, libc::SIGKILL);
            }
            panic!("launcher did not exit after SIGTERM");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };

    // 128 + SIGTERM, taken from the bot's own exit
    assert_eq!(status.code(), Some(128 + libc::SIGTERM));
    // SAFETY: signal 0 only checks that the pid exists.
    let bot_alive = unsafe { libc::kill(bot_pid, 0) == 0 };
    assert!(!bot_alive, "bot outlived the launcher");
    Ok(())
}
