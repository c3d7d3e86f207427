use crate::domain::model::ActiveEnvironment;
use crate::utils::error::{EXIT_FAILURE, EXIT_NOT_EXECUTABLE, EXIT_NOT_FOUND};
use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Why a child process did not finish successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildFailure {
    pub code: i32,
    pub message: String,
}

/// Exit code of a finished child. On Unix a signal death maps to 128 + signal.
pub fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    EXIT_FAILURE
}

pub fn spawn_failure(program: &str, err: &std::io::Error) -> ChildFailure {
    let code = match err.kind() {
        std::io::ErrorKind::NotFound => EXIT_NOT_FOUND,
        std::io::ErrorKind::PermissionDenied => EXIT_NOT_EXECUTABLE,
        _ => EXIT_FAILURE,
    };
    ChildFailure {
        code,
        message: format!("could not run {}: {}", program, err),
    }
}

/// Points a command at the activated environment.
pub fn apply_environment(command: &mut Command, env: &ActiveEnvironment) {
    command
        .env("VIRTUAL_ENV", env.virtual_env())
        .env("PATH", &env.path_var)
        .env_remove("PYTHONHOME");
}

/// Human readable form of a command line for logs and dry runs.
pub fn describe<S: AsRef<OsStr>>(program: impl AsRef<OsStr>, args: &[S]) -> String {
    let mut line = program.as_ref().to_string_lossy().into_owned();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.as_ref().to_string_lossy());
    }
    line
}

/// Runs a command with inherited output and waits for it. Non-zero exits
/// and spawn errors become a `ChildFailure` carrying the exit code.
pub async fn run_to_completion(
    mut command: Command,
    command_line: &str,
) -> std::result::Result<(), ChildFailure> {
    tracing::debug!("Running: {}", command_line);

    command
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    let status = command
        .status()
        .await
        .map_err(|e| spawn_failure(command_line, &e))?;

    if status.success() {
        return Ok(());
    }

    let code = status_code(status);
    Err(ChildFailure {
        code,
        message: format!("{} exited with code {}", command_line, code),
    })
}

/// Spawns a long-running child and waits for it, relaying termination
/// signals sent to the launcher. On Unix the child gets its own process
/// group, so a terminal Ctrl-C reaches it once, through the launcher.
pub async fn run_forwarding_signals(
    mut command: Command,
    command_line: &str,
) -> std::result::Result<ExitStatus, ChildFailure> {
    tracing::debug!("Running: {}", command_line);

    command.kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    // 先註冊訊號處理，避免子程序啟動後的空窗期
    let signals = ForwardedSignals::register().map_err(|e| ChildFailure {
        code: EXIT_FAILURE,
        message: format!("cannot install signal handlers: {}", e),
    })?;

    let child = command
        .spawn()
        .map_err(|e| spawn_failure(command_line, &e))?;

    signals.wait(child).await.map_err(|e| ChildFailure {
        code: EXIT_FAILURE,
        message: format!("lost track of {}: {}", command_line, e),
    })
}

#[cfg(unix)]
struct ForwardedSignals {
    terminate: Signal,
    interrupt: Signal,
    hangup: Signal,
}

#[cfg(unix)]
impl ForwardedSignals {
    fn register() -> std::io::Result<Self> {
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    async fn wait(mut self, mut child: Child) -> std::io::Result<ExitStatus> {
        loop {
            let forwarded = tokio::select! {
                status = child.wait() => return status,
                _ = self.terminate.recv() => libc::SIGTERM,
                _ = self.interrupt.recv() => libc::SIGINT,
                _ = self.hangup.recv() => libc::SIGHUP,
            };

            if let Some(pid) = child.id() {
                tracing::info!("Forwarding signal {} to the bot (pid {})", forwarded, pid);
                // SAFETY: `pid` is our own child and has not been reaped yet.
                unsafe {
                    libc::kill(pid as libc::pid_t, forwarded);
                }
            }
        }
    }
}

#[cfg(not(unix))]
struct ForwardedSignals;

#[cfg(not(unix))]
impl ForwardedSignals {
    fn register() -> std::io::Result<Self> {
        Ok(Self)
    }

    /// Ctrl-C reaches the whole console, so we keep waiting for the child.
    async fn wait(self, mut child: Child) -> std::io::Result<ExitStatus> {
        tokio::select! {
            status = child.wait() => status,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupt received, waiting for the bot to exit");
                child.wait().await
            }
        }
    }
}
