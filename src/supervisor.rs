//! Foreground supervision of the analytics server.
//!
//! The wrapper runs the server as a child process and turns SIGINT/SIGTERM
//! into a graceful terminate of that child. Signals are observed by one task
//! owned by the `Supervisor`, which cancels a `CancellationToken`; the child
//! is terminated when the token fires. Dropping the supervisor stops the
//! forwarding task.

use std::io;
use std::path::Path;
use std::process::ExitStatus;

use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::WrapperConfig;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed waiting for '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to install signal handler: {0}")]
    Signal(io::Error),

    #[error("Failed to create database directory '{}': {source}", .path.display())]
    CreateDir {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Listens for SIGINT/SIGTERM and cancels the token. Aborted on drop.
struct SignalForwarder {
    handle: JoinHandle<()>,
}

impl SignalForwarder {
    #[cfg(unix)]
    fn install(token: CancellationToken) -> Result<Self, SupervisorError> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt()).map_err(SupervisorError::Signal)?;
        let mut terminate = signal(SignalKind::terminate()).map_err(SupervisorError::Signal)?;

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = interrupt.recv() => log::info!("Caught SIGINT, stopping the process..."),
                _ = terminate.recv() => log::info!("Caught SIGTERM, stopping the process..."),
                _ = token.cancelled() => return,
            }
            token.cancel();
        });
        Ok(Self { handle })
    }

    #[cfg(not(unix))]
    fn install(token: CancellationToken) -> Result<Self, SupervisorError> {
        let handle = tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        log::warn!("Ctrl+C handler failed: {}", e);
                        return;
                    }
                    log::info!("Caught Ctrl+C, stopping the process...");
                }
                _ = token.cancelled() => return,
            }
            token.cancel();
        });
        Ok(Self { handle })
    }
}

impl Drop for SignalForwarder {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct Supervisor {
    token: CancellationToken,
    _forwarder: Option<SignalForwarder>,
}

impl Supervisor {
    /// A supervisor driven only by `token`; no signal handling.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            _forwarder: None,
        }
    }

    /// A supervisor whose token is cancelled by SIGINT or SIGTERM.
    /// Must be called from within a tokio runtime.
    pub fn with_shutdown_signals() -> Result<Self, SupervisorError> {
        let token = CancellationToken::new();
        let forwarder = SignalForwarder::install(token.clone())?;
        Ok(Self {
            token,
            _forwarder: Some(forwarder),
        })
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Run `command` through the shell, terminating it if the token fires.
    pub async fn run_foreground(&self, command: &str) -> Result<ExitStatus, SupervisorError> {
        let mut child = spawn_shell(command)?;
        log::info!("Started '{}' (pid {:?})", command, child.id());

        tokio::select! {
            status = child.wait() => status.map_err(|source| SupervisorError::Wait {
                command: command.to_string(),
                source,
            }),
            _ = self.token.cancelled() => {
                log::info!("Stopping '{}'", command);
                terminate(&mut child);
                child.wait().await.map_err(|source| SupervisorError::Wait {
                    command: command.to_string(),
                    source,
                })
            }
        }
    }

    /// Run `command` through the shell and wait for it, ignoring the token.
    pub async fn run_to_completion(&self, command: &str) -> Result<ExitStatus, SupervisorError> {
        spawn_shell(command)?
            .wait()
            .await
            .map_err(|source| SupervisorError::Wait {
                command: command.to_string(),
                source,
            })
    }
}

fn spawn_shell(command: &str) -> Result<Child, SupervisorError> {
    Command::new("sh")
        .arg("-c")
        .arg(command)
        .spawn()
        .map_err(|source| SupervisorError::Spawn {
            command: command.to_string(),
            source,
        })
}

/// Ask the child to stop: SIGTERM on unix, a kill elsewhere.
#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    let Ok(raw) = i32::try_from(pid) else {
        log::warn!("Child pid {} out of range, killing instead", pid);
        if let Err(e) = child.start_kill() {
            log::warn!("Failed to stop child: {}", e);
        }
        return;
    };
    if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        log::warn!("SIGTERM to pid {} failed: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        log::warn!("Failed to stop child: {}", e);
    }
}

fn h2_command(jar: &Path, tool: &str, db_file: &Path, script: &Path) -> String {
    format!(
        "java -cp {} org.h2.tools.{} -url jdbc:h2:{} -script {}",
        jar.display(),
        tool,
        db_file.display(),
        script.display()
    )
}

/// Command that seeds a fresh database from an SQL script.
pub fn init_script_command(config: &WrapperConfig, script: &Path) -> String {
    h2_command(&config.jar, "RunScript", &config.db_file(), script)
}

/// Command that exports the database to an SQL script.
pub fn export_script_command(config: &WrapperConfig, script: &Path) -> String {
    h2_command(&config.jar, "Script", &config.db_file(), script)
}

/// Full wrapper lifecycle: prepare the database directory, seed it if it is
/// new, run the server in the foreground, then export if asked to.
///
/// Returns the server's exit status.
pub async fn run_analytics_server(
    config: &WrapperConfig,
    supervisor: &Supervisor,
) -> Result<ExitStatus, SupervisorError> {
    let existed = config.db_dir.exists();
    if existed {
        log::info!("Metabase DB path: {}", config.db_dir.display());
    } else {
        std::fs::create_dir_all(&config.db_dir).map_err(|source| SupervisorError::CreateDir {
            path: config.db_dir.clone(),
            source,
        })?;
        log::info!("Metabase DB path created: {}", config.db_dir.display());
    }

    match &config.init_sql_file {
        Some(init) if init.exists() => {
            if existed {
                log::info!(
                    "Database path {} exists, SKIP creating database from {}",
                    config.db_dir.display(),
                    init.display()
                );
            } else {
                log::info!(
                    "Create database {} from {}",
                    config.db_file().display(),
                    init.display()
                );
                let status = supervisor
                    .run_to_completion(&init_script_command(config, init))
                    .await?;
                log::info!("Creating DONE ({})", status);
            }
        }
        other => log::info!("MB_DB_INIT_SQL_FILE {:?} not found, SKIP", other),
    }

    let status = supervisor.run_foreground(&config.run_command).await?;
    log::info!("Server exited with {}", status);

    if let Some(save) = &config.save_sql_file {
        log::info!(
            "Saving database {} to {}",
            config.db_file().display(),
            save.display()
        );
        let export = supervisor
            .run_to_completion(&export_script_command(config, save))
            .await?;
        log::info!("Saving DONE ({})", export);
    }

    Ok(status)
}
