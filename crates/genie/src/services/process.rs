use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use nix::sys::signal;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tokio::process::Command;
use tokio::sync::oneshot;

use crate::Map;
use crate::common::error::GenieError;

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub enum StdioDef {
    #[default]
    Null,
    File(PathBuf),
}

/// Description of a process that should be started.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub args: Vec<String>,
    pub env: Map<String, String>,
    pub cwd: PathBuf,
    pub stdout: StdioDef,
    pub stderr: StdioDef,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProcessSignal {
    /// Polite request to terminate (SIGTERM)
    Terminate,
    /// Forced kill (SIGKILL)
    Kill,
}

impl From<ProcessSignal> for Signal {
    fn from(signal: ProcessSignal) -> Self {
        match signal {
            ProcessSignal::Terminate => Signal::SIGTERM,
            ProcessSignal::Kill => Signal::SIGKILL,
        }
    }
}

/// How a started process ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProcessExit {
    Exited(i32),
    Signaled(i32),
    Unknown,
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        match (status.code(), status.signal()) {
            (Some(code), _) => ProcessExit::Exited(code),
            (None, Some(signal)) => ProcessExit::Signaled(signal),
            (None, None) => ProcessExit::Unknown,
        }
    }
}

impl Display for ProcessExit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessExit::Exited(code) => write!(f, "exit code {code}"),
            ProcessExit::Signaled(signal) => {
                write!(f, "signal {signal} ({})", signal_name(*signal))
            }
            ProcessExit::Unknown => write!(f, "unknown exit status"),
        }
    }
}

/// A process that runs detached from its starter.
pub struct StartedProcess {
    pub pid: u32,
    /// Resolves once the process exits
    pub exit: oneshot::Receiver<ProcessExit>,
}

/// Capability to start processes and to signal them.
pub trait ProcessExecutor: Send + Sync {
    /// Starts the process in a new process group and returns without waiting for it.
    fn start(&self, spec: &ProcessSpec) -> crate::Result<StartedProcess>;

    /// Sends `signal` to the process group of `pid`.
    fn signal_group(&self, pid: u32, signal: ProcessSignal) -> crate::Result<()>;
}

/// Starts processes on the local node using Tokio.
/// `start` has to be called from within a Tokio runtime.
#[derive(Default, Debug, Clone)]
pub struct LocalProcessExecutor;

impl LocalProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessExecutor for LocalProcessExecutor {
    fn start(&self, spec: &ProcessSpec) -> crate::Result<StartedProcess> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|error| GenieError::GenericError(format!("Cannot start process: {error}")))?;
        let mut command = command_from_spec(spec)?;

        log::trace!("Running command {:?}", command);
        let mut child = command
            .spawn()
            .map_err(|error| map_spawn_error(error, spec))?;
        let pid = child.id().ok_or_else(|| {
            GenieError::GenericError("Process exited before its pid was read".to_string())
        })?;

        let (sender, receiver) = oneshot::channel();
        runtime.spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => ProcessExit::from(status),
                Err(error) => {
                    log::error!("Waiting for process {pid} failed: {error:?}");
                    ProcessExit::Unknown
                }
            };
            log::debug!("Process {pid} has finished with {exit}");
            let _ = sender.send(exit);
        });

        Ok(StartedProcess {
            pid,
            exit: receiver,
        })
    }

    fn signal_group(&self, pid: u32, signal: ProcessSignal) -> crate::Result<()> {
        let signal: Signal = signal.into();
        // Started processes lead their own session, so the group id is the pid
        let pgid = Pid::from_raw(pid as i32);
        signal::killpg(pgid, Some(signal)).map_err(|error| {
            GenieError::SignalDeliveryFailed(format!(
                "Cannot send signal {signal} to PGID {pgid}: {error:?}"
            ))
        })?;
        Ok(())
    }
}

/// Create an output stream file on the given path.
/// If the path is relative, the file will be created relative to `cwd`.
fn create_output_stream(def: &StdioDef, cwd: &Path) -> crate::Result<Stdio> {
    let stdio = match def {
        StdioDef::File(path) => {
            let stream_path = if path.is_relative() {
                cwd.join(path)
            } else {
                path.clone()
            };
            if let Some(parent) = stream_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(&stream_path).map_err(|e| {
                GenieError::GenericError(format!(
                    "Creating stream file {} failed: {e}",
                    stream_path.display()
                ))
            })?;
            Stdio::from(file)
        }
        StdioDef::Null => Stdio::null(),
    };
    Ok(stdio)
}

fn command_from_spec(spec: &ProcessSpec) -> crate::Result<Command> {
    if spec.args.is_empty() {
        return Err(GenieError::GenericError("No command arguments".to_string()));
    }

    let mut command = Command::new(&spec.args[0]);

    #[cfg(unix)]
    unsafe {
        command.pre_exec(|| {
            // The job gets its own process group, so that signals sent to it
            // do not reach the coordinator and reach every child of the job.
            nix::unistd::setsid().map_err(std::io::Error::from)?;
            Ok(())
        });
    }

    command.args(&spec.args[1..]);

    if !spec.cwd.is_dir() {
        std::fs::create_dir_all(&spec.cwd).map_err(|error| {
            GenieError::GenericError(format!("Could not create working directory: {error:?}"))
        })?;
    }
    command.current_dir(&spec.cwd);
    command.envs(&spec.env);

    command.stdin(Stdio::null());
    command.stdout(create_output_stream(&spec.stdout, &spec.cwd)?);
    command.stderr(create_output_stream(&spec.stderr, &spec.cwd)?);
    Ok(command)
}

fn looks_like_bash_script(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "sh")
}

/// Provide a more detailed error message when a process fails to be spawned.
fn map_spawn_error(error: std::io::Error, spec: &ProcessSpec) -> GenieError {
    let program = Path::new(&spec.args[0]);
    let context = match error.kind() {
        ErrorKind::NotFound => format!(
            "\nThe program that you have tried to execute (`{}`) was not found.",
            program.display()
        ),
        ErrorKind::PermissionDenied if looks_like_bash_script(program) => format!(
            "\nThe script that you have tried to execute (`{}`) is not executable.",
            program.display()
        ),
        _ => "".to_string(),
    };
    GenieError::GenericError(format!(
        "Cannot execute {:?}: {}{}",
        spec.args.join(" "),
        error,
        context
    ))
}

/// Provide a user-friendly name of a signal, for a subset of common signals.
pub fn signal_name(signal: i32) -> &'static str {
    match signal {
        1 => "SIGHUP",
        2 => "SIGINT",
        3 => "SIGQUIT",
        4 => "SIGILL",
        6 => "SIGABRT",
        9 => "SIGKILL",
        11 => "SIGSEGV",
        13 => "SIGPIPE",
        14 => "SIGALRM",
        15 => "SIGTERM",
        _ => "unknown",
    }
}
