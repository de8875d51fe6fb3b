use crate::command::{
    CommandError, CommandFactory, ExecContext, ExecutableCommand, ExitCode, TurnOutcome,
};
use crate::interpreter::Factory;
use crate::parser::{CommandRequest, RedirectionSpec};
use crate::redirect;
use crate::signals::SignalDispositions;
use nix::unistd::Pid;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::Stdio;
use thiserror::Error;

/// Errors raised while starting or waiting for a child process.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{path}: {source}")]
    Redirect {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{0}: command not found")]
    NotFound(String),
    #[error("{program}: permission denied")]
    NotExecutable { program: String },
    #[error("{program}: failed to start: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to wait for child {pid}: {source}")]
    Wait {
        pid: i32,
        #[source]
        source: nix::Error,
    },
}

impl ExecError {
    /// Status a foreground command gets when it fails this way, if any.
    ///
    /// A failure to fork at all leaves `$?` alone, as no command ran.
    pub fn status(&self) -> Option<ExitCode> {
        match self {
            Self::Redirect { .. } => Some(1),
            Self::NotExecutable { .. } => Some(126),
            Self::NotFound(_) => Some(127),
            Self::Spawn { .. } | Self::Wait { .. } => None,
        }
    }
}

/// Command that is not a builtin.
///
/// It runs in a child process with default signal dispositions, its
/// redirections applied, and the program looked up through `PATH`.
pub struct ExternalCommand {
    request: CommandRequest,
}

impl ExternalCommand {
    pub fn new(request: CommandRequest) -> Self {
        Self { request }
    }

    fn spawn(&self) -> Result<Pid, ExecError> {
        let Some((program, args)) = self.request.argv.split_first() else {
            return Err(ExecError::NotFound(String::new()));
        };

        let mut command = std::process::Command::new(program);
        command.args(args);
        if let Some(spec) = self.request.output() {
            command.stdout(open_stdio(spec)?);
        }
        if let Some(spec) = self.request.input() {
            command.stdin(open_stdio(spec)?);
        }

        let dispositions = SignalDispositions::CHILD;
        // SAFETY: the closure runs between fork and exec and only calls
        // sigaction, which is async-signal-safe.
        unsafe {
            command.pre_exec(move || dispositions.apply().map_err(io::Error::from));
        }

        let child = command.spawn().map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ExecError::NotFound(program.clone()),
            io::ErrorKind::PermissionDenied => ExecError::NotExecutable {
                program: program.clone(),
            },
            _ => ExecError::Spawn {
                program: program.clone(),
                source,
            },
        })?;
        let pid = Pid::from_raw(child.id() as i32);
        tracing::debug!(pid = pid.as_raw(), %program, background = self.request.background, "spawned child");
        Ok(pid)
    }
}

fn open_stdio(spec: &RedirectionSpec) -> Result<Stdio, ExecError> {
    redirect::open_target(spec)
        .map(Stdio::from)
        .map_err(|source| ExecError::Redirect {
            path: spec.path.clone(),
            source,
        })
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(&self, request: &CommandRequest) -> Option<Box<dyn ExecutableCommand>> {
        if request.is_empty() {
            return None;
        }
        Some(Box::new(ExternalCommand::new(request.clone())))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(self: Box<Self>, ctx: &mut ExecContext<'_>) -> Result<TurnOutcome, CommandError> {
        let pid = match self.spawn() {
            Ok(pid) => pid,
            Err(e) => {
                if let (false, Some(status)) = (self.request.background, e.status()) {
                    ctx.jobs.record_status(status);
                }
                return Err(e.into());
            }
        };
        if self.request.background {
            ctx.jobs.track_background(pid);
        } else {
            ctx.jobs
                .wait_foreground(pid)
                .map_err(|source| ExecError::Wait {
                    pid: pid.as_raw(),
                    source,
                })?;
        }
        Ok(TurnOutcome::Continue)
    }
}
