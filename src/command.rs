use crate::builtin::BuiltinError;
use crate::env::Environment;
use crate::external::ExecError;
use crate::jobs::JobTracker;
use crate::parser::CommandRequest;
use thiserror::Error;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// What the read loop should do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Read the next line.
    Continue,
    /// Terminate the interpreter with the given status.
    Exit(ExitCode),
}

/// Everything a command may look at or update while it runs.
pub struct ExecContext<'a> {
    pub env: &'a Environment,
    pub jobs: &'a mut JobTracker,
}

/// Failure of a single command. The interpreter reports it and moves on.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Builtin(#[from] BuiltinError),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
pub trait ExecutableCommand {
    /// Executes the command.
    fn execute(self: Box<Self>, ctx: &mut ExecContext<'_>) -> Result<TurnOutcome, CommandError>;
}

/// Factory that tries to create a command from a parsed request.
///
/// Returns `None` when the factory doesn't recognize the program name.
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided request.
    fn try_create(&self, request: &CommandRequest) -> Option<Box<dyn ExecutableCommand>>;
}
