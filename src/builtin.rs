use crate::command::{
    CommandError, CommandFactory, ExecContext, ExecutableCommand, ExitCode, TurnOutcome,
};
use crate::interpreter::Factory;
use crate::parser::CommandRequest;
use std::num::IntErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Usage and runtime errors of built-in commands.
///
/// These are reported to the user and never change `$?`.
#[derive(Debug, Error)]
pub enum BuiltinError {
    #[error("{0}: too many arguments")]
    TooManyArguments(&'static str),
    #[error("exit: {0}: numeric argument required")]
    InvalidExitCode(String),
    #[error("exit: {0}: numeric argument out of range")]
    ExitCodeOutOfRange(String),
    #[error("cd: HOME not set")]
    HomeNotSet,
    #[error("cd: {}: no such file or directory", .0.display())]
    NoSuchDirectory(PathBuf),
    #[error("cd: {}: {source}", .path.display())]
    ChangeDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Built-in commands known to the shell at compile time.
///
/// Builtins run directly in the interpreter's process, never in a child,
/// and ignore any redirections on their line. Arguments are matched by hand
/// instead of through `argh`, which would take `exit -1` for a flag.
pub(crate) trait BuiltinCommand: Sized {
    /// Canonical name of the command, e.g. "exit" or "cd".
    fn name() -> &'static str;

    /// Validate the arguments that follow the command name.
    fn from_args(args: &[String]) -> Result<Self, BuiltinError>;

    /// Executes the command against the interpreter's state.
    fn execute(self, ctx: &mut ExecContext<'_>) -> Result<TurnOutcome, BuiltinError>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, ctx: &mut ExecContext<'_>) -> Result<TurnOutcome, CommandError> {
        Ok(T::execute(*self, ctx)?)
    }
}

/// Stands in for a builtin whose arguments were rejected; running it just
/// reports the problem.
struct InvalidArgs(BuiltinError);

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, _ctx: &mut ExecContext<'_>) -> Result<TurnOutcome, CommandError> {
        Err(self.0.into())
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, request: &CommandRequest) -> Option<Box<dyn ExecutableCommand>> {
        let (name, args) = request.argv.split_first()?;
        if name != T::name() {
            return None;
        }
        Some(match T::from_args(args) {
            Ok(cmd) => Box::new(cmd),
            Err(e) => Box::new(InvalidArgs(e)),
        })
    }
}

/// Exit the shell, with the given status or else with `$?`.
#[derive(Debug, PartialEq, Eq)]
pub struct Exit {
    pub code: Option<ExitCode>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn from_args(args: &[String]) -> Result<Self, BuiltinError> {
        match args {
            [] => Ok(Self { code: None }),
            [code] => parse_exit_code(code).map(|code| Self { code: Some(code) }),
            _ => Err(BuiltinError::TooManyArguments("exit")),
        }
    }

    fn execute(self, ctx: &mut ExecContext<'_>) -> Result<TurnOutcome, BuiltinError> {
        Ok(TurnOutcome::Exit(
            self.code.unwrap_or(ctx.jobs.state().last_status),
        ))
    }
}

/// Parse an `exit` argument. Values wider than `i32` keep their low bits,
/// which still carry the low byte the OS reports as the exit status.
fn parse_exit_code(arg: &str) -> Result<ExitCode, BuiltinError> {
    match arg.parse::<i64>() {
        Ok(code) => Ok(code as ExitCode),
        Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
            Err(BuiltinError::ExitCodeOutOfRange(arg.to_owned()))
        }
        Err(_) => Err(BuiltinError::InvalidExitCode(arg.to_owned())),
    }
}

/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
#[derive(Debug, PartialEq, Eq)]
pub struct Cd {
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn from_args(args: &[String]) -> Result<Self, BuiltinError> {
        match args {
            [] => Ok(Self { target: None }),
            [target] => Ok(Self {
                target: Some(target.clone()),
            }),
            _ => Err(BuiltinError::TooManyArguments("cd")),
        }
    }

    fn execute(self, ctx: &mut ExecContext<'_>) -> Result<TurnOutcome, BuiltinError> {
        let target = match self.target {
            Some(t) => PathBuf::from(t),
            None => PathBuf::from(ctx.env.get_var("HOME").ok_or(BuiltinError::HomeNotSet)?),
        };
        change_dir(&target)?;
        Ok(TurnOutcome::Continue)
    }
}

fn change_dir(target: &Path) -> Result<(), BuiltinError> {
    if !target.exists() {
        return Err(BuiltinError::NoSuchDirectory(target.to_owned()));
    }
    std::env::set_current_dir(target).map_err(|source| BuiltinError::ChangeDirectory {
        path: target.to_owned(),
        source,
    })?;
    tracing::debug!(dir = %target.display(), "changed directory");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use crate::jobs::JobTracker;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX.get_or_init(|| Mutex::new(())).lock().unwrap()
    }

    fn request(argv: &[&str]) -> CommandRequest {
        CommandRequest {
            argv: argv.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn run(env: &Environment, argv: &[&str]) -> Result<TurnOutcome, CommandError> {
        let mut jobs = JobTracker::new();
        let mut ctx = ExecContext {
            env,
            jobs: &mut jobs,
        };
        let cmd = Factory::<Exit>::default()
            .try_create(&request(argv))
            .or_else(|| Factory::<Cd>::default().try_create(&request(argv)))
            .expect("builtin");
        cmd.execute(&mut ctx)
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn factory_matches_only_its_name() {
        assert!(Factory::<Exit>::default().try_create(&request(&["exit"])).is_some());
        assert!(Factory::<Exit>::default().try_create(&request(&["exit2"])).is_none());
        assert!(Factory::<Cd>::default().try_create(&request(&["exit"])).is_none());
        assert!(Factory::<Cd>::default().try_create(&request(&[])).is_none());
    }

    #[test]
    fn exit_argument_validation() {
        assert_eq!(Exit::from_args(&[]).unwrap(), Exit { code: None });
        assert_eq!(Exit::from_args(&args(&["3"])).unwrap(), Exit { code: Some(3) });
        assert!(matches!(
            Exit::from_args(&args(&["abc"])),
            Err(BuiltinError::InvalidExitCode(s)) if s == "abc"
        ));
        assert!(matches!(
            Exit::from_args(&args(&["1", "2"])),
            Err(BuiltinError::TooManyArguments("exit"))
        ));
    }

    #[test]
    fn wide_exit_codes_keep_their_low_byte() {
        let Exit { code: Some(code) } = Exit::from_args(&args(&["99999999999"])).unwrap() else {
            panic!("expected a code");
        };
        assert_eq!(code & 0xff, (99_999_999_999_i64 & 0xff) as i32);
        assert_eq!(Exit::from_args(&args(&["-1"])).unwrap(), Exit { code: Some(-1) });

        let err = Exit::from_args(&args(&["99999999999999999999999"])).unwrap_err();
        assert!(matches!(err, BuiltinError::ExitCodeOutOfRange(_)));
        assert_eq!(
            err.to_string(),
            "exit: 99999999999999999999999: numeric argument out of range"
        );
    }

    #[test]
    fn exit_without_code_uses_last_status() {
        let env = Environment::default();
        let mut jobs = JobTracker::new();
        let pid = std::process::Command::new("sh")
            .args(["-c", "exit 9"])
            .spawn()
            .unwrap()
            .id();
        jobs.wait_foreground(nix::unistd::Pid::from_raw(pid as i32))
            .unwrap();

        let mut ctx = ExecContext {
            env: &env,
            jobs: &mut jobs,
        };
        let outcome = BuiltinCommand::execute(Exit { code: None }, &mut ctx).unwrap();
        assert_eq!(outcome, TurnOutcome::Exit(9));
    }

    #[test]
    fn exit_with_code() {
        let env = Environment::default();
        assert_eq!(run(&env, &["exit", "42"]).unwrap(), TurnOutcome::Exit(42));
        assert_eq!(run(&env, &["exit"]).unwrap(), TurnOutcome::Exit(0));
    }

    #[test]
    fn bad_exit_arguments_do_not_exit() {
        let env = Environment::default();
        let err = run(&env, &["exit", "abc"]).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Builtin(BuiltinError::InvalidExitCode(_))
        ));
        assert_eq!(err.to_string(), "exit: abc: numeric argument required");

        let err = run(&env, &["exit", "1", "2"]).unwrap_err();
        assert_eq!(err.to_string(), "exit: too many arguments");
    }

    #[test]
    fn cd_without_arguments_goes_home() {
        let _lock = lock_current_dir();
        let before = std::env::current_dir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let env = Environment::from_vars([("HOME", home.path().to_string_lossy().into_owned())]);

        let outcome = run(&env, &["cd"]).unwrap();
        let now = std::env::current_dir().unwrap();
        std::env::set_current_dir(&before).unwrap();

        assert_eq!(outcome, TurnOutcome::Continue);
        assert_eq!(now, home.path().canonicalize().unwrap());
    }

    #[test]
    fn cd_to_explicit_directory() {
        let _lock = lock_current_dir();
        let before = std::env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().to_string_lossy().into_owned();

        run(&Environment::default(), &["cd", &target]).unwrap();
        let now = std::env::current_dir().unwrap();
        std::env::set_current_dir(&before).unwrap();

        assert_eq!(now, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn cd_failures_are_reported_and_leave_cwd_alone() {
        let _lock = lock_current_dir();
        let before = std::env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let file = dir.path().join("file");
        std::fs::write(&file, "").unwrap();
        let env = Environment::default();

        let err = run(&env, &["cd", &missing.to_string_lossy()]).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Builtin(BuiltinError::NoSuchDirectory(_))
        ));

        let err = run(&env, &["cd", &file.to_string_lossy()]).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Builtin(BuiltinError::ChangeDirectory { .. })
        ));

        let err = run(&env, &["cd", "a", "b"]).unwrap_err();
        assert_eq!(err.to_string(), "cd: too many arguments");

        let err = run(&env, &["cd"]).unwrap_err();
        assert!(matches!(err, CommandError::Builtin(BuiltinError::HomeNotSet)));

        assert_eq!(std::env::current_dir().unwrap(), before);
    }
}
