use crate::command::{CommandFactory, ExecContext, ExitCode, TurnOutcome};
use crate::env::Environment;
use crate::expansion::{self, ExpansionScope};
use crate::jobs::{JobTracker, ShellState};
use crate::lexer::{self, DEFAULT_MAX_WORDS};
use crate::parser::{self, CommandRequest};
use crate::signals::SignalDispositions;
use anyhow::Context;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead};

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate: builtins and ExternalCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Knobs controlling how the interpreter reads and handles lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOptions {
    /// Reading from a terminal: show a prompt and survive Ctrl-C / Ctrl-Z.
    pub interactive: bool,
    /// Lines with more words than this are rejected.
    pub max_words: usize,
    /// Create or truncate `>` targets while parsing, before the command runs.
    pub eager_truncation: bool,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            interactive: false,
            max_words: DEFAULT_MAX_WORDS,
            eager_truncation: true,
        }
    }
}

/// A minimal shell-like interpreter that can execute built-in and external commands.
///
/// Each line goes through the same steps: split into words, expand
/// parameters in every word, separate redirections and the background flag,
/// then hand the request to the first [`CommandFactory`] that accepts it.
/// Builtins come first, so they shadow programs of the same name.
///
/// Example
/// ```
/// use smallsh::{Interpreter, TurnOutcome};
/// let mut sh = Interpreter::default();
/// assert_eq!(sh.run_line("sh -c exit\\ 3"), TurnOutcome::Continue);
/// assert_eq!(sh.expand("$?"), "3");
/// assert_eq!(sh.run_line("exit"), TurnOutcome::Exit(3));
/// ```
pub struct Interpreter {
    env: Environment,
    jobs: JobTracker,
    options: ShellOptions,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom environment and set of command factories.
    pub fn new(
        options: ShellOptions,
        env: Environment,
        commands: Vec<Box<dyn CommandFactory>>,
    ) -> Self {
        Self {
            env,
            jobs: JobTracker::new(),
            options,
            commands,
        }
    }

    /// Create an interpreter over the process environment with the default commands.
    pub fn with_options(options: ShellOptions) -> Self {
        Self::new(options, Environment::new(), default_commands())
    }

    pub fn options(&self) -> &ShellOptions {
        &self.options
    }

    /// Current `$?` / `$!` values.
    pub fn state(&self) -> &ShellState {
        self.jobs.state()
    }

    /// Expand parameter references in a single word.
    pub fn expand(&self, word: &str) -> String {
        let scope = ExpansionScope {
            env: &self.env,
            state: self.jobs.state(),
        };
        expansion::expand_word(word, &scope)
    }

    /// The interactive prompt: `${PS1}`, expanded.
    pub fn prompt(&self) -> String {
        self.expand("${PS1}")
    }

    /// Report background children that finished or stopped since the last check.
    pub fn report_jobs(&mut self) {
        for event in self.jobs.reap() {
            eprintln!("{event}");
        }
    }

    /// Handle one line of input.
    ///
    /// Errors are reported on stderr and never end the loop; only `exit`
    /// produces [`TurnOutcome::Exit`].
    pub fn run_line(&mut self, line: &str) -> TurnOutcome {
        let words = match lexer::split_into_words_limited(line, self.options.max_words) {
            Ok(words) => words,
            Err(e) => {
                report(&e);
                return TurnOutcome::Continue;
            }
        };
        tracing::debug!(?words, "split line");

        let words: Vec<String> = words.iter().map(|w| self.expand(w)).collect();
        tracing::debug!(?words, "expanded words");

        let request = match parser::parse_command(words, self.options.eager_truncation) {
            Ok(request) => request,
            Err(e) => {
                report(&e);
                return TurnOutcome::Continue;
            }
        };
        tracing::debug!(?request, "parsed request");

        self.execute(&request)
    }

    /// Run an already parsed request.
    pub fn execute(&mut self, request: &CommandRequest) -> TurnOutcome {
        if request.is_empty() {
            return TurnOutcome::Continue;
        }
        let Some(cmd) = self.commands.iter().find_map(|f| f.try_create(request)) else {
            return TurnOutcome::Continue;
        };
        let mut ctx = ExecContext {
            env: &self.env,
            jobs: &mut self.jobs,
        };
        match cmd.execute(&mut ctx) {
            Ok(outcome) => outcome,
            Err(e) => {
                report(&e);
                TurnOutcome::Continue
            }
        }
    }

    /// Interactive read-eval loop on the terminal.
    ///
    /// Lines are read through rustyline, which draws the `${PS1}` prompt on
    /// stdout; job reports and diagnostics still go to stderr. A line that is
    /// not valid UTF-8 is reported and skipped.
    ///
    /// Returns the status the process should exit with.
    pub fn repl(&mut self) -> anyhow::Result<ExitCode> {
        if self.options.interactive {
            SignalDispositions::INTERACTIVE
                .apply()
                .context("failed to install signal handlers")?;
        }
        let mut rl = DefaultEditor::new().context("failed to set up line editor")?;

        loop {
            self.report_jobs();
            match rl.readline(&self.prompt()) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        if let Err(e) = rl.add_history_entry(line.as_str()) {
                            tracing::warn!(error = %e, "failed to record history");
                        }
                    }
                    if let TurnOutcome::Exit(code) = self.run_line(&line) {
                        return Ok(code);
                    }
                }
                Err(ReadlineError::Interrupted) => eprintln!(),
                Err(ReadlineError::Io(e)) if e.kind() == io::ErrorKind::Interrupted => eprintln!(),
                Err(ReadlineError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    eprintln!("smallsh: invalid UTF-8 in input");
                }
                Err(ReadlineError::Eof) => return Ok(self.state().last_status),
                Err(err) => return Err(err).context("failed to read input"),
            }
        }
    }

    /// Run commands read line by line from `input`, without a prompt.
    ///
    /// Bytes that are not valid UTF-8 are replaced with U+FFFD rather than
    /// ending the loop.
    ///
    /// Returns the status the process should exit with.
    pub fn run_script(&mut self, mut input: impl BufRead) -> anyhow::Result<ExitCode> {
        let mut line = Vec::new();
        loop {
            self.report_jobs();
            line.clear();
            match input.read_until(b'\n', &mut line) {
                Ok(0) => return Ok(self.state().last_status),
                Ok(_) => {
                    let bytes = line.strip_suffix(b"\n").unwrap_or(&line[..]);
                    let text = String::from_utf8_lossy(bytes);
                    if let TurnOutcome::Exit(code) = self.run_line(&text) {
                        return Ok(code);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => eprintln!(),
                Err(e) => return Err(e).context("failed to read input"),
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::with_options(ShellOptions::default())
    }
}

/// The default set of commands:
/// - built-ins: `exit`, `cd`
/// - external command launcher
pub fn default_commands() -> Vec<Box<dyn CommandFactory>> {
    use crate::builtin::*;
    use crate::external::ExternalCommand;
    vec![
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<ExternalCommand>::default()),
    ]
}

fn report(err: &dyn std::error::Error) {
    eprintln!("smallsh: {err}");
}
