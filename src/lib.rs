//! A small interactive command interpreter.
//!
//! Every input line runs through the same pipeline: the [`lexer`] splits it
//! into words, [`expansion`] substitutes `$$`, `$!`, `$?` and `${name}` in each
//! word, the [`parser`] separates redirections and a trailing `&` from the
//! argument vector, and the [`Interpreter`] runs the result either as a builtin
//! (`exit`, `cd`) or as a child process. The [`jobs`] tracker keeps `$?` and
//! `$!` current and reports background children at the next prompt.
//!
//! The main entry point is [`Interpreter`]. The public modules expose each
//! stage on its own so it can be driven and tested without the read loop.

mod builtin;
pub mod command;
pub mod env;
pub mod expansion;
mod external;
mod interpreter;
pub mod jobs;
pub mod lexer;
pub mod parser;
pub mod redirect;
pub mod signals;

pub use builtin::BuiltinError;
pub use command::{ExitCode, TurnOutcome};
pub use external::ExecError;
/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Interpreter, ShellOptions, default_commands};
