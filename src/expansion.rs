//! Parameter expansion of single words.
//!
//! Recognized references are `$$`, `$!`, `$?` and `${name}`. Scanning is
//! driven by an explicit byte cursor, so a word can be expanded any number of
//! times, in any order, without hidden state.

use crate::command::ExitCode;
use crate::env::Environment;
use crate::jobs::ShellState;

/// A parameter reference found inside a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter<'w> {
    /// `$$`
    ShellPid,
    /// `$!`
    LastBackgroundPid,
    /// `$?`
    LastStatus,
    /// `${name}`
    Named(&'w str),
}

/// Location of a parameter reference: `word[start..end]` is the full
/// reference text including the leading `$`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamRef<'w> {
    pub param: Parameter<'w>,
    pub start: usize,
    pub end: usize,
}

/// Source of the values substituted for parameter references.
pub trait ParameterSource {
    /// Process id of the interpreter itself.
    fn shell_pid(&self) -> u32;

    /// Status of the most recent foreground command.
    fn last_status(&self) -> ExitCode;

    /// Pid of the most recent background command, if any was started.
    fn last_background_pid(&self) -> Option<i32>;

    /// Value of a named variable, or `None` when unset.
    fn variable(&self, name: &str) -> Option<&str>;
}

/// The interpreter's view of parameters: live shell state plus the
/// environment snapshot.
pub struct ExpansionScope<'a> {
    pub env: &'a Environment,
    pub state: &'a ShellState,
}

impl ParameterSource for ExpansionScope<'_> {
    fn shell_pid(&self) -> u32 {
        std::process::id()
    }

    fn last_status(&self) -> ExitCode {
        self.state.last_status
    }

    fn last_background_pid(&self) -> Option<i32> {
        self.state.last_background_pid
    }

    fn variable(&self, name: &str) -> Option<&str> {
        self.env.get_var(name)
    }
}

/// Find the first parameter reference in `word` at or after byte offset `from`.
///
/// An unterminated `${` is not a reference; scanning moves past it and may
/// still find later references.
pub fn scan_param(word: &str, from: usize) -> Option<ParamRef<'_>> {
    let bytes = word.as_bytes();
    let mut pos = from;
    while let Some(offset) = word.get(pos..)?.find('$') {
        let start = pos + offset;
        let param = match bytes.get(start + 1) {
            Some(b'$') => Some((Parameter::ShellPid, start + 2)),
            Some(b'!') => Some((Parameter::LastBackgroundPid, start + 2)),
            Some(b'?') => Some((Parameter::LastStatus, start + 2)),
            Some(b'{') => word[start + 2..].find('}').map(|close| {
                let name_end = start + 2 + close;
                (Parameter::Named(&word[start + 2..name_end]), name_end + 1)
            }),
            _ => None,
        };
        if let Some((param, end)) = param {
            return Some(ParamRef { param, start, end });
        }
        pos = start + 1;
    }
    None
}

/// Expand every parameter reference in `word`, left to right.
///
/// The input is left untouched; the result is a freshly built string made of
/// the literal spans between references and each reference's value.
pub fn expand_word(word: &str, source: &impl ParameterSource) -> String {
    let mut out = String::with_capacity(word.len());
    let mut cursor = 0;
    while let Some(found) = scan_param(word, cursor) {
        out.push_str(&word[cursor..found.start]);
        match found.param {
            Parameter::ShellPid => out.push_str(&source.shell_pid().to_string()),
            // Nothing is substituted until a background command has started.
            Parameter::LastBackgroundPid => {
                if let Some(pid) = source.last_background_pid() {
                    out.push_str(&pid.to_string());
                }
            }
            Parameter::LastStatus => out.push_str(&source.last_status().to_string()),
            Parameter::Named(name) => out.push_str(source.variable(name).unwrap_or_default()),
        }
        cursor = found.end;
    }
    out.push_str(&word[cursor..]);
    out
}
