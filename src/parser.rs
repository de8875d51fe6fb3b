use crate::redirect;
use thiserror::Error;

/// Kind of redirection
///
/// Defines the specific operation mode for an I/O redirection (`<`, `>`, `>>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// Input redirection (`<`): Reads standard input from a specified file.
    Read,
    /// Output redirection (`>`): Writes standard output to a file, **overwriting** the file if it exists.
    Write,
    /// Output redirection with append (`>>`): Writes standard output to a file, **appending** to the file if it exists.
    Append,
}

impl RedirectKind {
    fn from_operator(word: &str) -> Option<Self> {
        match word {
            "<" => Some(Self::Read),
            ">" => Some(Self::Write),
            ">>" => Some(Self::Append),
            _ => None,
        }
    }

    /// The operator text for this kind.
    pub fn operator(self) -> &'static str {
        match self {
            Self::Read => "<",
            Self::Write => ">",
            Self::Append => ">>",
        }
    }
}

/// A single redirection: an operator together with its path argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectionSpec {
    pub kind: RedirectKind,
    pub path: String,
}

/// A parsed command line, ready for execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRequest {
    /// The program name followed by its arguments. Empty means "no command".
    pub argv: Vec<String>,
    /// Redirections in the order they appeared on the line.
    pub redirections: Vec<RedirectionSpec>,
    /// Set when the line ended with `&`.
    pub background: bool,
}

impl CommandRequest {
    /// True when there is nothing to execute.
    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    /// The authoritative input redirection: the last `<` on the line.
    pub fn input(&self) -> Option<&RedirectionSpec> {
        self.redirections
            .iter()
            .rev()
            .find(|r| r.kind == RedirectKind::Read)
    }

    /// The authoritative output redirection: whichever of `>` or `>>` came last.
    pub fn output(&self) -> Option<&RedirectionSpec> {
        self.redirections
            .iter()
            .rev()
            .find(|r| r.kind != RedirectKind::Read)
    }
}

/// Errors that can occur while turning expanded words into a [`CommandRequest`].
#[derive(Debug, Error)]
pub enum ParsingError {
    /// A redirection operator was the last word, so it has no path.
    #[error("syntax error: `{}` needs a file name", .0.operator())]
    MissingRedirectTarget(RedirectKind),
    /// The target of `>` could not be created or truncated while parsing.
    #[error("{path}: {source}")]
    Truncate {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

struct RequestBuilder {
    words: Vec<String>,
    pos: usize,
    eager_truncation: bool,
}

impl RequestBuilder {
    fn consume(&mut self) -> Option<String> {
        let word = self.words.get_mut(self.pos).map(std::mem::take);
        if word.is_some() {
            self.pos += 1;
        }
        word
    }

    fn build(mut self) -> Result<CommandRequest, ParsingError> {
        let mut request = CommandRequest::default();

        // Only a trailing `&` is special; anywhere else it is an argument.
        if self.words.last().is_some_and(|w| w == "&") {
            self.words.pop();
            request.background = true;
        }

        while let Some(word) = self.consume() {
            let Some(kind) = RedirectKind::from_operator(&word) else {
                request.argv.push(word);
                continue;
            };
            let path = self
                .consume()
                .ok_or(ParsingError::MissingRedirectTarget(kind))?;
            if kind == RedirectKind::Write && self.eager_truncation {
                redirect::truncate_now(&path).map_err(|source| ParsingError::Truncate {
                    path: path.clone(),
                    source,
                })?;
            }
            request.redirections.push(RedirectionSpec { kind, path });
        }

        Ok(request)
    }
}

/// Separates expanded words into argv, redirections and the background flag.
///
/// When `eager_truncation` is set, the target of every `>` is created or
/// truncated right here, before the command runs (or even if it never does).
pub fn parse_command(
    words: Vec<String>,
    eager_truncation: bool,
) -> Result<CommandRequest, ParsingError> {
    RequestBuilder {
        words,
        pos: 0,
        eager_truncation,
    }
    .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(ws: &[&str]) -> Vec<String> {
        ws.iter().map(|w| w.to_string()).collect()
    }

    fn parse(ws: &[&str]) -> CommandRequest {
        parse_command(words(ws), false).unwrap()
    }

    fn spec(kind: RedirectKind, path: &str) -> RedirectionSpec {
        RedirectionSpec {
            kind,
            path: path.to_string(),
        }
    }

    #[test]
    fn plain_command() {
        let req = parse(&["ls", "-l", "/tmp"]);
        assert_eq!(req.argv, vec!["ls", "-l", "/tmp"]);
        assert!(req.redirections.is_empty());
        assert!(!req.background);
    }

    #[test]
    fn input_and_output_redirection() {
        let req = parse(&["cat", "<", "in.txt", ">", "out.txt"]);
        assert_eq!(req.argv, vec!["cat"]);
        assert_eq!(
            req.redirections,
            vec![
                spec(RedirectKind::Read, "in.txt"),
                spec(RedirectKind::Write, "out.txt")
            ]
        );
        assert!(!req.background);
        assert_eq!(req.input(), Some(&spec(RedirectKind::Read, "in.txt")));
        assert_eq!(req.output(), Some(&spec(RedirectKind::Write, "out.txt")));
    }

    #[test]
    fn redirections_may_sit_between_arguments() {
        let req = parse(&["sort", "<", "a", "-r", ">>", "b", "-u"]);
        assert_eq!(req.argv, vec!["sort", "-r", "-u"]);
        assert_eq!(req.output(), Some(&spec(RedirectKind::Append, "b")));
    }

    #[test]
    fn trailing_ampersand_means_background() {
        let req = parse(&["echo", "hi", "&"]);
        assert!(req.background);
        assert_eq!(req.argv, vec!["echo", "hi"]);
    }

    #[test]
    fn inner_ampersand_is_an_argument() {
        let req = parse(&["echo", "&", "hi"]);
        assert!(!req.background);
        assert_eq!(req.argv, vec!["echo", "&", "hi"]);
    }

    #[test]
    fn lone_ampersand_is_an_empty_background_request() {
        let req = parse(&["&"]);
        assert!(req.background);
        assert!(req.is_empty());
    }

    #[test]
    fn no_words_is_no_command() {
        assert!(parse(&[]).is_empty());
    }

    #[test]
    fn redirection_only_line_is_no_command() {
        let req = parse(&["<", "file"]);
        assert!(req.is_empty());
        assert_eq!(req.redirections.len(), 1);
    }

    #[test]
    fn last_redirection_of_a_kind_wins() {
        let req = parse(&["cmd", "<", "a", "<", "b", ">", "c", ">>", "d"]);
        assert_eq!(req.input(), Some(&spec(RedirectKind::Read, "b")));
        assert_eq!(req.output(), Some(&spec(RedirectKind::Append, "d")));

        let req = parse(&["cmd", ">>", "d", ">", "c"]);
        assert_eq!(req.output(), Some(&spec(RedirectKind::Write, "c")));
    }

    #[test]
    fn missing_redirect_target_is_an_error() {
        for op in ["<", ">", ">>"] {
            let err = parse_command(words(&["cat", op]), false).unwrap_err();
            assert!(matches!(err, ParsingError::MissingRedirectTarget(_)));
        }
    }

    #[test]
    fn trailing_ampersand_is_not_a_redirect_target() {
        let err = parse_command(words(&["cat", ">", "&"]), false).unwrap_err();
        assert!(matches!(
            err,
            ParsingError::MissingRedirectTarget(RedirectKind::Write)
        ));
    }

    #[test]
    fn write_target_is_truncated_while_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.txt");
        let fresh = dir.path().join("fresh.txt");
        std::fs::write(&old, "stale contents").unwrap();

        let line = vec![
            "no-such-program".to_string(),
            ">".to_string(),
            old.to_string_lossy().into_owned(),
            ">".to_string(),
            fresh.to_string_lossy().into_owned(),
        ];
        let req = parse_command(line, true).unwrap();

        // both targets are touched even though only the last one is used
        assert_eq!(std::fs::read(&old).unwrap(), b"");
        assert!(fresh.exists());
        assert_eq!(req.output().unwrap().path, fresh.to_string_lossy());
    }

    #[test]
    fn append_target_is_left_alone_while_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log.txt");
        std::fs::write(&log, "keep").unwrap();
        let missing = dir.path().join("missing.txt");

        let line = vec![
            "cmd".to_string(),
            ">>".to_string(),
            log.to_string_lossy().into_owned(),
            ">>".to_string(),
            missing.to_string_lossy().into_owned(),
        ];
        parse_command(line, true).unwrap();

        assert_eq!(std::fs::read_to_string(&log).unwrap(), "keep");
        assert!(!missing.exists());
    }

    #[test]
    fn deferred_truncation_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let line = vec![
            "cmd".to_string(),
            ">".to_string(),
            out.to_string_lossy().into_owned(),
        ];
        parse_command(line, false).unwrap();
        assert!(!out.exists());
    }

    #[test]
    fn failed_truncation_aborts_the_parse() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("no-such-dir").join("out.txt");
        let line = vec![
            "cmd".to_string(),
            ">".to_string(),
            bad.to_string_lossy().into_owned(),
        ];
        let err = parse_command(line, true).unwrap_err();
        assert!(matches!(err, ParsingError::Truncate { .. }));
    }
}
