//! Lexical analysis: splitting a raw input line into words.
//!
//! Words are separated by unescaped whitespace. A backslash makes the next
//! character literal (the backslash itself is dropped), and a word that starts
//! with `#` comments out the rest of the line.

use thiserror::Error;

/// Default upper bound on the number of words accepted from a single line.
pub const DEFAULT_MAX_WORDS: usize = 1024;

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexingError {
    /// The line holds more words than the configured limit. The whole line is
    /// rejected rather than silently cut short.
    #[error("too many words on one line (limit is {limit})")]
    TooManyWords {
        /// The limit that was exceeded.
        limit: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    /// Between words, skipping whitespace.
    Start,
    ReadingWord,
    /// The previous character was a backslash.
    Escaped,
}

struct LexingFSM<'a> {
    input: std::str::Chars<'a>,
    state: LexingState,
    max_words: usize,
    buffer: String,
    words: Vec<String>,
}

impl<'a> LexingFSM<'a> {
    fn new(line: &'a str, max_words: usize) -> Self {
        LexingFSM {
            input: line.chars(),
            state: LexingState::Start,
            max_words,
            buffer: String::new(),
            words: Vec::new(),
        }
    }

    fn make_words(mut self) -> Result<Vec<String>, LexingError> {
        while let Some(ch) = self.input.next() {
            match self.state {
                LexingState::Start => {
                    if ch.is_whitespace() {
                        continue;
                    }
                    if ch == '#' {
                        break;
                    }
                    if self.words.len() == self.max_words {
                        return Err(LexingError::TooManyWords {
                            limit: self.max_words,
                        });
                    }
                    self.handle_word(ch);
                }
                LexingState::ReadingWord => self.handle_word(ch),
                LexingState::Escaped => {
                    self.buffer.push(ch);
                    self.state = LexingState::ReadingWord;
                }
            }
        }

        // A backslash at the very end has nothing to escape and stays literal.
        if self.state == LexingState::Escaped {
            self.buffer.push('\\');
        }
        self.finish_word();

        Ok(self.words)
    }

    fn handle_word(&mut self, ch: char) {
        match ch {
            '\\' => self.state = LexingState::Escaped,
            c if c.is_whitespace() => {
                self.finish_word();
                self.state = LexingState::Start;
            }
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn finish_word(&mut self) {
        if self.state != LexingState::Start {
            self.words.push(std::mem::take(&mut self.buffer));
        }
    }
}

/// Split `line` into words using the default word limit.
pub fn split_into_words(line: &str) -> Result<Vec<String>, LexingError> {
    split_into_words_limited(line, DEFAULT_MAX_WORDS)
}

/// Split `line` into words, rejecting lines with more than `max_words` words.
pub fn split_into_words_limited(line: &str, max_words: usize) -> Result<Vec<String>, LexingError> {
    LexingFSM::new(line, max_words).make_words()
}
