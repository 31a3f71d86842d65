//! Assembles a [`crate::lexer::Token`] stream into a [`Pipeline`]: ordered
//! stages, at most one input and one output redirection, and a
//! background flag. Detects syntax errors rather than panicking; a
//! `Pipeline` with `error` set must never be executed.

use crate::lexer::Token;

/// One external command within a pipeline: always at least one argument
/// once a `Pipeline` is free of `error`.
#[derive(Debug, Clone)]
pub struct Command {
    pub args: Vec<String>,
}

/// One line's worth of parsed input.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    pub stages: Vec<Command>,
    pub in_file: Option<String>,
    pub out_file: Option<String>,
    pub out_append: bool,
    pub background: bool,
    pub error: Option<String>,
}

impl Pipeline {
    fn with_error(msg: impl Into<String>) -> Pipeline {
        Pipeline {
            error: Some(msg.into()),
            ..Pipeline::default()
        }
    }
}

/// Parse a token stream into a [`Pipeline`].
///
/// Mirrors the source shell's `readcmd()` token loop: a pipe with an
/// empty current command is a "misplaced pipe" error, a redirection
/// operator not followed by a word is a missing-filename error, and a
/// duplicate redirection of either kind is an error. The trailing `&`
/// does not stop the scan — any words appearing after it still append to
/// the current command, matching the source's (acknowledged) behavior.
pub fn parse(tokens: Vec<Token>) -> Pipeline {
    let mut stages: Vec<Command> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut in_file: Option<String> = None;
    let mut out_file: Option<String> = None;
    let mut out_append = false;
    let mut background = false;

    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        match token {
            Token::Word(w) => current.push(w),
            Token::Pipe => {
                if current.is_empty() {
                    return Pipeline::with_error("misplaced pipe");
                }
                stages.push(Command {
                    args: std::mem::take(&mut current),
                });
            }
            Token::RedirIn => {
                if in_file.is_some() {
                    return Pipeline::with_error("only one input file supported");
                }
                match iter.next() {
                    Some(Token::Word(w)) => in_file = Some(w),
                    _ => {
                        return Pipeline::with_error(
                            "filename missing for input redirection",
                        );
                    }
                }
            }
            Token::RedirOut => {
                if out_file.is_some() {
                    return Pipeline::with_error("only one output file supported");
                }
                match iter.next() {
                    Some(Token::Word(w)) => out_file = Some(w),
                    _ => {
                        return Pipeline::with_error(
                            "filename missing for output redirection",
                        );
                    }
                }
            }
            Token::RedirAppend => {
                if out_file.is_some() {
                    return Pipeline::with_error("only one output file supported");
                }
                match iter.next() {
                    Some(Token::Word(w)) => {
                        out_file = Some(w);
                        out_append = true;
                    }
                    _ => {
                        return Pipeline::with_error(
                            "filename missing for output redirection",
                        );
                    }
                }
            }
            Token::Amp => background = true,
        }
    }

    if !current.is_empty() {
        stages.push(Command { args: current });
    } else if !stages.is_empty() {
        return Pipeline::with_error("misplaced pipe");
    }

    Pipeline {
        stages,
        in_file,
        out_file,
        out_append,
        background,
        error: None,
    }
}

/// Reconstruct a human-readable command line from a parsed pipeline, used
/// for `jobs`/`fg`/`bg`/`stop` listings and "Stopped"/"Done" messages.
pub fn command_text(pipeline: &Pipeline) -> String {
    pipeline
        .stages
        .iter()
        .map(|cmd| cmd.args.join(" "))
        .collect::<Vec<_>>()
        .join(" | ")
}
