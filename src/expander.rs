//! Tilde and glob expansion, applied to each [`crate::lexer::Token::Word`]
//! independently, in place, before the parser consumes the token stream.

use crate::lexer::Token;

/// Expand tilde and glob patterns in every `Word` token of `tokens`,
/// in place. Non-word tokens pass through untouched. A single `Word` may
/// expand into several words (glob expansion), so the result can be
/// longer than the input.
pub fn expand(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        match token {
            Token::Word(word) => {
                let word = expand_tilde(&word);
                for expanded in expand_glob(&word) {
                    out.push(Token::Word(expanded));
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// `~` alone becomes `$HOME`; `~/suffix` becomes `$HOME` + `/suffix`.
/// Any other leading-tilde form (`~user`, or `HOME` unset) passes through
/// unchanged.
fn expand_tilde(word: &str) -> String {
    if !word.starts_with('~') {
        return word.to_string();
    }

    let Ok(home) = std::env::var("HOME") else {
        return word.to_string();
    };

    if word == "~" {
        return home;
    }
    if let Some(suffix) = word.strip_prefix("~/") {
        return format!("{home}/{suffix}");
    }

    word.to_string()
}

fn contains_glob_char(word: &str) -> bool {
    word.contains('*')
}

/// Expand a word containing `*` against the entries of the current
/// directory. `.` and `..` are never candidates; other dotfiles are.
/// Falls back to the literal pattern when there is no match, a listing
/// error occurs, or the word has no glob metacharacter at all.
///
/// Matching is byte-for-byte literal except for `*`, which matches any
/// (possibly empty) run of characters — unlike a full glob engine, `?`
/// and `[...]` have no special meaning here.
fn expand_glob(word: &str) -> Vec<String> {
    if !contains_glob_char(word) {
        return vec![word.to_string()];
    }

    let Ok(entries) = std::fs::read_dir(".") else {
        return vec![word.to_string()];
    };

    let pattern: Vec<char> = word.chars().collect();
    let mut matches: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name != "." && name != "..")
        .filter(|name| {
            let text: Vec<char> = name.chars().collect();
            matches_pattern(&pattern, &text)
        })
        .collect();

    if matches.is_empty() {
        return vec![word.to_string()];
    }

    matches.sort();
    matches
}

/// Recursive literal/`*` matcher: `*` matches any sequence (including
/// empty) by first trying to consume zero characters, then backtracking
/// to consume one more on failure. Every other character must match
/// exactly.
fn matches_pattern(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((&'*', rest)) => {
            matches_pattern(rest, text) || (!text.is_empty() && matches_pattern(pattern, &text[1..]))
        }
        Some((&p, rest)) => !text.is_empty() && text[0] == p && matches_pattern(rest, &text[1..]),
    }
}
