use super::error::{ParenImbalance, QueryError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A lexical unit of the query language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A trimmed, non-empty atom such as `red_hair`, `-blonde` or `score:>=10`.
    Atom(String),
    Open,
    Close,
    /// Canonical OR marker. `|`, `~` and `,` all lex to this inside a group.
    Or,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Atom(atom) => f.write_str(atom),
            Token::Open => f.write_str("("),
            Token::Close => f.write_str(")"),
            Token::Or => f.write_str("|"),
        }
    }
}

/// How whitespace inside a parenthesized group is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhitespaceMode {
    /// Whitespace always terminates the current atom.
    #[default]
    Split,
    /// Inside a group, whitespace stays part of the atom unless the next
    /// non-space character is `|`, `~`, `,`, `(` or `)`.
    Legacy,
}

fn is_or_char(ch: char) -> bool {
    matches!(ch, '|' | '~' | ',')
}

/// Splits a raw query into a flat token stream in a single pass.
///
/// Fails with [`QueryError::UnmatchedParen`] on the first `)` that closes
/// nothing, or at end of input when groups are left open.
pub fn tokenize(query: &str, mode: WhitespaceMode) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut buffer = String::new();
    let mut depth = 0usize;

    for (pos, ch) in query.char_indices() {
        match ch {
            '(' => {
                flush(&mut buffer, &mut tokens);
                tokens.push(Token::Open);
                depth += 1;
            }
            ')' => {
                if depth == 0 {
                    return Err(QueryError::UnmatchedParen(ParenImbalance::MissingOpen {
                        position: pos,
                    }));
                }
                flush(&mut buffer, &mut tokens);
                tokens.push(Token::Close);
                depth -= 1;
            }
            ch if depth > 0 && is_or_char(ch) => {
                flush(&mut buffer, &mut tokens);
                tokens.push(Token::Or);
            }
            ch if ch.is_whitespace() => {
                if depth > 0 && mode == WhitespaceMode::Legacy && !buffer.trim().is_empty() {
                    let rest = &query[pos + ch.len_utf8()..];
                    match rest.trim_start().chars().next() {
                        Some(next) if is_or_char(next) || next == '(' || next == ')' => {
                            flush(&mut buffer, &mut tokens);
                        }
                        Some(_) => buffer.push(ch),
                        None => flush(&mut buffer, &mut tokens),
                    }
                } else {
                    flush(&mut buffer, &mut tokens);
                }
            }
            _ => buffer.push(ch),
        }
    }

    flush(&mut buffer, &mut tokens);

    if depth > 0 {
        return Err(QueryError::UnmatchedParen(ParenImbalance::MissingClose {
            count: depth,
        }));
    }

    Ok(tokens)
}

fn flush(buffer: &mut String, tokens: &mut Vec<Token>) {
    let atom = buffer.trim();
    if !atom.is_empty() {
        tokens.push(Token::Atom(atom.to_string()));
    }
    buffer.clear();
}
