//! Parser for the alias-set column of the reference table.
//!
//! The column holds a literal collection of quoted strings as written by
//! the tool that produced the table, e.g. `{'PN-B-03264:1984', 'PN-B-03264:1999'}`.
//! Accepted forms: `{...}`, `[...]`, `(...)`, `set()`, `set(<collection>)`
//! and `frozenset(...)`. Items are single- or double-quoted strings with
//! backslash escapes. Nothing is evaluated.

use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid alias set at column {column}: {message}")]
pub struct AliasSetError {
    pub column: usize,
    pub message: String,
}

/// Parse an alias-set literal into its strings.
///
/// Duplicates collapse; order is not significant.
pub fn parse(input: &str) -> Result<BTreeSet<String>, AliasSetError> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
    };
    let items = parser.collection()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(items)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn error(&self, message: impl Into<String>) -> AliasSetError {
        AliasSetError {
            column: self.pos + 1,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let end = self.pos + keyword.chars().count();
        if end <= self.chars.len() && self.chars[self.pos..end].iter().copied().eq(keyword.chars()) {
            self.pos = end;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), AliasSetError> {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{expected}'")))
        }
    }

    fn collection(&mut self) -> Result<BTreeSet<String>, AliasSetError> {
        self.skip_ws();
        if self.eat_keyword("frozenset") || self.eat_keyword("set") {
            self.expect('(')?;
            self.skip_ws();
            if self.peek() == Some(')') {
                self.pos += 1;
                return Ok(BTreeSet::new());
            }
            let items = self.collection()?;
            self.expect(')')?;
            return Ok(items);
        }

        let close = match self.peek() {
            Some('{') => '}',
            Some('[') => ']',
            Some('(') => ')',
            Some(_) => return Err(self.error("expected a set, list or tuple literal")),
            None => return Err(self.error("empty alias set")),
        };
        self.pos += 1;

        let mut items = BTreeSet::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(items);
            }
            items.insert(self.string()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {}
                Some(_) => return Err(self.error(format!("expected ',' or '{close}'"))),
                None => return Err(self.error(format!("unterminated collection, expected '{close}'"))),
            }
        }
    }

    fn string(&mut self) -> Result<String, AliasSetError> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected a quoted string")),
        };
        self.pos += 1;

        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    let escaped = match self.peek() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some(c @ ('\\' | '\'' | '"')) => c,
                        Some(c) => {
                            // Unknown escapes are kept verbatim
                            out.push('\\');
                            c
                        }
                        None => return Err(self.error("unterminated escape")),
                    };
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }
}
