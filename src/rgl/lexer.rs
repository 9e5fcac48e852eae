//! RGL lexer — splits one statement record into lexemes.

use crate::{Error, Result};

/// A lexeme from one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    pub span: Span,
    pub text: String,
}

/// Source span (byte offsets into the record).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Lexeme kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexemeKind {
    /// Run of ASCII digits.
    Digits,
    /// Probability marker `p`.
    ProbMarker,

    // Punctuation
    Colon,
    Gt,
    LParen,
    RParen,
    Comma,
    Dot,

    Eof,
}

/// Tokenize a single statement record.
pub fn tokenize(input: &str) -> Result<Vec<Lexeme>> {
    let mut lexemes = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => { chars.next(); }

            c if c.is_ascii_digit() => {
                let start = pos;
                let mut digits = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_digit() {
                        digits.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                lexemes.push(Lexeme {
                    kind: LexemeKind::Digits,
                    span: Span { start, end: start + digits.len() },
                    text: digits,
                });
            }

            'p' => { chars.next(); lexemes.push(punct(LexemeKind::ProbMarker, pos, "p")); }
            ':' => { chars.next(); lexemes.push(punct(LexemeKind::Colon, pos, ":")); }
            '>' => { chars.next(); lexemes.push(punct(LexemeKind::Gt, pos, ">")); }
            '(' => { chars.next(); lexemes.push(punct(LexemeKind::LParen, pos, "(")); }
            ')' => { chars.next(); lexemes.push(punct(LexemeKind::RParen, pos, ")")); }
            ',' => { chars.next(); lexemes.push(punct(LexemeKind::Comma, pos, ",")); }
            '.' => { chars.next(); lexemes.push(punct(LexemeKind::Dot, pos, ".")); }

            other => {
                return Err(Error::MalformedStatement {
                    position: pos,
                    message: format!("Unexpected character '{other}'"),
                });
            }
        }
    }

    lexemes.push(Lexeme {
        kind: LexemeKind::Eof,
        span: Span { start: input.len(), end: input.len() },
        text: String::new(),
    });

    Ok(lexemes)
}

fn punct(kind: LexemeKind, pos: usize, text: &str) -> Lexeme {
    Lexeme {
        kind,
        span: Span { start: pos, end: pos + text.len() },
        text: text.to_string(),
    }
}
