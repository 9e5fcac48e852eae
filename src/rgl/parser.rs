//! RGL recursive descent parser.
//!
//! Grammar for one record:
//!
//! ```text
//! statement   := token ':' token '>' token '(' 'p' probability ',' token ')'
//! token       := DIGITS
//! probability := DIGITS ( '.' DIGITS )?
//! ```

use crate::model::{Probability, Statement, Token};
use crate::{Error, Result};
use super::lexer::{Lexeme, LexemeKind};

/// Parser state: a lexeme slice plus a cursor.
struct Parser<'t> {
    lexemes: &'t [Lexeme],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(lexemes: &'t [Lexeme]) -> Self {
        Self { lexemes, pos: 0 }
    }

    fn peek(&self) -> &Lexeme {
        &self.lexemes[self.pos.min(self.lexemes.len() - 1)]
    }

    fn advance(&mut self) -> &Lexeme {
        let lexeme = &self.lexemes[self.pos.min(self.lexemes.len() - 1)];
        if self.pos < self.lexemes.len() {
            self.pos += 1;
        }
        lexeme
    }

    fn expect(&mut self, kind: LexemeKind) -> Result<&Lexeme> {
        let lexeme = self.peek();
        if lexeme.kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error(format!("Expected {:?}, got {:?} '{}'", kind, lexeme.kind, lexeme.text)))
        }
    }

    fn at(&self, kind: LexemeKind) -> bool {
        self.peek().kind == kind
    }

    fn error(&self, msg: String) -> Error {
        Error::MalformedStatement {
            position: self.peek().span.start,
            message: msg,
        }
    }
}

/// Parse a complete record from lexemes.
pub fn parse_statement(lexemes: &[Lexeme]) -> Result<Statement> {
    if lexemes.is_empty() {
        return Err(Error::MalformedStatement { position: 0, message: "Empty record".into() });
    }
    let mut p = Parser::new(lexemes);

    let main = parse_token(&mut p)?;
    p.expect(LexemeKind::Colon)?;
    let sub = parse_token(&mut p)?;
    p.expect(LexemeKind::Gt)?;
    let variable = parse_token(&mut p)?;
    p.expect(LexemeKind::LParen)?;
    p.expect(LexemeKind::ProbMarker)?;
    let probability = parse_probability(&mut p)?;
    p.expect(LexemeKind::Comma)?;
    let condition = parse_token(&mut p)?;
    p.expect(LexemeKind::RParen)?;

    if !p.at(LexemeKind::Eof) {
        let tail = p.peek().text.clone();
        return Err(p.error(format!("Unexpected trailing input '{tail}'")));
    }

    Ok(Statement::new(main, sub, variable, probability, condition))
}

fn parse_token(p: &mut Parser<'_>) -> Result<Token> {
    let position = p.peek().span.start;
    let digits = p.expect(LexemeKind::Digits)?;
    digits
        .text
        .parse::<u64>()
        .map(Token)
        .map_err(|_| Error::MalformedStatement {
            position,
            message: format!("Token id '{}' out of range", digits.text),
        })
}

fn parse_probability(p: &mut Parser<'_>) -> Result<Probability> {
    let position = p.peek().span.start;
    let mut text = p.expect(LexemeKind::Digits)?.text.clone();
    if p.at(LexemeKind::Dot) {
        p.advance();
        text.push('.');
        text.push_str(&p.expect(LexemeKind::Digits)?.text);
    }

    let value: f64 = text.parse().map_err(|_| Error::MalformedStatement {
        position,
        message: format!("Invalid probability '{text}'"),
    })?;
    Probability::new(value).map_err(|_| Error::MalformedStatement {
        position,
        message: format!("Probability {text} outside [0, 1]"),
    })
}
